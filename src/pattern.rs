//! Grammar Model: the immutable RELAX-NG pattern tree.
//!
//! Patterns are `Arc`-shared nodes built once by the compiler and never
//! mutated afterwards, which is what lets any number of concurrent
//! validations walk one grammar without synchronization. The derivative
//! functions in [`crate::automaton`] replace the *current* pattern on every
//! structural event; they never modify a pattern in place.
//!
//! `After(p, q)` is the compound continuation node of the derivative
//! algorithm: "finish matching `p`, then the enclosing context resumes at
//! `q`". Together with `Choice` it is how non-deterministic alternatives are
//! carried forward without committing to a branch prematurely.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::datatype::{Datatype, DatatypeParams};
use crate::event::QName;
use crate::schematron::SchematronRule;

/// Predicate over resolved (namespace, local-name) pairs.
#[derive(Debug, Clone, PartialEq)]
pub enum NameClass {
    /// A single fixed name.
    Named { namespace: String, local: String },
    /// Any name in a namespace, minus an optional exclusion.
    NsName {
        namespace: String,
        except: Option<Box<NameClass>>,
    },
    /// Any name at all, minus an optional exclusion.
    AnyName { except: Option<Box<NameClass>> },
    Choice(Box<NameClass>, Box<NameClass>),
}

impl NameClass {
    pub fn named(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        NameClass::Named {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    pub fn contains(&self, name: &QName) -> bool {
        match self {
            NameClass::Named { namespace, local } => {
                *namespace == name.namespace && *local == name.local
            }
            NameClass::NsName { namespace, except } => {
                *namespace == name.namespace
                    && !except.as_ref().is_some_and(|ex| ex.contains(name))
            }
            NameClass::AnyName { except } => {
                !except.as_ref().is_some_and(|ex| ex.contains(name))
            }
            NameClass::Choice(a, b) => a.contains(name) || b.contains(name),
        }
    }

    /// Human-readable rendering for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            NameClass::Named { namespace, local } => {
                if namespace.is_empty() {
                    local.clone()
                } else {
                    format!("{{{}}}{}", namespace, local)
                }
            }
            NameClass::NsName { namespace, .. } => format!("{{{}}}*", namespace),
            NameClass::AnyName { .. } => "*".to_string(),
            NameClass::Choice(a, b) => format!("{} or {}", a.describe(), b.describe()),
        }
    }
}

impl fmt::Display for NameClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// A node in the grammar's pattern tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Empty,
    NotAllowed,
    Text,
    Choice(Arc<Pattern>, Arc<Pattern>),
    Group(Arc<Pattern>, Arc<Pattern>),
    Interleave(Arc<Pattern>, Arc<Pattern>),
    OneOrMore(Arc<Pattern>),
    Attribute(NameClass, Arc<Pattern>),
    Element(NameClass, Arc<Pattern>),
    /// Indirect reference into the grammar's definition map, resolved lazily
    /// at each derivative step. Cyclic definitions stay finite this way.
    Ref(String),
    Data {
        datatype: Datatype,
        params: DatatypeParams,
        except: Option<Arc<Pattern>>,
    },
    Value {
        datatype: Datatype,
        literal: String,
    },
    /// Derivative-internal continuation: match the first pattern to the end
    /// of the current element, then resume the second.
    After(Arc<Pattern>, Arc<Pattern>),
}

fn singleton(cell: &'static OnceLock<Arc<Pattern>>, make: fn() -> Pattern) -> Arc<Pattern> {
    cell.get_or_init(|| Arc::new(make())).clone()
}

pub fn empty() -> Arc<Pattern> {
    static CELL: OnceLock<Arc<Pattern>> = OnceLock::new();
    singleton(&CELL, || Pattern::Empty)
}

pub fn not_allowed() -> Arc<Pattern> {
    static CELL: OnceLock<Arc<Pattern>> = OnceLock::new();
    singleton(&CELL, || Pattern::NotAllowed)
}

pub fn text() -> Arc<Pattern> {
    static CELL: OnceLock<Arc<Pattern>> = OnceLock::new();
    singleton(&CELL, || Pattern::Text)
}

/// Non-deterministic OR of two patterns. Both branches are retained; the
/// automaton never commits to one prematurely.
pub fn choice(a: Arc<Pattern>, b: Arc<Pattern>) -> Arc<Pattern> {
    match (&*a, &*b) {
        (Pattern::NotAllowed, _) => b,
        (_, Pattern::NotAllowed) => a,
        (Pattern::Empty, Pattern::Empty) => a,
        _ if Arc::ptr_eq(&a, &b) => a,
        _ => Arc::new(Pattern::Choice(a, b)),
    }
}

/// Ordered concatenation.
pub fn group(a: Arc<Pattern>, b: Arc<Pattern>) -> Arc<Pattern> {
    match (&*a, &*b) {
        (Pattern::NotAllowed, _) | (_, Pattern::NotAllowed) => not_allowed(),
        (Pattern::Empty, _) => b,
        (_, Pattern::Empty) => a,
        _ => Arc::new(Pattern::Group(a, b)),
    }
}

/// Unordered merge: children may arrive in any interleaving.
pub fn interleave(a: Arc<Pattern>, b: Arc<Pattern>) -> Arc<Pattern> {
    match (&*a, &*b) {
        (Pattern::NotAllowed, _) | (_, Pattern::NotAllowed) => not_allowed(),
        (Pattern::Empty, _) => b,
        (_, Pattern::Empty) => a,
        _ => Arc::new(Pattern::Interleave(a, b)),
    }
}

pub fn one_or_more(p: Arc<Pattern>) -> Arc<Pattern> {
    match &*p {
        Pattern::NotAllowed => not_allowed(),
        Pattern::Empty => empty(),
        _ => Arc::new(Pattern::OneOrMore(p)),
    }
}

pub fn after(a: Arc<Pattern>, b: Arc<Pattern>) -> Arc<Pattern> {
    match (&*a, &*b) {
        (Pattern::NotAllowed, _) | (_, Pattern::NotAllowed) => not_allowed(),
        _ => Arc::new(Pattern::After(a, b)),
    }
}

/// A compiled grammar: the start pattern, the named definition map that
/// `Pattern::Ref` nodes resolve against, and the embedded assertion rules.
///
/// Read-only after compilation; share across validations with `Arc<Grammar>`.
#[derive(Debug)]
pub struct Grammar {
    start: Arc<Pattern>,
    defines: HashMap<String, Arc<Pattern>>,
    rules: Vec<SchematronRule>,
}

impl Grammar {
    pub fn new(
        start: Arc<Pattern>,
        defines: HashMap<String, Arc<Pattern>>,
        rules: Vec<SchematronRule>,
    ) -> Self {
        Self {
            start,
            defines,
            rules,
        }
    }

    pub fn start(&self) -> &Arc<Pattern> {
        &self.start
    }

    pub fn resolve(&self, name: &str) -> Option<&Arc<Pattern>> {
        self.defines.get(name)
    }

    pub fn defines(&self) -> &HashMap<String, Arc<Pattern>> {
        &self.defines
    }

    pub fn rules(&self) -> &[SchematronRule] {
        &self.rules
    }

    /// True when the pattern accepts the empty sequence, i.e. the current
    /// element may close now.
    pub fn nullable(&self, p: &Pattern) -> bool {
        let mut visiting = Vec::new();
        self.nullable_guarded(p, &mut visiting)
    }

    fn nullable_guarded<'g>(&'g self, p: &'g Pattern, visiting: &mut Vec<&'g str>) -> bool {
        match p {
            Pattern::Empty | Pattern::Text => true,
            Pattern::NotAllowed
            | Pattern::Attribute(..)
            | Pattern::Element(..)
            | Pattern::Data { .. }
            | Pattern::Value { .. }
            | Pattern::After(..) => false,
            Pattern::Choice(a, b) => {
                self.nullable_guarded(a, visiting) || self.nullable_guarded(b, visiting)
            }
            Pattern::Group(a, b) | Pattern::Interleave(a, b) => {
                self.nullable_guarded(a, visiting) && self.nullable_guarded(b, visiting)
            }
            Pattern::OneOrMore(inner) => self.nullable_guarded(inner, visiting),
            Pattern::Ref(name) => {
                // A ref cycle with no intervening element is rejected at
                // compile time; the guard keeps this total regardless.
                if visiting.iter().any(|n| *n == name) {
                    return false;
                }
                match self.resolve(name) {
                    Some(target) => {
                        visiting.push(name);
                        let result = self.nullable_guarded(target, visiting);
                        visiting.pop();
                        result
                    }
                    None => false,
                }
            }
        }
    }

    /// Structural equivalence of two grammars: same start pattern, same
    /// definitions, same rule count. Compiling the same source twice must
    /// yield equivalent grammars.
    pub fn structurally_equal(&self, other: &Grammar) -> bool {
        self.start == other.start
            && self.defines == other.defines
            && self.rules == other.rules
    }
}
