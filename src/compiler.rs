//! Schema Compiler: lowers a RELAX-NG grammar-source document (XML syntax,
//! with embedded Schematron annotations) into a [`Grammar`].
//!
//! Two passes over a `<grammar>`: the first collects `<define>` bindings so
//! forward references are legal, the second lowers each body into a pattern.
//! References stay indirect (`Pattern::Ref`) and are resolved lazily during
//! derivation, so cyclic definitions never expand; a reference cycle that
//! does not pass through an `<element>` is rejected here instead.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::datatype::{Datatype, DatatypeParams};
use crate::error::{CompileError, CompileResult};
use crate::event::Location;
use crate::pattern::{
    Grammar, NameClass, Pattern, choice, empty, group, interleave, not_allowed, one_or_more, text,
};
use crate::schematron::{
    ContextPath, Expr, MessagePart, MessageTemplate, SchematronRule, SchematronTest, TestKind,
};
use crate::xml_source::{self, XmlChild, XmlElement};

pub const RELAXNG_NS: &str = "http://relaxng.org/ns/structure/1.0";
pub const SCHEMATRON_NS: &str = "http://www.ascc.net/xml/schematron";
pub const SCHEMATRON_ISO_NS: &str = "http://purl.oclc.org/dsdl/schematron";

/// Compile grammar source bytes into a grammar.
pub fn compile_source(bytes: &[u8]) -> CompileResult<Grammar> {
    let root = xml_source::parse_document(bytes)
        .map_err(|e| CompileError::syntax(e.location, e.details))?;
    compile_tree(&root)
}

/// Compile an already-parsed grammar-source tree.
pub fn compile_tree(root: &XmlElement) -> CompileResult<Grammar> {
    Compiler::default().compile(root)
}

fn is_schematron(ns: &str) -> bool {
    ns == SCHEMATRON_NS || ns == SCHEMATRON_ISO_NS
}

/// Inheritable compilation context: the in-scope `ns` and `datatypeLibrary`
/// attribute values, plus the nearest named element for defaulted rule
/// contexts.
#[derive(Debug, Clone, Default)]
struct Ctx {
    ns: String,
    datatype_library: String,
    element_name: Option<String>,
}

impl Ctx {
    fn descend(&self, elem: &XmlElement) -> Ctx {
        let mut next = self.clone();
        if let Some(ns) = elem.attribute("ns") {
            next.ns = ns.to_string();
        }
        if let Some(lib) = elem.attribute("datatypeLibrary") {
            next.datatype_library = lib.to_string();
        }
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CombineOp {
    Choice,
    Interleave,
}

#[derive(Default)]
struct Compiler {
    defines: HashMap<String, Arc<Pattern>>,
    define_locations: HashMap<String, Location>,
    used_refs: Vec<(String, Location)>,
    rules: Vec<SchematronRule>,
}

impl Compiler {
    fn compile(mut self, root: &XmlElement) -> CompileResult<Grammar> {
        if root.name.namespace != RELAXNG_NS {
            return Err(CompileError::syntax(
                root.location,
                format!(
                    "expected a RELAX-NG grammar document, found root element \"{}\"",
                    root.name
                ),
            ));
        }
        let ctx = Ctx::default().descend(root);
        let start = match root.name.local.as_str() {
            // A bare pattern as document root is an implicit grammar.
            "element" => self.lower_pattern(root, &ctx)?,
            "grammar" => self.compile_grammar_element(root, &ctx)?,
            other => {
                return Err(CompileError::syntax(
                    root.location,
                    format!("\"{}\" cannot start a grammar document", other),
                ));
            }
        };

        // Every ref must resolve within this grammar.
        for (name, _loc) in &self.used_refs {
            if !self.defines.contains_key(name) {
                return Err(CompileError::UnresolvedRef { name: name.clone() });
            }
        }
        self.check_ref_cycles()?;

        Ok(Grammar::new(start, self.defines, self.rules))
    }

    fn compile_grammar_element(
        &mut self,
        grammar: &XmlElement,
        ctx: &Ctx,
    ) -> CompileResult<Arc<Pattern>> {
        let mut start: Option<Arc<Pattern>> = None;
        let mut pending: HashMap<String, (Option<CombineOp>, Vec<Arc<Pattern>>)> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for child in grammar.elements() {
            let child_ctx = ctx.descend(child);
            if is_schematron(&child.name.namespace) {
                self.collect_schematron(child, None)?;
                continue;
            }
            if child.name.namespace != RELAXNG_NS {
                // Foreign-namespace annotations are ignored.
                continue;
            }
            match child.name.local.as_str() {
                "start" => {
                    if start.is_some() {
                        return Err(CompileError::syntax(
                            child.location,
                            "start rule defined more than once",
                        ));
                    }
                    start = Some(self.lower_children(child, &child_ctx)?);
                }
                "define" => {
                    let name = required_attribute(child, "name")?.to_string();
                    let combine = match child.attribute("combine") {
                        None => None,
                        Some("choice") => Some(CombineOp::Choice),
                        Some("interleave") => Some(CombineOp::Interleave),
                        Some(other) => {
                            return Err(CompileError::syntax(
                                child.location,
                                format!("invalid combine value \"{}\"", other),
                            ));
                        }
                    };
                    let body = self.lower_children(child, &child_ctx)?;
                    match pending.entry(name.clone()) {
                        std::collections::hash_map::Entry::Vacant(entry) => {
                            order.push(name.clone());
                            self.define_locations.insert(name, child.location);
                            entry.insert((combine, vec![body]));
                        }
                        std::collections::hash_map::Entry::Occupied(mut entry) => {
                            let (existing_op, bodies) = entry.get_mut();
                            let op = match (*existing_op, combine) {
                                (None, None) => {
                                    return Err(CompileError::syntax(
                                        child.location,
                                        format!("duplicate definition of \"{}\"", name),
                                    ));
                                }
                                (Some(a), Some(b)) if a != b => {
                                    return Err(CompileError::syntax(
                                        child.location,
                                        format!(
                                            "definition \"{}\" mixes combine=\"choice\" and combine=\"interleave\"",
                                            name
                                        ),
                                    ));
                                }
                                (Some(op), _) | (_, Some(op)) => op,
                            };
                            *existing_op = Some(op);
                            bodies.push(body);
                        }
                    }
                }
                "include" | "externalRef" => {
                    return Err(CompileError::syntax(
                        child.location,
                        format!("\"{}\" is not supported", child.name.local),
                    ));
                }
                other => {
                    return Err(CompileError::syntax(
                        child.location,
                        format!("unexpected element \"{}\" in grammar", other),
                    ));
                }
            }
        }

        for name in order {
            let (op, mut bodies) = pending.remove(&name).expect("collected above");
            let merged = match op {
                _ if bodies.len() == 1 => bodies.pop().expect("one body"),
                Some(CombineOp::Interleave) => {
                    bodies.into_iter().reduce(interleave).expect("non-empty")
                }
                _ => bodies.into_iter().reduce(choice).expect("non-empty"),
            };
            self.defines.insert(name, merged);
        }

        start.ok_or_else(|| {
            CompileError::syntax(grammar.location, "grammar does not define a start rule")
        })
    }

    /// Lower an element's pattern children as one sequence, collecting any
    /// embedded Schematron rules along the way.
    fn lower_children(&mut self, parent: &XmlElement, ctx: &Ctx) -> CompileResult<Arc<Pattern>> {
        let mut parts = Vec::new();
        for child in parent.elements() {
            if is_schematron(&child.name.namespace) {
                self.collect_schematron(child, ctx.element_name.as_deref())?;
                continue;
            }
            if child.name.namespace != RELAXNG_NS {
                continue;
            }
            parts.push(self.lower_pattern(child, &ctx.descend(child))?);
        }
        match parts.len() {
            0 => Err(CompileError::syntax(
                parent.location,
                format!("\"{}\" requires a content pattern", parent.name.local),
            )),
            _ => Ok(parts.into_iter().reduce(group).expect("non-empty")),
        }
    }

    fn lower_pattern(&mut self, elem: &XmlElement, ctx: &Ctx) -> CompileResult<Arc<Pattern>> {
        match elem.name.local.as_str() {
            "element" => self.lower_element(elem, ctx),
            "attribute" => self.lower_attribute(elem, ctx),
            "group" => self.lower_children(elem, ctx),
            "choice" => self.lower_combinator(elem, ctx, choice),
            "interleave" => self.lower_combinator(elem, ctx, interleave),
            "optional" => Ok(choice(self.lower_children(elem, ctx)?, empty())),
            "zeroOrMore" => Ok(choice(one_or_more(self.lower_children(elem, ctx)?), empty())),
            "oneOrMore" => Ok(one_or_more(self.lower_children(elem, ctx)?)),
            "mixed" => Ok(interleave(self.lower_children(elem, ctx)?, text())),
            "empty" => Ok(empty()),
            "text" => Ok(text()),
            "notAllowed" => Ok(not_allowed()),
            "ref" => {
                let name = required_attribute(elem, "name")?.to_string();
                self.used_refs.push((name.clone(), elem.location));
                Ok(Arc::new(Pattern::Ref(name)))
            }
            "data" => self.lower_data(elem, ctx),
            "value" => self.lower_value(elem, ctx),
            "list" | "externalRef" | "parentRef" | "grammar" | "include" => Err(
                CompileError::syntax(
                    elem.location,
                    format!("\"{}\" patterns are not supported", elem.name.local),
                ),
            ),
            other => Err(CompileError::syntax(
                elem.location,
                format!("unknown pattern element \"{}\"", other),
            )),
        }
    }

    fn lower_combinator(
        &mut self,
        elem: &XmlElement,
        ctx: &Ctx,
        combine: fn(Arc<Pattern>, Arc<Pattern>) -> Arc<Pattern>,
    ) -> CompileResult<Arc<Pattern>> {
        let mut parts = Vec::new();
        for child in elem.elements() {
            if is_schematron(&child.name.namespace) {
                self.collect_schematron(child, ctx.element_name.as_deref())?;
                continue;
            }
            if child.name.namespace != RELAXNG_NS {
                continue;
            }
            parts.push(self.lower_pattern(child, &ctx.descend(child))?);
        }
        parts
            .into_iter()
            .reduce(combine)
            .ok_or_else(|| CompileError::syntax(elem.location, "empty choice or interleave"))
    }

    fn lower_element(&mut self, elem: &XmlElement, ctx: &Ctx) -> CompileResult<Arc<Pattern>> {
        let (name_class, skip_first) = self.element_name_class(elem, ctx, &ctx.ns)?;
        let mut content_ctx = ctx.clone();
        content_ctx.element_name = match &name_class {
            NameClass::Named { local, .. } => Some(local.clone()),
            _ => None,
        };

        let mut parts = Vec::new();
        for (i, child) in elem.elements().enumerate() {
            if skip_first && i == 0 {
                continue;
            }
            if is_schematron(&child.name.namespace) {
                self.collect_schematron(child, content_ctx.element_name.as_deref())?;
                continue;
            }
            if child.name.namespace != RELAXNG_NS {
                continue;
            }
            parts.push(self.lower_pattern(child, &content_ctx.descend(child))?);
        }
        let content = parts.into_iter().reduce(group).ok_or_else(|| {
            CompileError::syntax(elem.location, "element requires a content pattern")
        })?;
        Ok(Arc::new(Pattern::Element(name_class, content)))
    }

    fn lower_attribute(&mut self, elem: &XmlElement, ctx: &Ctx) -> CompileResult<Arc<Pattern>> {
        // Unlike elements, an attribute name is in no namespace unless the
        // attribute pattern itself says otherwise.
        let attr_ns = elem.attribute("ns").unwrap_or("");
        let (name_class, skip_first) = self.element_name_class(elem, ctx, attr_ns)?;

        let mut parts = Vec::new();
        for (i, child) in elem.elements().enumerate() {
            if skip_first && i == 0 {
                continue;
            }
            if child.name.namespace != RELAXNG_NS {
                continue;
            }
            parts.push(self.lower_pattern(child, &ctx.descend(child))?);
        }
        // An attribute with no content pattern accepts any text.
        let content = parts.into_iter().reduce(group).unwrap_or_else(text);
        Ok(Arc::new(Pattern::Attribute(name_class, content)))
    }

    /// Name class of an element/attribute pattern: either a `name` attribute
    /// or a leading name-class child.
    fn element_name_class(
        &mut self,
        elem: &XmlElement,
        _ctx: &Ctx,
        default_ns: &str,
    ) -> CompileResult<(NameClass, bool)> {
        if let Some(name) = elem.attribute("name") {
            let name = name.trim();
            if name.contains(':') {
                return Err(CompileError::syntax(
                    elem.location,
                    format!(
                        "prefixed name \"{}\" is not supported; use an ns attribute",
                        name
                    ),
                ));
            }
            return Ok((NameClass::named(default_ns, name), false));
        }
        let first = elem.elements().next().ok_or_else(|| {
            CompileError::syntax(
                elem.location,
                format!("\"{}\" requires a name or a name class", elem.name.local),
            )
        })?;
        let nc = self.lower_name_class(first, default_ns)?;
        Ok((nc, true))
    }

    fn lower_name_class(&mut self, elem: &XmlElement, default_ns: &str) -> CompileResult<NameClass> {
        if elem.name.namespace != RELAXNG_NS {
            return Err(CompileError::syntax(
                elem.location,
                format!("\"{}\" is not a name class", elem.name),
            ));
        }
        let ns = elem.attribute("ns").unwrap_or(default_ns);
        match elem.name.local.as_str() {
            "name" => {
                let value = elem.text();
                let local = value.trim();
                if local.is_empty() || local.contains(':') {
                    return Err(CompileError::syntax(
                        elem.location,
                        format!("malformed name \"{}\"", local),
                    ));
                }
                Ok(NameClass::named(ns, local))
            }
            "anyName" => Ok(NameClass::AnyName {
                except: self.name_class_except(elem, default_ns)?,
            }),
            "nsName" => Ok(NameClass::NsName {
                namespace: ns.to_string(),
                except: self.name_class_except(elem, default_ns)?,
            }),
            "choice" => {
                let mut parts = Vec::new();
                for child in elem.elements() {
                    parts.push(self.lower_name_class(child, default_ns)?);
                }
                parts
                    .into_iter()
                    .reduce(|a, b| NameClass::Choice(Box::new(a), Box::new(b)))
                    .ok_or_else(|| CompileError::syntax(elem.location, "empty name-class choice"))
            }
            other => Err(CompileError::syntax(
                elem.location,
                format!("malformed name class \"{}\"", other),
            )),
        }
    }

    fn name_class_except(
        &mut self,
        elem: &XmlElement,
        default_ns: &str,
    ) -> CompileResult<Option<Box<NameClass>>> {
        let mut except = None;
        for child in elem.elements() {
            if child.name.namespace == RELAXNG_NS && child.name.local == "except" {
                let mut parts = Vec::new();
                for nc in child.elements() {
                    parts.push(self.lower_name_class(nc, default_ns)?);
                }
                let merged = parts
                    .into_iter()
                    .reduce(|a, b| NameClass::Choice(Box::new(a), Box::new(b)))
                    .ok_or_else(|| CompileError::syntax(child.location, "empty except"))?;
                except = Some(Box::new(merged));
            }
        }
        Ok(except)
    }

    fn lower_data(&mut self, elem: &XmlElement, ctx: &Ctx) -> CompileResult<Arc<Pattern>> {
        let type_name = required_attribute(elem, "type")?;
        let datatype = Datatype::lookup(&ctx.datatype_library, type_name).ok_or_else(|| {
            CompileError::syntax(
                elem.location,
                format!(
                    "unknown datatype \"{}\" in library \"{}\"",
                    type_name, ctx.datatype_library
                ),
            )
        })?;
        let mut params = DatatypeParams::default();
        let mut except = None;
        for child in elem.elements() {
            if child.name.namespace != RELAXNG_NS {
                continue;
            }
            match child.name.local.as_str() {
                "param" => {
                    let name = required_attribute(child, "name")?;
                    params
                        .set(name, &child.text())
                        .map_err(|e| CompileError::syntax(child.location, e))?;
                }
                "except" => {
                    let mut parts = Vec::new();
                    for p in child.elements() {
                        parts.push(self.lower_pattern(p, &ctx.descend(p))?);
                    }
                    except = parts.into_iter().reduce(choice);
                }
                other => {
                    return Err(CompileError::syntax(
                        child.location,
                        format!("unexpected \"{}\" inside data", other),
                    ));
                }
            }
        }
        Ok(Arc::new(Pattern::Data {
            datatype,
            params,
            except,
        }))
    }

    fn lower_value(&mut self, elem: &XmlElement, ctx: &Ctx) -> CompileResult<Arc<Pattern>> {
        let datatype = match elem.attribute("type") {
            // With no type, value compares as a builtin token.
            None => Datatype::Token,
            Some(type_name) => {
                Datatype::lookup(&ctx.datatype_library, type_name).ok_or_else(|| {
                    CompileError::syntax(
                        elem.location,
                        format!(
                            "unknown datatype \"{}\" in library \"{}\"",
                            type_name, ctx.datatype_library
                        ),
                    )
                })?
            }
        };
        Ok(Arc::new(Pattern::Value {
            datatype,
            literal: elem.text(),
        }))
    }

    /// Collect Schematron annotations: a `pattern` wrapper, a single `rule`,
    /// or anything else in the Schematron namespace (ignored).
    fn collect_schematron(
        &mut self,
        elem: &XmlElement,
        default_context: Option<&str>,
    ) -> CompileResult<()> {
        match elem.name.local.as_str() {
            "pattern" => {
                for child in elem.elements() {
                    if is_schematron(&child.name.namespace) && child.name.local == "rule" {
                        let rule = self.compile_rule(child, default_context)?;
                        self.rules.push(rule);
                    }
                }
            }
            "rule" => {
                let rule = self.compile_rule(elem, default_context)?;
                self.rules.push(rule);
            }
            // title, ns, p and friends carry no assertions
            _ => {}
        }
        Ok(())
    }

    fn compile_rule(
        &mut self,
        elem: &XmlElement,
        default_context: Option<&str>,
    ) -> CompileResult<SchematronRule> {
        let context_text = match elem.attribute("context") {
            Some(c) => c.to_string(),
            None => default_context
                .ok_or_else(|| {
                    CompileError::syntax(elem.location, "rule requires a context attribute")
                })?
                .to_string(),
        };
        let context = ContextPath::parse(&context_text)
            .map_err(|e| CompileError::syntax(elem.location, e))?;

        let mut tests = Vec::new();
        for child in elem.elements() {
            if !is_schematron(&child.name.namespace) {
                continue;
            }
            let kind = match child.name.local.as_str() {
                "assert" => TestKind::Assert,
                "report" => TestKind::Report,
                _ => continue,
            };
            let test_text = required_attribute(child, "test")?;
            let test = Expr::parse(test_text)
                .map_err(|e| CompileError::syntax(child.location, e))?;
            let message = self.compile_message(child)?;
            tests.push(SchematronTest {
                kind,
                test,
                message,
            });
        }
        Ok(SchematronRule { context, tests })
    }

    fn compile_message(&mut self, assert: &XmlElement) -> CompileResult<MessageTemplate> {
        let mut parts = Vec::new();
        for child in &assert.children {
            match child {
                XmlChild::Text(s) => parts.push(MessagePart::Text(s.clone())),
                XmlChild::Element(e) if is_schematron(&e.name.namespace) => {
                    match e.name.local.as_str() {
                        "name" => parts.push(MessagePart::Name),
                        "value-of" => {
                            let select = required_attribute(e, "select")?;
                            let expr = Expr::parse(select)
                                .map_err(|err| CompileError::syntax(e.location, err))?;
                            parts.push(MessagePart::ValueOf(expr));
                        }
                        _ => parts.push(MessagePart::Text(e.text())),
                    }
                }
                XmlChild::Element(e) => parts.push(MessagePart::Text(e.text())),
            }
        }
        Ok(MessageTemplate::new(parts))
    }

    /// A `define` cycle that never crosses an `<element>` would make
    /// derivation diverge; reject it at compile time.
    fn check_ref_cycles(&self) -> CompileResult<()> {
        let mut graph: HashMap<&str, Vec<String>> = HashMap::new();
        for (name, pattern) in &self.defines {
            let mut refs = Vec::new();
            collect_shallow_refs(pattern, &mut refs);
            graph.insert(name, refs);
        }

        let mut in_progress = HashSet::new();
        let mut done = HashSet::new();
        for name in graph.keys() {
            self.visit_define(name, &graph, &mut in_progress, &mut done)?;
        }
        Ok(())
    }

    fn visit_define<'g>(
        &self,
        node: &'g str,
        graph: &'g HashMap<&str, Vec<String>>,
        in_progress: &mut HashSet<&'g str>,
        done: &mut HashSet<&'g str>,
    ) -> CompileResult<()> {
        if done.contains(node) {
            return Ok(());
        }
        if !in_progress.insert(node) {
            let location = self
                .define_locations
                .get(node)
                .copied()
                .unwrap_or_else(Location::unknown);
            return Err(CompileError::syntax(
                location,
                format!(
                    "definition \"{}\" is recursive without an intervening element",
                    node
                ),
            ));
        }
        if let Some(children) = graph.get(node) {
            for next in children {
                if graph.contains_key(next.as_str()) {
                    self.visit_define(next, graph, in_progress, done)?;
                }
            }
        }
        in_progress.remove(node);
        done.insert(node);
        Ok(())
    }
}

/// Refs reachable from a pattern without descending into element content.
fn collect_shallow_refs(p: &Pattern, out: &mut Vec<String>) {
    match p {
        Pattern::Ref(name) => out.push(name.clone()),
        Pattern::Choice(a, b) | Pattern::Group(a, b) | Pattern::Interleave(a, b) => {
            collect_shallow_refs(a, out);
            collect_shallow_refs(b, out);
        }
        Pattern::OneOrMore(inner) | Pattern::Attribute(_, inner) => {
            collect_shallow_refs(inner, out);
        }
        Pattern::Data {
            except: Some(ex), ..
        } => collect_shallow_refs(ex, out),
        _ => {}
    }
}

fn required_attribute<'a>(elem: &'a XmlElement, name: &str) -> CompileResult<&'a str> {
    elem.attribute(name).ok_or_else(|| {
        CompileError::syntax(
            elem.location,
            format!(
                "\"{}\" requires a \"{}\" attribute",
                elem.name.local, name
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::QName;

    const ITEMS_GRAMMAR: &str = r#"<?xml version="1.0"?>
<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start>
    <element name="root">
      <oneOrMore>
        <ref name="item"/>
      </oneOrMore>
    </element>
  </start>
  <define name="item">
    <element name="item">
      <empty/>
    </element>
  </define>
</grammar>"#;

    #[test]
    fn test_compile_items_grammar() {
        let grammar = compile_source(ITEMS_GRAMMAR.as_bytes()).unwrap();
        assert!(grammar.resolve("item").is_some());
        match &**grammar.start() {
            Pattern::Element(nc, _) => assert!(nc.contains(&QName::local("root"))),
            other => panic!("expected element start pattern, got {:?}", other),
        }
    }

    #[test]
    fn test_compile_is_idempotent() {
        let first = compile_source(ITEMS_GRAMMAR.as_bytes()).unwrap();
        let second = compile_source(ITEMS_GRAMMAR.as_bytes()).unwrap();
        assert!(first.structurally_equal(&second));
    }

    #[test]
    fn test_unresolved_ref() {
        let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><element name="r"><ref name="missing"/></element></start>
</grammar>"#;
        match compile_source(source.as_bytes()) {
            Err(CompileError::UnresolvedRef { name }) => assert_eq!(name, "missing"),
            other => panic!("expected UnresolvedRef, got {:?}", other),
        }
    }

    #[test]
    fn test_implicit_grammar_root() {
        let source = r#"<element name="doc" xmlns="http://relaxng.org/ns/structure/1.0">
  <text/>
</element>"#;
        let grammar = compile_source(source.as_bytes()).unwrap();
        match &**grammar.start() {
            Pattern::Element(nc, content) => {
                assert!(nc.contains(&QName::local("doc")));
                assert_eq!(**content, Pattern::Text);
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_start_rule() {
        let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <define name="x"><element name="x"><empty/></element></define>
</grammar>"#;
        match compile_source(source.as_bytes()) {
            Err(CompileError::Syntax { details, .. }) => {
                assert!(details.contains("start rule"), "details: {}", details)
            }
            other => panic!("expected Syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_start_rule() {
        let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><element name="a"><empty/></element></start>
  <start><element name="b"><empty/></element></start>
</grammar>"#;
        assert!(matches!(
            compile_source(source.as_bytes()),
            Err(CompileError::Syntax { .. })
        ));
    }

    #[test]
    fn test_duplicate_define_without_combine() {
        let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="x"/></start>
  <define name="x"><element name="x"><empty/></element></define>
  <define name="x"><element name="y"><empty/></element></define>
</grammar>"#;
        match compile_source(source.as_bytes()) {
            Err(CompileError::Syntax { details, .. }) => {
                assert!(details.contains("duplicate"), "details: {}", details)
            }
            other => panic!("expected Syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_combine_choice_merges() {
        let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="x"/></start>
  <define name="x" combine="choice"><element name="a"><empty/></element></define>
  <define name="x" combine="choice"><element name="b"><empty/></element></define>
</grammar>"#;
        let grammar = compile_source(source.as_bytes()).unwrap();
        match &**grammar.resolve("x").unwrap() {
            Pattern::Choice(..) => {}
            other => panic!("expected merged choice, got {:?}", other),
        }
    }

    #[test]
    fn test_combine_mismatch_rejected() {
        let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="x"/></start>
  <define name="x" combine="choice"><element name="a"><empty/></element></define>
  <define name="x" combine="interleave"><element name="b"><empty/></element></define>
</grammar>"#;
        assert!(matches!(
            compile_source(source.as_bytes()),
            Err(CompileError::Syntax { .. })
        ));
    }

    #[test]
    fn test_cyclic_defines_through_element_allowed() {
        let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="tree"/></start>
  <define name="tree">
    <element name="node">
      <zeroOrMore><ref name="tree"/></zeroOrMore>
    </element>
  </define>
</grammar>"#;
        assert!(compile_source(source.as_bytes()).is_ok());
    }

    #[test]
    fn test_cycle_without_element_rejected() {
        let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="a"/></start>
  <define name="a"><choice><ref name="b"/><empty/></choice></define>
  <define name="b"><choice><ref name="a"/><empty/></choice></define>
</grammar>"#;
        match compile_source(source.as_bytes()) {
            Err(CompileError::Syntax { details, .. }) => {
                assert!(details.contains("recursive"), "details: {}", details)
            }
            other => panic!("expected Syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_ns_attribute_inherited_for_elements() {
        let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0" ns="http://example.com/ns">
  <start>
    <element name="root">
      <attribute name="id"/>
    </element>
  </start>
</grammar>"#;
        let grammar = compile_source(source.as_bytes()).unwrap();
        match &**grammar.start() {
            Pattern::Element(nc, content) => {
                assert!(nc.contains(&QName::new("http://example.com/ns", "root")));
                // the attribute name stays in no namespace
                match &**content {
                    Pattern::Attribute(anc, _) => {
                        assert!(anc.contains(&QName::local("id")));
                    }
                    other => panic!("expected attribute, got {:?}", other),
                }
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_data_with_params() {
        let source = r#"<element name="code" xmlns="http://relaxng.org/ns/structure/1.0"
    datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes">
  <data type="integer">
    <param name="minInclusive">0</param>
  </data>
</element>"#;
        let grammar = compile_source(source.as_bytes()).unwrap();
        match &**grammar.start() {
            Pattern::Element(_, content) => match &**content {
                Pattern::Data {
                    datatype, params, ..
                } => {
                    assert_eq!(*datatype, Datatype::XsdInteger);
                    assert_eq!(params.min_inclusive, Some(0.0));
                }
                other => panic!("expected data, got {:?}", other),
            },
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_datatype_rejected() {
        let source = r#"<element name="x" xmlns="http://relaxng.org/ns/structure/1.0">
  <data type="gMonth"/>
</element>"#;
        assert!(matches!(
            compile_source(source.as_bytes()),
            Err(CompileError::Syntax { .. })
        ));
    }

    #[test]
    fn test_value_without_type_is_token() {
        let source = r#"<element name="x" xmlns="http://relaxng.org/ns/structure/1.0">
  <value>fixed</value>
</element>"#;
        let grammar = compile_source(source.as_bytes()).unwrap();
        match &**grammar.start() {
            Pattern::Element(_, content) => match &**content {
                Pattern::Value { datatype, literal } => {
                    assert_eq!(*datatype, Datatype::Token);
                    assert_eq!(literal, "fixed");
                }
                other => panic!("expected value, got {:?}", other),
            },
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_name_class_choice_and_nsname() {
        let source = r#"<element xmlns="http://relaxng.org/ns/structure/1.0">
  <choice>
    <name>a</name>
    <nsName ns="http://example.com/ns"/>
  </choice>
  <empty/>
</element>"#;
        let grammar = compile_source(source.as_bytes()).unwrap();
        match &**grammar.start() {
            Pattern::Element(nc, _) => {
                assert!(nc.contains(&QName::local("a")));
                assert!(nc.contains(&QName::new("http://example.com/ns", "whatever")));
                assert!(!nc.contains(&QName::local("b")));
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_embedded_schematron_rules_collected() {
        let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"
         xmlns:sch="http://www.ascc.net/xml/schematron">
  <start>
    <element name="root">
      <sch:rule>
        <sch:assert test="count(item) &gt; 0">root must hold at least one item</sch:assert>
      </sch:rule>
      <zeroOrMore><element name="item"><text/></element></zeroOrMore>
    </element>
  </start>
  <sch:pattern>
    <sch:rule context="item">
      <sch:assert test="string-length(.) &gt; 0">item must have text</sch:assert>
    </sch:rule>
  </sch:pattern>
</grammar>"#;
        let grammar = compile_source(source.as_bytes()).unwrap();
        assert_eq!(grammar.rules().len(), 2);
        // the inline rule defaulted its context to the enclosing element
        assert_eq!(format!("{}", grammar.rules()[0].context), "root");
        assert_eq!(format!("{}", grammar.rules()[1].context), "item");
    }

    #[test]
    fn test_rule_without_context_outside_element_rejected() {
        let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"
         xmlns:sch="http://www.ascc.net/xml/schematron">
  <start><element name="r"><empty/></element></start>
  <sch:pattern>
    <sch:rule><sch:assert test="true()">hm</sch:assert></sch:rule>
  </sch:pattern>
</grammar>"#;
        assert!(matches!(
            compile_source(source.as_bytes()),
            Err(CompileError::Syntax { .. })
        ));
    }

    #[test]
    fn test_malformed_xml_is_syntax_error() {
        let source = "<grammar xmlns=\"http://relaxng.org/ns/structure/1.0\"><start>";
        assert!(matches!(
            compile_source(source.as_bytes()),
            Err(CompileError::Syntax { .. })
        ));
    }

    #[test]
    fn test_include_unsupported() {
        let source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <include href="other.rng"/>
  <start><element name="r"><empty/></element></start>
</grammar>"#;
        match compile_source(source.as_bytes()) {
            Err(CompileError::Syntax { details, .. }) => {
                assert!(details.contains("not supported"))
            }
            other => panic!("expected Syntax error, got {:?}", other),
        }
    }
}
