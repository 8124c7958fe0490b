//! Derivative Automaton: the validation kernel.
//!
//! Each function computes the residual pattern after consuming one
//! structural token, in the classic derivative formulation for regular tree
//! grammars. All functions are pure: they take the shared grammar (for lazy
//! `Ref` resolution) and the current pattern, and return a replacement
//! pattern. `not_allowed()` is the rejecting residual; callers decide how to
//! report and recover.
//!
//! A start tag is consumed in three steps: `start_tag_open_deriv` for the
//! element name, `att_deriv` once per attribute (in whatever order the
//! attributes arrive; order cannot affect the outcome because both operand
//! orders are derived and joined by `Choice`), then `start_tag_close_deriv`
//! once the attribute set is complete.

use std::sync::Arc;

use crate::event::QName;
use crate::pattern::{
    Grammar, Pattern, after, choice, empty, group, interleave, not_allowed, one_or_more,
};

type AfterFn<'f> = &'f dyn Fn(Arc<Pattern>) -> Arc<Pattern>;

/// Distribute a continuation transformer over the `Choice`/`After` spine.
fn apply_after(f: AfterFn<'_>, p: &Arc<Pattern>) -> Arc<Pattern> {
    match &**p {
        Pattern::After(head, cont) => after(head.clone(), f(cont.clone())),
        Pattern::Choice(a, b) => choice(apply_after(f, a), apply_after(f, b)),
        _ => not_allowed(),
    }
}

/// Residual after an element-start event: narrows the pattern to the
/// element's content, with the enclosing continuation recorded in `After`.
pub fn start_tag_open_deriv(g: &Grammar, p: &Arc<Pattern>, name: &QName) -> Arc<Pattern> {
    match &**p {
        Pattern::Choice(a, b) => choice(
            start_tag_open_deriv(g, a, name),
            start_tag_open_deriv(g, b, name),
        ),
        Pattern::Element(nc, content) => {
            if nc.contains(name) {
                after(content.clone(), empty())
            } else {
                not_allowed()
            }
        }
        Pattern::Interleave(a, b) => {
            let b2 = b.clone();
            let left = apply_after(
                &move |x| interleave(x, b2.clone()),
                &start_tag_open_deriv(g, a, name),
            );
            let a2 = a.clone();
            let right = apply_after(
                &move |x| interleave(a2.clone(), x),
                &start_tag_open_deriv(g, b, name),
            );
            choice(left, right)
        }
        Pattern::Group(a, b) => {
            let b2 = b.clone();
            let x = apply_after(
                &move |p1| group(p1, b2.clone()),
                &start_tag_open_deriv(g, a, name),
            );
            if g.nullable(a) {
                choice(x, start_tag_open_deriv(g, b, name))
            } else {
                x
            }
        }
        Pattern::OneOrMore(inner) => {
            let rest = choice(p.clone(), empty());
            apply_after(
                &move |x| group(x, rest.clone()),
                &start_tag_open_deriv(g, inner, name),
            )
        }
        Pattern::After(a, b) => {
            let b2 = b.clone();
            apply_after(
                &move |x| after(x, b2.clone()),
                &start_tag_open_deriv(g, a, name),
            )
        }
        Pattern::Ref(def) => match g.resolve(def) {
            Some(target) => start_tag_open_deriv(g, target, name),
            None => not_allowed(),
        },
        _ => not_allowed(),
    }
}

/// Residual after consuming one attribute of the open start tag.
pub fn att_deriv(g: &Grammar, p: &Arc<Pattern>, name: &QName, value: &str) -> Arc<Pattern> {
    match &**p {
        Pattern::After(a, b) => after(att_deriv(g, a, name, value), b.clone()),
        Pattern::Choice(a, b) => choice(att_deriv(g, a, name, value), att_deriv(g, b, name, value)),
        Pattern::Group(a, b) => choice(
            group(att_deriv(g, a, name, value), b.clone()),
            group(a.clone(), att_deriv(g, b, name, value)),
        ),
        Pattern::Interleave(a, b) => choice(
            interleave(att_deriv(g, a, name, value), b.clone()),
            interleave(a.clone(), att_deriv(g, b, name, value)),
        ),
        Pattern::OneOrMore(inner) => group(
            att_deriv(g, inner, name, value),
            choice(p.clone(), empty()),
        ),
        Pattern::Attribute(nc, content) => {
            if nc.contains(name) && value_match(g, content, value) {
                empty()
            } else {
                not_allowed()
            }
        }
        Pattern::Ref(def) => match g.resolve(def) {
            Some(target) => att_deriv(g, target, name, value),
            None => not_allowed(),
        },
        _ => not_allowed(),
    }
}

/// Does an attribute-content pattern accept the given value?
fn value_match(g: &Grammar, p: &Arc<Pattern>, value: &str) -> bool {
    (g.nullable(p) && crate::datatype::is_xml_whitespace(value))
        || g.nullable(&text_deriv(g, p, value))
}

/// Residual once the start tag's attribute set is complete. Remaining
/// required `Attribute` patterns become `NotAllowed` here.
pub fn start_tag_close_deriv(g: &Grammar, p: &Arc<Pattern>) -> Arc<Pattern> {
    start_tag_close(g, p, false)
}

/// Recovery variant: treats unconsumed required attributes as satisfied so
/// validation of the element's content can continue after the omission has
/// been reported.
pub fn force_start_tag_close(g: &Grammar, p: &Arc<Pattern>) -> Arc<Pattern> {
    start_tag_close(g, p, true)
}

fn start_tag_close(g: &Grammar, p: &Arc<Pattern>, force: bool) -> Arc<Pattern> {
    match &**p {
        Pattern::After(a, b) => after(start_tag_close(g, a, force), b.clone()),
        Pattern::Choice(a, b) => {
            choice(start_tag_close(g, a, force), start_tag_close(g, b, force))
        }
        Pattern::Group(a, b) => group(start_tag_close(g, a, force), start_tag_close(g, b, force)),
        Pattern::Interleave(a, b) => {
            interleave(start_tag_close(g, a, force), start_tag_close(g, b, force))
        }
        Pattern::OneOrMore(inner) => one_or_more(start_tag_close(g, inner, force)),
        Pattern::Attribute(..) => {
            if force {
                empty()
            } else {
                not_allowed()
            }
        }
        Pattern::Ref(def) => match g.resolve(def) {
            Some(target) => start_tag_close(g, target, force),
            None => not_allowed(),
        },
        _ => p.clone(),
    }
}

/// Residual after a text chunk.
pub fn text_deriv(g: &Grammar, p: &Arc<Pattern>, s: &str) -> Arc<Pattern> {
    match &**p {
        Pattern::Choice(a, b) => choice(text_deriv(g, a, s), text_deriv(g, b, s)),
        Pattern::Interleave(a, b) => choice(
            interleave(text_deriv(g, a, s), b.clone()),
            interleave(a.clone(), text_deriv(g, b, s)),
        ),
        Pattern::Group(a, b) => {
            let x = group(text_deriv(g, a, s), b.clone());
            if g.nullable(a) {
                choice(x, text_deriv(g, b, s))
            } else {
                x
            }
        }
        Pattern::After(a, b) => after(text_deriv(g, a, s), b.clone()),
        Pattern::OneOrMore(inner) => {
            group(text_deriv(g, inner, s), choice(p.clone(), empty()))
        }
        Pattern::Text => p.clone(),
        Pattern::Value { datatype, literal } => {
            if datatype.value_equal(literal, s) {
                empty()
            } else {
                not_allowed()
            }
        }
        Pattern::Data {
            datatype,
            params,
            except,
        } => {
            let ok = datatype.allows(s).is_ok()
                && params.check(*datatype, s).is_ok()
                && !except.as_ref().is_some_and(|ex| value_match(g, ex, s));
            if ok { empty() } else { not_allowed() }
        }
        Pattern::Ref(def) => match g.resolve(def) {
            Some(target) => text_deriv(g, target, s),
            None => not_allowed(),
        },
        _ => not_allowed(),
    }
}

/// Residual after the element-end event: valid only where the content
/// pattern is nullable, in which case the enclosing continuation resumes.
pub fn end_tag_deriv(g: &Grammar, p: &Arc<Pattern>) -> Arc<Pattern> {
    match &**p {
        Pattern::Choice(a, b) => choice(end_tag_deriv(g, a), end_tag_deriv(g, b)),
        Pattern::After(a, b) => {
            if g.nullable(a) {
                b.clone()
            } else {
                not_allowed()
            }
        }
        Pattern::Ref(def) => match g.resolve(def) {
            Some(target) => end_tag_deriv(g, target),
            None => not_allowed(),
        },
        _ => not_allowed(),
    }
}

/// Recovery variant: resume every pending continuation regardless of
/// nullability, after the incomplete content has been reported.
pub fn force_end_tag_deriv(g: &Grammar, p: &Arc<Pattern>) -> Arc<Pattern> {
    match &**p {
        Pattern::Choice(a, b) => choice(force_end_tag_deriv(g, a), force_end_tag_deriv(g, b)),
        Pattern::After(_, b) => b.clone(),
        Pattern::Ref(def) => match g.resolve(def) {
            Some(target) => force_end_tag_deriv(g, target),
            None => not_allowed(),
        },
        _ => not_allowed(),
    }
}

/// Describe what the pattern could accept next, for diagnostics.
pub fn expected_names(g: &Grammar, p: &Pattern) -> Vec<String> {
    let mut out = Vec::new();
    let mut visiting = Vec::new();
    collect_expected(g, p, &mut visiting, &mut out);
    out.dedup();
    out
}

fn collect_expected<'g>(
    g: &'g Grammar,
    p: &'g Pattern,
    visiting: &mut Vec<&'g str>,
    out: &mut Vec<String>,
) {
    let push = |out: &mut Vec<String>, s: String| {
        if !out.contains(&s) {
            out.push(s);
        }
    };
    match p {
        Pattern::Empty | Pattern::NotAllowed => {}
        Pattern::Text | Pattern::Data { .. } | Pattern::Value { .. } => {
            push(out, "text".to_string())
        }
        Pattern::Attribute(nc, _) => push(out, format!("attribute \"{}\"", nc.describe())),
        Pattern::Element(nc, _) => push(out, format!("element \"{}\"", nc.describe())),
        Pattern::Choice(a, b) | Pattern::Interleave(a, b) => {
            collect_expected(g, a, visiting, out);
            collect_expected(g, b, visiting, out);
        }
        Pattern::Group(a, b) => {
            collect_expected(g, a, visiting, out);
            if g.nullable(a) {
                collect_expected(g, b, visiting, out);
            }
        }
        Pattern::OneOrMore(inner) => collect_expected(g, inner, visiting, out),
        Pattern::After(a, _) => collect_expected(g, a, visiting, out),
        Pattern::Ref(name) => {
            if visiting.iter().any(|n| *n == name) {
                return;
            }
            if let Some(target) = g.resolve(name) {
                visiting.push(name);
                collect_expected(g, target, visiting, out);
                visiting.pop();
            }
        }
    }
}

/// Name-classes of attribute patterns still pending in `p`, for the
/// missing-required-attribute diagnostic.
pub fn missing_attributes(g: &Grammar, p: &Pattern) -> Vec<String> {
    let mut out = Vec::new();
    let mut visiting = Vec::new();
    collect_missing_attributes(g, p, &mut visiting, &mut out);
    out
}

fn collect_missing_attributes<'g>(
    g: &'g Grammar,
    p: &'g Pattern,
    visiting: &mut Vec<&'g str>,
    out: &mut Vec<String>,
) {
    match p {
        Pattern::Attribute(nc, _) => {
            let desc = nc.describe();
            if !out.contains(&desc) {
                out.push(desc);
            }
        }
        Pattern::Choice(a, b) => {
            // An alternative that can proceed without attributes makes the
            // whole choice satisfiable; nothing to report from it then.
            if g.nullable(&start_tag_close(g, &Arc::new(p.clone()), false)) {
                return;
            }
            collect_missing_attributes(g, a, visiting, out);
            collect_missing_attributes(g, b, visiting, out);
        }
        Pattern::Group(a, b) | Pattern::Interleave(a, b) => {
            collect_missing_attributes(g, a, visiting, out);
            collect_missing_attributes(g, b, visiting, out);
        }
        Pattern::OneOrMore(inner) => collect_missing_attributes(g, inner, visiting, out),
        Pattern::After(a, _) => collect_missing_attributes(g, a, visiting, out),
        Pattern::Ref(name) => {
            if visiting.iter().any(|n| *n == name) {
                return;
            }
            if let Some(target) = g.resolve(name) {
                visiting.push(name);
                collect_missing_attributes(g, target, visiting, out);
                visiting.pop();
            }
        }
        _ => {}
    }
}

/// Does `p` mention an attribute pattern matching `name` at all? Used to
/// distinguish "attribute not allowed" from "bad attribute value".
pub fn mentions_attribute(g: &Grammar, p: &Pattern, name: &QName) -> bool {
    fn walk<'g>(g: &'g Grammar, p: &'g Pattern, name: &QName, visiting: &mut Vec<&'g str>) -> bool {
        match p {
            Pattern::Attribute(nc, _) => nc.contains(name),
            Pattern::Choice(a, b)
            | Pattern::Group(a, b)
            | Pattern::Interleave(a, b) => {
                walk(g, a, name, visiting) || walk(g, b, name, visiting)
            }
            Pattern::OneOrMore(inner) => walk(g, inner, name, visiting),
            Pattern::After(a, _) => walk(g, a, name, visiting),
            Pattern::Ref(def) => {
                if visiting.iter().any(|n| *n == def) {
                    return false;
                }
                match g.resolve(def) {
                    Some(target) => {
                        visiting.push(def);
                        let r = walk(g, target, name, visiting);
                        visiting.pop();
                        r
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }
    walk(g, p, name, &mut Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{NameClass, text};
    use std::collections::HashMap;

    fn element(local: &str, content: Arc<Pattern>) -> Arc<Pattern> {
        Arc::new(Pattern::Element(NameClass::named("", local), content))
    }

    fn attribute(local: &str, content: Arc<Pattern>) -> Arc<Pattern> {
        Arc::new(Pattern::Attribute(NameClass::named("", local), content))
    }

    fn grammar(start: Arc<Pattern>) -> Grammar {
        Grammar::new(start, HashMap::new(), Vec::new())
    }

    /// Run a whole single element through the derivative steps.
    fn consume_element(
        g: &Grammar,
        p: &Arc<Pattern>,
        name: &str,
        atts: &[(&str, &str)],
        text_content: Option<&str>,
    ) -> Arc<Pattern> {
        let mut p = start_tag_open_deriv(g, p, &QName::local(name));
        for (an, av) in atts {
            p = att_deriv(g, &p, &QName::local(*an), av);
        }
        p = start_tag_close_deriv(g, &p);
        if let Some(s) = text_content {
            p = text_deriv(g, &p, s);
        }
        end_tag_deriv(g, &p)
    }

    #[test]
    fn test_single_empty_element() {
        let start = element("root", empty());
        let g = grammar(start.clone());
        let p = consume_element(&g, &start, "root", &[], None);
        assert!(g.nullable(&p), "root element should be accepted");
    }

    #[test]
    fn test_wrong_element_name_rejected() {
        let start = element("root", empty());
        let g = grammar(start.clone());
        let p = start_tag_open_deriv(&g, &start, &QName::local("other"));
        assert_eq!(*p, Pattern::NotAllowed);
    }

    #[test]
    fn test_one_or_more_children() {
        let item = element("item", empty());
        let start = element("root", one_or_more(item));
        let g = grammar(start.clone());

        // <root><item/><item/></root>
        let mut p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        p = start_tag_close_deriv(&g, &p);
        for _ in 0..2 {
            p = start_tag_open_deriv(&g, &p, &QName::local("item"));
            p = start_tag_close_deriv(&g, &p);
            p = end_tag_deriv(&g, &p);
            assert_ne!(*p, Pattern::NotAllowed);
        }
        let done = end_tag_deriv(&g, &p);
        assert!(g.nullable(&done));
    }

    #[test]
    fn test_one_or_more_requires_at_least_one() {
        let item = element("item", empty());
        let start = element("root", one_or_more(item));
        let g = grammar(start.clone());

        // <root></root> — close immediately
        let mut p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        p = start_tag_close_deriv(&g, &p);
        let done = end_tag_deriv(&g, &p);
        assert_eq!(*done, Pattern::NotAllowed);
    }

    #[test]
    fn test_group_ordering_enforced() {
        let a = element("a", empty());
        let b = element("b", empty());
        let start = element("root", group(a, b));
        let g = grammar(start.clone());

        let mut p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        p = start_tag_close_deriv(&g, &p);
        // b before a must be rejected
        let wrong = start_tag_open_deriv(&g, &p, &QName::local("b"));
        assert_eq!(*wrong, Pattern::NotAllowed);
        // a then b accepted
        p = consume_inner(&g, p, "a");
        p = consume_inner(&g, p, "b");
        assert!(g.nullable(&end_tag_deriv(&g, &p)));
    }

    fn consume_inner(g: &Grammar, p: Arc<Pattern>, name: &str) -> Arc<Pattern> {
        let p = start_tag_open_deriv(g, &p, &QName::local(name));
        let p = start_tag_close_deriv(g, &p);
        end_tag_deriv(g, &p)
    }

    #[test]
    fn test_interleave_any_order() {
        let a = element("a", empty());
        let b = element("b", empty());
        let start = element("root", interleave(a, b));
        let g = grammar(start.clone());

        for order in [["a", "b"], ["b", "a"]] {
            let mut p = start_tag_open_deriv(&g, &start, &QName::local("root"));
            p = start_tag_close_deriv(&g, &p);
            for name in order {
                p = consume_inner(&g, p, name);
                assert_ne!(*p, Pattern::NotAllowed, "order {:?}", order);
            }
            assert!(g.nullable(&end_tag_deriv(&g, &p)), "order {:?}", order);
        }
    }

    #[test]
    fn test_choice_keeps_both_branches() {
        // root contains (a, b) | (a, c): after seeing a, both continuations
        // must remain live.
        let ab = group(element("a", empty()), element("b", empty()));
        let ac = group(element("a", empty()), element("c", empty()));
        let start = element("root", choice(ab, ac));
        let g = grammar(start.clone());

        let mut p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        p = start_tag_close_deriv(&g, &p);
        p = consume_inner(&g, p, "a");
        // either b or c closes the choice
        let via_b = consume_inner(&g, p.clone(), "b");
        let via_c = consume_inner(&g, p, "c");
        assert_ne!(*via_b, Pattern::NotAllowed);
        assert_ne!(*via_c, Pattern::NotAllowed);
    }

    #[test]
    fn test_attribute_order_insignificant() {
        let content = group(
            attribute("x", text()),
            attribute("y", text()),
        );
        let start = element("root", content);
        let g = grammar(start.clone());

        for order in [[("x", "1"), ("y", "2")], [("y", "2"), ("x", "1")]] {
            let p = consume_element(&g, &start, "root", &order, None);
            assert!(g.nullable(&p), "attribute order {:?} must validate", order);
        }
    }

    #[test]
    fn test_missing_required_attribute() {
        let start = element("root", attribute("id", text()));
        let g = grammar(start.clone());

        let mut p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        p = start_tag_close_deriv(&g, &p);
        assert_eq!(*p, Pattern::NotAllowed);
    }

    #[test]
    fn test_force_start_tag_close_recovers() {
        let start = element("root", group(attribute("id", text()), element("c", empty())));
        let g = grammar(start.clone());

        let p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        assert_eq!(*start_tag_close_deriv(&g, &p), Pattern::NotAllowed);
        let recovered = force_start_tag_close(&g, &p);
        assert_ne!(*recovered, Pattern::NotAllowed);
        // content still validated after recovery
        let p2 = consume_inner(&g, recovered, "c");
        assert!(g.nullable(&end_tag_deriv(&g, &p2)));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let start = element("root", attribute("id", text()));
        let g = grammar(start.clone());

        let p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        let p = att_deriv(&g, &p, &QName::local("other"), "v");
        assert_eq!(*p, Pattern::NotAllowed);
    }

    #[test]
    fn test_attribute_value_pattern() {
        use crate::datatype::Datatype;
        let yes_no = choice(
            Arc::new(Pattern::Value {
                datatype: Datatype::Token,
                literal: "yes".to_string(),
            }),
            Arc::new(Pattern::Value {
                datatype: Datatype::Token,
                literal: "no".to_string(),
            }),
        );
        let start = element("root", attribute("flag", yes_no));
        let g = grammar(start.clone());

        let ok = consume_element(&g, &start, "root", &[("flag", " yes ")], None);
        assert!(g.nullable(&ok));
        let p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        let bad = att_deriv(&g, &p, &QName::local("flag"), "maybe");
        assert_eq!(*bad, Pattern::NotAllowed);
    }

    #[test]
    fn test_text_and_data_deriv() {
        use crate::datatype::{Datatype, DatatypeParams};
        let start = element(
            "n",
            Arc::new(Pattern::Data {
                datatype: Datatype::XsdInteger,
                params: DatatypeParams::default(),
                except: None,
            }),
        );
        let g = grammar(start.clone());

        let ok = consume_element(&g, &start, "n", &[], Some("42"));
        assert!(g.nullable(&ok));
        let bad = consume_element(&g, &start, "n", &[], Some("forty-two"));
        assert_eq!(*bad, Pattern::NotAllowed);
    }

    #[test]
    fn test_data_except() {
        use crate::datatype::{Datatype, DatatypeParams};
        let except = Arc::new(Pattern::Value {
            datatype: Datatype::Token,
            literal: "forbidden".to_string(),
        });
        let start = element(
            "n",
            Arc::new(Pattern::Data {
                datatype: Datatype::Token,
                params: DatatypeParams::default(),
                except: Some(except),
            }),
        );
        let g = grammar(start.clone());

        assert!(g.nullable(&consume_element(&g, &start, "n", &[], Some("ok"))));
        assert_eq!(
            *consume_element(&g, &start, "n", &[], Some("forbidden")),
            Pattern::NotAllowed
        );
    }

    #[test]
    fn test_ref_resolution_and_recursion() {
        // tree = element node { ref tree* } — recursion through an element
        let mut defines = HashMap::new();
        let tree_content = choice(
            one_or_more(Arc::new(Pattern::Ref("tree".to_string()))),
            empty(),
        );
        defines.insert(
            "tree".to_string(),
            element("node", tree_content),
        );
        let start = Arc::new(Pattern::Ref("tree".to_string()));
        let g = Grammar::new(start.clone(), defines, Vec::new());

        // <node><node/></node>
        let mut p = start_tag_open_deriv(&g, &start, &QName::local("node"));
        p = start_tag_close_deriv(&g, &p);
        p = consume_inner(&g, p, "node");
        assert_ne!(*p, Pattern::NotAllowed);
        assert!(g.nullable(&end_tag_deriv(&g, &p)));
    }

    #[test]
    fn test_end_event_contract() {
        // nullable pattern accepts the end event; non-nullable reports
        let item = element("item", empty());
        let start = element("root", one_or_more(item));
        let g = grammar(start.clone());

        let mut p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        p = start_tag_close_deriv(&g, &p);
        p = consume_inner(&g, p, "item");
        // content now nullable: end accepted
        let closed = end_tag_deriv(&g, &p);
        assert_ne!(*closed, Pattern::NotAllowed);

        // fresh root with no items: not nullable, end rejected
        let mut q = start_tag_open_deriv(&g, &start, &QName::local("root"));
        q = start_tag_close_deriv(&g, &q);
        assert_eq!(*end_tag_deriv(&g, &q), Pattern::NotAllowed);
        // recovery resumes the enclosing continuation
        let recovered = force_end_tag_deriv(&g, &q);
        assert!(g.nullable(&recovered));
    }

    #[test]
    fn test_expected_names_reports_missing_item() {
        let item = element("item", empty());
        let start = element("root", one_or_more(item));
        let g = grammar(start.clone());

        let mut p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        p = start_tag_close_deriv(&g, &p);
        let expected = expected_names(&g, &p);
        assert!(
            expected.iter().any(|e| e.contains("item")),
            "expected names {:?} should mention item",
            expected
        );
    }

    #[test]
    fn test_missing_attributes_named() {
        let start = element("root", group(attribute("id", text()), empty()));
        let g = grammar(start.clone());
        let p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        let missing = missing_attributes(&g, &p);
        assert_eq!(missing, vec!["id".to_string()]);
    }

    #[test]
    fn test_mentions_attribute() {
        let start = element("root", attribute("id", text()));
        let g = grammar(start.clone());
        let p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        assert!(mentions_attribute(&g, &p, &QName::local("id")));
        assert!(!mentions_attribute(&g, &p, &QName::local("class")));
    }

    #[test]
    fn test_whitespace_text_in_element_only_content() {
        let item = element("item", empty());
        let start = element("root", one_or_more(item));
        let g = grammar(start.clone());

        let mut p = start_tag_open_deriv(&g, &start, &QName::local("root"));
        p = start_tag_close_deriv(&g, &p);
        // element-only content rejects text outright at the kernel level;
        // the verifier's whitespace policy decides whether to ignore it.
        let d = text_deriv(&g, &p, "\n  ");
        assert_eq!(*d, Pattern::NotAllowed);
    }
}
