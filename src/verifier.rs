//! Streaming Verifier: drives the derivative automaton and the assertion
//! evaluator over one document's event sequence.
//!
//! State machine: `Ready -> Open(depth) -> Closed`. Element-start advances
//! the automaton and opens a node; element-end checks acceptance, runs the
//! assertion rules whose context matches the completed node, and at depth 0
//! closes the document and fixes the verdict.
//!
//! Validation diagnostics never abort: after a mismatch the verifier recovers
//! (skipping grammar checks beneath a rejected element, forcing the pending
//! continuations on incomplete content) so one run reports as much as it can.
//! Assertions keep running beneath grammar-invalid nodes. Malformed event
//! streams are a different animal entirely: they are internal-contract
//! violations and fail the document closed with a FATAL diagnostic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::automaton::{
    att_deriv, end_tag_deriv, expected_names, force_end_tag_deriv, force_start_tag_close,
    mentions_attribute, missing_attributes, start_tag_close_deriv, start_tag_open_deriv,
    text_deriv,
};
use crate::datatype::{collapse, is_xml_whitespace};
use crate::diagnostic::Diagnostic;
use crate::error::{Result, ValidationError};
use crate::event::{Event, EventSource, Location, QName};
use crate::pattern::{Grammar, Pattern, choice, empty};
use crate::schematron::{NodeArena, NodeChild};

/// Handling of whitespace-only text under element-only content models.
/// Datatype-library-dependent in the wild, so it stays configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhitespacePolicy {
    /// Whitespace-only text that the content model rejects is ignored.
    #[default]
    Flexible,
    /// Every text event is significant.
    Strict,
}

#[derive(Debug, Clone, Default)]
pub struct VerifierOptions {
    pub whitespace: WhitespacePolicy,
}

/// Cooperative cancellation handle, checked between structural events. One
/// token cancels one document's validation and nothing else.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Final verdict for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub valid: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl DocumentReport {
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity.is_invalidating())
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerifierState {
    Ready,
    Open(usize),
    Closed,
}

struct Frame {
    name: QName,
    location: Location,
    recovering: bool,
}

/// Per-document verifier. Owns all mutable validation state; the grammar is
/// shared and read-only, which is what makes concurrent validation of many
/// documents against one grammar safe without locks.
pub struct Verifier {
    grammar: Arc<Grammar>,
    options: VerifierOptions,
    state: VerifierState,
    pattern: Arc<Pattern>,
    in_start_tag: bool,
    frames: Vec<Frame>,
    arena: NodeArena,
    open_nodes: Vec<usize>,
    diagnostics: Vec<Diagnostic>,
    rejected: bool,
    contract_violated: bool,
    aborted: bool,
}

impl Verifier {
    pub fn new(grammar: Arc<Grammar>, options: VerifierOptions) -> Self {
        let pattern = grammar.start().clone();
        Self {
            grammar,
            options,
            state: VerifierState::Ready,
            pattern,
            in_start_tag: false,
            frames: Vec::new(),
            arena: NodeArena::default(),
            open_nodes: Vec::new(),
            diagnostics: Vec::new(),
            rejected: false,
            contract_violated: false,
            aborted: false,
        }
    }

    /// Consume one structural event.
    pub fn feed(&mut self, event: Event) {
        if self.contract_violated {
            // Fail closed: once the stream itself is broken, nothing further
            // is trusted.
            return;
        }
        match self.state {
            VerifierState::Closed => {
                self.contract_violation(event.location(), "event received after document close");
            }
            VerifierState::Ready => match event {
                Event::StartElement { name, location } => {
                    self.state = VerifierState::Open(1);
                    self.handle_start(name, location);
                }
                other => {
                    self.contract_violation(
                        other.location(),
                        "event stream must begin with an element start",
                    );
                }
            },
            VerifierState::Open(depth) => match event {
                Event::StartElement { name, location } => {
                    self.close_start_tag();
                    self.state = VerifierState::Open(depth + 1);
                    self.handle_start(name, location);
                }
                Event::Attribute {
                    name,
                    value,
                    location,
                } => {
                    if self.in_start_tag {
                        self.handle_attribute(name, value, location);
                    } else {
                        self.contract_violation(location, "attribute event outside a start tag");
                    }
                }
                Event::Text { value, location } => {
                    self.close_start_tag();
                    self.handle_text(value, location);
                }
                Event::EndElement { name, location } => {
                    self.close_start_tag();
                    self.handle_end(name, location, depth);
                }
            },
        }
    }

    /// The external event source failed (a document that is not well-formed
    /// XML, for instance). The document cannot be valid; remaining events are
    /// gone, so close out with what was seen.
    pub fn record_source_failure(&mut self, error: &ValidationError) {
        self.diagnostics.push(Diagnostic::error(
            Location::unknown(),
            format!("document could not be read: {}", error),
        ));
        self.aborted = true;
    }

    /// Close the document and produce the verdict with the ordered
    /// diagnostics.
    pub fn finish(mut self) -> DocumentReport {
        if !self.contract_violated && !self.aborted {
            match self.state {
                VerifierState::Ready => {
                    self.diagnostics.push(Diagnostic::error(
                        Location::new(1, 1),
                        "document contains no elements",
                    ));
                }
                VerifierState::Open(_) => {
                    self.contract_violated = true;
                    let location = self
                        .frames
                        .last()
                        .map(|f| f.location)
                        .unwrap_or_else(Location::unknown);
                    self.diagnostics.push(Diagnostic::fatal(
                        location,
                        "malformed event stream: input ended with open elements",
                    ));
                }
                VerifierState::Closed => {}
            }
        }
        self.diagnostics.sort_by_key(|d| d.location);
        let valid = !self.rejected
            && !self.contract_violated
            && !self
                .diagnostics
                .iter()
                .any(|d| d.severity.is_invalidating());
        DocumentReport {
            valid,
            diagnostics: self.diagnostics,
        }
    }

    fn handle_start(&mut self, name: QName, location: Location) {
        let parent = self.open_nodes.last().copied();
        let node = self.arena.push(name.clone(), parent, location);
        self.open_nodes.push(node);
        self.in_start_tag = true;

        if self.frames.last().is_some_and(|f| f.recovering) {
            self.frames.push(Frame {
                name,
                location,
                recovering: true,
            });
            return;
        }

        let derived = start_tag_open_deriv(&self.grammar, &self.pattern, &name);
        if matches!(*derived, Pattern::NotAllowed) {
            self.rejected = true;
            let expected = expected_names(&self.grammar, &self.pattern);
            let mut message = format!("element \"{}\" not allowed here", name);
            if !expected.is_empty() {
                message.push_str(&format!("; expected {}", join_alternatives(&expected)));
            }
            self.diagnostics.push(Diagnostic::error(location, message));
            self.frames.push(Frame {
                name,
                location,
                recovering: true,
            });
        } else {
            self.pattern = derived;
            self.frames.push(Frame {
                name,
                location,
                recovering: false,
            });
        }
    }

    fn handle_attribute(&mut self, name: QName, value: String, location: Location) {
        if let Some(&node) = self.open_nodes.last() {
            self.arena
                .node_mut(node)
                .attributes
                .push((name.clone(), value.clone()));
        }
        if self.frames.last().is_some_and(|f| f.recovering) {
            return;
        }

        let derived = att_deriv(&self.grammar, &self.pattern, &name, &value);
        if matches!(*derived, Pattern::NotAllowed) {
            self.rejected = true;
            let message = if mentions_attribute(&self.grammar, &self.pattern, &name) {
                format!("invalid value \"{}\" for attribute \"{}\"", value, name)
            } else {
                format!("attribute \"{}\" not allowed here", name)
            };
            self.diagnostics.push(Diagnostic::error(location, message));
        } else {
            self.pattern = derived;
        }
    }

    fn close_start_tag(&mut self) {
        if !self.in_start_tag {
            return;
        }
        self.in_start_tag = false;
        if self.frames.last().is_some_and(|f| f.recovering) {
            return;
        }

        let derived = start_tag_close_deriv(&self.grammar, &self.pattern);
        if matches!(*derived, Pattern::NotAllowed) {
            self.rejected = true;
            let missing = missing_attributes(&self.grammar, &self.pattern);
            let (name, location) = self
                .frames
                .last()
                .map(|f| (f.name.to_string(), f.location))
                .unwrap_or_else(|| (String::new(), Location::unknown()));
            let message = if missing.is_empty() {
                format!("element \"{}\" has an invalid attribute set", name)
            } else {
                format!(
                    "element \"{}\" is missing required attribute {}",
                    name,
                    join_alternatives(&missing)
                )
            };
            self.diagnostics.push(Diagnostic::error(location, message));
            let recovered = force_start_tag_close(&self.grammar, &self.pattern);
            self.pattern = if matches!(*recovered, Pattern::NotAllowed) {
                empty()
            } else {
                recovered
            };
        } else {
            self.pattern = derived;
        }
    }

    fn handle_text(&mut self, value: String, location: Location) {
        if let Some(&node) = self.open_nodes.last() {
            self.arena
                .node_mut(node)
                .children
                .push(NodeChild::Text(value.clone()));
        }
        if self.frames.last().is_some_and(|f| f.recovering) {
            return;
        }

        let derived = text_deriv(&self.grammar, &self.pattern, &value);
        let ignorable = is_xml_whitespace(&value)
            && self.options.whitespace == WhitespacePolicy::Flexible;
        if ignorable {
            // Keep both readings open: the whitespace may be significant for
            // a text-accepting branch and ignorable for an element-only one.
            if !matches!(*derived, Pattern::NotAllowed) {
                self.pattern = choice(derived, self.pattern.clone());
            }
            return;
        }
        if matches!(*derived, Pattern::NotAllowed) {
            self.rejected = true;
            let expects_text = expected_names(&self.grammar, &self.pattern)
                .iter()
                .any(|e| e == "text");
            let shown = collapse(&value);
            let message = if expects_text {
                format!("text \"{}\" does not match the required content", shown)
            } else {
                "text not allowed here".to_string()
            };
            self.diagnostics.push(Diagnostic::error(location, message));
        } else {
            self.pattern = derived;
        }
    }

    fn handle_end(&mut self, name: QName, location: Location, depth: usize) {
        let open_name = match self.frames.last() {
            Some(frame) => frame.name.clone(),
            None => {
                self.contract_violation(location, "element end with no open element");
                return;
            }
        };
        if open_name != name {
            self.contract_violation(
                location,
                format!(
                    "element end \"{}\" does not match open element \"{}\"",
                    name, open_name
                ),
            );
            return;
        }

        // Assertions run for every completed node, grammar-valid or not.
        if let Some(node) = self.open_nodes.pop() {
            self.run_rules(node);
        }

        let frame = self.frames.pop().expect("frame checked above");
        if !frame.recovering {
            let derived = end_tag_deriv(&self.grammar, &self.pattern);
            if matches!(*derived, Pattern::NotAllowed) {
                self.rejected = true;
                let expected = expected_names(&self.grammar, &self.pattern);
                let mut message = format!("element \"{}\" is incomplete", frame.name);
                if !expected.is_empty() {
                    message.push_str(&format!(
                        "; missing required {}",
                        join_alternatives(&expected)
                    ));
                }
                self.diagnostics.push(Diagnostic::error(location, message));
                let recovered = force_end_tag_deriv(&self.grammar, &self.pattern);
                self.pattern = if matches!(*recovered, Pattern::NotAllowed) {
                    empty()
                } else {
                    recovered
                };
            } else {
                self.pattern = derived;
            }
        }

        self.state = if depth == 1 {
            VerifierState::Closed
        } else {
            VerifierState::Open(depth - 1)
        };
    }

    fn run_rules(&mut self, node: usize) {
        for rule in self.grammar.rules() {
            if rule.context.matches(&self.arena, node) {
                self.diagnostics.extend(rule.evaluate(&self.arena, node));
            }
        }
    }

    fn contract_violation(&mut self, location: Location, details: impl Into<String>) {
        self.contract_violated = true;
        self.diagnostics.push(Diagnostic::fatal(
            location,
            format!("malformed event stream: {}", details.into()),
        ));
    }
}

fn join_alternatives(items: &[String]) -> String {
    match items.len() {
        0 => String::new(),
        1 => items[0].clone(),
        _ => {
            let head = items[..items.len() - 1].join(", ");
            format!("{} or {}", head, items[items.len() - 1])
        }
    }
}

/// Validate one document's event stream against a compiled grammar.
///
/// Diagnostics accumulate; only cancellation surfaces as an error. A failing
/// event source (a document that is not well-formed) yields an invalid
/// verdict, not an error, so a batch run keeps going.
pub fn validate<S: EventSource>(
    grammar: &Arc<Grammar>,
    source: &mut S,
    options: VerifierOptions,
    cancel: Option<&CancelToken>,
) -> Result<DocumentReport> {
    let mut verifier = Verifier::new(grammar.clone(), options);
    loop {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(ValidationError::Cancelled {
                reason: "validation aborted between events".to_string(),
            });
        }
        match source.next_event() {
            Ok(Some(event)) => verifier.feed(event),
            Ok(None) => break,
            Err(e) => {
                verifier.record_source_failure(&e);
                break;
            }
        }
    }
    Ok(verifier.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_source;
    use crate::event::VecEventSource;
    use crate::xml_source::XmlEventSource;

    const ITEMS_GRAMMAR: &str = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start>
    <element name="root">
      <oneOrMore><ref name="item"/></oneOrMore>
    </element>
  </start>
  <define name="item">
    <element name="item"><empty/></element>
  </define>
</grammar>"#;

    fn compile(source: &str) -> Arc<Grammar> {
        Arc::new(compile_source(source.as_bytes()).unwrap())
    }

    fn run(grammar: &Arc<Grammar>, document: &str) -> DocumentReport {
        let mut source = XmlEventSource::from_bytes(document.as_bytes().to_vec(), "doc.xml");
        validate(grammar, &mut source, VerifierOptions::default(), None).unwrap()
    }

    #[test]
    fn test_valid_document_no_diagnostics() {
        let grammar = compile(ITEMS_GRAMMAR);
        let report = run(&grammar, "<root><item/><item/></root>");
        assert!(report.valid, "diagnostics: {:?}", report.diagnostics);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_empty_root_reports_missing_item() {
        let grammar = compile(ITEMS_GRAMMAR);
        let report = run(&grammar, "<root></root>");
        assert!(!report.valid);
        assert_eq!(report.diagnostics.len(), 1);
        let diagnostic = &report.diagnostics[0];
        assert!(
            diagnostic.message.contains("item"),
            "message should name the missing element: {}",
            diagnostic.message
        );
        // anchored at the close of <root>
        assert_eq!(diagnostic.location.line, 1);
        assert!(diagnostic.location.column > 1);
    }

    #[test]
    fn test_unexpected_element_reported_and_recovered() {
        let grammar = compile(ITEMS_GRAMMAR);
        let report = run(&grammar, "<root><other/><item/></root>");
        assert!(!report.valid);
        // exactly one complaint about "other"; the trailing item still
        // satisfies the content model
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].message.contains("other"));
    }

    #[test]
    fn test_diagnostics_are_ordered_by_location() {
        let grammar = compile(ITEMS_GRAMMAR);
        let report = run(
            &grammar,
            "<root>\n  <bad1/>\n  <item/>\n  <bad2/>\n</root>",
        );
        assert!(!report.valid);
        let locations: Vec<_> = report.diagnostics.iter().map(|d| d.location).collect();
        let mut sorted = locations.clone();
        sorted.sort();
        assert_eq!(locations, sorted);
    }

    #[test]
    fn test_whitespace_flexible_by_default() {
        let grammar = compile(ITEMS_GRAMMAR);
        let report = run(&grammar, "<root>\n  <item/>\n</root>");
        assert!(report.valid, "diagnostics: {:?}", report.diagnostics);
    }

    #[test]
    fn test_whitespace_strict_rejects() {
        let grammar = compile(ITEMS_GRAMMAR);
        let mut source =
            XmlEventSource::from_bytes(b"<root>\n  <item/>\n</root>".to_vec(), "doc.xml");
        let options = VerifierOptions {
            whitespace: WhitespacePolicy::Strict,
        };
        let report = validate(&grammar, &mut source, options, None).unwrap();
        assert!(!report.valid);
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.message.contains("text not allowed")),
            "diagnostics: {:?}",
            report.diagnostics
        );
    }

    #[test]
    fn test_assertion_failure_on_grammar_valid_document() {
        let grammar_source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"
         xmlns:sch="http://www.ascc.net/xml/schematron">
  <start>
    <element name="root">
      <oneOrMore>
        <element name="item">
          <sch:rule>
            <sch:assert test="string-length(.) &gt; 0">item must have non-empty text</sch:assert>
          </sch:rule>
          <choice><text/><empty/></choice>
        </element>
      </oneOrMore>
    </element>
  </start>
</grammar>"#;
        let grammar = compile(grammar_source);
        let report = run(&grammar, "<root><item/></root>");
        assert!(!report.valid);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].message.contains("non-empty text"));
        // the diagnostic points at the empty <item>
        assert!(report.diagnostics[0].location.column >= 7);
    }

    #[test]
    fn test_assertions_run_beneath_invalid_nodes() {
        let grammar_source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"
         xmlns:sch="http://www.ascc.net/xml/schematron">
  <start>
    <element name="root">
      <element name="known"><empty/></element>
    </element>
  </start>
  <sch:pattern>
    <sch:rule context="item">
      <sch:assert test="string-length(.) &gt; 0">item must have text</sch:assert>
    </sch:rule>
  </sch:pattern>
</grammar>"#;
        let grammar = compile(grammar_source);
        // <item> is grammar-invalid here, but its assertion still runs
        let report = run(&grammar, "<root><item/><known/></root>");
        assert!(!report.valid);
        let messages: Vec<_> = report.diagnostics.iter().map(|d| &d.message).collect();
        assert!(
            messages.iter().any(|m| m.contains("not allowed here")),
            "messages: {:?}",
            messages
        );
        assert!(
            messages.iter().any(|m| m.contains("must have text")),
            "messages: {:?}",
            messages
        );
    }

    #[test]
    fn test_missing_required_attribute_reported() {
        let grammar_source = r#"<element name="root" xmlns="http://relaxng.org/ns/structure/1.0">
  <attribute name="id"/>
</element>"#;
        let grammar = compile(grammar_source);
        let report = run(&grammar, "<root/>");
        assert!(!report.valid);
        assert!(report.diagnostics[0].message.contains("id"));
    }

    #[test]
    fn test_attribute_permutation_same_verdict() {
        let grammar_source = r#"<element name="root" xmlns="http://relaxng.org/ns/structure/1.0">
  <attribute name="a"/>
  <attribute name="b"/>
</element>"#;
        let grammar = compile(grammar_source);
        let forward = run(&grammar, r#"<root a="1" b="2"/>"#);
        let reversed = run(&grammar, r#"<root b="2" a="1"/>"#);
        assert!(forward.valid);
        assert!(reversed.valid);
    }

    #[test]
    fn test_malformed_stream_fails_closed() {
        let grammar = compile(ITEMS_GRAMMAR);

        // end with no matching open element
        let mut verifier = Verifier::new(grammar.clone(), VerifierOptions::default());
        verifier.feed(Event::EndElement {
            name: QName::local("root"),
            location: Location::new(1, 1),
        });
        let report = verifier.finish();
        assert!(!report.valid);
        assert!(
            report.diagnostics[0].message.contains("malformed event stream"),
            "got: {}",
            report.diagnostics[0].message
        );

        // events after close
        let mut verifier = Verifier::new(grammar, VerifierOptions::default());
        verifier.feed(Event::StartElement {
            name: QName::local("root"),
            location: Location::new(1, 1),
        });
        verifier.feed(Event::StartElement {
            name: QName::local("item"),
            location: Location::new(1, 7),
        });
        verifier.feed(Event::EndElement {
            name: QName::local("item"),
            location: Location::new(1, 14),
        });
        verifier.feed(Event::EndElement {
            name: QName::local("root"),
            location: Location::new(1, 21),
        });
        verifier.feed(Event::StartElement {
            name: QName::local("extra"),
            location: Location::new(1, 28),
        });
        let report = verifier.finish();
        assert!(!report.valid);
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.message.contains("after document close"))
        );
    }

    #[test]
    fn test_mismatched_end_tag_fails_closed() {
        let grammar = compile(ITEMS_GRAMMAR);
        let events = vec![
            Event::StartElement {
                name: QName::local("root"),
                location: Location::new(1, 1),
            },
            Event::EndElement {
                name: QName::local("wrong"),
                location: Location::new(1, 7),
            },
        ];
        let mut source = VecEventSource::new(events);
        let report = validate(&grammar, &mut source, VerifierOptions::default(), None).unwrap();
        assert!(!report.valid);
        assert!(report.diagnostics[0].message.contains("does not match"));
    }

    #[test]
    fn test_truncated_stream_fails_closed() {
        let grammar = compile(ITEMS_GRAMMAR);
        let events = vec![Event::StartElement {
            name: QName::local("root"),
            location: Location::new(1, 1),
        }];
        let mut source = VecEventSource::new(events);
        let report = validate(&grammar, &mut source, VerifierOptions::default(), None).unwrap();
        assert!(!report.valid);
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.message.contains("ended with open elements"))
        );
    }

    #[test]
    fn test_empty_stream_is_invalid() {
        let grammar = compile(ITEMS_GRAMMAR);
        let mut source = VecEventSource::new(Vec::new());
        let report = validate(&grammar, &mut source, VerifierOptions::default(), None).unwrap();
        assert!(!report.valid);
    }

    #[test]
    fn test_cancellation_between_events() {
        let grammar = compile(ITEMS_GRAMMAR);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut source = XmlEventSource::from_bytes(b"<root><item/></root>".to_vec(), "doc.xml");
        let result = validate(&grammar, &mut source, VerifierOptions::default(), Some(&cancel));
        assert!(matches!(result, Err(ValidationError::Cancelled { .. })));
    }

    #[test]
    fn test_not_well_formed_document_is_invalid_not_error() {
        let grammar = compile(ITEMS_GRAMMAR);
        let mut source = XmlEventSource::from_bytes(b"<root><item></root>".to_vec(), "doc.xml");
        let report = validate(&grammar, &mut source, VerifierOptions::default(), None).unwrap();
        assert!(!report.valid);
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.message.contains("could not be read"))
        );
    }

    #[test]
    fn test_text_content_with_datatype() {
        let grammar_source = r#"<element name="n" xmlns="http://relaxng.org/ns/structure/1.0"
  datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes">
  <data type="integer"/>
</element>"#;
        let grammar = compile(grammar_source);
        assert!(run(&grammar, "<n>42</n>").valid);
        let bad = run(&grammar, "<n>fortytwo</n>");
        assert!(!bad.valid);
        assert!(bad.diagnostics[0].message.contains("fortytwo"));
    }

    #[test]
    fn test_report_rule_warns_but_stays_valid() {
        let grammar_source = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"
         xmlns:sch="http://www.ascc.net/xml/schematron">
  <start>
    <element name="root">
      <element name="item"><text/></element>
    </element>
  </start>
  <sch:pattern>
    <sch:rule context="item">
      <sch:report test="contains(., 'legacy')">legacy marker found in <sch:name/></sch:report>
    </sch:rule>
  </sch:pattern>
</grammar>"#;
        let grammar = compile(grammar_source);
        let report = run(&grammar, "<root><item>legacy value</item></root>");
        assert!(report.valid, "reports are warnings: {:?}", report.diagnostics);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(
            report.diagnostics[0].message,
            "legacy marker found in item"
        );
    }
}
