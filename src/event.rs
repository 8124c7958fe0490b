//! Structural document events and source locations.
//!
//! The verification kernel consumes a lazy, forward-only sequence of these
//! events from an external event source (see [`crate::xml_source`] for the
//! quick-xml backed implementation). Every event carries the location it was
//! read from so diagnostics can be anchored precisely.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A resolved (namespace URI, local name) pair.
///
/// An empty namespace string means "no namespace".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    pub namespace: String,
    pub local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// A name with no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new("", local)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// A line/column position within a source document (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Placeholder location for diagnostics with no better anchor.
    pub fn unknown() -> Self {
        Self { line: 0, column: 0 }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One structural document event.
///
/// Attribute events follow their element-start event; the attribute set of a
/// start tag ends at the first event that is not an `Attribute`.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StartElement { name: QName, location: Location },
    Attribute {
        name: QName,
        value: String,
        location: Location,
    },
    Text { value: String, location: Location },
    EndElement { name: QName, location: Location },
}

impl Event {
    pub fn location(&self) -> Location {
        match self {
            Event::StartElement { location, .. }
            | Event::Attribute { location, .. }
            | Event::Text { location, .. }
            | Event::EndElement { location, .. } => *location,
        }
    }
}

/// External event source collaborator: a lazy, finite, forward-only stream of
/// structural events. Restartable only by constructing a new source.
pub trait EventSource {
    /// Produce the next event, or `None` at end of input.
    fn next_event(&mut self) -> Result<Option<Event>>;
}

/// An event source over a pre-built event list. Used by tests and by callers
/// that already hold a parsed document.
#[derive(Debug, Default)]
pub struct VecEventSource {
    events: std::vec::IntoIter<Event>,
}

impl VecEventSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events: events.into_iter(),
        }
    }
}

impl EventSource for VecEventSource {
    fn next_event(&mut self) -> Result<Option<Event>> {
        Ok(self.events.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_display() {
        assert_eq!(QName::local("item").to_string(), "item");
        assert_eq!(
            QName::new("http://example.com/ns", "item").to_string(),
            "{http://example.com/ns}item"
        );
    }

    #[test]
    fn test_location_ordering() {
        assert!(Location::new(1, 10) < Location::new(2, 1));
        assert!(Location::new(3, 4) < Location::new(3, 5));
        assert_eq!(Location::new(2, 2), Location::new(2, 2));
    }

    #[test]
    fn test_vec_event_source_drains_in_order() {
        let events = vec![
            Event::StartElement {
                name: QName::local("root"),
                location: Location::new(1, 1),
            },
            Event::EndElement {
                name: QName::local("root"),
                location: Location::new(1, 8),
            },
        ];
        let mut source = VecEventSource::new(events.clone());
        assert_eq!(source.next_event().unwrap(), Some(events[0].clone()));
        assert_eq!(source.next_event().unwrap(), Some(events[1].clone()));
        assert_eq!(source.next_event().unwrap(), None);
    }
}
