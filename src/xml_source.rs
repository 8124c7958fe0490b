//! XML parsing boundary, backed by quick-xml.
//!
//! Two consumers sit on top of this module: the schema compiler takes a
//! fully parsed grammar-source tree ([`parse_document`]), and the streaming
//! verifier takes structural events one at a time ([`XmlEventSource`]). Both
//! carry line/column locations mapped from byte offsets so diagnostics can
//! point at the source precisely.

use std::collections::VecDeque;
use std::io::Cursor;
use std::path::PathBuf;

use quick_xml::NsReader;
use quick_xml::events::Event as XmlEvent;
use quick_xml::name::ResolveResult;

use crate::error::{Result, ValidationError};
use crate::event::{Event, EventSource, Location, QName};

/// Byte-offset to line/column mapping for one document.
#[derive(Debug)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(bytes: &[u8]) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in bytes.iter().enumerate() {
            if *b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    pub fn location(&self, offset: usize) -> Location {
        let line = self.line_starts.partition_point(|start| *start <= offset);
        let column = offset - self.line_starts[line - 1] + 1;
        Location::new(line as u32, column as u32)
    }
}

/// Parse failure with the position it occurred at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlParseError {
    pub location: Location,
    pub details: String,
}

/// One element of a parsed document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: QName,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlChild>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub name: QName,
    pub value: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlChild {
    Element(XmlElement),
    Text(String),
}

impl XmlElement {
    /// Child elements only.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlChild::Element(e) => Some(e),
            XmlChild::Text(_) => None,
        })
    }

    /// Concatenated text content of this element (direct children).
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let XmlChild::Text(s) = child {
                out.push_str(s);
            }
        }
        out
    }

    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace.is_empty() && a.name.local == local)
            .map(|a| a.value.as_str())
    }
}

fn resolved_namespace(res: ResolveResult<'_>, loc: Location) -> std::result::Result<String, XmlParseError> {
    match res {
        ResolveResult::Bound(ns) => Ok(String::from_utf8_lossy(ns.into_inner()).into_owned()),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(prefix) => Err(XmlParseError {
            location: loc,
            details: format!(
                "unbound namespace prefix \"{}\"",
                String::from_utf8_lossy(&prefix)
            ),
        }),
    }
}

fn read_attributes<R>(
    reader: &NsReader<R>,
    start: &quick_xml::events::BytesStart<'_>,
    loc: Location,
) -> std::result::Result<Vec<XmlAttribute>, XmlParseError> {
    let mut out = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlParseError {
            location: loc,
            details: format!("malformed attribute: {}", e),
        })?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let (res, local) = reader.resolve_attribute(attr.key);
        let namespace = resolved_namespace(res, loc)?;
        let value = attr
            .unescape_value()
            .map_err(|e| XmlParseError {
                location: loc,
                details: format!("malformed attribute value: {}", e),
            })?
            .into_owned();
        out.push(XmlAttribute {
            name: QName::new(namespace, String::from_utf8_lossy(local.into_inner()).into_owned()),
            value,
            location: loc,
        });
    }
    Ok(out)
}

/// Parse a whole document into a tree. Used for grammar sources, which are
/// small and are walked repeatedly by the compiler.
pub fn parse_document(bytes: &[u8]) -> std::result::Result<XmlElement, XmlParseError> {
    let index = LineIndex::new(bytes);
    let mut reader = NsReader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let offset = reader.buffer_position() as usize;
        let loc = index.location(offset);
        let (res, ev) = match reader.read_resolved_event_into(&mut buf) {
            Ok(pair) => pair,
            Err(e) => {
                return Err(XmlParseError {
                    location: index.location(reader.buffer_position() as usize),
                    details: e.to_string(),
                });
            }
        };
        match ev {
            XmlEvent::Start(e) => {
                let namespace = resolved_namespace(res, loc)?;
                let local = String::from_utf8_lossy(e.local_name().into_inner()).into_owned();
                let attributes = read_attributes(&reader, &e, loc)?;
                stack.push(XmlElement {
                    name: QName::new(namespace, local),
                    attributes,
                    children: Vec::new(),
                    location: loc,
                });
            }
            XmlEvent::Empty(e) => {
                let namespace = resolved_namespace(res, loc)?;
                let local = String::from_utf8_lossy(e.local_name().into_inner()).into_owned();
                let attributes = read_attributes(&reader, &e, loc)?;
                let elem = XmlElement {
                    name: QName::new(namespace, local),
                    attributes,
                    children: Vec::new(),
                    location: loc,
                };
                attach(&mut stack, &mut root, elem, loc)?;
            }
            XmlEvent::End(_) => {
                let elem = stack.pop().ok_or_else(|| XmlParseError {
                    location: loc,
                    details: "unexpected end tag".to_string(),
                })?;
                attach(&mut stack, &mut root, elem, loc)?;
            }
            XmlEvent::Text(t) => {
                let s = t
                    .unescape()
                    .map_err(|e| XmlParseError {
                        location: loc,
                        details: e.to_string(),
                    })?
                    .into_owned();
                if let Some(top) = stack.last_mut() {
                    top.children.push(XmlChild::Text(s));
                }
            }
            XmlEvent::CData(t) => {
                let s = String::from_utf8_lossy(&t.into_inner()).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.children.push(XmlChild::Text(s));
                }
            }
            XmlEvent::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    root.ok_or_else(|| XmlParseError {
        location: Location::new(1, 1),
        details: "document has no root element".to_string(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    elem: XmlElement,
    loc: Location,
) -> std::result::Result<(), XmlParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlChild::Element(elem));
        Ok(())
    } else if root.is_some() {
        Err(XmlParseError {
            location: loc,
            details: "multiple root elements".to_string(),
        })
    } else {
        *root = Some(elem);
        Ok(())
    }
}

/// Streaming event source over a document held in memory. One XML start tag
/// expands into an element-start event followed by one event per attribute.
pub struct XmlEventSource {
    reader: NsReader<Cursor<Vec<u8>>>,
    index: LineIndex,
    buf: Vec<u8>,
    pending: VecDeque<Event>,
    open_names: Vec<QName>,
    path: PathBuf,
    done: bool,
}

impl XmlEventSource {
    pub fn from_bytes(bytes: Vec<u8>, path: impl Into<PathBuf>) -> Self {
        let index = LineIndex::new(&bytes);
        Self {
            reader: NsReader::from_reader(Cursor::new(bytes)),
            index,
            buf: Vec::new(),
            pending: VecDeque::new(),
            open_names: Vec::new(),
            path: path.into(),
            done: false,
        }
    }

    fn parse_error(&self, loc: Location, details: impl std::fmt::Display) -> ValidationError {
        ValidationError::XmlParse {
            path: self.path.clone(),
            details: format!("{} at {}", details, loc),
        }
    }
}

impl EventSource for XmlEventSource {
    fn next_event(&mut self) -> Result<Option<Event>> {
        loop {
            if let Some(ev) = self.pending.pop_front() {
                return Ok(Some(ev));
            }
            if self.done {
                return Ok(None);
            }

            let offset = self.reader.buffer_position() as usize;
            let loc = self.index.location(offset);
            self.buf.clear();
            let (res, ev) = match self.reader.read_resolved_event_into(&mut self.buf) {
                Ok(pair) => pair,
                Err(e) => {
                    self.done = true;
                    let loc = self.index.location(self.reader.buffer_position() as usize);
                    return Err(self.parse_error(loc, e));
                }
            };
            match ev {
                ev @ (XmlEvent::Start(_) | XmlEvent::Empty(_)) => {
                    let self_closing = matches!(ev, XmlEvent::Empty(_));
                    let e = match ev {
                        XmlEvent::Start(e) | XmlEvent::Empty(e) => e,
                        _ => unreachable!(),
                    };
                    let namespace = match resolved_namespace(res, loc) {
                        Ok(ns) => ns,
                        Err(err) => {
                            self.done = true;
                            return Err(self.parse_error(err.location, err.details));
                        }
                    };
                    let local = String::from_utf8_lossy(e.local_name().into_inner()).into_owned();
                    let name = QName::new(namespace, local);
                    let attributes = match read_attributes(&self.reader, &e, loc) {
                        Ok(attrs) => attrs,
                        Err(err) => {
                            self.done = true;
                            return Err(self.parse_error(err.location, err.details));
                        }
                    };
                    self.pending.push_back(Event::StartElement {
                        name: name.clone(),
                        location: loc,
                    });
                    for attr in attributes {
                        self.pending.push_back(Event::Attribute {
                            name: attr.name,
                            value: attr.value,
                            location: attr.location,
                        });
                    }
                    if self_closing {
                        // A combined start+end tag.
                        self.pending.push_back(Event::EndElement {
                            name,
                            location: loc,
                        });
                    } else {
                        self.open_names.push(name);
                    }
                }
                XmlEvent::End(_) => {
                    if let Some(name) = self.open_names.pop() {
                        self.pending.push_back(Event::EndElement {
                            name,
                            location: loc,
                        });
                    } else {
                        self.done = true;
                        return Err(self.parse_error(loc, "unexpected end tag"));
                    }
                }
                XmlEvent::Text(t) => {
                    let s = match t.unescape() {
                        Ok(s) => s.into_owned(),
                        Err(e) => {
                            self.done = true;
                            return Err(self.parse_error(loc, e));
                        }
                    };
                    if !s.is_empty() {
                        self.pending.push_back(Event::Text {
                            value: s,
                            location: loc,
                        });
                    }
                }
                XmlEvent::CData(t) => {
                    let s = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    if !s.is_empty() {
                        self.pending.push_back(Event::Text {
                            value: s,
                            location: loc,
                        });
                    }
                }
                XmlEvent::Eof => {
                    self.done = true;
                }
                _ => {}
            }
        }
    }
}
