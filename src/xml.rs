//! XML decoding for SOAP/TR-064 envelopes and UPnP descriptions.
//!
//! Documents are turned into a `serde_json::Value` tree using these
//! rules (the shape FRITZ!Box tooling conventionally works with):
//!
//! - The result is an object with a single key, the root element name.
//! - An element with only text becomes a string; an empty one becomes `""`.
//! - Attributes are collected under `"$"`; text that sits next to
//!   attributes or child elements goes under `"_"`.
//! - A child name that occurs once maps to its value; repeated sibling
//!   names collect into an array in document order.
//! - Qualified names are kept verbatim (`"s:Envelope"`). Use
//!   [`local_name`] to match independently of the prefix.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

/// Failure to decode an XML document.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Syntax(String),

    #[error("document has no root element")]
    Empty,

    #[error("unexpected end of document inside <{0}>")]
    Unclosed(String),
}

/// Element under construction.
struct Frame {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

        let mut attributes = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError::Syntax(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError::Syntax(e.to_string()))?;
            attributes.insert(key, Value::String(value.into_owned()));
        }

        Ok(Frame {
            name,
            attributes,
            children: Map::new(),
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        if self.attributes.is_empty() && self.children.is_empty() {
            return (self.name, Value::String(self.text));
        }

        let mut object = Map::new();
        if !self.attributes.is_empty() {
            object.insert("$".to_string(), Value::Object(self.attributes));
        }
        if !self.text.is_empty() {
            object.insert("_".to_string(), Value::String(self.text));
        }
        for (key, value) in self.children {
            insert_child(&mut object, key, value);
        }
        (self.name, Value::Object(object))
    }
}

fn insert_child(object: &mut Map<String, Value>, key: String, value: Value) {
    match object.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            object.insert(key, value);
        }
    }
}

/// Parses an XML document into a nested value.
pub fn parse(body: &str) -> Result<Value, XmlError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => stack.push(Frame::open(e)?),
            Ok(Event::Empty(ref e)) => {
                let (name, value) = Frame::open(e)?.close();
                attach(&mut stack, &mut root, name, value);
            }
            Ok(Event::End(_)) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| XmlError::Syntax("unmatched closing tag".to_string()))?;
                let (name, value) = frame.close();
                attach(&mut stack, &mut root, name, value);
            }
            Ok(Event::Text(ref e)) => {
                if let Some(frame) = stack.last_mut() {
                    let text = e.unescape().map_err(|err| XmlError::Syntax(err.to_string()))?;
                    frame.text.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XmlError::Syntax(e.to_string())),
            // Declarations, comments, processing instructions, doctypes.
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }

    let (name, value) = root.ok_or(XmlError::Empty)?;
    let mut document = Map::new();
    document.insert(name, value);
    Ok(Value::Object(document))
}

fn attach(stack: &mut [Frame], root: &mut Option<(String, Value)>, name: String, value: Value) {
    match stack.last_mut() {
        Some(parent) => insert_child(&mut parent.children, name, value),
        None => *root = Some((name, value)),
    }
}

/// Element name without its namespace prefix.
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Looks up a child of an element object by local name, ignoring any
/// namespace prefix. The first match in key order wins.
pub fn child<'v>(element: &'v Value, name: &str) -> Option<&'v Value> {
    element
        .as_object()?
        .iter()
        .find(|(key, _)| key.as_str() != "$" && local_name(key) == name)
        .map(|(_, value)| value)
}

/// Walks a path of local names from `element`.
pub fn find<'v>(element: &'v Value, path: &[&str]) -> Option<&'v Value> {
    path.iter().try_fold(element, |node, name| child(node, name))
}

/// Text content of an element value: the string itself, or the `"_"`
/// entry of an element that also carries attributes.
pub fn text(element: &Value) -> Option<&str> {
    match element {
        Value::String(s) => Some(s),
        Value::Object(object) => object.get("_").and_then(Value::as_str),
        _ => None,
    }
}
