//! A small owned XML tree built on top of `quick-xml` events.
//!
//! Both the native reader and the URDF converter work on [`XmlElement`] trees:
//! they are cheap to walk, to rewrite in place, and to write back out.

use crate::error::XmlError;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use tracing::warn;

/// An XML element with its attributes, text and child elements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct XmlElement {
    /// Tag name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Concatenated character data, if any.
    pub text: Option<String>,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parses a single element (and its subtree) from text.
    pub fn parse(text: &str) -> Result<Self, XmlError> {
        XmlDocument::parse(text)?
            .root
            .ok_or_else(|| XmlError::new(0, "document has no root element"))
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing any existing value for `key`.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Text content, or the empty string.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    pub fn first_child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn first_child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// Removes every child named `name`, returning how many were removed.
    pub fn remove_children(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children.retain(|c| c.name != name);
        before - self.children.len()
    }

    /// Returns the first child named `name`, appending an empty one if absent.
    pub fn child_mut_or_insert(&mut self, name: &str) -> &mut XmlElement {
        let idx = match self.children.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                self.children.push(XmlElement::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    /// The element's scalar payload: its `value` attribute, else its trimmed text.
    pub fn key_value(&self) -> String {
        match self.attribute("value") {
            Some(v) => v.trim().to_string(),
            None => self.text().trim().to_string(),
        }
    }

    /// Sets child `<key>` to hold `value` as text, replacing an existing child.
    pub fn add_key_value(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(old) = self.first_child(key) {
            let old_value = old.key_value();
            if old_value != value {
                warn!(
                    "multiple inconsistent <{}> exists due to fixed joint reduction, overwriting previous value [{}] with [{}]",
                    key, old_value, value
                );
            }
            self.remove_children(key);
        }
        self.children.push(XmlElement::new(key).with_text(value));
    }

    /// Serializes this element and its subtree, indented by two spaces.
    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_into(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(|e| XmlError::new(0, e))
    }

    fn write_into<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            start.push_attribute((k.as_str(), v.as_str()));
        }

        if self.children.is_empty() && self.text.is_none() {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|e| XmlError::new(0, e));
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| XmlError::new(0, e))?;
        if let Some(text) = &self.text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| XmlError::new(0, e))?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| XmlError::new(0, e))
    }
}

/// A parsed XML document. Conversion failures are reported as a document without a root.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct XmlDocument {
    pub root: Option<XmlElement>,
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self { root: Some(root) }
    }

    /// True when the document holds a root element.
    pub fn is_valid(&self) -> bool {
        self.root.is_some()
    }

    /// Parses a complete document.
    pub fn parse(text: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader
                .read_event()
                .map_err(|e| XmlError::new(position, e))?;
            match event {
                Event::Start(ref e) => stack.push(start_element(e, position)?),
                Event::Empty(ref e) => {
                    let elem = start_element(e, position)?;
                    attach(&mut stack, &mut root, elem, position)?;
                }
                Event::End(_) => {
                    if let Some(elem) = stack.pop() {
                        attach(&mut stack, &mut root, elem, position)?;
                    }
                }
                Event::Text(ref t) => {
                    let text = t.unescape().map_err(|e| XmlError::new(position, e))?;
                    append_text(&mut stack, &text);
                }
                Event::CData(ref c) => {
                    let text = String::from_utf8_lossy(c);
                    append_text(&mut stack, &text);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::new(
                reader.buffer_position() as u64,
                format!("unclosed element <{}>", open.name),
            ));
        }
        Ok(Self { root })
    }

    /// Serializes the document with an XML declaration.
    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        match &self.root {
            Some(root) => Ok(format!("<?xml version='1.0' ?>\n{}\n", root.to_xml_string()?)),
            None => Ok(String::new()),
        }
    }
}

fn start_element(e: &BytesStart, position: u64) -> Result<XmlElement, XmlError> {
    let mut elem = XmlElement::new(String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr.map_err(|err| XmlError::new(position, err))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| XmlError::new(position, err))?
            .into_owned();
        elem.attributes.push((key, value));
    }
    Ok(elem)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    elem: XmlElement,
    position: u64,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(elem);
        Ok(())
    } else if root.is_none() {
        *root = Some(elem);
        Ok(())
    } else {
        Err(XmlError::new(position, "multiple root elements"))
    }
}

fn append_text(stack: &mut [XmlElement], text: &str) {
    if let Some(top) = stack.last_mut() {
        match &mut top.text {
            Some(existing) => existing.push_str(text),
            None => top.text = Some(text.to_string()),
        }
    }
}
