//! Minimal owned XML tree for WordprocessingML parts.
//!
//! The post-processor needs to *edit* parts and write them back, so unlike a
//! streaming reader we keep every element, attribute and text node. Element and
//! attribute names are stored fully qualified (`w:p`, `w:val`) because DOCX
//! producers use the conventional prefixes and new elements must be written
//! with the same ones.
//!
//! Comments, processing instructions and doctypes never appear in the parts we
//! edit and are dropped on parse.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// The XML declaration written in front of every serialised part.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Errors raised while parsing a part.
#[derive(Debug, Error)]
pub enum XmlError {
    /// quick-xml rejected the input.
    #[error("XML syntax error at byte {position}: {detail}")]
    Syntax { position: u64, detail: String },

    /// The input ended with elements still open, or had no root element.
    #[error("XML document is incomplete: {0}")]
    Incomplete(String),
}

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with its attributes and children, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder-style text append.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Remove an attribute; returns `true` if it was present.
    pub fn remove_attr(&mut self, key: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(k, _)| k != key);
        before != self.attributes.len()
    }

    /// Iterate over child elements (text nodes skipped).
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First direct child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Direct children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name == name)
    }

    /// Remove every direct child with the given name; returns how many went.
    pub fn remove_children_named(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if e.name == name));
        before - self.children.len()
    }

    /// `true` if any descendant (not self) has the given name.
    pub fn contains_descendant(&self, name: &str) -> bool {
        self.elements()
            .any(|e| e.name == name || e.contains_descendant(name))
    }

    /// Collect every descendant with the given name, depth-first.
    pub fn descendants_named<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for e in self.elements() {
            if e.name == name {
                out.push(e);
            }
            e.descendants_named(name, out);
        }
    }

    /// Apply `f` to every descendant with the given name, depth-first.
    ///
    /// Matching elements are not searched further (WordprocessingML never
    /// nests an element inside another of the same name in the parts we edit).
    pub fn for_each_named_mut(&mut self, name: &str, f: &mut dyn FnMut(&mut Element)) {
        for e in self.elements_mut() {
            if e.name == name {
                f(e);
            } else {
                e.for_each_named_mut(name, f);
            }
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Get the direct child `name`, creating it at its schema position if
    /// absent.
    ///
    /// `order` lists the permitted child names in schema sequence. A new child
    /// is inserted before the first existing sibling that comes later in
    /// `order`; names not in `order` are treated as coming last.
    pub fn ensure_child(&mut self, name: &str, order: &[&str]) -> &mut Element {
        let idx = match self.child_index(name) {
            Some(idx) => idx,
            None => {
                let idx = self.insertion_index(name, order);
                self.children.insert(idx, Node::Element(Element::new(name)));
                idx
            }
        };
        match &mut self.children[idx] {
            Node::Element(e) => e,
            Node::Text(_) => unreachable!("index points at an element"),
        }
    }

    fn child_index(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.name == name))
    }

    fn insertion_index(&self, name: &str, order: &[&str]) -> usize {
        let rank = |n: &str| order.iter().position(|o| *o == n).unwrap_or(order.len());
        let my_rank = rank(name);
        self.children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if rank(&e.name) > my_rank))
            .unwrap_or(self.children.len())
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attributes {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape_attr(v));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                Node::Text(t) => out.push_str(&escape_text(t)),
                Node::Element(e) => e.write_to(out),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// A parsed XML part: one root element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: Element,
}

impl XmlDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parse a complete XML document.
    pub fn parse(input: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(strip_bom(input));
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| XmlError::Syntax {
                position: reader.error_position() as u64,
                detail: e.to_string(),
            })?;

            match event {
                Event::Start(e) => {
                    let element = start_element(e.name().as_ref(), e.attributes())?;
                    stack.push(element);
                }
                Event::Empty(e) => {
                    let element = start_element(e.name().as_ref(), e.attributes())?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::Incomplete("unexpected end tag".into()))?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(t) => {
                    push_text(&mut stack, &String::from_utf8_lossy(t.as_ref()));
                }
                Event::CData(t) => {
                    push_text(&mut stack, &String::from_utf8_lossy(t.as_ref()));
                }
                Event::GeneralRef(r) => {
                    let entity = String::from_utf8_lossy(r.as_ref()).into_owned();
                    let resolved = resolve_entity(&entity).unwrap_or_else(|| format!("&{entity};"));
                    push_text(&mut stack, &resolved);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::Incomplete(format!(
                "{} element(s) left open",
                stack.len()
            )));
        }
        root.map(Self::new)
            .ok_or_else(|| XmlError::Incomplete("no root element".into()))
    }

    /// Serialise with the standard DOCX declaration.
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(4096);
        out.push_str(XML_DECLARATION);
        out.push('\n');
        self.root.write_to(&mut out);
        out
    }
}

fn start_element(
    name: &[u8],
    attributes: quick_xml::events::attributes::Attributes<'_>,
) -> Result<Element, XmlError> {
    let mut element = Element::new(String::from_utf8_lossy(name).into_owned());
    for attr in attributes {
        let attr = attr.map_err(|e| XmlError::Syntax {
            position: 0,
            detail: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value).into_owned();
        let value = match quick_xml::escape::unescape(&raw) {
            Ok(v) => v.into_owned(),
            Err(_) => raw,
        };
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// Append text to the innermost open element, merging adjacent text nodes.
/// Text outside the root element is whitespace and dropped.
fn push_text(stack: &mut [Element], text: &str) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    if let Some(Node::Text(prev)) = parent.children.last_mut() {
        prev.push_str(text);
    } else {
        parent.children.push(Node::Text(text.to_string()));
    }
}

fn strip_bom(input: &str) -> &str {
    input.strip_prefix('\u{FEFF}').unwrap_or(input)
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()?
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()?
    } else {
        return None;
    };
    char::from_u32(code).map(|c| c.to_string())
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
