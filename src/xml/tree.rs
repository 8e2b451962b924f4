// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Owned XML tree and its serializer.
//!
//! Output policy: two-space indentation, no XML declaration, `\n` line
//! separators, and no whitespace-only lines. Serializing a document that was
//! parsed from this serializer's own output yields identical text.

use std::sync::LazyLock;

use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use regex::Regex;

use super::secure::XmlError;

/// Matches lines that hold nothing but spaces or tabs.
static BLANK_LINE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\r?\n"));

/// A node inside an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A nested element.
    Element(Element),
    /// Character data, already unescaped.
    Text(String),
    /// A CDATA section, verbatim.
    CData(String),
    /// A comment body, verbatim.
    Comment(String),
    /// A processing instruction body (target and data), verbatim.
    ProcessingInstruction(String),
}

/// An element with its attributes in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified tag name, including any namespace prefix.
    pub name: String,
    /// Attribute names and unescaped values.
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an element with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Returns the unescaped value of an attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over the direct child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Returns this element followed by all descendant elements, in
    /// document order.
    #[must_use]
    pub fn descendants(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(element) = stack.pop() {
            out.push(element);
            // Reverse so the first child is popped next.
            let children: Vec<&Self> = element.child_elements().collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }
}

/// A parsed document: a single root element plus comments and processing
/// instructions before and after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// Nodes preceding the root element.
    pub prolog: Vec<Node>,
    /// The document element.
    pub root: Element,
    /// Nodes following the root element.
    pub epilog: Vec<Node>,
}

impl XmlDocument {
    /// Wraps a root element into a document with an empty prolog and epilog.
    #[must_use]
    pub const fn new(root: Element) -> Self {
        Self {
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }

    /// Replaces the first element, in document order, that satisfies
    /// `predicate`. The replacement takes the matched element's exact
    /// position. Returns `false` and leaves the tree untouched when nothing
    /// matches.
    pub fn replace_first<F>(&mut self, predicate: F, replacement: Element) -> bool
    where
        F: Fn(&Element) -> bool,
    {
        if predicate(&self.root) {
            self.root = replacement;
            return true;
        }
        let mut slot = Some(replacement);
        replace_in_children(&mut self.root, &predicate, &mut slot)
    }

    /// Serializes the document with the deterministic output policy.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Serialize`] if the writer fails or produces
    /// invalid UTF-8.
    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        for node in &self.prolog {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            write_node(&mut writer, node)?;
        }

        let raw = String::from_utf8(writer.into_inner())
            .map_err(|e| XmlError::Serialize(e.to_string()))?;
        strip_blank_lines(&raw)
    }
}

fn replace_in_children<F>(element: &mut Element, predicate: &F, slot: &mut Option<Element>) -> bool
where
    F: Fn(&Element) -> bool,
{
    for child in &mut element.children {
        let Node::Element(candidate) = child else {
            continue;
        };
        if predicate(&*candidate) {
            return slot.take().is_some_and(|replacement| {
                *candidate = replacement;
                true
            });
        }
        if replace_in_children(candidate, predicate, slot) {
            return true;
        }
    }
    false
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return write_event(writer, Event::Empty(start));
    }

    write_event(writer, Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    write_event(writer, Event::End(BytesEnd::new(element.name.as_str())))
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), XmlError> {
    match node {
        Node::Element(element) => write_element(writer, element),
        Node::Text(text) => write_event(
            writer,
            Event::Text(BytesText::from_escaped(partial_escape(text))),
        ),
        Node::CData(data) => write_event(writer, Event::CData(BytesCData::new(data.as_str()))),
        Node::Comment(body) => write_event(
            writer,
            Event::Comment(BytesText::from_escaped(body.as_str())),
        ),
        Node::ProcessingInstruction(body) => {
            write_event(writer, Event::PI(BytesText::from_escaped(body.as_str())))
        }
    }
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|e| XmlError::Serialize(e.to_string()))
}

fn strip_blank_lines(text: &str) -> Result<String, XmlError> {
    let pattern = BLANK_LINE
        .as_ref()
        .map_err(|e| XmlError::Serialize(e.to_string()))?;
    Ok(pattern.replace_all(text, "").into_owned())
}
