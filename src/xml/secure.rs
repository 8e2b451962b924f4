// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Hardened XML parsing.
//!
//! Every piece of XML that enters the system goes through
//! [`SecureXmlParser`]. The parser:
//!
//! - rejects any `<!DOCTYPE ...>` outright, so no internal or external DTD,
//!   external general or parameter entity, or DTD download can take effect;
//! - resolves only the five predefined entities and numeric character
//!   references, failing on any other `&name;` instead of expanding it;
//! - never follows XInclude or any other external reference;
//! - bounds element nesting depth.
//!
//! Beyond that it enforces well-formedness: one root element, matching end
//! tags, no unclosed elements, no stray text outside the root and no
//! duplicate attributes.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use tracing::trace;

use super::tree::{Element, Node, XmlDocument};
use crate::error::{Classify, ErrorKind};

/// Default maximum element nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Reasons a piece of XML is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XmlError {
    /// The input was blank.
    #[error("XML content is empty")]
    Empty,
    /// The input declared a document type.
    #[error("DOCTYPE declarations are not allowed")]
    DoctypeForbidden,
    /// The input is not well-formed.
    #[error("Malformed XML at byte {position}: {message}")]
    Malformed {
        /// Byte offset where the problem was detected.
        position: usize,
        /// What went wrong.
        message: String,
    },
    /// Elements are nested deeper than the configured limit.
    #[error("Element nesting exceeds the limit of {limit}")]
    TooDeep {
        /// The configured limit.
        limit: usize,
    },
    /// The tree could not be written back out.
    #[error("Failed to serialize XML: {0}")]
    Serialize(String),
}

impl Classify for XmlError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Serialize(_) => ErrorKind::Io,
            _ => ErrorKind::InvalidInput,
        }
    }
}

fn malformed(position: usize, message: impl std::fmt::Display) -> XmlError {
    XmlError::Malformed {
        position,
        message: message.to_string(),
    }
}

/// Parses XML text into an owned [`XmlDocument`] with all unsafe features
/// disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecureXmlParser {
    max_depth: usize,
}

impl Default for SecureXmlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureXmlParser {
    /// Creates a parser with the default nesting limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Overrides the maximum element nesting depth. A value of zero is
    /// treated as one.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = if max_depth == 0 { 1 } else { max_depth };
        self
    }

    /// The maximum element nesting depth.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Parses `text` into a document.
    ///
    /// # Errors
    ///
    /// Returns an [`XmlError`] if the text is blank, declares a DOCTYPE,
    /// references an unknown entity, nests too deeply, or is otherwise not
    /// well-formed.
    pub fn parse(&self, text: &str) -> Result<XmlDocument, XmlError> {
        if text.trim().is_empty() {
            return Err(XmlError::Empty);
        }

        let mut reader = Reader::from_str(text);
        reader
            .check_end_names(true)
            .expand_empty_elements(false)
            .trim_text(false);

        let mut builder = TreeBuilder::default();
        let mut seen_content = false;

        loop {
            let position = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|e| malformed(reader.buffer_position(), e))?;

            match event {
                Event::DocType(_) => return Err(XmlError::DoctypeForbidden),
                Event::Decl(_) => {
                    if seen_content {
                        return Err(malformed(
                            position,
                            "XML declaration is only allowed at the start of the document",
                        ));
                    }
                }
                Event::Start(start) => {
                    self.check_depth(builder.depth())?;
                    builder.open(parse_start(&start, position)?, position)?;
                }
                Event::Empty(start) => {
                    self.check_depth(builder.depth())?;
                    builder.open(parse_start(&start, position)?, position)?;
                    builder.close(None, position)?;
                }
                Event::End(end) => {
                    let name = utf8(end.name().as_ref(), position)?;
                    builder.close(Some(name), position)?;
                }
                Event::Text(text) => {
                    let value = text.unescape().map_err(|e| malformed(position, e))?;
                    if !value.trim().is_empty() {
                        builder.content(Node::Text(value.into_owned()), position)?;
                    }
                }
                Event::CData(data) => {
                    let value = utf8(&data, position)?;
                    builder.content(Node::CData(value), position)?;
                }
                Event::Comment(comment) => {
                    builder.misc(Node::Comment(utf8(&comment, position)?));
                }
                Event::PI(instruction) => {
                    builder.misc(Node::ProcessingInstruction(utf8(&instruction, position)?));
                }
                Event::Eof => break,
            }
            seen_content = true;
        }

        let document = builder.finish(reader.buffer_position())?;
        trace!("Parsed XML document with root <{}>", document.root.name);
        Ok(document)
    }

    const fn check_depth(&self, depth: usize) -> Result<(), XmlError> {
        if depth >= self.max_depth {
            return Err(XmlError::TooDeep {
                limit: self.max_depth,
            });
        }
        Ok(())
    }
}

fn utf8(bytes: &[u8], position: usize) -> Result<String, XmlError> {
    std::str::from_utf8(bytes)
        .map(ToString::to_string)
        .map_err(|e| malformed(position, e))
}

fn parse_start(start: &BytesStart<'_>, position: usize) -> Result<Element, XmlError> {
    let mut element = Element::new(utf8(start.name().as_ref(), position)?);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| malformed(position, e))?;
        let key = utf8(attribute.key.as_ref(), position)?;
        let value = attribute
            .unescape_value()
            .map_err(|e| malformed(position, e))?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

/// Assembles the owned tree while enforcing document structure.
#[derive(Default)]
struct TreeBuilder {
    open: Vec<Element>,
    prolog: Vec<Node>,
    root: Option<Element>,
    epilog: Vec<Node>,
}

impl TreeBuilder {
    const fn depth(&self) -> usize {
        self.open.len()
    }

    fn open(&mut self, element: Element, position: usize) -> Result<(), XmlError> {
        if self.open.is_empty() && self.root.is_some() {
            return Err(malformed(
                position,
                format!("second root element <{}>", element.name),
            ));
        }
        self.open.push(element);
        Ok(())
    }

    fn close(&mut self, name: Option<String>, position: usize) -> Result<(), XmlError> {
        let element = self.open.pop().ok_or_else(|| {
            malformed(
                position,
                format!("unexpected closing tag </{}>", name.as_deref().unwrap_or("")),
            )
        })?;
        if let Some(name) = name.filter(|n| *n != element.name) {
            return Err(malformed(
                position,
                format!("expected </{}>, found </{name}>", element.name),
            ));
        }

        match self.open.last_mut() {
            Some(parent) => parent.children.push(Node::Element(element)),
            None => self.root = Some(element),
        }
        Ok(())
    }

    /// Text and CDATA are only allowed inside the root element.
    fn content(&mut self, node: Node, position: usize) -> Result<(), XmlError> {
        let parent = self
            .open
            .last_mut()
            .ok_or_else(|| malformed(position, "character data outside the root element"))?;
        parent.children.push(node);
        Ok(())
    }

    /// Comments and processing instructions may appear anywhere.
    fn misc(&mut self, node: Node) {
        if let Some(parent) = self.open.last_mut() {
            parent.children.push(node);
        } else if self.root.is_none() {
            self.prolog.push(node);
        } else {
            self.epilog.push(node);
        }
    }

    fn finish(self, position: usize) -> Result<XmlDocument, XmlError> {
        if let Some(unclosed) = self.open.last() {
            return Err(malformed(
                position,
                format!("unclosed element <{}>", unclosed.name),
            ));
        }
        let root = self
            .root
            .ok_or_else(|| malformed(position, "document has no root element"))?;
        Ok(XmlDocument {
            prolog: self.prolog,
            root,
            epilog: self.epilog,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};

    fn parse(text: &str) -> Result<XmlDocument, XmlError> {
        SecureXmlParser::new().parse(text)
    }

    #[test]
    fn test_parse_simple_document() -> Result<()> {
        let doc = parse(r#"<Configuration><Adapter name="A"><X>1</X></Adapter></Configuration>"#)?;
        assert_eq!(doc.root.name, "Configuration");
        let adapter = doc
            .root
            .child_elements()
            .next()
            .ok_or_else(|| anyhow!("missing adapter"))?;
        assert_eq!(adapter.attribute("name"), Some("A"));
        Ok(())
    }

    #[test]
    fn test_declaration_is_accepted_and_dropped() -> Result<()> {
        let doc = parse("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Root/>")?;
        assert!(doc.prolog.is_empty());
        assert_eq!(doc.root.name, "Root");
        Ok(())
    }

    #[test]
    fn test_doctype_is_rejected() {
        let xxe = r#"<?xml version="1.0"?>
<!DOCTYPE foo [ <!ENTITY xxe SYSTEM "file:///etc/passwd"> ]>
<foo>&xxe;</foo>"#;
        assert_eq!(parse(xxe), Err(XmlError::DoctypeForbidden));
    }

    #[test]
    fn test_billion_laughs_is_rejected() {
        let bomb = r#"<!DOCTYPE lolz [
  <!ENTITY lol "lol">
  <!ENTITY lol2 "&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;">
]>
<lolz>&lol2;</lolz>"#;
        assert_eq!(parse(bomb), Err(XmlError::DoctypeForbidden));
    }

    #[test]
    fn test_undeclared_entity_is_not_expanded() {
        let result = parse("<foo>&xxe;</foo>");
        assert!(matches!(result, Err(XmlError::Malformed { .. })));
    }

    #[test]
    fn test_predefined_and_numeric_entities_resolve() -> Result<()> {
        let doc = parse("<a t=\"&quot;x&quot;\">&lt;&amp;&gt;&#65;&#x42;</a>")?;
        assert_eq!(doc.root.attribute("t"), Some("\"x\""));
        assert_eq!(doc.root.children, vec![Node::Text("<&>AB".into())]);
        Ok(())
    }

    #[test]
    fn test_blank_input_is_empty_error() {
        assert_eq!(parse(""), Err(XmlError::Empty));
        assert_eq!(parse("  \n\t "), Err(XmlError::Empty));
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        assert!(parse("<adapter").is_err());
        assert!(parse("<Configuration><Adapter name=\"A\">").is_err());
    }

    #[test]
    fn test_mismatched_end_tag_is_rejected() {
        assert!(parse("<a><b></a></b>").is_err());
    }

    #[test]
    fn test_stray_closing_tag_is_rejected() {
        assert!(parse("<a/></b>").is_err());
    }

    #[test]
    fn test_multiple_roots_are_rejected() {
        assert!(parse("<a/><b/>").is_err());
    }

    #[test]
    fn test_text_outside_root_is_rejected() {
        assert!(parse("hello <a/>").is_err());
        assert!(parse("<a/> trailing").is_err());
    }

    #[test]
    fn test_duplicate_attribute_is_rejected() {
        assert!(parse(r#"<a x="1" x="2"/>"#).is_err());
    }

    #[test]
    fn test_depth_limit() -> Result<()> {
        let parser = SecureXmlParser::new().with_max_depth(3);
        parser.parse("<a><b><c/></b></a>")?;
        assert_eq!(
            parser.parse("<a><b><c><d/></c></b></a>"),
            Err(XmlError::TooDeep { limit: 3 })
        );
        Ok(())
    }

    #[test]
    fn test_comments_around_root_are_kept() -> Result<()> {
        let doc = parse("<!-- head --><a><!-- inner --></a><!-- tail -->")?;
        assert_eq!(doc.prolog, vec![Node::Comment(" head ".into())]);
        assert_eq!(doc.root.children, vec![Node::Comment(" inner ".into())]);
        assert_eq!(doc.epilog, vec![Node::Comment(" tail ".into())]);
        Ok(())
    }

    #[test]
    fn test_whitespace_between_elements_is_dropped() -> Result<()> {
        let doc = parse("<a>\n  <b/>\n  <c/>\n</a>")?;
        assert_eq!(doc.root.children.len(), 2);
        Ok(())
    }

    #[test]
    fn test_errors_classify_as_invalid_input() {
        assert_eq!(XmlError::DoctypeForbidden.kind(), ErrorKind::InvalidInput);
        assert_eq!(XmlError::Empty.kind(), ErrorKind::InvalidInput);
    }
}
