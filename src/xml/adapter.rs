// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Replaces a named `Adapter` element inside a configuration document.
//!
//! Candidates are all elements literally named `Adapter`, anywhere in the
//! document, visited in document order. An outer adapter is visited before
//! the adapters nested inside it, so matching an outer adapter replaces its
//! whole subtree. The first element whose `name` attribute equals the
//! requested name exactly is replaced in place.

use thiserror::Error;
use tracing::debug;

use super::secure::{SecureXmlParser, XmlError};
use super::tree::Element;
use crate::error::{Classify, ErrorKind};

/// Tag name of adapter elements.
pub const ADAPTER_TAG: &str = "Adapter";

/// Attribute identifying an adapter.
pub const NAME_ATTRIBUTE: &str = "name";

/// Why an adapter replacement did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterEditError {
    /// The configuration text itself could not be parsed.
    #[error("Configuration is not valid XML: {0}")]
    InvalidDocument(#[source] XmlError),
    /// The replacement fragment could not be parsed.
    #[error("Replacement adapter is not valid XML: {0}")]
    InvalidReplacementFragment(#[source] XmlError),
    /// No adapter with that name exists in the configuration.
    #[error("Adapter '{0}' not found")]
    AdapterNotFound(String),
}

impl Classify for AdapterEditError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDocument(_) | Self::InvalidReplacementFragment(_) => {
                ErrorKind::InvalidInput
            }
            Self::AdapterNotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// A missing `name` attribute compares as the empty string.
fn is_adapter_named(element: &Element, name: &str) -> bool {
    element.name == ADAPTER_TAG && element.attribute(NAME_ATTRIBUTE).unwrap_or_default() == name
}

/// Adapter editing on top of a [`SecureXmlParser`]. Pure: never touches disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterEditor {
    parser: SecureXmlParser,
}

impl AdapterEditor {
    /// Creates an editor that parses with `parser`.
    #[must_use]
    pub const fn new(parser: SecureXmlParser) -> Self {
        Self { parser }
    }

    /// The parser used for both documents and fragments.
    #[must_use]
    pub const fn parser(&self) -> &SecureXmlParser {
        &self.parser
    }

    /// Replaces the first adapter named `adapter_name` in `xml` with the root
    /// element of `fragment` and returns the re-serialized document.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterEditError::InvalidDocument`] if `xml` does not parse,
    /// [`AdapterEditError::InvalidReplacementFragment`] if `fragment` does not
    /// parse, and [`AdapterEditError::AdapterNotFound`] if no adapter carries
    /// that name. In every error case the caller's text is left as it was.
    pub fn replace(
        &self,
        xml: &str,
        adapter_name: &str,
        fragment: &str,
    ) -> Result<String, AdapterEditError> {
        let mut document = self
            .parser
            .parse(xml)
            .map_err(AdapterEditError::InvalidDocument)?;
        let replacement = self
            .parser
            .parse(fragment)
            .map_err(AdapterEditError::InvalidReplacementFragment)?
            .root;

        if !document.replace_first(|e| is_adapter_named(e, adapter_name), replacement) {
            debug!("Adapter '{adapter_name}' not present in configuration");
            return Err(AdapterEditError::AdapterNotFound(adapter_name.to_string()));
        }

        // Serializing an owned tree we just parsed cannot produce bad input,
        // so a failure here is reported against the document.
        document
            .to_xml_string()
            .map_err(AdapterEditError::InvalidDocument)
    }

    /// Lists the `name` of every adapter in document order. Adapters without
    /// a name attribute are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterEditError::InvalidDocument`] if `xml` does not parse.
    pub fn adapter_names(&self, xml: &str) -> Result<Vec<String>, AdapterEditError> {
        let document = self
            .parser
            .parse(xml)
            .map_err(AdapterEditError::InvalidDocument)?;
        Ok(document
            .root
            .descendants()
            .into_iter()
            .filter(|e| e.name == ADAPTER_TAG)
            .filter_map(|e| e.attribute(NAME_ATTRIBUTE))
            .map(ToString::to_string)
            .collect())
    }
}

/// Replaces an adapter using the default parser.
///
/// # Errors
///
/// See [`AdapterEditor::replace`].
pub fn replace_adapter(
    xml: &str,
    adapter_name: &str,
    fragment: &str,
) -> Result<String, AdapterEditError> {
    AdapterEditor::default().replace(xml, adapter_name, fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    const TWO_ADAPTERS: &str = r#"<Configuration><Adapter name="A"><X>1</X></Adapter><Adapter name="B"><Y>2</Y></Adapter></Configuration>"#;

    fn adapter_block(xml: &str, name: &str) -> Option<String> {
        let open = format!("<Adapter name=\"{name}\">");
        let start = xml.find(&open)?;
        let end = xml[start..].find("</Adapter>")? + start + "</Adapter>".len();
        Some(xml[start..end].to_string())
    }

    #[test]
    fn test_replaces_named_adapter() -> Result<()> {
        let out = replace_adapter(TWO_ADAPTERS, "A", r#"<Adapter name="A"><X>9</X></Adapter>"#)?;
        assert!(out.contains("<X>9</X>"));
        assert!(!out.contains("<X>1</X>"));
        assert!(out.contains("name=\"B\""));
        assert!(out.contains("<Y>2</Y>"));
        Ok(())
    }

    #[test]
    fn test_replacement_keeps_sibling_position() -> Result<()> {
        let xml = r#"<Configuration><Adapter name="A"/><Adapter name="B"/><Adapter name="C"/></Configuration>"#;
        let out = replace_adapter(xml, "B", r#"<Adapter name="B2"/>"#)?;
        let editor = AdapterEditor::default();
        assert_eq!(editor.adapter_names(&out)?, ["A", "B2", "C"]);
        Ok(())
    }

    #[test]
    fn test_missing_adapter_is_not_found() {
        let result = replace_adapter(TWO_ADAPTERS, "Z", r#"<Adapter name="Z"/>"#);
        assert_eq!(result, Err(AdapterEditError::AdapterNotFound("Z".into())));
    }

    #[test]
    fn test_truncated_fragment_is_invalid_fragment() {
        let result = replace_adapter(TWO_ADAPTERS, "A", "<adapter");
        assert!(matches!(
            result,
            Err(AdapterEditError::InvalidReplacementFragment(_))
        ));
    }

    #[test]
    fn test_corrupt_document_is_invalid_document() {
        let result = replace_adapter("<Configuration><Adapter", "A", "<Adapter name=\"A\"/>");
        assert!(matches!(result, Err(AdapterEditError::InvalidDocument(_))));
    }

    #[test]
    fn test_invalid_document_wins_over_invalid_fragment() {
        let result = replace_adapter("", "A", "");
        assert!(matches!(result, Err(AdapterEditError::InvalidDocument(_))));
    }

    #[test]
    fn test_replacing_twice_is_idempotent() -> Result<()> {
        let fragment = r#"<Adapter name="A">
            <Pipe name="p1">
                <Param name="x" value="1"/>
            </Pipe>
        </Adapter>"#;
        let first = replace_adapter(TWO_ADAPTERS, "A", fragment)?;
        let second = replace_adapter(&first, "A", fragment)?;
        assert_eq!(first, second);

        // Feeding the serialized adapter back in is a fixed point too.
        let serialized = adapter_block(&first, "A").unwrap_or_default();
        let third = replace_adapter(&second, "A", &serialized)?;
        assert_eq!(second, third);
        Ok(())
    }

    #[test]
    fn test_siblings_are_byte_identical() -> Result<()> {
        let xml = r#"<Configuration>
  <Adapter name="A"><X>1</X></Adapter>
  <Adapter name="B"><Y>2</Y></Adapter>
  <Adapter name="C"><Z a="1">3</Z></Adapter>
</Configuration>"#;
        let baseline = replace_adapter(xml, "A", r#"<Adapter name="A"><X>1</X></Adapter>"#)?;
        let edited = replace_adapter(xml, "A", r#"<Adapter name="A"><X>2</X><W/></Adapter>"#)?;

        for sibling in ["B", "C"] {
            assert_eq!(
                adapter_block(&baseline, sibling),
                adapter_block(&edited, sibling)
            );
        }
        Ok(())
    }

    #[test]
    fn test_name_match_is_exact() {
        let xml = r#"<Configuration><Adapter name="AdapterOne"/><Adapter name="one"/></Configuration>"#;
        assert!(matches!(
            replace_adapter(xml, "Adapter", "<Adapter name=\"x\"/>"),
            Err(AdapterEditError::AdapterNotFound(_))
        ));
        assert!(matches!(
            replace_adapter(xml, "One", "<Adapter name=\"x\"/>"),
            Err(AdapterEditError::AdapterNotFound(_))
        ));
    }

    #[test]
    fn test_empty_name_matches_unnamed_adapter() -> Result<()> {
        let xml = r#"<Configuration><Adapter name="A"/><Adapter><Pipe/></Adapter></Configuration>"#;
        let out = replace_adapter(xml, "", r#"<Adapter name="Named"/>"#)?;
        let editor = AdapterEditor::default();
        assert_eq!(editor.adapter_names(&out)?, ["A", "Named"]);
        assert!(!out.contains("<Pipe/>"));
        Ok(())
    }

    #[test]
    fn test_configuration_without_adapters_is_not_found() {
        let result = replace_adapter("<Configuration/>", "A", "<Adapter name=\"A\"/>");
        assert!(matches!(result, Err(AdapterEditError::AdapterNotFound(_))));
    }

    #[test]
    fn test_only_adapter_tag_is_a_candidate() -> Result<()> {
        let xml = r#"<Configuration><Pipe name="A"/><Adapter name="A"><Pipe name="A"/></Adapter></Configuration>"#;
        let out = replace_adapter(xml, "A", r#"<Adapter name="A"><Done/></Adapter>"#)?;
        assert!(out.contains("<Pipe name=\"A\"/>"));
        assert!(out.contains("<Done/>"));
        Ok(())
    }

    #[test]
    fn test_outer_adapter_matches_before_nested() -> Result<()> {
        let xml = r#"<Configuration><Adapter name="A"><Adapter name="A"><Inner/></Adapter></Adapter></Configuration>"#;
        let out = replace_adapter(xml, "A", r#"<Adapter name="A"><Flat/></Adapter>"#)?;
        assert!(!out.contains("<Inner/>"));
        assert_eq!(
            out,
            "<Configuration>\n  <Adapter name=\"A\">\n    <Flat/>\n  </Adapter>\n</Configuration>"
        );
        Ok(())
    }

    #[test]
    fn test_nested_adapter_can_be_targeted() -> Result<()> {
        let xml = r#"<Configuration><Adapter name="Outer"><Adapter name="Inner"><Old/></Adapter></Adapter></Configuration>"#;
        let out = replace_adapter(xml, "Inner", r#"<Adapter name="Inner"><New/></Adapter>"#)?;
        assert!(out.contains("name=\"Outer\""));
        assert!(out.contains("<New/>"));
        assert!(!out.contains("<Old/>"));
        Ok(())
    }

    #[test]
    fn test_doctype_in_fragment_is_rejected() {
        let fragment = r#"<!DOCTYPE a [<!ENTITY x SYSTEM "file:///etc/passwd">]><Adapter name="A">&x;</Adapter>"#;
        assert_eq!(
            replace_adapter(TWO_ADAPTERS, "A", fragment),
            Err(AdapterEditError::InvalidReplacementFragment(
                XmlError::DoctypeForbidden
            ))
        );
    }

    #[test]
    fn test_doctype_in_document_is_rejected() {
        let xml = format!("<!DOCTYPE Configuration>{TWO_ADAPTERS}");
        assert_eq!(
            replace_adapter(&xml, "A", "<Adapter name=\"A\"/>"),
            Err(AdapterEditError::InvalidDocument(XmlError::DoctypeForbidden))
        );
    }

    #[test]
    fn test_output_omits_declaration_and_blank_lines() -> Result<()> {
        let xml = format!("<?xml version=\"1.0\"?>\n\n{TWO_ADAPTERS}\n\n");
        let out = replace_adapter(&xml, "B", "<Adapter name=\"B\">\n\n  <Y>3</Y>\n\n</Adapter>")?;
        assert!(!out.starts_with("<?xml"));
        assert!(!out.contains("\n\n"));
        assert!(out.lines().all(|line| !line.trim().is_empty()));
        Ok(())
    }

    #[test]
    fn test_adapter_names_in_document_order() -> Result<()> {
        let xml = r#"<Configuration><Adapter name="A"><Adapter name="A1"/></Adapter><Adapter/><Adapter name="B"/></Configuration>"#;
        assert_eq!(
            AdapterEditor::default().adapter_names(xml)?,
            ["A", "A1", "B"]
        );
        Ok(())
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            AdapterEditError::AdapterNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AdapterEditError::InvalidReplacementFragment(XmlError::Empty).kind(),
            ErrorKind::InvalidInput
        );
    }
}
