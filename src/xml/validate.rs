// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Well-formedness check for configuration text.

use super::secure::{SecureXmlParser, XmlError};

/// Message returned for blank input.
pub const EMPTY_CONTENT_MESSAGE: &str = "XML content is empty";

/// Checks that `text` is well-formed XML using the default parser.
///
/// Returns `None` when the text is acceptable, otherwise a human-readable
/// reason.
#[must_use]
pub fn validate_xml(text: &str) -> Option<String> {
    validate_xml_with(&SecureXmlParser::default(), text)
}

/// Checks that `text` is well-formed XML using `parser`.
#[must_use]
pub fn validate_xml_with(parser: &SecureXmlParser, text: &str) -> Option<String> {
    match parser.parse(text) {
        Ok(_) => None,
        Err(XmlError::Empty) => Some(EMPTY_CONTENT_MESSAGE.to_string()),
        Err(e) => Some(e.to_string()),
    }
}
