// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Adapter lookup and replacement inside configuration documents.
mod adapter;
/// Hardened parser producing owned trees.
mod secure;
/// Owned document tree and deterministic serializer.
mod tree;
/// Cheap well-formedness gate for user-submitted XML.
mod validate;

pub use adapter::{ADAPTER_TAG, AdapterEditError, AdapterEditor, NAME_ATTRIBUTE, replace_adapter};
pub use secure::{DEFAULT_MAX_DEPTH, SecureXmlParser, XmlError};
pub use tree::{Element, Node, XmlDocument};
pub use validate::{EMPTY_CONTENT_MESSAGE, validate_xml, validate_xml_with};
