// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Flow Studio is the backend of a visual pipeline-configuration editor.
//!
//! It keeps projects of XML configuration documents, replaces `Adapter`
//! elements inside those documents without disturbing their siblings, and
//! gives the editor sandboxed access to the files under each project root.

/// Terminal output helpers for the command-line interface.
pub mod cli;
/// Layered configuration loading.
pub mod config;
/// Error classification shared by every layer.
pub mod error;
/// JSON-RPC tool server over stdin/stdout.
pub mod mcp;
/// Projects, configurations, filter settings and recent-project history.
pub mod project;
/// Tool handler mapping protocol calls onto the core operations.
pub mod tools;
/// Sandboxed filesystem access below a project root.
pub mod workspace;
/// Hardened XML parsing, serialization and adapter editing.
pub mod xml;
