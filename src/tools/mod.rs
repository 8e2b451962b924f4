// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Tool handlers exposed through the JSON-RPC server.

/// File tree and file content tools.
mod file_tools;
/// Project, configuration and history tools.
pub mod handler;

pub use handler::FlowToolHandler;
