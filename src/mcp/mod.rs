// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Line-delimited JSON-RPC server over stdin/stdout.
mod server;
/// JSON-RPC messages and tool payloads.
mod types;

pub use server::{McpServer, ToolHandler};
pub use types::*;
