// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Filesystem access confined to a project root.
//!
//! Every caller-supplied path is resolved through [`PathSandbox`] before any
//! listing, read or write touches the disk.

mod error;
/// Reading and writing files below a sandbox root.
pub mod file_io;
/// Directory snapshots rendered as [`FileTreeNode`] trees.
pub mod file_tree;
/// Path containment checks.
pub mod path_security;

pub use error::WorkspaceError;
pub use file_io::{FileError, ProjectFiles, WriteLocks};
pub use file_tree::{DEFAULT_MAX_DEPTH, FileTreeBuilder, FileTreeNode, ListMode, NodeType, list_tree};
pub use path_security::{PathSandbox, normalize_lexically, resolve_path};
