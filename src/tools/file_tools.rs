// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! File tool handlers: `file_tree`, `list_directories`, `read_file`,
//! `write_file` and `update_adapter_in_file`.
//!
//! Every path is resolved inside the root of a named project, or a directory
//! under the configured projects root, before the disk is touched.

use serde::Deserialize;
use serde_json::Value;

use super::handler::{FlowToolHandler, ToolFailure, ToolResult, json_result, parse_args};
use crate::mcp::CallToolResult;
use crate::workspace::{FileTreeBuilder, ListMode, PathSandbox, ProjectFiles};

/// Which root a path is relative to.
#[derive(Debug, Deserialize)]
struct Scope {
    /// Name of an open project.
    project: Option<String>,
    /// Directory inside the projects root, used when no project is named.
    root: Option<String>,
    /// Path below the root. Empty means the root itself.
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
struct FileTreeInput {
    #[serde(flatten)]
    scope: Scope,
    #[serde(default)]
    recursive: bool,
}

#[derive(Debug, Deserialize)]
struct ListDirectoriesInput {
    #[serde(flatten)]
    scope: Scope,
    #[serde(default)]
    include_files: bool,
}

#[derive(Debug, Deserialize)]
struct ReadFileInput {
    #[serde(flatten)]
    scope: Scope,
}

#[derive(Debug, Deserialize)]
struct WriteFileInput {
    #[serde(flatten)]
    scope: Scope,
    content: String,
}

#[derive(Debug, Deserialize)]
struct UpdateAdapterInFileInput {
    #[serde(flatten)]
    scope: Scope,
    adapter: String,
    fragment: String,
}

impl FlowToolHandler {
    fn sandbox_for(&self, scope: &Scope) -> Result<PathSandbox, ToolFailure> {
        let root = match (&scope.project, &scope.root) {
            (Some(project), _) => self
                .store
                .with_project(project, |p| p.root_path.clone())?,
            (None, Some(root)) => self.confine(root, true)?,
            (None, None) => {
                return Err(ToolFailure::invalid_input(
                    "Either project or root is required",
                ));
            }
        };
        Ok(PathSandbox::new(root)?)
    }

    fn files_for(&self, scope: &Scope) -> Result<ProjectFiles<'_>, ToolFailure> {
        Ok(ProjectFiles::new(self.sandbox_for(scope)?, &self.locks)
            .with_editor(*self.store.editor()))
    }

    /// Handles the `file_tree` tool call.
    pub(super) fn handle_file_tree(&self, arguments: Option<Value>) -> ToolResult {
        let input: FileTreeInput = parse_args(arguments)?;
        tracing::debug!("file_tree: {} (recursive={})", input.scope.path, input.recursive);

        let builder = FileTreeBuilder::new(self.sandbox_for(&input.scope)?)
            .with_max_depth(self.max_tree_depth);
        json_result(&builder.list_tree(&input.scope.path, input.recursive)?)
    }

    /// Handles the `list_directories` tool call.
    pub(super) fn handle_list_directories(&self, arguments: Option<Value>) -> ToolResult {
        let input: ListDirectoriesInput = parse_args(arguments)?;
        let mode = if input.include_files {
            ListMode::All
        } else {
            ListMode::DirectoriesOnly
        };

        let builder = FileTreeBuilder::new(self.sandbox_for(&input.scope)?);
        json_result(&builder.list_immediate_children(&input.scope.path, mode)?)
    }

    /// Handles the `read_file` tool call.
    pub(super) fn handle_read_file(&self, arguments: Option<Value>) -> ToolResult {
        let input: ReadFileInput = parse_args(arguments)?;
        let content = self.files_for(&input.scope)?.read_file(&input.scope.path)?;
        Ok(CallToolResult::text(content))
    }

    /// Handles the `write_file` tool call.
    pub(super) fn handle_write_file(&self, arguments: Option<Value>) -> ToolResult {
        let input: WriteFileInput = parse_args(arguments)?;
        self.files_for(&input.scope)?
            .write_file(&input.scope.path, &input.content)?;
        Ok(CallToolResult::text(format!(
            "Wrote {} bytes to {}",
            input.content.len(),
            input.scope.path
        )))
    }

    /// Handles the `update_adapter_in_file` tool call.
    pub(super) fn handle_update_adapter_in_file(&self, arguments: Option<Value>) -> ToolResult {
        let input: UpdateAdapterInFileInput = parse_args(arguments)?;
        let updated = self.files_for(&input.scope)?.update_adapter(
            &input.scope.path,
            &input.adapter,
            &input.fragment,
        )?;
        Ok(CallToolResult::text(updated))
    }
}
