/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Handler that maps tool calls onto the project store, the XML editor and
//! the sandboxed workspace.

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Classify, ErrorKind};
use crate::mcp::{CallToolResult, Tool, ToolHandler};
use crate::project::{ProjectStore, ProjectSummary, RecentProjects};
use crate::workspace::{DEFAULT_MAX_DEPTH, PathSandbox, WriteLocks};
use crate::xml::validate_xml_with;

/// A tool call that failed in a way the client should see classified.
#[derive(Debug)]
pub(super) struct ToolFailure {
    kind: ErrorKind,
    message: String,
}

impl ToolFailure {
    pub(super) fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            message: message.into(),
        }
    }

    pub(super) fn security(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::SecurityViolation,
            message: message.into(),
        }
    }

    fn internal(error: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Io,
            message: error.to_string(),
        }
    }

    fn into_result(self) -> CallToolResult {
        CallToolResult::failure(self.kind, self.message)
    }
}

impl<E: Classify + fmt::Display> From<E> for ToolFailure {
    fn from(error: E) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

pub(super) type ToolResult = std::result::Result<CallToolResult, ToolFailure>;

/// Decodes tool arguments. Absent arguments decode as an empty object.
pub(super) fn parse_args<T: DeserializeOwned>(
    arguments: Option<Value>,
) -> std::result::Result<T, ToolFailure> {
    let value = arguments.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    serde_json::from_value(value)
        .map_err(|e| ToolFailure::invalid_input(format!("Invalid arguments: {e}")))
}

pub(super) fn json_result(value: &impl Serialize) -> ToolResult {
    CallToolResult::json(value).map_err(ToolFailure::internal)
}

#[derive(Debug, Deserialize)]
struct NameInput {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OpenProjectInput {
    path: String,
}

#[derive(Debug, Deserialize)]
struct CreateProjectInput {
    name: String,
    root_path: String,
    #[serde(default)]
    configurations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigurationInput {
    project: String,
    filepath: String,
}

#[derive(Debug, Deserialize)]
struct UpdateConfigurationInput {
    project: String,
    filepath: String,
    xml: String,
}

#[derive(Debug, Deserialize)]
struct UpdateAdapterInput {
    project: String,
    filepath: String,
    adapter: String,
    fragment: String,
}

#[derive(Debug, Deserialize)]
struct SetFilterInput {
    project: String,
    filter: String,
    /// Absent means toggle.
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct XmlInput {
    xml: String,
}

#[derive(Debug, Deserialize)]
struct RootPathInput {
    root_path: String,
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct FilterState {
    filter: String,
    enabled: bool,
}

/// Tool handler backed by one [`ProjectStore`].
#[derive(Debug)]
pub struct FlowToolHandler {
    pub(super) store: ProjectStore,
    pub(super) locks: WriteLocks,
    recent: RecentProjects,
    projects_root: Option<PathBuf>,
    pub(super) max_tree_depth: usize,
}

impl FlowToolHandler {
    /// Creates a handler over `store`, recording opened projects in `recent`.
    #[must_use]
    pub fn new(store: ProjectStore, recent: RecentProjects) -> Self {
        Self {
            store,
            locks: WriteLocks::new(),
            recent,
            projects_root: None,
            max_tree_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Directory listed by `list_project_folders`.
    #[must_use]
    pub fn with_projects_root(mut self, projects_root: impl Into<PathBuf>) -> Self {
        self.projects_root = Some(projects_root.into());
        self
    }

    /// Depth bound for recursive `file_tree` calls.
    #[must_use]
    pub const fn with_max_tree_depth(mut self, max_tree_depth: usize) -> Self {
        self.max_tree_depth = max_tree_depth;
        self
    }

    /// Builds a handler from runtime settings, loading every project under
    /// the configured projects root.
    ///
    /// # Errors
    ///
    /// Returns an error if the projects root cannot be scanned or the
    /// recent-projects file has no location.
    pub fn from_config(config: &Config) -> Result<Self> {
        let parser = config.parser();
        let store = match config.projects_root() {
            Some(root) => ProjectStore::scan(root, parser)
                .with_context(|| format!("Failed to load projects from {}", root.display()))?,
            None => ProjectStore::new(parser),
        };
        let mut handler = Self::new(store, config.recent_projects()?)
            .with_max_tree_depth(config.max_tree_depth);
        handler.projects_root = config.projects_root.clone();
        Ok(handler)
    }

    /// The project store.
    #[must_use]
    pub const fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// The recent-projects history.
    #[must_use]
    pub const fn recent(&self) -> &RecentProjects {
        &self.recent
    }

    /// The configured projects root.
    #[must_use]
    pub fn projects_root(&self) -> Option<&Path> {
        self.projects_root.as_deref()
    }

    /// Resolves a client-supplied project location inside the projects root,
    /// following symlinks for the check but returning the lexical path.
    /// Without a configured projects root no location is accepted.
    pub(super) fn confine(
        &self,
        requested: &str,
        must_exist: bool,
    ) -> std::result::Result<PathBuf, ToolFailure> {
        let root = self.projects_root.as_deref().ok_or_else(|| {
            ToolFailure::security(format!(
                "No projects root is configured; refusing {requested}"
            ))
        })?;
        let sandbox = PathSandbox::new(root)?;
        if must_exist {
            sandbox.resolve_existing(requested)?;
        } else {
            sandbox.resolve_for_write(requested)?;
        }
        Ok(sandbox.resolve(requested)?)
    }

    /// History is best effort; a failed write does not fail the open.
    fn remember(&self, summary: &ProjectSummary) {
        if let Err(e) = self.recent.add(&summary.name, &summary.root_path) {
            warn!("Could not record {} in recent projects: {e}", summary.name);
        }
    }

    fn handle_list_projects(&self) -> ToolResult {
        json_result(&self.store.list_projects()?)
    }

    fn handle_list_project_folders(&self) -> ToolResult {
        let root = self
            .projects_root
            .as_deref()
            .ok_or_else(|| ToolFailure::invalid_input("No projects root is configured"))?;
        json_result(&ProjectStore::project_folders(root)?)
    }

    fn handle_open_project(&self, arguments: Option<Value>) -> ToolResult {
        let input: OpenProjectInput = parse_args(arguments)?;
        let path = self.confine(&input.path, true)?;
        let summary = self.store.open_project(&path)?;
        self.remember(&summary);
        json_result(&summary)
    }

    fn handle_create_project(&self, arguments: Option<Value>) -> ToolResult {
        let input: CreateProjectInput = parse_args(arguments)?;
        let root = self.confine(&input.root_path, false)?;
        let mut summary = self.store.create_project(&input.name, &root)?;
        if !input.configurations.is_empty() {
            summary = self
                .store
                .add_configurations(&summary.name, &input.configurations)?;
        }
        self.remember(&summary);
        json_result(&summary)
    }

    fn handle_get_project(&self, arguments: Option<Value>) -> ToolResult {
        let input: NameInput = parse_args(arguments)?;
        json_result(&self.store.project(&input.name)?)
    }

    fn handle_close_project(&self, arguments: Option<Value>) -> ToolResult {
        let input: NameInput = parse_args(arguments)?;
        json_result(&self.store.remove_project(&input.name)?)
    }

    fn handle_add_configuration(&self, arguments: Option<Value>) -> ToolResult {
        let input: ConfigurationInput = parse_args(arguments)?;
        json_result(
            &self
                .store
                .add_configuration(&input.project, &input.filepath)?,
        )
    }

    fn handle_get_configuration(&self, arguments: Option<Value>) -> ToolResult {
        let input: ConfigurationInput = parse_args(arguments)?;
        Ok(CallToolResult::text(
            self.store
                .configuration_xml(&input.project, &input.filepath)?,
        ))
    }

    fn handle_update_configuration(&self, arguments: Option<Value>) -> ToolResult {
        let input: UpdateConfigurationInput = parse_args(arguments)?;
        self.store
            .update_configuration_xml(&input.project, &input.filepath, &input.xml)?;
        Ok(CallToolResult::text(format!(
            "Updated {} in {}",
            input.filepath, input.project
        )))
    }

    fn handle_update_adapter(&self, arguments: Option<Value>) -> ToolResult {
        let input: UpdateAdapterInput = parse_args(arguments)?;
        let updated = self.store.update_adapter(
            &input.project,
            &input.filepath,
            &input.adapter,
            &input.fragment,
        )?;
        Ok(CallToolResult::text(updated))
    }

    fn handle_list_adapters(&self, arguments: Option<Value>) -> ToolResult {
        let input: ConfigurationInput = parse_args(arguments)?;
        let xml = self
            .store
            .configuration_xml(&input.project, &input.filepath)?;
        json_result(&self.store.editor().adapter_names(&xml)?)
    }

    fn handle_set_filter(&self, arguments: Option<Value>) -> ToolResult {
        let input: SetFilterInput = parse_args(arguments)?;
        let enabled = match input.enabled {
            Some(enabled) => {
                self.store
                    .set_filter(&input.project, &input.filter, enabled)?;
                enabled
            }
            None => self.store.toggle_filter(&input.project, &input.filter)?,
        };
        json_result(&FilterState {
            filter: input.filter.trim().to_ascii_uppercase(),
            enabled,
        })
    }

    fn handle_validate_xml(&self, arguments: Option<Value>) -> ToolResult {
        let input: XmlInput = parse_args(arguments)?;
        let error = validate_xml_with(self.store.editor().parser(), &input.xml);
        json_result(&ValidationReport {
            valid: error.is_none(),
            error,
        })
    }

    fn handle_recent_projects(&self) -> ToolResult {
        json_result(&self.recent.list())
    }

    fn handle_forget_recent_project(&self, arguments: Option<Value>) -> ToolResult {
        let input: RootPathInput = parse_args(arguments)?;
        json_result(&self.recent.remove(&input.root_path)?)
    }
}

impl ToolHandler for FlowToolHandler {
    #[allow(clippy::too_many_lines, reason = "Naturally long list of tools")]
    fn list_tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "list_projects".to_string(),
                description: Some("List open projects with their configuration filepaths and filter flags.".to_string()),
                input_schema: empty_schema(),
            },
            Tool {
                name: "list_project_folders".to_string(),
                description: Some("List the folders under the configured projects root.".to_string()),
                input_schema: empty_schema(),
            },
            Tool {
                name: "open_project".to_string(),
                description: Some("Open a directory as a project, loading every XML file below it. Relative paths are taken from the projects root.".to_string()),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Project directory inside the projects root" }
                    },
                    "required": ["path"]
                }),
            },
            Tool {
                name: "create_project".to_string(),
                description: Some("Create an empty project rooted at a directory, optionally with template configurations.".to_string()),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Unique project name" },
                        "root_path": { "type": "string", "description": "Project root directory inside the projects root" },
                        "configurations": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Configuration filepaths to create from the template"
                        }
                    },
                    "required": ["name", "root_path"]
                }),
            },
            Tool {
                name: "get_project".to_string(),
                description: Some("Get one project by name.".to_string()),
                input_schema: name_schema(),
            },
            Tool {
                name: "close_project".to_string(),
                description: Some("Close a project. Files on disk are not touched.".to_string()),
                input_schema: name_schema(),
            },
            Tool {
                name: "add_configuration".to_string(),
                description: Some("Add a configuration holding the default template. An existing configuration with the same filepath is replaced.".to_string()),
                input_schema: configuration_schema(&[]),
            },
            Tool {
                name: "get_configuration".to_string(),
                description: Some("Get the XML text of a configuration.".to_string()),
                input_schema: configuration_schema(&[]),
            },
            Tool {
                name: "update_configuration".to_string(),
                description: Some("Replace the XML text of a configuration. Text that is not well-formed is rejected and nothing is stored.".to_string()),
                input_schema: configuration_schema(&[(
                    "xml",
                    "New document text",
                )]),
            },
            Tool {
                name: "update_adapter".to_string(),
                description: Some("Replace the first Adapter element with the given name attribute by an XML fragment. Returns the new document; siblings are left as they were.".to_string()),
                input_schema: configuration_schema(&[
                    ("adapter", "Value of the adapter's name attribute"),
                    ("fragment", "Replacement element, a single root"),
                ]),
            },
            Tool {
                name: "list_adapters".to_string(),
                description: Some("List adapter names in a configuration, in document order.".to_string()),
                input_schema: configuration_schema(&[]),
            },
            Tool {
                name: "set_filter".to_string(),
                description: Some("Set or toggle a project filter flag (e.g. HTTP, JDBC, KAFKA).".to_string()),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "project": { "type": "string", "description": "Project name" },
                        "filter": { "type": "string", "description": "Filter name, case-insensitive" },
                        "enabled": { "type": "boolean", "description": "New value; omit to toggle" }
                    },
                    "required": ["project", "filter"]
                }),
            },
            Tool {
                name: "validate_xml".to_string(),
                description: Some("Check that text is a single well-formed XML document. DOCTYPE declarations are refused.".to_string()),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "xml": { "type": "string", "description": "Text to check" }
                    },
                    "required": ["xml"]
                }),
            },
            Tool {
                name: "file_tree".to_string(),
                description: Some("List a directory inside a project root, one level or fully expanded.".to_string()),
                input_schema: location_schema(&[
                    ("recursive", "boolean", "Expand every subdirectory (default: false)"),
                ]),
            },
            Tool {
                name: "list_directories".to_string(),
                description: Some("List the subdirectories of a directory inside a project root.".to_string()),
                input_schema: location_schema(&[
                    ("include_files", "boolean", "Also list files (default: false)"),
                ]),
            },
            Tool {
                name: "read_file".to_string(),
                description: Some("Read a text file inside a project root.".to_string()),
                input_schema: location_schema(&[]),
            },
            Tool {
                name: "write_file".to_string(),
                description: Some("Replace the content of an existing file inside a project root.".to_string()),
                input_schema: location_schema(&[
                    ("content", "string", "New file content"),
                ]),
            },
            Tool {
                name: "update_adapter_in_file".to_string(),
                description: Some("Replace an adapter inside an XML file on disk. The file is left untouched if the edit fails.".to_string()),
                input_schema: location_schema(&[
                    ("adapter", "string", "Value of the adapter's name attribute"),
                    ("fragment", "string", "Replacement element, a single root"),
                ]),
            },
            Tool {
                name: "recent_projects".to_string(),
                description: Some("List recently opened projects, most recent first.".to_string()),
                input_schema: empty_schema(),
            },
            Tool {
                name: "forget_recent_project".to_string(),
                description: Some("Remove a project root from the recent projects history.".to_string()),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "root_path": { "type": "string", "description": "Project root to forget" }
                    },
                    "required": ["root_path"]
                }),
            },
        ]
    }

    fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        debug!("Tool call: {name}");

        let result = match name {
            "list_projects" => self.handle_list_projects(),
            "list_project_folders" => self.handle_list_project_folders(),
            "open_project" => self.handle_open_project(arguments),
            "create_project" => self.handle_create_project(arguments),
            "get_project" => self.handle_get_project(arguments),
            "close_project" => self.handle_close_project(arguments),
            "add_configuration" => self.handle_add_configuration(arguments),
            "get_configuration" => self.handle_get_configuration(arguments),
            "update_configuration" => self.handle_update_configuration(arguments),
            "update_adapter" => self.handle_update_adapter(arguments),
            "list_adapters" => self.handle_list_adapters(arguments),
            "set_filter" => self.handle_set_filter(arguments),
            "validate_xml" => self.handle_validate_xml(arguments),
            "file_tree" => self.handle_file_tree(arguments),
            "list_directories" => self.handle_list_directories(arguments),
            "read_file" => self.handle_read_file(arguments),
            "write_file" => self.handle_write_file(arguments),
            "update_adapter_in_file" => self.handle_update_adapter_in_file(arguments),
            "recent_projects" => self.handle_recent_projects(),
            "forget_recent_project" => self.handle_forget_recent_project(arguments),
            _ => return Err(anyhow!("Unknown tool: {name}")),
        };

        Ok(result.unwrap_or_else(|failure| {
            warn!("{name} failed: {}: {}", failure.kind, failure.message);
            failure.into_result()
        }))
    }
}

// Schema helpers
fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

fn name_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "description": "Project name" }
        },
        "required": ["name"]
    })
}

/// `project` + `filepath` plus extra required string fields.
fn configuration_schema(extra: &[(&str, &str)]) -> Value {
    let mut properties = serde_json::json!({
        "project": { "type": "string", "description": "Project name" },
        "filepath": { "type": "string", "description": "Configuration path relative to the project root" }
    });
    let mut required = vec!["project", "filepath"];
    for (name, description) in extra {
        properties[*name] = serde_json::json!({ "type": "string", "description": description });
        required.push(*name);
    }
    serde_json::json!({ "type": "object", "properties": properties, "required": required })
}

/// A location inside a project root plus extra fields. Only the extra string
/// fields are required.
fn location_schema(extra: &[(&str, &str, &str)]) -> Value {
    let mut properties = serde_json::json!({
        "project": { "type": "string", "description": "Name of an open project whose root is the sandbox" },
        "root": { "type": "string", "description": "Directory inside the projects root, when no project is given" },
        "path": { "type": "string", "description": "Path relative to the root (default: the root itself)" }
    });
    let mut required = Vec::new();
    for (name, kind, description) in extra {
        properties[*name] = serde_json::json!({ "type": kind, "description": description });
        if *kind == "string" {
            required.push(*name);
        }
    }
    serde_json::json!({ "type": "object", "properties": properties, "required": required })
}
