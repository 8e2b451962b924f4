// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! The project store.
//!
//! Each project sits behind its own `RwLock`, and the list of projects
//! behind another. Edits to one project are serialized by that project's
//! write lock while reads of other projects proceed in parallel. The list
//! lock is only held long enough to find or insert an entry.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use ignore::WalkBuilder;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::configuration::{Configuration, ConfigurationStore};
use super::error::ProjectError;
use super::settings::{FilterType, ProjectSettings};
use crate::workspace::{PathSandbox, WorkspaceError};
use crate::xml::{AdapterEditor, SecureXmlParser, validate_xml_with};

/// A named set of configurations rooted at a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Unique name.
    pub name: String,
    /// Absolute, normalized root directory.
    pub root_path: PathBuf,
    /// Configuration documents.
    pub configurations: ConfigurationStore,
    /// Filter flags.
    pub settings: ProjectSettings,
}

impl Project {
    /// An empty project.
    pub fn new(name: impl Into<String>, root_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root_path: root_path.into(),
            configurations: ConfigurationStore::new(),
            settings: ProjectSettings::new(),
        }
    }

    /// The shape returned to clients.
    #[must_use]
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            name: self.name.clone(),
            root_path: self.root_path.to_string_lossy().into_owned(),
            filepaths: self.configurations.filepaths(),
            filters: self.settings.filters().clone(),
        }
    }
}

/// Client view of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    /// Project name.
    pub name: String,
    /// Root directory.
    pub root_path: String,
    /// Configuration filepaths in insertion order.
    pub filepaths: Vec<String>,
    /// Every filter flag.
    pub filters: BTreeMap<FilterType, bool>,
}

struct Entry {
    name: String,
    project: Arc<RwLock<Project>>,
}

/// All open projects.
#[derive(Default)]
pub struct ProjectStore {
    entries: RwLock<Vec<Entry>>,
    editor: AdapterEditor,
}

impl std::fmt::Debug for ProjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .entries
            .read()
            .map(|entries| entries.iter().map(|e| e.name.clone()).collect())
            .unwrap_or_default();
        f.debug_struct("ProjectStore")
            .field("projects", &names)
            .field("editor", &self.editor)
            .finish()
    }
}

/// Joins the components of a project-relative path with `/`.
fn relative_filepath(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

fn is_xml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

/// Subdirectory names of `projects_root`, sorted.
fn subdirectories(projects_root: &Path) -> Result<Vec<(String, PathBuf)>, WorkspaceError> {
    let metadata =
        fs::metadata(projects_root).map_err(|e| WorkspaceError::io("inspect", projects_root, e))?;
    if !metadata.is_dir() {
        return Err(WorkspaceError::NotADirectory {
            path: projects_root.to_path_buf(),
        });
    }

    let reader =
        fs::read_dir(projects_root).map_err(|e| WorkspaceError::io("list", projects_root, e))?;
    let mut folders: Vec<(String, PathBuf)> = reader
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
        .collect();
    folders.sort();
    Ok(folders)
}

impl ProjectStore {
    /// An empty store parsing with `parser`.
    #[must_use]
    pub const fn new(parser: SecureXmlParser) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            editor: AdapterEditor::new(parser),
        }
    }

    /// Builds a store from a projects directory: each immediate
    /// subdirectory becomes a project and every `*.xml` file below it a
    /// configuration. Hidden files and directories are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Workspace`] if `projects_root` is missing or
    /// not a directory. Unreadable configuration files are logged and
    /// skipped.
    pub fn scan(projects_root: &Path, parser: SecureXmlParser) -> Result<Self, ProjectError> {
        let store = Self::new(parser);
        for (name, path) in subdirectories(projects_root)? {
            if name.starts_with('.') {
                continue;
            }
            store.insert(load_project(&name, &path)?)?;
        }
        info!(
            "Loaded {} project(s) from {}",
            store.len()?,
            projects_root.display()
        );
        Ok(store)
    }

    /// Sorted names of the folders under `projects_root`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Workspace`] if `projects_root` is missing or
    /// not a directory.
    pub fn project_folders(projects_root: &Path) -> Result<Vec<String>, ProjectError> {
        Ok(subdirectories(projects_root)?
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| !name.starts_with('.'))
            .collect())
    }

    /// The editor used for adapter updates.
    #[must_use]
    pub const fn editor(&self) -> &AdapterEditor {
        &self.editor
    }

    /// Number of projects.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::LockPoisoned`] if the store lock is poisoned.
    pub fn len(&self) -> Result<usize, ProjectError> {
        Ok(self
            .entries
            .read()
            .map_err(|_| ProjectError::LockPoisoned)?
            .len())
    }

    /// Whether the store holds no projects.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::LockPoisoned`] if the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, ProjectError> {
        Ok(self.len()? == 0)
    }

    /// Creates an empty project.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::InvalidName`] for a blank name and
    /// [`ProjectError::ProjectAlreadyExists`] if the name is taken.
    pub fn create_project(
        &self,
        name: &str,
        root_path: &Path,
    ) -> Result<ProjectSummary, ProjectError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProjectError::InvalidName(name.to_string()));
        }
        let root = PathSandbox::new(root_path)?.root().to_path_buf();
        let project = Project::new(name, root);
        let summary = project.summary();
        self.insert(project)?;
        info!("Created project {name}");
        Ok(summary)
    }

    /// Opens an existing directory as a project named after the directory,
    /// loading its `*.xml` files.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Workspace`] if the directory cannot be read and
    /// [`ProjectError::ProjectAlreadyExists`] if the name is taken.
    pub fn open_project(&self, root_path: &Path) -> Result<ProjectSummary, ProjectError> {
        let root = PathSandbox::new(root_path)?.root().to_path_buf();
        let metadata = fs::metadata(&root).map_err(|e| WorkspaceError::io("open", &root, e))?;
        if !metadata.is_dir() {
            return Err(WorkspaceError::NotADirectory { path: root }.into());
        }
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ProjectError::InvalidName(root.display().to_string()))?;

        let project = load_project(&name, &root)?;
        let summary = project.summary();
        self.insert(project)?;
        Ok(summary)
    }

    fn insert(&self, project: Project) -> Result<(), ProjectError> {
        let mut entries = self.entries.write().map_err(|_| ProjectError::LockPoisoned)?;
        if entries.iter().any(|e| e.name == project.name) {
            return Err(ProjectError::ProjectAlreadyExists(project.name));
        }
        entries.push(Entry {
            name: project.name.clone(),
            project: Arc::new(RwLock::new(project)),
        });
        Ok(())
    }

    fn find(&self, name: &str) -> Result<Arc<RwLock<Project>>, ProjectError> {
        let entries = self.entries.read().map_err(|_| ProjectError::LockPoisoned)?;
        entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| Arc::clone(&e.project))
            .ok_or_else(|| ProjectError::ProjectNotFound(name.to_string()))
    }

    /// Runs `f` with shared access to one project.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::ProjectNotFound`] if no project has that name.
    pub fn with_project<T>(
        &self,
        name: &str,
        f: impl FnOnce(&Project) -> T,
    ) -> Result<T, ProjectError> {
        let project = self.find(name)?;
        let guard = project.read().map_err(|_| ProjectError::LockPoisoned)?;
        Ok(f(&guard))
    }

    /// Runs `f` with exclusive access to one project.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::ProjectNotFound`] if no project has that name,
    /// or whatever `f` returns.
    pub fn with_project_mut<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Project) -> Result<T, ProjectError>,
    ) -> Result<T, ProjectError> {
        let project = self.find(name)?;
        let mut guard = project.write().map_err(|_| ProjectError::LockPoisoned)?;
        f(&mut guard)
    }

    /// Summary of one project.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::ProjectNotFound`] if no project has that name.
    pub fn project(&self, name: &str) -> Result<ProjectSummary, ProjectError> {
        self.with_project(name, Project::summary)
    }

    /// Summaries of every project in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::LockPoisoned`] if a lock is poisoned.
    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>, ProjectError> {
        let projects: Vec<Arc<RwLock<Project>>> = self
            .entries
            .read()
            .map_err(|_| ProjectError::LockPoisoned)?
            .iter()
            .map(|e| Arc::clone(&e.project))
            .collect();

        projects
            .iter()
            .map(|p| {
                p.read()
                    .map(|guard| guard.summary())
                    .map_err(|_| ProjectError::LockPoisoned)
            })
            .collect()
    }

    /// Forgets a project. Files on disk are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::ProjectNotFound`] if no project has that name.
    pub fn remove_project(&self, name: &str) -> Result<ProjectSummary, ProjectError> {
        let entry = {
            let mut entries = self.entries.write().map_err(|_| ProjectError::LockPoisoned)?;
            let index = entries
                .iter()
                .position(|e| e.name == name)
                .ok_or_else(|| ProjectError::ProjectNotFound(name.to_string()))?;
            entries.remove(index)
        };
        let summary = entry
            .project
            .read()
            .map_err(|_| ProjectError::LockPoisoned)?
            .summary();
        info!("Removed project {name}");
        Ok(summary)
    }

    /// Adds a template configuration at `filepath`. An existing
    /// configuration with that filepath keeps its content.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::ProjectNotFound`] if no project has that name.
    pub fn add_configuration(
        &self,
        project: &str,
        filepath: &str,
    ) -> Result<ProjectSummary, ProjectError> {
        self.add_configurations(project, &[filepath.to_string()])
    }

    /// Adds a template configuration for each filepath not already present.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::ProjectNotFound`] if no project has that name.
    pub fn add_configurations(
        &self,
        project: &str,
        filepaths: &[String],
    ) -> Result<ProjectSummary, ProjectError> {
        self.with_project_mut(project, |p| {
            for filepath in filepaths {
                p.configurations.add(Configuration::new(filepath.as_str()));
            }
            Ok(p.summary())
        })
    }

    /// Text of one configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::ProjectNotFound`] or
    /// [`ProjectError::ConfigurationNotFound`].
    pub fn configuration_xml(&self, project: &str, filepath: &str) -> Result<String, ProjectError> {
        self.with_project(project, |p| {
            p.configurations
                .find(filepath)
                .map(|c| c.xml_content.clone())
        })?
        .ok_or_else(|| ProjectError::ConfigurationNotFound {
            project: project.to_string(),
            filepath: filepath.to_string(),
        })
    }

    /// Replaces the text of one configuration after checking that it is
    /// well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::InvalidXml`] without storing anything if the
    /// text is rejected, or a not-found error.
    pub fn update_configuration_xml(
        &self,
        project: &str,
        filepath: &str,
        xml: &str,
    ) -> Result<(), ProjectError> {
        if let Some(message) = validate_xml_with(self.editor.parser(), xml) {
            return Err(ProjectError::InvalidXml(message));
        }
        self.with_project_mut(project, |p| {
            p.configurations
                .set_content(filepath, xml)
                .map_err(|_| ProjectError::ConfigurationNotFound {
                    project: project.to_string(),
                    filepath: filepath.to_string(),
                })
        })?;
        debug!("Updated configuration {filepath} in {project}");
        Ok(())
    }

    /// Replaces an adapter inside a stored configuration and returns the new
    /// text. On any error the stored text is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Adapter`] for parse failures or a missing
    /// adapter, or a not-found error.
    pub fn update_adapter(
        &self,
        project: &str,
        filepath: &str,
        adapter_name: &str,
        fragment: &str,
    ) -> Result<String, ProjectError> {
        self.with_project_mut(project, |p| {
            let current = p
                .configurations
                .find(filepath)
                .ok_or_else(|| ProjectError::ConfigurationNotFound {
                    project: project.to_string(),
                    filepath: filepath.to_string(),
                })?;
            let updated = self
                .editor
                .replace(&current.xml_content, adapter_name, fragment)?;
            p.configurations
                .set_content(filepath, updated.clone())
                .map_err(|_| ProjectError::ConfigurationNotFound {
                    project: project.to_string(),
                    filepath: filepath.to_string(),
                })?;
            info!("Replaced adapter '{adapter_name}' in {project}/{filepath}");
            Ok(updated)
        })
    }

    /// Sets one filter flag by name.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::InvalidFilterType`] for an unknown name or
    /// [`ProjectError::ProjectNotFound`].
    pub fn set_filter(
        &self,
        project: &str,
        filter: &str,
        enabled: bool,
    ) -> Result<ProjectSummary, ProjectError> {
        let filter: FilterType = filter.parse()?;
        self.with_project_mut(project, |p| {
            p.settings.set_enabled(filter, enabled);
            Ok(p.summary())
        })
    }

    /// Flips one filter flag and returns its new value.
    ///
    /// # Errors
    ///
    /// Same as [`Self::set_filter`].
    pub fn toggle_filter(&self, project: &str, filter: &str) -> Result<bool, ProjectError> {
        let filter: FilterType = filter.parse()?;
        self.with_project_mut(project, |p| Ok(p.settings.toggle(filter)))
    }
}

fn load_project(name: &str, root: &Path) -> Result<Project, ProjectError> {
    let mut project = Project::new(name, root);

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {e}", root.display());
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) || !is_xml(path) {
            continue;
        }
        let Some(filepath) = relative_filepath(root, path) else {
            continue;
        };
        match fs::read_to_string(path) {
            Ok(content) => {
                project
                    .configurations
                    .add(Configuration::with_content(filepath, content));
            }
            Err(e) => warn!("Skipping configuration {}: {e}", path.display()),
        }
    }

    debug!(
        "Project {name}: {} configuration(s)",
        project.configurations.len()
    );
    Ok(project)
}
