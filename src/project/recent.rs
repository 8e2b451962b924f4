// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Recently opened projects, persisted as one JSON array.
//!
//! The file is read and rewritten whole on every change. Entries are kept
//! most-recent first, unique by normalized root path, and capped at
//! [`MAX_RECENT_PROJECTS`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::workspace::{WorkspaceError, normalize_lexically};
use crate::workspace::file_io::atomic_write;

/// Maximum number of remembered projects.
pub const MAX_RECENT_PROJECTS: usize = 10;

/// One history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentProject {
    /// Display name.
    pub name: String,
    /// Absolute, normalized project root.
    pub root_path: String,
    /// When the project was last opened.
    pub last_opened: DateTime<Utc>,
}

/// Makes `root` absolute and folds `.`/`..` so equivalent spellings compare
/// equal. Falls back to the input if that is not possible.
fn normalize_root(root: &str) -> String {
    std::path::absolute(root)
        .ok()
        .and_then(|absolute| normalize_lexically(&absolute))
        .map_or_else(|| root.to_string(), |p| p.to_string_lossy().into_owned())
}

/// The recent-projects history file.
#[derive(Debug)]
pub struct RecentProjects {
    file: PathBuf,
    lock: RwLock<()>,
}

impl RecentProjects {
    /// History stored at `file`.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            lock: RwLock::new(()),
        }
    }

    /// `<data dir>/flow-studio/recent-projects.json`, if the platform has a
    /// data directory.
    #[must_use]
    pub fn default_file() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("flow-studio").join("recent-projects.json"))
    }

    /// Path of the history file.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Current entries, most recent first. A missing, unreadable or corrupt
    /// file reads as empty.
    #[must_use]
    pub fn list(&self) -> Vec<RecentProject> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        self.read_from_disk()
    }

    /// Records that a project was opened now and returns the new history.
    /// Blank names or roots are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] if the file cannot be written.
    pub fn add(&self, name: &str, root_path: &str) -> Result<Vec<RecentProject>, WorkspaceError> {
        if name.trim().is_empty() || root_path.trim().is_empty() {
            warn!("Cannot add recent project with blank name or root path");
            return Ok(self.list());
        }
        let root = normalize_root(root_path);

        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut projects = self.read_from_disk();
        projects.retain(|p| normalize_root(&p.root_path) != root);
        projects.insert(
            0,
            RecentProject {
                name: name.to_string(),
                root_path: root,
                last_opened: Utc::now(),
            },
        );
        projects.truncate(MAX_RECENT_PROJECTS);
        self.save_to_disk(&projects)?;
        Ok(projects)
    }

    /// Forgets a project root and returns the new history.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] if the file cannot be written.
    pub fn remove(&self, root_path: &str) -> Result<Vec<RecentProject>, WorkspaceError> {
        if root_path.trim().is_empty() {
            return Ok(self.list());
        }
        let root = normalize_root(root_path);

        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut projects = self.read_from_disk();
        let before = projects.len();
        projects.retain(|p| normalize_root(&p.root_path) != root);
        if projects.len() != before {
            self.save_to_disk(&projects)?;
        }
        Ok(projects)
    }

    fn read_from_disk(&self) -> Vec<RecentProject> {
        let json = match fs::read_to_string(&self.file) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Error reading recent projects {}: {e}", self.file.display());
                return Vec::new();
            }
        };
        serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!("Ignoring corrupt recent projects file {}: {e}", self.file.display());
            Vec::new()
        })
    }

    fn save_to_disk(&self, projects: &[RecentProject]) -> Result<(), WorkspaceError> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent).map_err(|e| WorkspaceError::io("create", parent, e))?;
        }
        let json = serde_json::to_string_pretty(projects).map_err(|e| WorkspaceError::Io {
            operation: "serialize",
            path: self.file.clone(),
            source: io::Error::other(e),
        })?;
        atomic_write(&self.file, json.as_bytes())
            .map_err(|e| WorkspaceError::io("write", &self.file, e))?;
        debug!(
            "Saved {} recent project(s) to {}",
            projects.len(),
            self.file.display()
        );
        Ok(())
    }
}
