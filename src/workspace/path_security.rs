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

//! Path containment for project file access.
//!
//! Resolution happens in two stages. [`PathSandbox::resolve`] is purely
//! lexical: it joins the request onto the root, folds `.` and `..`, and
//! requires the root to be a component-wise prefix of the result. The
//! `resolve_existing` and `resolve_for_write` variants additionally
//! canonicalize against the filesystem so a symlink inside the root cannot
//! lead outside it.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use super::error::WorkspaceError;

/// Folds `.` and `..` components without touching the filesystem.
///
/// Returns `None` if a `..` would climb above the start of the path (above
/// the filesystem root for absolute paths).
#[must_use]
pub fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                parts.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                _ => return None,
            },
        }
    }
    Some(parts.iter().collect())
}

/// Resolves `requested` against `root` with the lexical check only.
///
/// # Errors
///
/// Returns [`WorkspaceError::SecurityViolation`] if the result lies outside
/// `root`.
pub fn resolve_path(root: &Path, requested: &Path) -> Result<PathBuf, WorkspaceError> {
    PathSandbox::new(root)?.resolve(requested)
}

/// A project root that caller-supplied paths must stay inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSandbox {
    /// Absolute, lexically normalized root.
    root: PathBuf,
}

impl PathSandbox {
    /// Creates a sandbox rooted at `root`. Relative roots are taken relative
    /// to the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] if the current directory is needed and
    /// unavailable, or [`WorkspaceError::SecurityViolation`] if the root
    /// itself climbs above the filesystem root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let root = root.as_ref();
        let absolute =
            std::path::absolute(root).map_err(|e| WorkspaceError::io("resolve", root, e))?;
        let root = normalize_lexically(&absolute).ok_or_else(|| WorkspaceError::security(root))?;
        Ok(Self { root })
    }

    /// The sandbox root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lexically resolves `requested`. Relative paths are joined onto the
    /// root; absolute paths are used as given.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::SecurityViolation`] if the normalized path is
    /// not inside the root.
    pub fn resolve(&self, requested: impl AsRef<Path>) -> Result<PathBuf, WorkspaceError> {
        let requested = requested.as_ref();
        let joined = self.root.join(requested);
        let Some(normalized) = normalize_lexically(&joined) else {
            warn!("Rejected path climbing above filesystem root: {}", requested.display());
            return Err(WorkspaceError::security(requested));
        };

        if !normalized.starts_with(&self.root) {
            warn!(
                "Rejected path outside {}: {}",
                self.root.display(),
                requested.display()
            );
            return Err(WorkspaceError::security(requested));
        }

        Ok(normalized)
    }

    /// Resolves an existing path and follows symlinks, requiring the real
    /// location to stay inside the real root. Returns the canonical path.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::SecurityViolation`] if either the lexical or
    /// the canonical path escapes, and [`WorkspaceError::NotFound`] if the
    /// path does not exist.
    pub fn resolve_existing(&self, requested: impl AsRef<Path>) -> Result<PathBuf, WorkspaceError> {
        let requested = requested.as_ref();
        let lexical = self.resolve(requested)?;
        let canonical = lexical
            .canonicalize()
            .map_err(|e| WorkspaceError::io("resolve", &lexical, e))?;

        if !self.contains_canonical(&canonical)? {
            warn!(
                "Rejected symlink escaping {}: {}",
                self.root.display(),
                requested.display()
            );
            return Err(WorkspaceError::security(requested));
        }

        Ok(canonical)
    }

    /// Resolves a path that may not exist yet. The nearest existing ancestor
    /// must canonicalize inside the root.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::SecurityViolation`] if the path or its
    /// nearest existing ancestor lies outside the root.
    pub fn resolve_for_write(
        &self,
        requested: impl AsRef<Path>,
    ) -> Result<PathBuf, WorkspaceError> {
        let requested = requested.as_ref();
        let lexical = self.resolve(requested)?;
        let ancestor = Self::find_existing_ancestor(&lexical)
            .ok_or_else(|| WorkspaceError::NotFound { path: self.root.clone() })?;
        let canonical_ancestor = ancestor
            .canonicalize()
            .map_err(|e| WorkspaceError::io("resolve", ancestor, e))?;

        if !self.contains_canonical(&canonical_ancestor)? {
            return Err(WorkspaceError::security(requested));
        }

        let remaining = lexical
            .strip_prefix(ancestor)
            .map_err(|_| WorkspaceError::security(requested))?;
        if remaining.as_os_str().is_empty() {
            return Ok(canonical_ancestor);
        }
        Ok(canonical_ancestor.join(remaining))
    }

    /// Checks a canonical path against the canonical root.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::NotFound`] if the root no longer exists.
    pub fn contains_canonical(&self, canonical: &Path) -> Result<bool, WorkspaceError> {
        let root = self
            .root
            .canonicalize()
            .map_err(|e| WorkspaceError::io("resolve", &self.root, e))?;
        Ok(canonical.starts_with(root))
    }

    /// Walks up the directory tree to find the first existing ancestor.
    fn find_existing_ancestor(path: &Path) -> Option<&Path> {
        let mut current = Some(path);
        while let Some(candidate) = current {
            // A dangling symlink counts as existing so its target is checked.
            if candidate.symlink_metadata().is_ok() {
                debug!("Nearest existing ancestor: {}", candidate.display());
                return Some(candidate);
            }
            current = candidate.parent();
        }
        None
    }
}
