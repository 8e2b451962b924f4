// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Reading and writing project files through a [`PathSandbox`].
//!
//! Writes to the same file are serialized in-process by [`WriteLocks`] and
//! land via temp file + rename, so a concurrent reader sees either the old
//! or the new content and concurrent writers resolve as last-writer-wins.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

use super::error::WorkspaceError;
use super::path_security::PathSandbox;
use crate::error::{Classify, ErrorKind};
use crate::xml::{AdapterEditError, AdapterEditor};

/// Failures of file-backed operations.
#[derive(Debug, Error)]
pub enum FileError {
    /// Sandbox or filesystem failure.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    /// The adapter edit itself failed; the file was not written.
    #[error(transparent)]
    Adapter(#[from] AdapterEditError),
}

impl Classify for FileError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Workspace(e) => e.kind(),
            Self::Adapter(e) => e.kind(),
        }
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Atomically replaces `path` with `data` via a sibling temp file + rename.
/// An existing file's permissions carry over.
///
/// # Errors
///
/// Returns the underlying I/O error; the temp file is removed on failure.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let pid = std::process::id();
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path = path.with_file_name(format!(
        ".{}.tmp.{pid}.{seq}",
        file_name.to_string_lossy()
    ));

    let result = fs::write(&temp_path, data)
        .and_then(|()| match fs::metadata(path) {
            Ok(existing) => fs::set_permissions(&temp_path, existing.permissions()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        })
        .and_then(|()| fs::rename(&temp_path, path));

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// In-process mutual exclusion per file path.
#[derive(Debug, Default)]
pub struct WriteLocks {
    table: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl WriteLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock for `path`. Callers should pass a
    /// canonical path so aliases of one file share a lock.
    pub fn with_lock<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let entry = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(path.to_path_buf()).or_default())
        };

        let result = {
            // A panic in another writer leaves nothing half-done in `()`.
            let _guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the table and this call hold it: nobody else is waiting.
        if Arc::strong_count(&entry) == 2 {
            table.remove(path);
        }
        result
    }

    /// Number of paths with a live lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no path currently holds a lock entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// File access below one project root.
#[derive(Debug)]
pub struct ProjectFiles<'a> {
    sandbox: PathSandbox,
    locks: &'a WriteLocks,
    editor: AdapterEditor,
}

impl<'a> ProjectFiles<'a> {
    /// Creates a handle sharing `locks` with other handles.
    #[must_use]
    pub fn new(sandbox: PathSandbox, locks: &'a WriteLocks) -> Self {
        Self {
            sandbox,
            locks,
            editor: AdapterEditor::default(),
        }
    }

    /// Uses `editor` for adapter updates.
    #[must_use]
    pub const fn with_editor(mut self, editor: AdapterEditor) -> Self {
        self.editor = editor;
        self
    }

    /// The sandbox paths are resolved through.
    #[must_use]
    pub const fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// Reads a UTF-8 file.
    ///
    /// # Errors
    ///
    /// Returns a [`WorkspaceError`] if the path escapes, does not exist, is a
    /// directory, or cannot be read.
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<String, FileError> {
        let canonical = self.existing_file(path.as_ref())?;
        let content = fs::read_to_string(&canonical)
            .map_err(|e| WorkspaceError::io("read", &canonical, e))?;
        Ok(content)
    }

    /// Replaces the content of an existing file.
    ///
    /// # Errors
    ///
    /// Returns a [`WorkspaceError`] if the path escapes, does not exist, is a
    /// directory, or cannot be written.
    pub fn write_file(&self, path: impl AsRef<Path>, content: &str) -> Result<(), FileError> {
        let canonical = self.existing_file(path.as_ref())?;
        self.locks
            .with_lock(&canonical, || atomic_write(&canonical, content.as_bytes()))
            .map_err(|e| WorkspaceError::io("write", &canonical, e))?;
        info!("Wrote {} bytes to {}", content.len(), canonical.display());
        Ok(())
    }

    /// Replaces an adapter inside a configuration file and writes the result
    /// back. Returns the new file content.
    ///
    /// The read, edit and write happen under the file's write lock. If the
    /// edit fails the file is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::Adapter`] if either document fails to parse or
    /// the adapter is missing, otherwise a [`WorkspaceError`].
    pub fn update_adapter(
        &self,
        path: impl AsRef<Path>,
        adapter_name: &str,
        fragment: &str,
    ) -> Result<String, FileError> {
        let canonical = self.existing_file(path.as_ref())?;
        let updated = self.locks.with_lock(&canonical, || {
            let current = fs::read_to_string(&canonical)
                .map_err(|e| WorkspaceError::io("read", &canonical, e))?;
            let updated = self.editor.replace(&current, adapter_name, fragment)?;
            atomic_write(&canonical, updated.as_bytes())
                .map_err(|e| WorkspaceError::io("write", &canonical, e))?;
            Ok::<_, FileError>(updated)
        })?;
        info!(
            "Replaced adapter '{adapter_name}' in {}",
            canonical.display()
        );
        Ok(updated)
    }

    fn existing_file(&self, path: &Path) -> Result<PathBuf, WorkspaceError> {
        let canonical = self.sandbox.resolve_existing(path)?;
        let metadata =
            fs::metadata(&canonical).map_err(|e| WorkspaceError::io("inspect", &canonical, e))?;
        if metadata.is_dir() {
            return Err(WorkspaceError::IsADirectory { path: canonical });
        }
        debug!("Resolved {} to {}", path.display(), canonical.display());
        Ok(canonical)
    }
}
