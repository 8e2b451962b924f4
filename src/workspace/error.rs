// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Error type shared by the sandbox, tree and file I/O.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::{Classify, ErrorKind};

/// Failures of sandboxed filesystem operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The path resolves outside the sandbox root.
    #[error("Path is outside the project root: {}", .path.display())]
    SecurityViolation {
        /// The path as requested.
        path: PathBuf,
    },
    /// The path does not exist.
    #[error("Path does not exist: {}", .path.display())]
    NotFound {
        /// The resolved path.
        path: PathBuf,
    },
    /// A directory was required.
    #[error("Not a directory: {}", .path.display())]
    NotADirectory {
        /// The resolved path.
        path: PathBuf,
    },
    /// A regular file was required.
    #[error("Is a directory: {}", .path.display())]
    IsADirectory {
        /// The resolved path.
        path: PathBuf,
    },
    /// Any other I/O failure.
    #[error("Failed to {operation} {}: {source}", .path.display())]
    Io {
        /// What was being attempted ("read", "write", "list", ...).
        operation: &'static str,
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl WorkspaceError {
    /// Wraps an I/O error, turning "not found" into [`Self::NotFound`].
    pub(crate) fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io {
                operation,
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub(crate) fn security(path: &Path) -> Self {
        Self::SecurityViolation {
            path: path.to_path_buf(),
        }
    }
}

impl Classify for WorkspaceError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::SecurityViolation { .. } => ErrorKind::SecurityViolation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotADirectory { .. } | Self::IsADirectory { .. } => ErrorKind::InvalidInput,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_becomes_not_found() {
        let err = WorkspaceError::io(
            "read",
            Path::new("/x"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(matches!(err, WorkspaceError::NotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_other_io_errors_keep_operation() {
        let err = WorkspaceError::io(
            "write",
            Path::new("/x"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().starts_with("Failed to write /x"));
    }
}
