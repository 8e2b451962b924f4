// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

use thiserror::Error;

use super::settings::InvalidFilterType;
use crate::error::{Classify, ErrorKind};
use crate::workspace::WorkspaceError;
use crate::xml::AdapterEditError;

/// Failures of project store operations.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// No project has that name.
    #[error("Project with name {0} cannot be found")]
    ProjectNotFound(String),
    /// A project with that name already exists.
    #[error("Project with name {0} already exists")]
    ProjectAlreadyExists(String),
    /// The project name is blank.
    #[error("Invalid project name: '{0}'")]
    InvalidName(String),
    /// The project has no configuration with that filepath.
    #[error("Configuration with filepath {filepath} cannot be found in project {project}")]
    ConfigurationNotFound {
        /// Project name.
        project: String,
        /// Requested filepath.
        filepath: String,
    },
    /// Unknown filter name.
    #[error(transparent)]
    InvalidFilterType(#[from] InvalidFilterType),
    /// Submitted configuration text is not well-formed.
    #[error("Invalid XML content: {0}")]
    InvalidXml(String),
    /// Adapter replacement failed.
    #[error(transparent)]
    Adapter(#[from] AdapterEditError),
    /// Filesystem failure while scanning or opening a project.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    /// A thread panicked while holding a store lock.
    #[error("Project store lock poisoned")]
    LockPoisoned,
}

impl Classify for ProjectError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::ProjectNotFound(_) | Self::ConfigurationNotFound { .. } => ErrorKind::NotFound,
            Self::ProjectAlreadyExists(_) => ErrorKind::Conflict,
            Self::InvalidName(_) | Self::InvalidFilterType(_) | Self::InvalidXml(_) => {
                ErrorKind::InvalidInput
            }
            Self::Adapter(e) => e.kind(),
            Self::Workspace(e) => e.kind(),
            Self::LockPoisoned => ErrorKind::Io,
        }
    }
}
