// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! In-memory projects and the on-disk recent-projects history.

mod configuration;
mod error;
mod recent;
mod settings;
mod store;

pub use configuration::{
    CONFIGURATION_TEMPLATE, Configuration, ConfigurationNotFound, ConfigurationStore,
};
pub use error::ProjectError;
pub use recent::{MAX_RECENT_PROJECTS, RecentProject, RecentProjects};
pub use settings::{FilterType, InvalidFilterType, ProjectSettings};
pub use store::{Project, ProjectStore, ProjectSummary};
