// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! The configuration documents owned by one project.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Content given to a configuration created without text.
pub const CONFIGURATION_TEMPLATE: &str =
    r#"<Configuration><Adapter name="new adapter"></Adapter></Configuration>"#;

/// One XML document, identified by its project-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Path relative to the project root, `/`-separated.
    pub filepath: String,
    /// Full document text.
    pub xml_content: String,
}

impl Configuration {
    /// A configuration holding [`CONFIGURATION_TEMPLATE`].
    pub fn new(filepath: impl Into<String>) -> Self {
        Self::with_content(filepath, CONFIGURATION_TEMPLATE)
    }

    /// A configuration holding `xml_content`.
    pub fn with_content(filepath: impl Into<String>, xml_content: impl Into<String>) -> Self {
        Self {
            filepath: filepath.into(),
            xml_content: xml_content.into(),
        }
    }
}

/// No configuration has the requested filepath.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Configuration with filepath {0} cannot be found")]
pub struct ConfigurationNotFound(pub String);

/// Ordered configurations of one project. Lookups are linear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationStore {
    configurations: Vec<Configuration>,
}

impl ConfigurationStore {
    /// An empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            configurations: Vec::new(),
        }
    }

    /// Finds a configuration by exact filepath.
    #[must_use]
    pub fn find(&self, filepath: &str) -> Option<&Configuration> {
        self.configurations.iter().find(|c| c.filepath == filepath)
    }

    fn position(&self, filepath: &str) -> Option<usize> {
        self.configurations
            .iter()
            .position(|c| c.filepath == filepath)
    }

    /// Adds a configuration unless one with the same filepath exists, whose
    /// content is then kept. Returns whether it was added.
    pub fn add(&mut self, configuration: Configuration) -> bool {
        if self.position(&configuration.filepath).is_some() {
            debug!("Keeping existing configuration {}", configuration.filepath);
            return false;
        }
        self.configurations.push(configuration);
        true
    }

    /// Removes and returns a configuration.
    pub fn remove(&mut self, filepath: &str) -> Option<Configuration> {
        self.position(filepath)
            .map(|index| self.configurations.remove(index))
    }

    /// Drops every configuration.
    pub fn remove_all(&mut self) {
        self.configurations.clear();
    }

    /// Replaces the full text of one configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationNotFound`] and changes nothing if no
    /// configuration has that filepath.
    pub fn set_content(
        &mut self,
        filepath: &str,
        xml_content: impl Into<String>,
    ) -> Result<(), ConfigurationNotFound> {
        let configuration = self
            .configurations
            .iter_mut()
            .find(|c| c.filepath == filepath)
            .ok_or_else(|| ConfigurationNotFound(filepath.to_string()))?;
        configuration.xml_content = xml_content.into();
        Ok(())
    }

    /// Configurations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Configuration> {
        self.configurations.iter()
    }

    /// Filepaths in insertion order.
    #[must_use]
    pub fn filepaths(&self) -> Vec<String> {
        self.iter().map(|c| c.filepath.clone()).collect()
    }

    /// Number of configurations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    /// Whether the store holds no configurations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }
}
