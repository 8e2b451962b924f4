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

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::project::RecentProjects;
use crate::workspace::DEFAULT_MAX_DEPTH as DEFAULT_TREE_DEPTH;
use crate::xml::{DEFAULT_MAX_DEPTH as DEFAULT_XML_DEPTH, SecureXmlParser};

/// Runtime settings.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory whose subdirectories are loaded as projects at startup.
    #[serde(default)]
    pub projects_root: Option<PathBuf>,

    /// Where the recent-projects history lives (default: the platform data
    /// directory).
    #[serde(default)]
    pub recent_projects_file: Option<PathBuf>,

    /// How many directory levels a recursive tree expands (default: 64)
    #[serde(default = "default_max_tree_depth")]
    pub max_tree_depth: usize,

    /// Maximum XML element nesting depth (default: 256)
    #[serde(default = "default_max_xml_depth")]
    pub max_xml_depth: usize,
}

const fn default_max_tree_depth() -> usize {
    DEFAULT_TREE_DEPTH
}

const fn default_max_xml_depth() -> usize {
    DEFAULT_XML_DEPTH
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projects_root: None,
            recent_projects_file: None,
            max_tree_depth: DEFAULT_TREE_DEPTH,
            max_xml_depth: DEFAULT_XML_DEPTH,
        }
    }
}

impl Config {
    /// Load configuration from standard paths or a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or a value has the wrong
    /// type.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self> {
        Self::load_from(user_config_path().as_deref(), explicit_file)
    }

    /// Load configuration with an explicit user config location. Missing
    /// user config is skipped; a missing explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or a value has the wrong
    /// type.
    pub fn load_from(user_file: Option<&Path>, explicit_file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // 1. Start with defaults
        builder = builder
            .set_default("max_tree_depth", u64::try_from(DEFAULT_TREE_DEPTH)?)?
            .set_default("max_xml_depth", u64::try_from(DEFAULT_XML_DEPTH)?)?;

        // 2. Load from user config directory (~/.config/flow-studio/config.toml)
        if let Some(path) = user_file
            && path.exists()
        {
            builder = builder.add_source(config::File::from(path));
        }

        // 3. Load from explicit file if provided
        if let Some(path) = explicit_file {
            if !path.exists() {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            builder = builder.add_source(config::File::from(path));
        }

        // 4. Load from environment variables (FLOW_STUDIO_PROJECTS_ROOT, etc.)
        builder = builder.add_source(
            config::Environment::with_prefix("FLOW_STUDIO")
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Parser honouring `max_xml_depth`.
    #[must_use]
    pub const fn parser(&self) -> SecureXmlParser {
        SecureXmlParser::new().with_max_depth(self.max_xml_depth)
    }

    /// The projects root, if configured.
    #[must_use]
    pub fn projects_root(&self) -> Option<&Path> {
        self.projects_root.as_deref()
    }

    /// The recent-projects history, at the configured file or the platform
    /// default.
    ///
    /// # Errors
    ///
    /// Returns an error if no file is configured and the platform has no
    /// data directory.
    pub fn recent_projects(&self) -> Result<RecentProjects> {
        self.recent_projects_file
            .clone()
            .or_else(RecentProjects::default_file)
            .map(RecentProjects::new)
            .ok_or_else(|| anyhow!("No location for the recent projects file; set recent_projects_file"))
    }
}

/// `~/.config/flow-studio/config.toml` on Linux, the platform equivalent
/// elsewhere.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("flow-studio").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_files() -> Result<()> {
        let config = Config::load_from(None, None)?;
        assert_eq!(config.max_tree_depth, DEFAULT_TREE_DEPTH);
        assert_eq!(config.max_xml_depth, DEFAULT_XML_DEPTH);
        Ok(())
    }

    #[test]
    fn test_explicit_file_overrides_user_file() -> Result<()> {
        let dir = TempDir::new()?;
        let user = dir.path().join("user.toml");
        let explicit = dir.path().join("explicit.toml");
        fs::write(&user, "max_tree_depth = 5\nprojects_root = \"/user/projects\"\n")?;
        fs::write(&explicit, "max_tree_depth = 7\n")?;

        let config = Config::load_from(Some(&user), Some(&explicit))?;
        assert_eq!(config.max_tree_depth, 7);
        assert_eq!(config.projects_root(), Some(Path::new("/user/projects")));
        Ok(())
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = Config::load_from(None, Some(Path::new("/no/such/flow-studio.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_type_is_error() -> Result<()> {
        let dir = TempDir::new()?;
        let file = dir.path().join("bad.toml");
        fs::write(&file, "max_xml_depth = \"deep\"\n")?;
        assert!(Config::load_from(None, Some(&file)).is_err());
        Ok(())
    }

    #[test]
    fn test_parser_uses_depth() {
        let config = Config {
            max_xml_depth: 3,
            ..Config::default()
        };
        assert_eq!(config.parser().max_depth(), 3);
    }

    #[test]
    fn test_recent_projects_uses_configured_file() -> Result<()> {
        let config = Config {
            recent_projects_file: Some(PathBuf::from("/tmp/recent.json")),
            ..Config::default()
        };
        assert_eq!(config.recent_projects()?.file(), Path::new("/tmp/recent.json"));
        Ok(())
    }
}
