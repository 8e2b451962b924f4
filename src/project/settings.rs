// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Per-project component filters.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A category of pipeline components the editor can show or hide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs, reason = "variant names are the component categories")]
pub enum FilterType {
    Adapter,
    Amqp,
    Cmis,
    FileSystem,
    Http,
    Idin,
    Jdbc,
    Jms,
    Jvm,
    Kafka,
    Mail,
    Mongodb,
    Mqtt,
    Sap,
}

impl FilterType {
    /// Every filter, in declaration order.
    pub const ALL: [Self; 14] = [
        Self::Adapter,
        Self::Amqp,
        Self::Cmis,
        Self::FileSystem,
        Self::Http,
        Self::Idin,
        Self::Jdbc,
        Self::Jms,
        Self::Jvm,
        Self::Kafka,
        Self::Mail,
        Self::Mongodb,
        Self::Mqtt,
        Self::Sap,
    ];

    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Adapter => "ADAPTER",
            Self::Amqp => "AMQP",
            Self::Cmis => "CMIS",
            Self::FileSystem => "FILE_SYSTEM",
            Self::Http => "HTTP",
            Self::Idin => "IDIN",
            Self::Jdbc => "JDBC",
            Self::Jms => "JMS",
            Self::Jvm => "JVM",
            Self::Kafka => "KAFKA",
            Self::Mail => "MAIL",
            Self::Mongodb => "MONGODB",
            Self::Mqtt => "MQTT",
            Self::Sap => "SAP",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecognised filter name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid filter type: {0}")]
pub struct InvalidFilterType(pub String);

impl FromStr for FilterType {
    type Err = InvalidFilterType;

    /// Matches case-insensitively, so `jdbc` and `JDBC` are the same filter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|filter| filter.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| InvalidFilterType(s.to_string()))
    }
}

/// Enabled flag for every [`FilterType`]. The map is always total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<FilterType, bool>", into = "BTreeMap<FilterType, bool>")]
pub struct ProjectSettings {
    filters: BTreeMap<FilterType, bool>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl From<BTreeMap<FilterType, bool>> for ProjectSettings {
    /// Filters missing from `map` start disabled.
    fn from(map: BTreeMap<FilterType, bool>) -> Self {
        let mut settings = Self::new();
        settings.filters.extend(map);
        settings
    }
}

impl From<ProjectSettings> for BTreeMap<FilterType, bool> {
    fn from(settings: ProjectSettings) -> Self {
        settings.filters
    }
}

impl ProjectSettings {
    /// All filters disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filters: FilterType::ALL.into_iter().map(|f| (f, false)).collect(),
        }
    }

    /// Whether `filter` is enabled.
    #[must_use]
    pub fn is_enabled(&self, filter: FilterType) -> bool {
        self.filters.get(&filter).copied().unwrap_or(false)
    }

    /// Sets one flag. Other flags are unaffected.
    pub fn set_enabled(&mut self, filter: FilterType, enabled: bool) {
        self.filters.insert(filter, enabled);
    }

    /// Flips one flag and returns its new value.
    pub fn toggle(&mut self, filter: FilterType) -> bool {
        let enabled = !self.is_enabled(filter);
        self.set_enabled(filter, enabled);
        enabled
    }

    /// All flags in [`FilterType::ALL`] order.
    #[must_use]
    pub const fn filters(&self) -> &BTreeMap<FilterType, bool> {
        &self.filters
    }
}
