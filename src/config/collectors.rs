//! Collector configuration.
//!
//! Each collector has a unique name (the TOML key) and a `type` selecting the
//! implementation. The processors a collector accepts are listed by processor
//! identifier, in order; later entries win when two handle the same kind.
//!
//! # Example
//!
//! ```toml
//! [collectors.pages]
//! type = "versioned"
//! processors = ["versioned"]
//! tables = ["Page", "File"]
//! lifetime_days = 180
//! keep_limit = 2
//!
//! [collectors.change_sets]
//! type = "change_set"
//! processors = ["change_set"]
//! lifetime_days = 100
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Identifiers of the processors every sweeper registers.
pub const BUILTIN_PROCESSORS: &[&str] = &["versioned", "change_set"];

/// Collector configurations keyed by unique name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectorsConfig {
    pub collectors: BTreeMap<String, CollectorConfig>,
}

impl CollectorsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, config) in &self.collectors {
            config
                .validate()
                .map_err(|e| ConfigError::Validation(format!("collector '{}': {}", name, e)))?;

            for processor in config.processors() {
                if !BUILTIN_PROCESSORS.contains(&processor.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "collector '{}': unknown processor '{}' (available: {})",
                        name,
                        processor,
                        BUILTIN_PROCESSORS.join(", ")
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CollectorConfig> {
        self.collectors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collectors.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CollectorConfig)> {
        self.collectors.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Configuration for a single collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollectorConfig {
    /// Obsolete versions of versioned records.
    Versioned(VersionedCollectorConfig),

    /// Completed change sets.
    ChangeSet(ChangeSetCollectorConfig),
}

impl CollectorConfig {
    pub fn processors(&self) -> &[String] {
        match self {
            Self::Versioned(c) => &c.processors,
            Self::ChangeSet(c) => &c.processors,
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Versioned(c) => c.validate(),
            Self::ChangeSet(c) => c.validate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionedCollectorConfig {
    /// Processor identifiers accepted by this collector.
    #[serde(default = "default_versioned_processors")]
    pub processors: Vec<String>,

    /// Versioned tables to scan. Empty scans every versioned table in the store.
    #[serde(default)]
    pub tables: Vec<String>,

    /// Versions edited more recently than this are kept.
    /// Default: 180
    #[serde(default = "default_versioned_lifetime_days")]
    pub lifetime_days: u32,

    /// Number of most recent versions always kept per record, on top of the
    /// latest and latest published versions.
    /// Default: 2
    #[serde(default = "default_keep_limit")]
    pub keep_limit: usize,

    /// Maximum number of records emitted per run. 0 for unlimited.
    /// Default: 100
    #[serde(default = "default_deletion_limit")]
    pub deletion_limit: usize,

    /// Maximum number of versions in a single record. Records with more
    /// stale versions are split.
    /// Default: 100
    #[serde(default = "default_query_limit")]
    pub query_limit: usize,

    /// Emit one record per locale per record for localised tables.
    #[serde(default)]
    pub locales: Vec<String>,
}

impl Default for VersionedCollectorConfig {
    fn default() -> Self {
        Self {
            processors: default_versioned_processors(),
            tables: Vec::new(),
            lifetime_days: default_versioned_lifetime_days(),
            keep_limit: default_keep_limit(),
            deletion_limit: default_deletion_limit(),
            query_limit: default_query_limit(),
            locales: Vec::new(),
        }
    }
}

impl VersionedCollectorConfig {
    fn validate(&self) -> Result<(), String> {
        if self.query_limit == 0 {
            return Err("query_limit must be at least 1".into());
        }
        Ok(())
    }

    pub fn lifetime(&self) -> chrono::Duration {
        chrono::Duration::days(self.lifetime_days as i64)
    }
}

fn default_versioned_processors() -> Vec<String> {
    vec!["versioned".to_string()]
}

fn default_versioned_lifetime_days() -> u32 {
    180
}

fn default_keep_limit() -> usize {
    2
}

fn default_deletion_limit() -> usize {
    100
}

fn default_query_limit() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeSetCollectorConfig {
    #[serde(default = "default_change_set_processors")]
    pub processors: Vec<String>,

    /// Completed change sets last edited before this are collected.
    /// Default: 100
    #[serde(default = "default_change_set_lifetime_days")]
    pub lifetime_days: u32,

    /// Maximum number of change sets emitted per run. 0 for unlimited.
    /// Default: 100
    #[serde(default = "default_deletion_limit")]
    pub deletion_limit: usize,
}

impl Default for ChangeSetCollectorConfig {
    fn default() -> Self {
        Self {
            processors: default_change_set_processors(),
            lifetime_days: default_change_set_lifetime_days(),
            deletion_limit: default_deletion_limit(),
        }
    }
}

impl ChangeSetCollectorConfig {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    pub fn lifetime(&self) -> chrono::Duration {
        chrono::Duration::days(self.lifetime_days as i64)
    }
}

fn default_change_set_processors() -> Vec<String> {
    vec!["change_set".to_string()]
}

fn default_change_set_lifetime_days() -> u32 {
    100
}
