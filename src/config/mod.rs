//! Configuration module for the sweeper.
//!
//! The sweeper is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [sweep]
//! collectors = ["pages"]
//!
//! [store]
//! path = "${SWEEPER_DATA}/store.json"
//!
//! [collectors.pages]
//! type = "versioned"
//! tables = ["Page"]
//! ```

mod collectors;
mod observability;
mod store;
mod sweep;

use std::path::Path;

pub use collectors::*;
pub use observability::*;
use serde::{Deserialize, Serialize};
pub use store::*;
pub use sweep::*;

/// Root configuration for the sweeper.
///
/// All sections are optional with sensible defaults. An empty file is a
/// valid configuration that sweeps nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweeperConfig {
    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Which collectors run and how.
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Record store location.
    #[serde(default)]
    pub store: StoreConfig,

    /// Collector definitions, keyed by name.
    #[serde(default)]
    pub collectors: CollectorsConfig,
}

impl SweeperConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let config: SweeperConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.sweep.validate().map_err(ConfigError::Validation)?;
        self.collectors.validate()?;

        for name in &self.sweep.collectors {
            if !self.collectors.contains(name) {
                return Err(ConfigError::Validation(format!(
                    "sweep.collectors names '{}', which is not defined under [collectors]",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Configuration written by `sweeper init`.
pub fn default_config_toml() -> &'static str {
    r#"# Sweeper configuration

[observability.logging]
level = "info"
format = "compact"

[sweep]
collectors = ["versions", "change_sets"]
dry_run = false
batch_size = 100

[sweep.worker]
enabled = false
interval_secs = 3600

# JSON record store
[store]
path = "store.json"

# Stale versions of versioned records
[collectors.versions]
type = "versioned"
processors = ["versioned"]
lifetime_days = 180
keep_limit = 2
deletion_limit = 100
query_limit = 100
# locales = ["en_NZ", "de_DE"]

# Published and reverted change sets
[collectors.change_sets]
type = "change_set"
processors = ["change_set"]
lifetime_days = 100
deletion_limit = 100
"#
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables after a `#` on the same line are left as-is.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    static RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid")
    });

    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in RE.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
