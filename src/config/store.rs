use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Record store configuration.
///
/// ```toml
/// [store]
/// path = "data/store.json"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// JSON file holding versioned records and change sets.
    /// When unset the store starts empty and nothing is persisted.
    #[serde(default)]
    pub path: Option<PathBuf>,
}
