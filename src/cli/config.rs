//! Configuration file
//!
//! ```json
//! {
//!   "namespace": "default",
//!   "channel_capacity": 256,
//!   "readonly": false,
//!   "keyspaces": [
//!     {
//!       "name": "people",
//!       "documents": { "p1": { "name": "ann", "age": 25 } },
//!       "indexes": [ { "name": "by_age", "keys": ["age"], "where": "age > 18" } ]
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{CliError, CliResult};
use crate::datastore::{IndexType, Keyspace, MemoryCatalog};
use crate::execution::{ContextOptions, DEFAULT_CHANNEL_CAPACITY};
use crate::expr::parse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Namespace every configured keyspace lives in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Items buffered between operators (must be > 0)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Index creation becomes a no-op
    #[serde(default)]
    pub readonly: bool,

    #[serde(default)]
    pub keyspaces: Vec<KeyspaceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyspaceConfig {
    pub name: String,

    /// Documents by id
    #[serde(default)]
    pub documents: BTreeMap<String, Value>,

    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub name: String,

    /// Key expressions as text, leading component first
    pub keys: Vec<String>,

    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default)]
    pub using: IndexType,
}

fn default_namespace() -> String {
    "default".to_string()
}
fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> CliResult<()> {
        if self.namespace.is_empty() {
            return Err(CliError::config_error("namespace must not be empty"));
        }

        if self.channel_capacity == 0 {
            return Err(CliError::config_error("channel_capacity must be > 0"));
        }

        let mut keyspaces = HashSet::new();
        for keyspace in &self.keyspaces {
            if keyspace.name.is_empty() {
                return Err(CliError::config_error("keyspace name must not be empty"));
            }
            if !keyspaces.insert(keyspace.name.as_str()) {
                return Err(CliError::config_error(format!(
                    "Duplicate keyspace: '{}'",
                    keyspace.name
                )));
            }

            let mut indexes = HashSet::new();
            for index in &keyspace.indexes {
                if index.name.is_empty() {
                    return Err(CliError::config_error(format!(
                        "Index without name on keyspace '{}'",
                        keyspace.name
                    )));
                }
                if !indexes.insert(index.name.as_str()) {
                    return Err(CliError::config_error(format!(
                        "Duplicate index '{}' on keyspace '{}'",
                        index.name, keyspace.name
                    )));
                }
                if index.keys.is_empty() {
                    return Err(CliError::config_error(format!(
                        "Index '{}' has no keys",
                        index.name
                    )));
                }
                for text in index.keys.iter().chain(index.condition.iter()) {
                    parse(text).map_err(|e| {
                        CliError::config_error(format!(
                            "Invalid expression '{}' in index '{}': {}",
                            text, index.name, e
                        ))
                    })?;
                }
            }
        }

        Ok(())
    }

    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            readonly: self.readonly,
            channel_capacity: self.channel_capacity,
        }
    }

    /// In-memory catalog holding every configured keyspace, documents
    /// loaded and indexes built
    pub fn build_catalog(&self) -> CliResult<MemoryCatalog> {
        let catalog = MemoryCatalog::new();
        for keyspace_config in &self.keyspaces {
            let keyspace = catalog
                .add_keyspace(&self.namespace, &keyspace_config.name)
                .map_err(|e| CliError::config_error(e.to_string()))?;
            for (id, doc) in &keyspace_config.documents {
                keyspace
                    .insert(id, doc.clone())
                    .map_err(|e| CliError::config_error(e.to_string()))?;
            }
            for index in &keyspace_config.indexes {
                let keys = index
                    .keys
                    .iter()
                    .map(|text| parse(text))
                    .collect::<Result<Vec<_>, _>>()?;
                let condition = index.condition.as_deref().map(parse).transpose()?;
                keyspace
                    .create_index(&index.name, None, &keys, condition.as_ref(), index.using)
                    .map_err(|e| CliError::config_error(e.to_string()))?;
            }
        }
        Ok(catalog)
    }
}
