//! Configuration for the query recorder.
//!
//! Defines collection stubs and logging settings. Fixtures can be written
//! inline in tests or loaded from YAML files.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for a recorder.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RopeConfig {
    /// Stubs in registration order
    #[serde(default)]
    pub stubs: Vec<StubDefinition>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl RopeConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, stub) in self.stubs.iter().enumerate() {
            stub.validate()
                .map_err(|e| anyhow::anyhow!("Stub {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// A canned response keyed by collection name.
///
/// A stub without a collection is a wildcard: it answers any query whose
/// collection has no stub of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StubDefinition {
    /// Collection this stub answers for (`None` = wildcard)
    #[serde(default)]
    pub collection: Option<String>,

    /// Data every matching query resolves to
    #[serde(default)]
    pub data: serde_json::Value,
}

impl StubDefinition {
    /// Stub answering queries against `collection`.
    pub fn for_collection(collection: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            collection: Some(collection.into()),
            data,
        }
    }

    /// Stub answering any collection without a dedicated stub.
    pub fn wildcard(data: serde_json::Value) -> Self {
        Self {
            collection: None,
            data,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.collection.is_none()
    }

    /// Validate the stub definition.
    ///
    /// Data is never inspected; only the collection name is checked.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(collection) = &self.collection {
            if collection.is_empty() {
                anyhow::bail!("Collection name cannot be empty");
            }
            if collection.contains('$') || collection.contains('\0') {
                anyhow::bail!("Invalid collection name: {:?}", collection);
            }
        }
        Ok(())
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log every query that matched a stub
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log queries that found no stub
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
        }
    }
}

fn default_true() -> bool {
    true
}
