//! Catalog configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Settings that shape how the catalog builds handles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Name of the system encoding; UTF-8 when unset or unknown
    pub system_encoding: Option<String>,
    /// Build every double-byte row when a handle is created instead of on demand
    pub eager_double_byte: bool,
}

impl CatalogConfig {
    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Read and parse a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Set the system encoding
    pub fn with_system_encoding(mut self, name: impl Into<String>) -> Self {
        self.system_encoding = Some(name.into());
        self
    }

    /// Enable or disable eager double-byte construction
    pub fn with_eager_double_byte(mut self, eager: bool) -> Self {
        self.eager_double_byte = eager;
        self
    }
}
