use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DacError;
use crate::types::DatabaseType;

/// Connection settings for a [`crate::Database`].
///
/// Read from the `"dac"` section of a JSON document:
///
/// ```rust
/// use sql_dac::prelude::*;
///
/// let json = r#"{ "dac": { "provider": "sqlite", "defaultConnection": "app.db" } }"#;
/// let config = DacConfig::from_json_str(json)?;
/// assert_eq!(config.provider, DatabaseType::Sqlite);
/// assert_eq!(config.default_connection, "app.db");
/// # Ok::<(), DacError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DacConfig {
    #[serde(default = "default_provider")]
    pub provider: DatabaseType,
    #[serde(alias = "DefaultConnection", alias = "default_connection")]
    pub default_connection: String,
    #[serde(default = "default_pool_size", alias = "pool_size")]
    pub pool_size: u32,
}

fn default_provider() -> DatabaseType {
    DatabaseType::Sqlite
}

fn default_pool_size() -> u32 {
    8
}

fn parse_document(json: &str) -> Result<Value, DacError> {
    serde_json::from_str(json)
        .map_err(|e| DacError::generic_with("configuration is not valid JSON", e))
}

impl DacConfig {
    /// Well-known section name holding the settings.
    pub const SECTION_DEFAULT_NAME: &'static str = "dac";
    /// Fully qualified section name, accepted when the short one is absent.
    pub const SECTION_QUALIFIED_NAME: &'static str = "am.kon.dac";

    #[must_use]
    pub fn new(provider: DatabaseType, default_connection: impl Into<String>) -> Self {
        Self {
            provider,
            default_connection: default_connection.into(),
            pool_size: default_pool_size(),
        }
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Parse the default section of a JSON document, falling back to
    /// [`DacConfig::SECTION_QUALIFIED_NAME`].
    ///
    /// # Errors
    ///
    /// Returns `DacError::Generic` for malformed JSON or when neither section exists.
    pub fn from_json_str(json: &str) -> Result<Self, DacError> {
        let document = parse_document(json)?;
        let section = [Self::SECTION_DEFAULT_NAME, Self::SECTION_QUALIFIED_NAME]
            .into_iter()
            .find(|name| document.get(*name).is_some())
            .unwrap_or(Self::SECTION_DEFAULT_NAME);
        Self::from_document(&document, section)
    }

    /// Parse the named section of a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `DacError::Generic` for malformed JSON or a missing section.
    pub fn from_json_section(json: &str, section: &str) -> Result<Self, DacError> {
        Self::from_document(&parse_document(json)?, section)
    }

    fn from_document(document: &Value, section: &str) -> Result<Self, DacError> {
        let Some(settings) = document.get(section) else {
            return Err(DacError::generic(format!(
                "configuration section `{section}` not found"
            )));
        };
        let config: DacConfig = serde_json::from_value(settings.clone()).map_err(|e| {
            DacError::generic_with(format!("invalid configuration section `{section}`"), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the default section from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `DacError::Generic` when the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DacError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DacError::generic_with(format!("cannot read configuration {}", path.display()), e)
        })?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<(), DacError> {
        if self.default_connection.trim().is_empty() {
            return Err(DacError::generic("defaultConnection must not be empty"));
        }
        if self.pool_size == 0 {
            return Err(DacError::generic("poolSize must be at least 1"));
        }
        Ok(())
    }
}
