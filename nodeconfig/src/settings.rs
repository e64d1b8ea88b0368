//! Tool settings shared by the library entry points and the CLI.

use std::{fs, path::Path};

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{extract::ExtractOptions, format::ConfigFormat, types::GenerateOptions};

/// Settings file contents. Every key is optional.
///
/// ```toml
/// [generate]
/// max_depth = 6
///
/// [extract]
/// fill_defaults = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Settings {
    pub generate: GenerateOptions,
    pub extract: ExtractOptions,
}

impl Settings {
    /// Read settings from a JSON, TOML or YAML file, picked by extension.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        let value = format.parse(&content)?;
        let settings = serde_json::from_value(value)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        debug!("settings from {}: {settings:?}", path.display());
        Ok(settings)
    }

    /// JSON Schema describing the settings file.
    pub fn json_schema() -> serde_json::Value {
        schemars::schema_for!(Settings).as_value().clone()
    }
}
