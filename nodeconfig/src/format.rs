//! Text encodings for configuration values.

use std::{fmt, path::Path};

use serde_json::Value;
use thiserror::Error;

/// Encoding and decoding failures.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml encode: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("toml decode: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unsupported config file extension: {0:?}")]
    UnsupportedExtension(String),
}

/// Supported config file encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Format for a file extension: `json`, `toml`/`tml` or `yaml`/`yml`.
    pub fn from_extension(ext: &str) -> Result<Self, FormatError> {
        match ext {
            "json" => Ok(Self::Json),
            "toml" | "tml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(FormatError::UnsupportedExtension(other.to_string())),
        }
    }

    /// Format for `path`, by its extension.
    pub fn from_path(path: &Path) -> Result<Self, FormatError> {
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        Self::from_extension(ext)
    }

    /// Canonical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
        }
    }

    /// Pretty-print `value`.
    ///
    /// TOML has no null, so null members are dropped first; an array
    /// holding a null is still an error.
    pub fn render(&self, value: &Value) -> Result<String, FormatError> {
        Ok(match self {
            Self::Json => serde_json::to_string_pretty(value)?,
            Self::Toml => toml::to_string_pretty(&strip_nulls(value))?,
            Self::Yaml => serde_yaml::to_string(value)?,
        })
    }

    /// Parse text into a plain value. Blank input is an empty object.
    pub fn parse(&self, text: &str) -> Result<Value, FormatError> {
        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        Ok(match self {
            Self::Json => serde_json::from_str(text)?,
            Self::Toml => {
                let v: toml::Value = toml::from_str(text)?;
                serde_json::to_value(v)?
            }
            Self::Yaml => serde_yaml::from_str(text)?,
        })
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(list) => Value::Array(list.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/.config.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(ConfigFormat::from_path(Path::new("b.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_extension("tml").unwrap(), ConfigFormat::Toml);
        let err = ConfigFormat::from_path(Path::new("c.ini")).unwrap_err();
        assert!(matches!(err, FormatError::UnsupportedExtension(ref e) if e == "ini"));
        assert!(ConfigFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_toml_drops_nulls() {
        let value = json!({"name": "x", "port": null, "server": {"host": "h", "tls": null}});
        let text = ConfigFormat::Toml.render(&value).unwrap();
        assert!(!text.contains("port"));
        let back = ConfigFormat::Toml.parse(&text).unwrap();
        assert_eq!(back, json!({"name": "x", "server": {"host": "h"}}));
    }

    #[test]
    fn test_each_format_reads_its_output() {
        let value = json!({"name": "demo", "ports": [1, 2], "debug": true, "ratio": 0.5});
        for format in [ConfigFormat::Json, ConfigFormat::Toml, ConfigFormat::Yaml] {
            let text = format.render(&value).unwrap();
            assert_eq!(format.parse(&text).unwrap(), value, "{format}");
        }
    }

    #[test]
    fn test_blank_input() {
        assert_eq!(ConfigFormat::Json.parse("  \n").unwrap(), json!({}));
    }
}
