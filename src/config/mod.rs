use std::{fs, path::Path};

use serde::Deserialize;

use crate::core::error::IntelError;
use crate::core::metadata::DEFAULT_CREATOR;
use crate::core::types::Tlp;
use crate::schema::{load_schema_file, SchemaRegistry};

pub const DEFAULT_CONFIG_PATH: &str = "config/stasis.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CoreConfig {
    #[serde(default = "default_creator")]
    pub creator: String,
    #[serde(default)]
    pub default_tlp: Tlp,
    #[serde(default = "default_merge_source")]
    pub merge_source: String,
    #[serde(default = "default_merge_confidence")]
    pub merge_confidence: i32,
    #[serde(default = "default_relationship_source")]
    pub relationship_source: String,
    #[serde(default = "default_import_creator")]
    pub import_creator: String,
    /// TOML file of `[[schema]]` tables layered over the built-in section schemas.
    #[serde(default)]
    pub schema_file: Option<String>,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            creator: default_creator(),
            default_tlp: Tlp::Amber,
            merge_source: default_merge_source(),
            merge_confidence: default_merge_confidence(),
            relationship_source: default_relationship_source(),
            import_creator: default_import_creator(),
            schema_file: None,
            log: LogConfig::default(),
        }
    }
}

impl CoreConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, IntelError> {
        let cfg: CoreConfig = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), IntelError> {
        if self.creator.trim().is_empty() {
            return Err(IntelError::Config("creator must not be empty".into()));
        }
        if self.merge_source.trim().is_empty() || self.relationship_source.trim().is_empty() {
            return Err(IntelError::Config("reference sources must not be empty".into()));
        }
        if !(0..=5).contains(&self.merge_confidence) {
            return Err(IntelError::Config(format!(
                "merge_confidence must be between 0 and 5, got {}",
                self.merge_confidence
            )));
        }
        Ok(())
    }

    /// Built-in schemas plus whatever `schema_file` layers on top.
    pub fn schema_registry(&self) -> Result<SchemaRegistry, IntelError> {
        match &self.schema_file {
            Some(path) => SchemaRegistry::with_overrides(load_schema_file(Path::new(path))?),
            None => SchemaRegistry::builtin(),
        }
    }
}

pub fn load_config(path: Option<&str>) -> Result<CoreConfig, IntelError> {
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    let path = path.map(Path::new).unwrap_or(default_path);

    if !path.exists() {
        return Ok(CoreConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| IntelError::Config(e.to_string()))?;
    CoreConfig::from_toml_str(&content)
}

fn default_level() -> String {
    "info".to_string()
}

fn default_creator() -> String {
    DEFAULT_CREATOR.to_string()
}

fn default_merge_source() -> String {
    "Data Merge".to_string()
}

fn default_merge_confidence() -> i32 {
    3
}

fn default_relationship_source() -> String {
    "Relationship Import".to_string()
}

fn default_import_creator() -> String {
    "ImportService".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_config(Some("does/not/exist.toml")).unwrap();
        assert_eq!(cfg, CoreConfig::default());
        assert_eq!(cfg.creator, "STASIS");
        assert_eq!(cfg.default_tlp, Tlp::Amber);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = CoreConfig::from_toml_str(
            r#"
            creator = "cti-team"
            default_tlp = "GREEN"

            [log]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.creator, "cti-team");
        assert_eq!(cfg.default_tlp, Tlp::Green);
        assert_eq!(cfg.merge_source, "Data Merge");
        assert_eq!(cfg.log.level, "debug");
    }

    #[test]
    fn out_of_range_merge_confidence_is_rejected() {
        let err = CoreConfig::from_toml_str("merge_confidence = 7").unwrap_err();
        assert!(matches!(err, IntelError::Config(_)));
    }

    #[test]
    fn schema_file_is_layered_over_builtins() {
        let dir = std::env::temp_dir().join("stasis_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let schema_path = dir.join("schemas.toml");
        std::fs::write(
            &schema_path,
            r#"
            [[schema]]
            name = "sighting"
            [schema.root]
            type = "object"
            "#,
        )
        .unwrap();
        let cfg = CoreConfig {
            schema_file: Some(schema_path.to_string_lossy().to_string()),
            ..CoreConfig::default()
        };
        let registry = cfg.schema_registry().unwrap();
        assert!(registry.names().contains(&"sighting".to_string()));
        assert!(registry.names().contains(&"identification".to_string()));
    }
}
