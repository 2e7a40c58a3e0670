//! Configuration for polar-ec
//!
//! Defaults are embedded from `assets/default_config.toml`. A user file is
//! layered on top of them: tables merge key by key, arrays (including
//! `[[schools]]`) replace the default array wholesale.

use crate::data::{DataLoader, Field, School};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_DEFAULTS: &str = include_str!("../assets/default_config.toml");

/// Config file picked up from the working directory when no path is given.
pub const LOCAL_CONFIG_FILE: &str = "polar-ec.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Data file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub dir: PathBuf,
    pub environment_suffix: String,
    pub growth_workbook: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub correlation_fields: Vec<Field>,
    pub export_fields: Vec<Field>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub file_name: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub analysis: AnalysisConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
    /// Study sites, in display order.
    pub schools: Vec<School>,
}

impl Config {
    /// The embedded defaults.
    pub fn from_defaults() -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(CONFIG_DEFAULTS)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse `user` and layer it over the defaults.
    pub fn from_toml(user: &str) -> Result<Self, ConfigError> {
        let mut base: toml::Value = toml::from_str(CONFIG_DEFAULTS)?;
        let overlay: toml::Value = toml::from_str(user)?;
        merge_values(&mut base, overlay);

        let config: Self = base.try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or `./polar-ec.toml` if present, or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let local = Path::new(LOCAL_CONFIG_FILE);
        let path = match path {
            Some(path) => path,
            None if local.is_file() => local,
            None => return Self::from_defaults(),
        };

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schools.is_empty() {
            return Err(ConfigError::Invalid("no schools configured".into()));
        }

        let mut seen = HashSet::new();
        for school in &self.schools {
            if school.name.trim().is_empty() {
                return Err(ConfigError::Invalid("school with empty name".into()));
            }
            if !seen.insert(school.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate school '{}'",
                    school.name
                )));
            }
            if !(school.target_ec.is_finite() && school.target_ec > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "school '{}' has non-positive target EC {}",
                    school.name, school.target_ec
                )));
            }
        }

        if self.analysis.correlation_fields.is_empty() {
            return Err(ConfigError::Invalid("no correlation fields".into()));
        }
        if self.analysis.export_fields.is_empty() {
            return Err(ConfigError::Invalid("no export fields".into()));
        }
        Ok(())
    }

    /// Data source handle for the configured directory.
    pub fn loader(&self) -> DataLoader {
        DataLoader::new(&self.data.dir).with_environment_suffix(&self.data.environment_suffix)
    }

    pub fn school(&self, name: &str) -> Option<&School> {
        self.schools.iter().find(|s| s.name == name)
    }
}

/// Merge `overlay` into `base`: tables recurse, everything else replaces.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_four_schools() {
        let config = Config::from_defaults().unwrap();
        let names: Vec<&str> = config.schools.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["송도고", "하늘고", "아라고", "동산고"]);
        assert_eq!(config.school("아라고").unwrap().target_ec, 4.0);
        assert_eq!(
            config.analysis.correlation_fields,
            vec![Field::Temperature, Field::Ec, Field::Weight]
        );
        assert_eq!(config.data.growth_workbook, "4개교_생육결과데이터.xlsx");
    }

    #[test]
    fn user_file_overrides_only_what_it_names() {
        let config = Config::from_toml(
            r#"
[data]
dir = "/srv/polar"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(config.data.dir, PathBuf::from("/srv/polar"));
        assert_eq!(config.data.environment_suffix, "_환경데이터.csv");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.schools.len(), 4);
    }

    #[test]
    fn school_list_replaces_defaults() {
        let config = Config::from_toml(
            r#"
[[schools]]
name = "A"
target_ec = 1.5
"#,
        )
        .unwrap();
        assert_eq!(config.schools.len(), 1);
        assert_eq!(config.schools[0].color, "");
    }

    #[test]
    fn rejects_bad_school_tables() {
        let non_positive = Config::from_toml(
            r#"
[[schools]]
name = "A"
target_ec = 0.0
"#,
        );
        assert!(matches!(non_positive, Err(ConfigError::Invalid(_))));

        let duplicate = Config::from_toml(
            r#"
[[schools]]
name = "A"
target_ec = 1.0

[[schools]]
name = "A"
target_ec = 2.0
"#,
        );
        assert!(matches!(duplicate, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = Config::from_toml(
            r#"
[analysis]
correlation_fields = ["temperature", "pressure"]
"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
