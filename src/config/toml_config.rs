use crate::core::ConfigProvider;
use crate::utils::error::{MrlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<String>,
    pub pretty: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

fn default_output_formats() -> Vec<String> {
    vec!["json".to_string()]
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["compact", "json"];

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MrlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MrlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| MrlError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validation::validate_path("source.path", &self.source.path)?;
        validation::validate_file_extensions("source.path", &[self.source.path.as_str()], &["json"])?;
        validation::validate_path("load.output_path", &self.load.output_path)?;
        validation::validate_output_formats("load.output_formats", &self.load.output_formats)?;
        validation::validate_output_targets(
            "load.output_path",
            &self.load.output_path,
            &self.load.output_formats,
        )?;

        if let Some(monitoring) = &self.monitoring {
            if let Some(level) = &monitoring.log_level {
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(MrlError::InvalidConfigValueError {
                        field: "monitoring.log_level".to_string(),
                        value: level.clone(),
                        reason: format!("Valid levels: {}", LOG_LEVELS.join(", ")),
                    });
                }
            }
            if let Some(format) = &monitoring.log_format {
                if !LOG_FORMATS.contains(&format.as_str()) {
                    return Err(MrlError::InvalidConfigValueError {
                        field: "monitoring.log_format".to_string(),
                        value: format.clone(),
                        reason: format!("Valid formats: {}", LOG_FORMATS.join(", ")),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_format.as_deref())
            .is_some_and(|format| format == "json")
    }
}

impl ConfigProvider for TomlConfig {
    fn input_path(&self) -> &str {
        &self.source.path
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.load.output_formats
    }

    fn pretty(&self) -> bool {
        self.load.pretty.unwrap_or(true)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_toml_config() {
        let toml_content = r#"
[pipeline]
name = "mrl-refresh"
description = "Rebuild tissue thresholds"
version = "1.0.0"

[source]
path = "data/dosage_reference_full_extended.json"

[load]
output_path = "data/updated_mrl.json"
output_formats = ["json", "csv"]
pretty = false

[monitoring]
enabled = true
log_level = "debug"
log_format = "json"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.pipeline.name, "mrl-refresh");
        assert_eq!(config.input_path(), "data/dosage_reference_full_extended.json");
        assert!(config.wants_format("csv"));
        assert!(!config.pretty());
        assert!(config.monitoring_enabled());
        assert_eq!(config.log_level(), Some("debug"));
        assert!(config.json_logs());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let toml_content = r#"
[pipeline]
name = "minimal"

[source]
path = "reference.json"

[load]
output_path = "updated.json"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.output_formats(), ["json".to_string()]);
        assert!(config.pretty());
        assert!(!config.monitoring_enabled());
        assert!(!config.json_logs());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MRL_TEST_DATA_DIR", "/srv/farm-data");

        let toml_content = r#"
[pipeline]
name = "test"

[source]
path = "${MRL_TEST_DATA_DIR}/reference.json"

[load]
output_path = "${MRL_TEST_UNSET_VAR}/updated.json"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.source.path, "/srv/farm-data/reference.json");
        assert_eq!(config.load.output_path, "${MRL_TEST_UNSET_VAR}/updated.json");

        std::env::remove_var("MRL_TEST_DATA_DIR");
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[pipeline]
name = "test"

[source]
path = "reference.json"

[load]
output_path = "updated.json"
output_formats = ["zip"]
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let bad_level = r#"
[pipeline]
name = "test"

[source]
path = "reference.json"

[load]
output_path = "updated.json"

[monitoring]
enabled = false
log_level = "loud"
"#;
        let config = TomlConfig::from_toml_str(bad_level).unwrap();
        assert!(config.validate().is_err());

        let clashing_outputs = r#"
[pipeline]
name = "test"

[source]
path = "reference.json"

[load]
output_path = "thresholds.csv"
output_formats = ["json", "csv"]
"#;
        let config = TomlConfig::from_toml_str(clashing_outputs).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_section_is_a_parse_error() {
        let err = TomlConfig::from_toml_str("[pipeline]\nname = \"x\"\n").unwrap_err();
        assert!(matches!(err, MrlError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[pipeline]
name = "file-test"

[source]
path = "reference.json"

[load]
output_path = "out/updated.json"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.pipeline.name, "file-test");
    }
}
