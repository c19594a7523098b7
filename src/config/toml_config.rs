use crate::adapters::remote_store::DEFAULT_TIMEOUT_SECONDS;
use crate::utils::error::{MarkingError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_ROSTER_SKIP_ROWS: usize = 2;
pub const DEFAULT_WRAP_WIDTH: usize = 90;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkingConfig {
    pub session: SessionConfig,
    pub reference: ReferenceConfig,
    pub store: StoreConfig,
    pub display: Option<DisplayConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub grader: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub roster_path: String,
    pub responses_path: String,
    pub roster_skip_rows: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub r#type: String,
    pub path: Option<String>,
    pub url: Option<String>,
    pub token: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub wrap_width: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl MarkingConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MarkingError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| MarkingError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${MARK_SHEET_URL})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::LazyLock;

        static ENV_VAR: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern"));

        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_grader("session.grader", &self.session.grader)?;
        validation::validate_csv_path("reference.roster_path", &self.reference.roster_path)?;
        validation::validate_csv_path("reference.responses_path", &self.reference.responses_path)?;

        match self.store.r#type.as_str() {
            "local" => {
                let path = validation::validate_required_field("store.path", &self.store.path)?;
                validation::validate_csv_path("store.path", path)?;
            }
            "remote" => {
                let url = validation::validate_required_field("store.url", &self.store.url)?;
                validation::validate_sheet_url("store.url", url)?;
                if let Some(timeout) = self.store.timeout_seconds {
                    validation::validate_range("store.timeout_seconds", timeout, 1, 600)?;
                }
            }
            other => {
                return Err(MarkingError::InvalidConfigValueError {
                    field: "store.type".to_string(),
                    value: other.to_string(),
                    reason: "Unsupported store type. Valid types: local, remote".to_string(),
                })
            }
        }

        validation::validate_range("display.wrap_width", self.wrap_width(), 20, 400)?;

        let format = self.log_format();
        if format != "compact" && format != "json" {
            return Err(MarkingError::InvalidConfigValueError {
                field: "logging.format".to_string(),
                value: format.to_string(),
                reason: "Unsupported format. Valid formats: compact, json".to_string(),
            });
        }

        Ok(())
    }

    pub fn grader(&self) -> &str {
        self.session.grader.as_deref().unwrap_or_default().trim()
    }

    pub fn roster_skip_rows(&self) -> usize {
        self.reference
            .roster_skip_rows
            .unwrap_or(DEFAULT_ROSTER_SKIP_ROWS)
    }

    pub fn wrap_width(&self) -> usize {
        self.display
            .as_ref()
            .and_then(|d| d.wrap_width)
            .unwrap_or(DEFAULT_WRAP_WIDTH)
    }

    /// Unresolved `${VAR}` placeholders count as no token.
    pub fn store_token(&self) -> Option<String> {
        self.store
            .token
            .as_ref()
            .filter(|t| !t.trim().is_empty() && !t.starts_with("${"))
            .cloned()
    }

    pub fn store_timeout_seconds(&self) -> u64 {
        self.store.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }

    pub fn log_format(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.format.as_deref())
            .unwrap_or("compact")
    }
}

impl Validate for MarkingConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LOCAL_CONFIG: &str = r#"
[session]
grader = "VM"

[reference]
roster_path = "reference/marking_groups.csv"
responses_path = "reference/formatted_responses.csv"

[store]
type = "local"
path = "results/scores_VM.csv"
"#;

    #[test]
    fn test_parse_local_config_with_defaults() {
        let config = MarkingConfig::from_toml_str(LOCAL_CONFIG).unwrap();

        assert_eq!(config.grader(), "VM");
        assert_eq!(config.roster_skip_rows(), 2);
        assert_eq!(config.wrap_width(), 90);
        assert_eq!(config.log_format(), "compact");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MARKING_DESK_TEST_SHEET", "https://sheets.example.com/values/A1");

        let toml_content = r#"
[session]
grader = "JD"

[reference]
roster_path = "groups.csv"
responses_path = "responses.csv"

[store]
type = "remote"
url = "${MARKING_DESK_TEST_SHEET}"
token = "${MARKING_DESK_TEST_TOKEN_UNSET}"
"#;

        let config = MarkingConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.store.url.as_deref(),
            Some("https://sheets.example.com/values/A1")
        );
        assert_eq!(config.store_token(), None);
        assert!(config.validate().is_ok());

        std::env::remove_var("MARKING_DESK_TEST_SHEET");
    }

    #[test]
    fn test_config_validation() {
        let mut config = MarkingConfig::from_toml_str(LOCAL_CONFIG).unwrap();
        config.store.r#type = "ftp".to_string();
        assert!(config.validate().is_err());

        let mut config = MarkingConfig::from_toml_str(LOCAL_CONFIG).unwrap();
        config.store.r#type = "remote".to_string();
        assert!(matches!(
            config.validate(),
            Err(MarkingError::MissingConfigError { .. })
        ));

        let mut config = MarkingConfig::from_toml_str(LOCAL_CONFIG).unwrap();
        config.session.grader = None;
        assert!(config.validate().is_err());

        let mut config = MarkingConfig::from_toml_str(LOCAL_CONFIG).unwrap();
        config.reference.roster_path = "groups.xlsx".to_string();
        assert!(config.validate().is_err());

        let mut config = MarkingConfig::from_toml_str(LOCAL_CONFIG).unwrap();
        config.session.grader = Some("VM JD".to_string());
        assert!(matches!(
            config.validate(),
            Err(MarkingError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(LOCAL_CONFIG.as_bytes()).unwrap();

        let config = MarkingConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.store.path.as_deref(), Some("results/scores_VM.csv"));
    }
}
