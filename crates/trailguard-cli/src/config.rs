//! TrailGuard configuration
//!
//! Loaded from YAML or TOML (chosen by file extension), then overridden by
//! environment variables, then by command-line flags.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use trailguard_egress::gemini::{API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use trailguard_egress::{AnalysisError, GeminiConfig, HttpClientConfig, RetryPolicy};
use trailguard_pii::{DetectorConfig, FailurePolicy, MaskingConfig};
use trailguard_report::ContextLimits;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrailGuardConfig {
    #[serde(default)]
    pub detection: DetectorConfig,

    #[serde(default)]
    pub masking: MaskingConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Usually supplied through `GEMINI_API_KEY` rather than the file
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub http: HttpClientConfig,

    #[serde(default)]
    pub context: ContextLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            retry: RetryPolicy::default(),
            http: HttpClientConfig::default(),
            context: ContextLimits::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl TrailGuardConfig {
    /// Load `.env`, the optional config file, then environment overrides
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        // A missing .env file is not an error
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.merge_env();
        Ok(config)
    }

    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var(API_KEY_ENV) {
            self.analysis.api_key = Some(val);
        }

        if let Ok(val) = std::env::var("TRAILGUARD_MODEL") {
            self.analysis.model = val;
        }

        if let Ok(val) = std::env::var("TRAILGUARD_BASE_URL") {
            self.analysis.base_url = val;
        }

        if let Ok(val) = std::env::var("TRAILGUARD_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Ok(val) = std::env::var("TRAILGUARD_LOG_FORMAT") {
            match val.to_lowercase().as_str() {
                "text" => self.logging.format = LogFormat::Text,
                "json" => self.logging.format = LogFormat::Json,
                _ => eprintln!(
                    "Warning: Invalid TRAILGUARD_LOG_FORMAT '{}', using default",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("TRAILGUARD_FAILURE_POLICY") {
            match val.parse::<FailurePolicy>() {
                Ok(policy) => self.masking.failure_policy = policy,
                Err(_) => eprintln!(
                    "Warning: Invalid TRAILGUARD_FAILURE_POLICY '{}', using default",
                    val
                ),
            }
        }
    }

    /// Backend settings for the Gemini client
    pub fn gemini_config(&self) -> trailguard_egress::Result<GeminiConfig> {
        let api_key = self
            .analysis
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(AnalysisError::MissingCredential(API_KEY_ENV))?;

        Ok(GeminiConfig::new(api_key)
            .with_base_url(self.analysis.base_url.clone())
            .with_model(self.analysis.model.clone())
            .with_temperature(self.analysis.temperature)
            .with_client_config(self.analysis.http.clone()))
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use trailguard_pii::PseudonymStyle;

    fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn clear_env() {
        unsafe {
            for var in [
                API_KEY_ENV,
                "TRAILGUARD_MODEL",
                "TRAILGUARD_BASE_URL",
                "TRAILGUARD_LOG_LEVEL",
                "TRAILGUARD_LOG_FORMAT",
                "TRAILGUARD_FAILURE_POLICY",
            ] {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = TrailGuardConfig::default();

        assert_eq!(config.analysis.model, "gemini-flash-latest");
        assert_eq!(config.analysis.retry.max_attempts, 7);
        assert_eq!(config.analysis.context.max_rows, 50);
        assert_eq!(config.masking.failure_policy, FailurePolicy::PassThrough);
        assert_eq!(config.logging.level, "info");
        assert!(config.analysis.api_key.is_none());
    }

    #[test]
    fn test_from_yaml_file() {
        let file = write_config(
            ".yaml",
            r#"
detection:
  detect_phone: false
  extra_given_names: ["priya"]
masking:
  failure_policy: redact
  table_style:
    style: placeholder
analysis:
  model: gemini-pro-latest
  retry:
    max_attempts: 3
    min_wait_secs: 1
logging:
  format: json
"#,
        );

        let config = TrailGuardConfig::from_file(file.path()).unwrap();

        assert!(!config.detection.detect_phone);
        assert_eq!(config.detection.extra_given_names, vec!["priya"]);
        assert_eq!(config.masking.failure_policy, FailurePolicy::Redact);
        assert_eq!(config.masking.table_style, PseudonymStyle::Placeholder);
        assert_eq!(config.analysis.model, "gemini-pro-latest");
        assert_eq!(config.analysis.retry.max_attempts, 3);
        assert_eq!(config.analysis.retry.min_wait, Duration::from_secs(1));
        assert_eq!(config.analysis.retry.max_wait, Duration::from_secs(60));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_from_toml_file() {
        let file = write_config(
            ".toml",
            r#"
[analysis]
temperature = 0.3

[analysis.context]
max_rows = 10

[logging]
level = "debug"
"#,
        );

        let config = TrailGuardConfig::from_file(file.path()).unwrap();

        assert_eq!(config.analysis.temperature, 0.3);
        assert_eq!(config.analysis.context.max_rows, 10);
        assert_eq!(config.analysis.context.max_chars, 5000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let file = write_config(".yaml", "analysis: [not, a, map");
        let err = TrailGuardConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid YAML"));
    }

    #[test]
    #[serial_test::serial]
    fn test_env_overrides_file() {
        clear_env();
        unsafe {
            std::env::set_var(API_KEY_ENV, "env-key");
            std::env::set_var("TRAILGUARD_MODEL", "gemini-env-model");
            std::env::set_var("TRAILGUARD_FAILURE_POLICY", "redact");
            std::env::set_var("TRAILGUARD_LOG_FORMAT", "json");
        }

        let file = write_config(".yaml", "analysis:\n  model: gemini-file-model\n");
        let mut config = TrailGuardConfig::from_file(file.path()).unwrap();
        config.merge_env();

        assert_eq!(config.analysis.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.analysis.model, "gemini-env-model");
        assert_eq!(config.masking.failure_policy, FailurePolicy::Redact);
        assert_eq!(config.logging.format, LogFormat::Json);

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_invalid_env_values_keep_defaults() {
        clear_env();
        unsafe {
            std::env::set_var("TRAILGUARD_FAILURE_POLICY", "drop");
            std::env::set_var("TRAILGUARD_LOG_FORMAT", "xml");
        }

        let mut config = TrailGuardConfig::default();
        config.merge_env();

        assert_eq!(config.masking.failure_policy, FailurePolicy::PassThrough);
        assert_eq!(config.logging.format, LogFormat::Text);

        clear_env();
    }

    #[test]
    fn test_gemini_config_requires_key() {
        let mut config = TrailGuardConfig::default();
        assert!(matches!(
            config.gemini_config(),
            Err(AnalysisError::MissingCredential(_))
        ));

        config.analysis.api_key = Some("   ".to_string());
        assert!(config.gemini_config().is_err());

        config.analysis.api_key = Some("key".to_string());
        config.analysis.model = "gemini-pro-latest".to_string();
        let gemini = config.gemini_config().unwrap();
        assert_eq!(gemini.model, "gemini-pro-latest");
        assert_eq!(gemini.api_key, "key");
    }
}
