/// Configuration for the schedule ingestion service
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Public download link of the college schedule document.
const DEFAULT_SOURCE_URL: &str = "https://cloud.nntc.nnov.ru/index.php/s/fYpXD39YccFB5gM/download";

const DEFAULT_NOTIFY_MESSAGE: &str =
    "📢 Расписание обновлено! Проверьте актуальное расписание в меню бота.";

/// Placeholder in `convert_command` replaced with the downloaded document path.
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Placeholder in `convert_command` replaced with the expected grid path.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the schedule document is downloaded from
    pub source_url: String,
    /// Directory for downloaded and converted artifacts
    pub data_dir: PathBuf,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Conversion collaborator argv, with `{input}` / `{output}` placeholders
    pub convert_command: Vec<String>,
    pub fetch_timeout_secs: u64,
    pub convert_timeout_secs: u64,
    /// Interval between ingestion cycles
    pub poll_interval_secs: u64,
    pub notify: NotifyConfig,
    pub server: ServerConfig,
}

/// Change notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// When set, one POST per contact is sent here; otherwise deliveries are only logged
    pub webhook_url: Option<String>,
    pub message: String,
    /// Maximum deliveries in flight at once
    pub concurrency: usize,
}

/// Query API bind address
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            data_dir: PathBuf::from("data"),
            database_path: PathBuf::from("data/database.db"),
            convert_command: vec![
                "python3".to_string(),
                "pdf_to_grid.py".to_string(),
                INPUT_PLACEHOLDER.to_string(),
                OUTPUT_PLACEHOLDER.to_string(),
            ],
            fetch_timeout_secs: 60,
            convert_timeout_secs: 120,
            poll_interval_secs: 600,
            notify: NotifyConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            message: DEFAULT_NOTIFY_MESSAGE.to_string(),
            concurrency: 8,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Config {
    /// Loads the configuration from a JSON file.
    ///
    /// A missing file is not an error: every field has a default, so the
    /// service can run unconfigured against the college's public link.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Validate the configuration at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.source_url)
            .map_err(|e| ConfigError::Invalid(format!("source_url: {e}")))?;

        if let Some(webhook) = &self.notify.webhook_url {
            Url::parse(webhook)
                .map_err(|e| ConfigError::Invalid(format!("notify.webhook_url: {e}")))?;
        }

        if self.convert_command.is_empty() {
            return Err(ConfigError::Invalid(
                "convert_command must name a program".to_string(),
            ));
        }

        for (name, value) in [
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("convert_timeout_secs", self.convert_timeout_secs),
            ("poll_interval_secs", self.poll_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }

        if self.notify.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "notify.concurrency must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn convert_timeout(&self) -> Duration {
        Duration::from_secs(self.convert_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Socket address string for the query API.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.address, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_secs(600));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = Config::from_json(
            r#"{ "poll_interval_secs": 300, "notify": { "webhook_url": "http://localhost:9000/send" } }"#,
        )
        .unwrap();

        assert_eq!(config.poll_interval_secs, 300);
        assert_eq!(config.fetch_timeout_secs, 60);
        assert_eq!(config.notify.concurrency, 8);
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.poll_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.source_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.convert_command.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/nntc_schedule.json")).unwrap();
        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
    }
}
