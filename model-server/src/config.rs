use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{Result, ServerError};
use crate::selector::CheckpointSelector;

/// Environment variable naming the experiment root
pub const EXPERIMENT_PATH_ENV: &str = "EXPERIMENT_PATH";

/// Main configuration for the model server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub experiment: ExperimentConfig,
    pub predictor: PredictorConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where checkpoints are read from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Experiment root; `EXPERIMENT_PATH` takes precedence when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

/// External predictor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Program run once per prediction
    pub program: String,
    /// Arguments placed before the checkpoint flags
    #[serde(default)]
    pub args: Vec<String>,
    /// Number of candidates requested per prediction
    pub top_n: usize,
    /// Upper bound on a single predictor call
    pub timeout_secs: u64,
    /// Selector used when a predict request omits date/epoch/step.
    /// Unset means such requests are rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_selector: Option<CheckpointSelector>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub log_to_file: bool,
    /// Directory for the rolling `access.log`; defaults to `~/.seq2seq/logs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            experiment: ExperimentConfig::default(),
            predictor: PredictorConfig {
                program: "seq2seq-predict".to_string(),
                args: Vec::new(),
                top_n: 3,
                timeout_secs: 120,
                default_selector: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                log_to_file: true,
                log_dir: None,
            },
        }
    }
}

impl Config {
    /// Get default configuration file path: `~/.seq2seq/model-server.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ServerError::Config("Cannot determine home directory".into()))?;
        Ok(home.join(".seq2seq").join("model-server.toml"))
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "Loading configuration");

        let content = std::fs::read_to_string(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to read config file");
            e
        })?;

        let config: Config = toml::from_str(&content)?;

        config.validate()?;

        tracing::info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Apply `EXPERIMENT_PATH` from the process environment
    pub fn apply_env(&mut self) {
        self.apply_experiment_path(std::env::var_os(EXPERIMENT_PATH_ENV).map(PathBuf::from));
    }

    fn apply_experiment_path(&mut self, value: Option<PathBuf>) {
        if let Some(root) = value.filter(|p| !p.as_os_str().is_empty()) {
            self.experiment.root = Some(root);
        }
    }

    /// Resolve the experiment root. It must be set and be an existing
    /// directory; there is no fallback.
    pub fn experiment_root(&self) -> Result<PathBuf> {
        let root = self.experiment.root.as_ref().ok_or_else(|| {
            ServerError::ExperimentRoot(format!(
                "set {} or experiment.root in the config file",
                EXPERIMENT_PATH_ENV
            ))
        })?;

        let meta = std::fs::metadata(root).map_err(|e| {
            ServerError::ExperimentRoot(format!("{}: {}", root.display(), e))
        })?;
        if !meta.is_dir() {
            return Err(ServerError::ExperimentRoot(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        Ok(root.clone())
    }

    pub fn predict_timeout(&self) -> Duration {
        Duration::from_secs(self.predictor.timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.predictor.program.trim().is_empty() {
            return Err(ServerError::Config("predictor.program must not be empty".into()));
        }

        if self.predictor.top_n == 0 || self.predictor.top_n > 100 {
            return Err(ServerError::Config(
                "predictor.top_n must be between 1 and 100".into(),
            ));
        }

        if self.predictor.timeout_secs == 0 {
            return Err(ServerError::Config(
                "predictor.timeout_secs must be at least 1".into(),
            ));
        }

        if let Some(selector) = &self.predictor.default_selector {
            selector
                .validate()
                .map_err(|e| ServerError::Config(format!("predictor.default_selector: {}", e)))?;
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ServerError::Config(
                    "log level must be one of: trace, debug, info, warn, error".into(),
                ))
            }
        }

        Ok(())
    }

    /// Save configuration to file (atomic write)
    pub fn save(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                tracing::error!(
                    path = %parent.display(),
                    error = %e,
                    "Failed to create config directory"
                );
                e
            })?;
        }

        let toml_string = toml::to_string_pretty(self)?;

        let temp_path = path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &toml_string).map_err(|e| {
            tracing::error!(
                path = %temp_path.display(),
                error = %e,
                "Failed to write temp config file"
            );
            e
        })?;

        std::fs::rename(&temp_path, path).map_err(|e| {
            tracing::error!(
                from = %temp_path.display(),
                to = %path.display(),
                error = %e,
                "Failed to rename temp config file"
            );
            e
        })?;

        tracing::info!(path = %path.display(), "Configuration saved successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.predictor.top_n, 3);
        assert!(config.predictor.default_selector.is_none());
        assert!(config.experiment.root.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_top_n() {
        let mut config = Config::default();
        config.predictor.top_n = 0;
        assert!(config.validate().is_err());

        config.predictor.top_n = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_timeout_and_program() {
        let mut config = Config::default();
        config.predictor.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.predictor.program = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_default_selector() {
        let mut config = Config::default();
        config.predictor.default_selector = Some(CheckpointSelector::new("../x", "1", "s"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_experiment_root_is_fatal() {
        let config = Config::default();
        assert!(matches!(
            config.experiment_root(),
            Err(ServerError::ExperimentRoot(_))
        ));
    }

    #[test]
    fn test_nonexistent_experiment_root_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.experiment.root = Some(temp_dir.path().join("gone"));
        assert!(config.experiment_root().is_err());
    }

    #[test]
    fn test_file_experiment_root_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();

        let mut config = Config::default();
        config.experiment.root = Some(file);
        assert!(config.experiment_root().is_err());
    }

    #[test]
    fn test_experiment_path_override() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.experiment.root = Some(PathBuf::from("/from/file"));

        config.apply_experiment_path(Some(temp_dir.path().to_path_buf()));
        assert_eq!(config.experiment_root().unwrap(), temp_dir.path());

        // An empty value does not clear a configured root.
        config.apply_experiment_path(Some(PathBuf::new()));
        assert_eq!(config.experiment.root.as_deref(), Some(temp_dir.path()));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("model-server.toml");

        let mut original = Config::default();
        original.predictor.default_selector =
            Some(CheckpointSelector::new("2018_05_24", "300", "2018_05_24_23_11_33_S5400"));
        original.save(&config_path).expect("save should succeed");

        assert!(config_path.exists());

        let loaded = Config::load(&config_path).expect("load should succeed");

        assert_eq!(original.server.port, loaded.server.port);
        assert_eq!(original.predictor.program, loaded.predictor.program);
        assert_eq!(original.predictor.default_selector, loaded.predictor.default_selector);
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("model-server.toml");

        Config::default().save(&config_path).unwrap();

        let temp_path = config_path.with_extension("toml.tmp");
        assert!(!temp_path.exists(), "Temp file should be cleaned up");
    }

    #[test]
    fn test_load_or_default_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_or_default(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.predictor.top_n, 3);
    }

    #[test]
    fn test_default_path() {
        let path = Config::default_path().unwrap();
        assert!(path.to_string_lossy().contains(".seq2seq"));
        assert!(path.to_string_lossy().ends_with("model-server.toml"));
    }
}
