// Configuration utilities
// Author: Gabriel Demetrios Lafis

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::comm::{Session, DEFAULT_MONITOR_PORT, DEFAULT_PORT};
use super::AppError;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the engine and its monitor listen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    pub monitor_port: u16,
    pub timeout_secs: Option<u64>,
}

/// Project the client connects to on start-up
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            monitor_port: DEFAULT_MONITOR_PORT,
            timeout_secs: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON or YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_lowercase();

        match extension.as_str() {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| AppError::Config(e.to_string())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| AppError::Config(e.to_string())),
            other => Err(AppError::Config(format!(
                "Unsupported config file format: '{}'",
                other
            ))),
        }
    }

    /// Get the log level filter
    pub fn log_level_filter(&self) -> log::LevelFilter {
        match self.logging.level.to_lowercase().as_str() {
            "off" => log::LevelFilter::Off,
            "error" => log::LevelFilter::Error,
            "warn" => log::LevelFilter::Warn,
            "info" => log::LevelFilter::Info,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Info,
        }
    }

    /// Build a session for the configured engine
    pub fn session(&self) -> Session {
        let session = Session::new(&self.engine.host, self.engine.port)
            .with_monitor_port(self.engine.monitor_port);

        match self.engine.timeout_secs {
            Some(secs) => session.with_timeout(Duration::from_secs(secs)),
            None => session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_point_at_local_engine() {
        let config = Config::default();
        let session = config.session();

        assert_eq!(session.host(), "localhost");
        assert_eq!(session.port(), 1708);
        assert_eq!(session.monitor_port(), 1711);
        assert_eq!(config.log_level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn test_yaml_config() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "engine:\n  host: 10.0.0.5\n  port: 2000\n  monitor_port: 2001\n  timeout_secs: 30\nlogging:\n  level: debug").unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.engine.host, "10.0.0.5");
        assert_eq!(config.session().port(), 2000);
        assert_eq!(config.session().timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.log_level_filter(), log::LevelFilter::Debug);
        assert!(config.project.name.is_none());
    }

    #[test]
    fn test_json_config_with_missing_sections() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"project": {{"name": "loans"}}}}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.project.name.as_deref(), Some("loans"));
        assert_eq!(config.engine.port, 1708);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();

        assert!(matches!(Config::from_file(file.path()), Err(AppError::Config(_))));
    }
}
