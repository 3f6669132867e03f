//! Configuration management
//!
//! This module handles loading, validation, and management of the Plost configuration.
//! Configuration is stored in TOML format at ~/.plost/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **server**: Bind address, port, session lifetime
//! - **storage**: Database file name, uploads directory
//! - **submission**: Field limits, icon size limit, link probe settings
//! - **security**: Password hashing cost
//!
//! # Path Expansion
//!
//! `~` is expanded to the user's home directory and the data and uploads
//! directories are created when missing.
//!
//! # Examples
//!
//! ```no_run
//! use plost_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Listening on {}:{}", config.server.host, config.server.port);
//! println!("Database: {:?}", config.database_path());
//! # Ok(())
//! # }
//! ```

use sdk::errors::MarketError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Submission validation settings
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Password hashing settings
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file name, relative to the data directory
    #[serde(default = "default_database")]
    pub database: String,

    /// Directory for uploaded icons (defaults to `<data_dir>/uploads`)
    #[serde(default)]
    pub uploads_dir: Option<PathBuf>,
}

/// Submission validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Maximum short description length in characters
    #[serde(default = "default_max_short_description")]
    pub max_short_description: usize,

    /// Maximum icon size in bytes
    #[serde(default = "default_max_icon_bytes")]
    pub max_icon_bytes: u64,

    /// Timeout applied to each link probe request
    #[serde(default = "default_link_check_timeout")]
    pub link_check_timeout_secs: u64,

    /// User-Agent sent by the link probe
    #[serde(default = "default_link_check_user_agent")]
    pub link_check_user_agent: String,
}

/// Password hashing configuration (argon2id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Memory cost in KiB
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    /// Number of passes
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Degree of parallelism
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.plost")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_session_ttl() -> u64 {
    86_400
}

fn default_database() -> String {
    "plost.db".to_string()
}

fn default_max_short_description() -> usize {
    180
}

fn default_max_icon_bytes() -> u64 {
    300 * 1024
}

fn default_link_check_timeout() -> u64 {
    10
}

fn default_link_check_user_agent() -> String {
    format!("plost-link-check/{}", env!("CARGO_PKG_VERSION"))
}

// OWASP baseline for argon2id
fn default_memory_kib() -> u32 {
    19_456
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_ttl_secs: default_session_ttl(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            uploads_dir: None,
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_short_description: default_max_short_description(),
            max_icon_bytes: default_max_icon_bytes(),
            link_check_timeout_secs: default_link_check_timeout(),
            link_check_user_agent: default_link_check_user_agent(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl SubmissionConfig {
    /// Link probe timeout as a `Duration`
    pub fn link_check_timeout(&self) -> Duration {
        Duration::from_secs(self.link_check_timeout_secs)
    }
}

impl Config {
    /// Load configuration from the default location (~/.plost/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, TOML parsing fails, or
    /// validation fails.
    pub fn load_or_create() -> Result<Self, MarketError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, MarketError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| MarketError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse, validate and process configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, MarketError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| MarketError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, MarketError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                MarketError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        // Serialize before processing so the file keeps the portable ~ paths
        let default = Self::default_config();
        let toml_string = toml::to_string_pretty(&default)
            .map_err(|e| MarketError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| MarketError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = default;
        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.plost/config.toml)
    fn default_config_path() -> Result<PathBuf, MarketError> {
        let home = dirs::home_dir()
            .ok_or_else(|| MarketError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".plost").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig::default(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            submission: SubmissionConfig::default(),
            security: SecurityConfig::default(),
        }
    }

    /// Configuration rooted at an explicit data directory, already processed
    pub fn with_data_dir(data_dir: &Path) -> Result<Self, MarketError> {
        let mut config = Self::default_config();
        config.core.data_dir = data_dir.to_path_buf();
        config.validate_and_process()?;
        Ok(config)
    }

    /// Absolute path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.core.data_dir.join(&self.storage.database)
    }

    /// Absolute path of the uploads directory
    pub fn uploads_dir(&self) -> PathBuf {
        self.storage
            .uploads_dir
            .clone()
            .unwrap_or_else(|| self.core.data_dir.join("uploads"))
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates the log level and numeric limits
    /// - Expands ~ in paths
    /// - Creates the data and uploads directories if they don't exist
    fn validate_and_process(&mut self) -> Result<(), MarketError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(MarketError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if !(1..=120).contains(&self.submission.link_check_timeout_secs) {
            return Err(MarketError::Config(
                "link_check_timeout_secs must be between 1 and 120".to_string(),
            ));
        }

        if self.submission.max_short_description == 0 || self.submission.max_icon_bytes == 0 {
            return Err(MarketError::Config(
                "submission limits must be greater than zero".to_string(),
            ));
        }

        if self.server.session_ttl_secs == 0 {
            return Err(MarketError::Config(
                "session_ttl_secs must be greater than zero".to_string(),
            ));
        }

        if self.storage.database.trim().is_empty() {
            return Err(MarketError::Config(
                "storage.database must not be empty".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        if let Some(uploads) = &self.storage.uploads_dir {
            self.storage.uploads_dir = Some(expand_path(uploads)?);
        }

        for dir in [self.core.data_dir.clone(), self.uploads_dir()] {
            if !dir.exists() {
                fs::create_dir_all(&dir).map_err(|e| {
                    MarketError::Config(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, MarketError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| MarketError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| MarketError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| MarketError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.submission.max_short_description, 180);
        assert_eq!(config.submission.max_icon_bytes, 300 * 1024);
        assert_eq!(config.storage.database, "plost.db");
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        let expanded = expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let toml = format!(
            "[core]\ndata_dir = {:?}\n\n[server]\nport = 8080\n",
            dir.path().join("data")
        );

        let config = Config::from_toml_str(&toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.submission.link_check_timeout_secs, 10);
        assert!(config.uploads_dir().is_dir());
        assert_eq!(config.database_path(), dir.path().join("data").join("plost.db"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let data_dir = format!("{:?}", dir.path());

        let bad_level = format!("[core]\ndata_dir = {}\nlog_level = \"loud\"\n", data_dir);
        assert!(matches!(
            Config::from_toml_str(&bad_level),
            Err(MarketError::Config(_))
        ));

        let bad_timeout = format!(
            "[core]\ndata_dir = {}\n\n[submission]\nlink_check_timeout_secs = 0\n",
            data_dir
        );
        assert!(Config::from_toml_str(&bad_timeout).is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(config.server.port, deserialized.server.port);
    }
}
