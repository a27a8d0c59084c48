//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the defect-intelligence core, supporting
//! TOML files and environment variables with validation and type-safe
//! access to all settings.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files (TOML), environment variables
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Type checking, range validation
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (highest priority)
//! 2. Configuration files
//! 3. Default values (lowest priority)
//!
//! ## Usage
//! ```rust
//! use defect_intel::config::Config;
//!
//! let config = Config::from_file("config.toml").unwrap();
//! println!("Cache TTL: {}h", config.cache.ttl_hours);
//! ```

use crate::errors::{IntakeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote data client settings
    pub client: ClientConfig,
    /// Local cache store settings
    pub cache: CacheStoreConfig,
    /// Offline geo index settings
    pub geo_index: GeoIndexConfig,
    /// Flat-file indexer settings
    pub indexer: IndexerConfig,
    /// Search filter behavior
    pub search: SearchConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Remote data client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// vPIC API base URL (VIN decoding, model lists)
    pub vpic_base_url: String,
    /// NHTSA API base URL (recalls, complaints)
    pub nhtsa_base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Local cache store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStoreConfig {
    /// Database file path
    pub db_path: PathBuf,
    /// Freshness window for cached payloads (hours)
    pub ttl_hours: u64,
    /// Enable gzip compression for large payloads
    pub enable_compression: bool,
    /// Payloads at or above this size are compressed (bytes)
    pub compression_threshold_bytes: usize,
}

/// Offline geo index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIndexConfig {
    /// Geo index database path (written only by the indexer)
    pub db_path: PathBuf,
}

/// Flat-file indexer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Path to the extracted ODI FLAT_CMPL.txt dump
    pub input_path: PathBuf,
    /// Log a progress line every N input lines
    pub progress_interval_lines: u64,
}

/// Search filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Result limit when the caller does not pass one
    pub default_limit: usize,
    /// Hard ceiling on caller-requested limits
    pub max_limit: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| IntakeError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| IntakeError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("DEFECT_INTEL_NHTSA_URL") {
            self.client.nhtsa_base_url = url;
        }
        if let Ok(url) = std::env::var("DEFECT_INTEL_VPIC_URL") {
            self.client.vpic_base_url = url;
        }
        if let Ok(path) = std::env::var("DEFECT_INTEL_CACHE_DB") {
            self.cache.db_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("DEFECT_INTEL_GEO_DB") {
            self.geo_index.db_path = PathBuf::from(path);
        }
        if let Ok(ttl) = std::env::var("DEFECT_INTEL_TTL_HOURS") {
            self.cache.ttl_hours = ttl.parse().map_err(|_| IntakeError::Config {
                message: "Invalid hour count in DEFECT_INTEL_TTL_HOURS".to_string(),
            })?;
        }
        if let Ok(level) = std::env::var("DEFECT_INTEL_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.client.timeout_seconds == 0 {
            return Err(IntakeError::ValidationFailed {
                field: "client.timeout_seconds".to_string(),
                reason: "Timeout cannot be zero".to_string(),
            });
        }

        if self.cache.ttl_hours == 0 {
            return Err(IntakeError::ValidationFailed {
                field: "cache.ttl_hours".to_string(),
                reason: "Freshness window cannot be zero".to_string(),
            });
        }

        if self.search.max_limit == 0 {
            return Err(IntakeError::ValidationFailed {
                field: "search.max_limit".to_string(),
                reason: "Result limit must be greater than zero".to_string(),
            });
        }

        if self.search.default_limit > self.search.max_limit {
            return Err(IntakeError::ValidationFailed {
                field: "search.default_limit".to_string(),
                reason: "Default limit cannot exceed the maximum".to_string(),
            });
        }

        Ok(())
    }

    /// Get configuration as a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| IntakeError::Config {
            message: format!("Failed to serialize config to TOML: {}", e),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig {
                vpic_base_url: "https://vpic.nhtsa.dot.gov/api".to_string(),
                nhtsa_base_url: "https://api.nhtsa.gov".to_string(),
                timeout_seconds: 25,
                user_agent: "defect-intel/0.1".to_string(),
            },
            cache: CacheStoreConfig {
                db_path: PathBuf::from("./data/cache.db"),
                ttl_hours: 24,
                enable_compression: true,
                compression_threshold_bytes: 16 * 1024,
            },
            geo_index: GeoIndexConfig {
                db_path: PathBuf::from("./data/geo_state_counts.db"),
            },
            indexer: IndexerConfig {
                input_path: PathBuf::from("./data/FLAT_CMPL.txt"),
                progress_interval_lines: 250_000,
            },
            search: SearchConfig {
                default_limit: 50,
                max_limit: 200,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = Config::default();
        config.client.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_search_limits() {
        let mut config = Config::default();
        config.search.default_limit = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.cache.ttl_hours, config.cache.ttl_hours);
        assert_eq!(parsed.client.nhtsa_base_url, config.client.nhtsa_base_url);
    }
}
