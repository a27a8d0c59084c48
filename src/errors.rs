//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the defect-intelligence core, providing
//! structured error types and conversion utilities for all components.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from client, storage, indexing, and search
//! - **Output**: Structured error types with context and error chains
//! - **Error Categories**: Client, Storage, Index, Configuration
//!
//! ## Key Features
//! - Context-carrying error variants per failure mode
//! - Automatic conversion from library error types
//! - Recoverability classification for fallback decisions
//! - Category labels for structured logging

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, IntakeError>;

/// Error types for the defect-intelligence core
#[derive(Debug, Error)]
pub enum IntakeError {
    /// Network-related errors (timeout, unreachable host, HTTP failure).
    /// Triggers the stale-cache fallback path.
    #[error("network error: {details}")]
    Network { details: String },

    /// Malformed API response; treated as an empty result at the component
    /// boundary, never a session failure
    #[error("failed to parse data from {endpoint}: {details}")]
    Parse { endpoint: String, details: String },

    /// No live data and no cached data exist for the query. Distinct from
    /// `Network` so callers can say "no records" vs "service unavailable"
    #[error("no data available for {context}")]
    NoDataAvailable { context: String },

    /// Offline geo index unreadable or structurally invalid
    #[error("geo index corrupted at {location}: {details}")]
    IndexCorrupted { location: String, details: String },

    /// Embedded database could not be opened
    #[error("database connection failed: {db_path} - {reason}")]
    DatabaseConnection { db_path: String, reason: String },

    /// Embedded database operation errors
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    /// Serialization/deserialization errors
    #[error("serialization failed: {message}")]
    Serialization { message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("validation failed for field '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violations
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl IntakeError {
    /// Check if the error is recoverable (a retry or fallback may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IntakeError::Network { .. } | IntakeError::DatabaseConnection { .. }
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            IntakeError::Network { .. }
            | IntakeError::Parse { .. }
            | IntakeError::NoDataAvailable { .. } => "client",
            IntakeError::Database(_)
            | IntakeError::DatabaseConnection { .. }
            | IntakeError::Serialization { .. } => "storage",
            IntakeError::IndexCorrupted { .. } => "index",
            IntakeError::Config { .. } | IntakeError::ValidationFailed { .. } => "configuration",
            IntakeError::Io(_) | IntakeError::Internal { .. } => "system",
        }
    }
}

// Conversion from common error types
impl From<reqwest::Error> for IntakeError {
    fn from(err: reqwest::Error) -> Self {
        IntakeError::Network {
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for IntakeError {
    fn from(err: serde_json::Error) -> Self {
        IntakeError::Serialization {
            message: format!("JSON serialization error: {}", err),
        }
    }
}

impl From<bincode::Error> for IntakeError {
    fn from(err: bincode::Error) -> Self {
        IntakeError::Serialization {
            message: format!("binary serialization error: {}", err),
        }
    }
}

impl From<toml::de::Error> for IntakeError {
    fn from(err: toml::de::Error) -> Self {
        IntakeError::Config {
            message: format!("TOML parse error: {}", err),
        }
    }
}
