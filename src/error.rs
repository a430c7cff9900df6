//! Error types for routewatch.
//!
//! This module defines the error types used throughout routewatch, providing
//! rich error information for debugging and user feedback.

use std::path::PathBuf;
use thiserror::Error;

use crate::diff::ChangeSummary;

/// Result type alias for routewatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for routewatch.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Device / Platform Errors
    // ========================================================================
    /// No parser exists for the device's platform tag.
    #[error("Unknown platform '{platform}' for device '{device}'. Valid options: cisco, juniper, huawei")]
    UnknownPlatform {
        /// Device hostname
        device: String,
        /// The unrecognized platform tag
        platform: String,
    },

    /// Device not present in the configured inventory.
    #[error("Device '{0}' not found in inventory")]
    DeviceNotFound(String),

    /// Command output could not be obtained for a device.
    #[error("Failed to run '{command}' on '{device}': {message}")]
    CommandFailed {
        /// Device hostname
        device: String,
        /// The command that failed
        command: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Collection Errors
    // ========================================================================
    /// A collection cycle for one device failed.
    #[error("Collection from '{device}' failed: {message}")]
    CollectionFailed {
        /// Device hostname
        device: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Generic storage failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Change counters or change records could not be persisted. The
    /// computed delta is carried so callers can still log it.
    #[error("Failed to persist change results: {message}")]
    ChangePersist {
        /// Error message
        message: String,
        /// The summary computed before the write failed
        summary: ChangeSummary,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    // ========================================================================
    // IO / Serialization Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// CSV writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new command failure error.
    pub fn command_failed(
        device: impl Into<String>,
        command: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            device: device.into(),
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates a new collection failure error.
    pub fn collection_failed(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CollectionFailed {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Returns the computed change summary if this error still carries one.
    pub fn change_summary(&self) -> Option<&ChangeSummary> {
        match self {
            Error::ChangePersist { summary, .. } => Some(summary),
            _ => None,
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::CollectionFailed { .. } | Error::CommandFailed { .. } => 2,
            Error::UnknownPlatform { .. } | Error::DeviceNotFound(_) => 3,
            Error::Config(_) | Error::ConfigFileNotFound(_) => 4,
            Error::Storage(_) | Error::ChangePersist { .. } => 5,
            _ => 1,
        }
    }
}
