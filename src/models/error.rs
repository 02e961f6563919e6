// HostSync - Error Types
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Shared error types for HostSync.

use thiserror::Error;

/// Result type alias for HostSync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for HostSync operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================
    // External Command Errors
    // ========================================
    #[error("Command failed: {program} exited with {code:?}: {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Command timed out after {secs}s: {program}")]
    CommandTimeout { program: String, secs: u64 },

    #[error("Failed to spawn {program}: {reason}")]
    CommandSpawn { program: String, reason: String },

    #[error("Service is not running: {0}")]
    ServiceNotRunning(String),

    // ========================================
    // Validation Errors
    // ========================================
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("The mtu must be an integer in {min} - {max} range.")]
    InvalidMtu { min: u32, max: u32 },

    #[error("Connection name ({0}) is already in use. Choose a different name.")]
    DuplicateName(String),

    #[error("Unknown network device ({0}).")]
    UnknownDevice(String),

    #[error("Unsupported {kind} profile ({profile}). Supported ones include: ({supported}).")]
    UnsupportedProfile {
        kind: String,
        profile: String,
        supported: String,
    },

    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    // ========================================
    // Lookup Errors
    // ========================================
    #[error("Network connection ({0}) does not exist.")]
    ConnectionNotFound(String),

    #[error("Application ({0}) does not exist.")]
    AppNotFound(String),

    // ========================================
    // State Transition Errors
    // ========================================
    #[error("Another application is in state transition ({0}). Try again later.")]
    PendingTransition(String),

    #[error("Application ({app}) is {state}: {reason}")]
    InvalidAppState {
        app: String,
        state: String,
        reason: String,
    },

    // ========================================
    // Storage Errors
    // ========================================
    #[error("Failed to read configuration: {0}")]
    ConfigReadFailed(String),

    #[error("Failed to write configuration: {0}")]
    ConfigWriteFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseFailed(String),

    #[error("Failed to parse state: {0}")]
    StateParseFailed(String),

    // ========================================
    // System Errors
    // ========================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new command failed error.
    pub fn command_failed(
        program: impl Into<String>,
        code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            program: program.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Exit code of a failed command, if this is one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { code, .. } => *code,
            _ => None,
        }
    }

    /// Check if the external tool reported that its target no longer exists.
    pub fn is_vanished(&self, vanished_code: i32) -> bool {
        self.exit_code() == Some(vanished_code)
    }

    /// Check if this error was raised by input validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed(_)
                | Self::InvalidMtu { .. }
                | Self::DuplicateName(_)
                | Self::UnknownDevice(_)
                | Self::UnsupportedProfile { .. }
                | Self::InvalidIpAddress(_)
        )
    }

    /// Response body for the administrative API.
    ///
    /// The first element is always the human-readable message.
    pub fn response_body(&self) -> serde_json::Value {
        let mut body = vec![serde_json::Value::String(self.to_string())];
        if let Self::CommandFailed { stderr, .. } = self {
            if !stderr.is_empty() {
                body.push(serde_json::Value::String(stderr.clone()));
            }
        }
        serde_json::Value::Array(body)
    }
}

// Convert from toml parse errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

// Convert from toml serialize errors
impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigWriteFailed(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::StateParseFailed(err.to_string())
    }
}
