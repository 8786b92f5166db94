//! Central error taxonomy for the ticket sniper
//!
//! Internal operations return `SniperError`; the caller-facing engine API
//! folds these into plain booleans and options at its boundary.

use thiserror::Error;

/// High-level error categories for metrics and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// HTTP transport or non-success platform responses
    Network,
    /// Configuration errors
    Configuration,
    /// Payloads that do not have the expected shape
    Parse,
    /// Credential store I/O
    Storage,
    /// Internal system errors
    System,
}

impl ErrorCategory {
    pub fn metric_label(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Storage => "storage",
            ErrorCategory::System => "system",
        }
    }
}

#[derive(Error, Debug)]
pub enum SniperError {
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Parse error: {field}: {message}")]
    Parse { field: String, message: String },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("System error: {message}")]
    System { message: String },
}

impl SniperError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SniperError::Network { .. } => ErrorCategory::Network,
            SniperError::Configuration { .. } => ErrorCategory::Configuration,
            SniperError::Parse { .. } => ErrorCategory::Parse,
            SniperError::Storage { .. } => ErrorCategory::Storage,
            SniperError::System { .. } => ErrorCategory::System,
        }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn network_with_source<S: Into<String>>(message: S, source: reqwest::Error) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn parse<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Parse {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn storage<S: Into<String>>(message: S, source: std::io::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Extension trait to tag transport errors with the call that produced them
pub trait ErrorContext<T> {
    fn network_context<S: Into<String>>(self, message: S) -> Result<T, SniperError>;
}

impl<T> ErrorContext<T> for Result<T, reqwest::Error> {
    fn network_context<S: Into<String>>(self, message: S) -> Result<T, SniperError> {
        self.map_err(|e| SniperError::network_with_source(message, e))
    }
}
