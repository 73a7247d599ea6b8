//! Error types for pipeline pagination
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// Opaque error produced by an aggregation engine
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for pipeline pagination
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Validation Errors
    // ============================================================================
    /// Page number below 1. The message is caller-configurable.
    #[error("{message}")]
    InvalidPage { message: String },

    /// Page size below 1 (and not unlimited). The message is caller-configurable.
    #[error("{message}")]
    InvalidLimit { message: String },

    // ============================================================================
    // Execution Errors
    // ============================================================================
    /// Failure raised by the aggregation engine, passed through untouched
    #[error(transparent)]
    Engine(BoxError),

    #[error("Pagination timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ============================================================================
    // Pipeline Errors
    // ============================================================================
    #[error("Invalid pipeline stage: {message}")]
    InvalidStage { message: String },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid page error
    pub fn invalid_page(message: impl Into<String>) -> Self {
        Self::InvalidPage {
            message: message.into(),
        }
    }

    /// Create an invalid limit error
    pub fn invalid_limit(message: impl Into<String>) -> Self {
        Self::InvalidLimit {
            message: message.into(),
        }
    }

    /// Wrap an engine failure without altering it
    pub fn engine(source: impl Into<BoxError>) -> Self {
        Self::Engine(source.into())
    }

    /// Create an invalid stage error
    pub fn invalid_stage(message: impl Into<String>) -> Self {
        Self::InvalidStage {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for rejections raised before any engine call
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidPage { .. } | Error::InvalidLimit { .. })
    }

    /// True when the aggregation engine itself failed
    pub fn is_engine(&self) -> bool {
        matches!(self, Error::Engine(_))
    }

    /// Borrow the original engine error, if this is one
    pub fn engine_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Engine(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias for pipeline pagination
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
