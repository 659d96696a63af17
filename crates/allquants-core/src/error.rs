//! Error types for AllQuants.
//!
//! Every fallible operation in the library returns [`AllQuantsError`]. The
//! [`ErrorCategory`] of an error decides how the workflow and the CLI react:
//! validation and precondition failures abort before or at the affected step,
//! process failures carry the captured diagnostic text, and cancellation is
//! turned into a graceful stop instead of a failure.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the AllQuants library.
#[derive(Debug, Error)]
pub enum AllQuantsError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Hub API error: {message}")]
    HubApi {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Model card template not found at {0}")]
    TemplateNotFound(PathBuf),

    #[error("{tool} not found (looked for: {})", display_paths(.searched))]
    MissingTool { tool: String, searched: Vec<PathBuf> },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // External process errors
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("GGUF conversion failed: {message}")]
    ConversionFailed { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // User interaction
    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Interrupted by user")]
    Cancelled,

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for AllQuants operations.
pub type Result<T> = std::result::Result<T, AllQuantsError>;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coarse classification used for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any work begins (e.g. malformed model id).
    Validation,
    /// A required file or executable is missing.
    Precondition,
    /// An external process could not be launched or reported failure.
    Process,
    /// The hub or the network failed.
    Network,
    /// The user interrupted the run.
    Cancelled,
    /// Everything else.
    Internal,
}

impl From<std::io::Error> for AllQuantsError {
    fn from(err: std::io::Error) -> Self {
        AllQuantsError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for AllQuantsError {
    fn from(err: serde_json::Error) -> Self {
        AllQuantsError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for AllQuantsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AllQuantsError::Timeout(std::time::Duration::from_secs(0))
        } else {
            AllQuantsError::Network {
                message: err.to_string(),
                cause: Some(err.to_string()),
            }
        }
    }
}

impl AllQuantsError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        AllQuantsError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create an IO error describing what was being done at `path`.
    pub fn io(context: &str, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        AllQuantsError::Io {
            message: format!("{context}: {err}"),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Shorthand for a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AllQuantsError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AllQuantsError::Validation { .. } => ErrorCategory::Validation,

            AllQuantsError::FileNotFound(_)
            | AllQuantsError::TemplateNotFound(_)
            | AllQuantsError::MissingTool { .. } => ErrorCategory::Precondition,

            AllQuantsError::Spawn { .. } | AllQuantsError::ConversionFailed { .. } => {
                ErrorCategory::Process
            }

            AllQuantsError::Network { .. }
            | AllQuantsError::Timeout(_)
            | AllQuantsError::HubApi { .. }
            | AllQuantsError::DownloadFailed { .. } => ErrorCategory::Network,

            AllQuantsError::Cancelled => ErrorCategory::Cancelled,

            _ => ErrorCategory::Internal,
        }
    }

    /// Whether this error represents a user interrupt.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AllQuantsError::Cancelled)
    }
}
