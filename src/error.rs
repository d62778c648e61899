//! Unified error handling for the apuntes crate
//!
//! Every module owns a `thiserror` enum for its own failures. This module
//! wraps them in a single [`Error`] for code that crosses module boundaries
//! (application wiring, background jobs, the binary) and classifies them.
//!
//! # Architecture
//!
//! - [`ApuntesErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use apuntes::error::{ApuntesErrorTrait, Error};
//!
//! fn report(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(category = ?err.category(), "Transient failure: {err}");
//!     } else {
//!         tracing::error!("Fatal error: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::generator::{GenerationError, PromptError};
pub use crate::jobs::JobError;
pub use crate::llm::{AttemptError, ExtractError, LlmError};
pub use crate::schema::ValidationError;
pub use crate::server::ServerError;
pub use crate::storage::StorageError;

/// Common trait for apuntes error types
pub trait ApuntesErrorTrait: std::error::Error {
    /// Whether repeating the operation may succeed
    fn is_recoverable(&self) -> bool;

    /// Error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Generative-text provider failures (network, quota, auth, empty output)
    Provider,
    /// Model output that is not valid JSON or violates a schema
    Validation,
    /// Caller supplied invalid input
    Input,
    /// Unknown identifier
    NotFound,
    /// Persistence failures
    Storage,
    /// Work stopped on request or deadline; not a failure
    Cancelled,
    /// Configuration errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Validation => "validation",
            Self::Input => "input",
            Self::NotFound => "not_found",
            Self::Storage => "storage",
            Self::Cancelled => "cancelled",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

impl ApuntesErrorTrait for ValidationError {
    fn is_recoverable(&self) -> bool {
        true
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

impl ApuntesErrorTrait for LlmError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::EmptyResponse => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Config(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Config,
            _ => ErrorCategory::Provider,
        }
    }
}

impl ApuntesErrorTrait for ExtractError {
    /// The attempt budget is already spent
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        match self.last_error() {
            AttemptError::Provider(e) => e.category(),
            AttemptError::Parse(_) | AttemptError::Validation(_) => ErrorCategory::Validation,
        }
    }
}

impl ApuntesErrorTrait for GenerationError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Outline(e) => e.category(),
            Self::Prompt(_) => ErrorCategory::Other,
            Self::Cancelled(_) => ErrorCategory::Cancelled,
        }
    }
}

impl ApuntesErrorTrait for JobError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTopic => ErrorCategory::Input,
            Self::NotFound(_) => ErrorCategory::NotFound,
        }
    }
}

impl ApuntesErrorTrait for StorageError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

/// Unified error type for the apuntes crate
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Malformed request from an API client
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ApuntesErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Validation(e) => e.is_recoverable(),
            Self::Llm(e) => e.is_recoverable(),
            Self::Extract(e) => e.is_recoverable(),
            Self::Generation(e) => e.is_recoverable(),
            Self::Job(e) => e.is_recoverable(),
            Self::Storage(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Prompt(_)
            | Self::Server(_)
            | Self::Config(_)
            | Self::InvalidRequest(_)
            | Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(e) => e.category(),
            Self::Llm(e) => e.category(),
            Self::Extract(e) => e.category(),
            Self::Generation(e) => e.category(),
            Self::Job(e) => e.category(),
            Self::Storage(e) => e.category(),
            Self::Io(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::InvalidRequest(_) => ErrorCategory::Input,
            Self::Prompt(_) | Self::Server(_) | Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error (configuration loading)
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Config(format!("{err:#}"))
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
