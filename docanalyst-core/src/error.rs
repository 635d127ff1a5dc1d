//! Error types for the docanalyst workflow.
//!
//! The variants mirror the failure taxonomy of a question run: collaborator
//! failures (store unreachable, oracle unavailable, query rejected by the store)
//! are distinct from input problems and from internal invariant breaches, so the
//! orchestrator can name the failing stage and the cause without guessing.

use thiserror::Error;

/// Core error types for the docanalyst framework.
#[derive(Error, Debug)]
pub enum AnalystError {
    /// I/O related errors (configuration files, sockets, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The document store could not be reached.
    #[error("Connectivity error: {message}")]
    Connectivity {
        /// Detailed error message
        message: String,
    },

    /// The language-model oracle failed (transport, auth, malformed envelope).
    #[error("Oracle error: {message}")]
    Oracle {
        /// Detailed error message
        message: String,
    },

    /// The store rejected or failed to run a query.
    #[error("Execution error: {message}")]
    Execution {
        /// Detailed error message
        message: String,
    },

    /// A candidate query does not fit the dialect's grammar.
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax {
        /// Detailed error message
        message: String,
        /// Byte offset into the query text where parsing stopped
        offset: usize,
    },

    /// Configuration validation errors
    #[error("Configuration error: {message}")]
    Configuration {
        /// Detailed error message
        message: String,
    },

    /// The user's question was rejected before any collaborator call.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Detailed error message
        message: String,
    },

    /// An event arrived that the current workflow stage cannot accept.
    #[error("Illegal transition: {event} while {stage}")]
    Transition {
        /// Stage the workflow was in
        stage: String,
        /// Event that was rejected
        event: String,
    },

    /// The caller cancelled the run.
    #[error("Cancelled")]
    Cancelled,

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Internal framework errors
    #[error("Internal error: {message}")]
    Internal {
        /// Detailed error message
        message: String,
    },

    /// Generic errors from external dependencies
    #[error("External error: {source}")]
    External {
        /// The underlying error
        #[source]
        source: anyhow::Error,
    },
}

impl AnalystError {
    /// Create a new connectivity error with a message.
    pub fn connectivity<S: Into<String>>(message: S) -> Self {
        Self::Connectivity {
            message: message.into(),
        }
    }

    /// Create a new oracle error with a message.
    pub fn oracle<S: Into<String>>(message: S) -> Self {
        Self::Oracle {
            message: message.into(),
        }
    }

    /// Create a new execution error with a message.
    pub fn execution<S: Into<String>>(message: S) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Create a new syntax error at a byte offset.
    pub fn syntax<S: Into<String>>(message: S, offset: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            offset,
        }
    }

    /// Create a new configuration error with a message.
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new invalid-input error with a message.
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new transition error.
    pub fn transition(stage: impl std::fmt::Display, event: impl Into<String>) -> Self {
        Self::Transition {
            stage: stage.to_string(),
            event: event.into(),
        }
    }

    /// Create a new internal error with a message.
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a new external error from any error that implements `Into<anyhow::Error>`.
    pub fn external<E: Into<anyhow::Error>>(error: E) -> Self {
        Self::External {
            source: error.into(),
        }
    }

    /// Check if this error is retryable by the *caller*.
    ///
    /// The workflow itself never retries collaborator errors; this only tells a
    /// caller whether re-running the whole question might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connectivity { .. } | Self::Oracle { .. } | Self::RateLimit | Self::Io(_)
        )
    }

    /// Check if this error is a client error (4xx-style).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::Configuration { .. } | Self::Syntax { .. }
        )
    }
}

/// Convert from `anyhow::Error` to `AnalystError`.
impl From<anyhow::Error> for AnalystError {
    fn from(error: anyhow::Error) -> Self {
        Self::External { source: error }
    }
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, AnalystError>;
