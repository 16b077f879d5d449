//! Core error types for the answer-sheet pipeline.
//!
//! The inference core itself never fails: missing geometry, ambiguous table
//! structure and under-detection all degrade to abstentions or gap-filling.
//! These types cover the edges around it, namely configuration validation and
//! reading OCR results or configuration from disk.

use thiserror::Error;

/// Enum representing different stages at which an edge operation can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Reading or decoding an OCR result.
    InputDecoding,
    /// Reading or decoding a configuration document.
    ConfigLoading,
    /// Parsing an answer key.
    AnswerKey,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::InputDecoding => write!(f, "input decoding"),
            ProcessingStage::ConfigLoading => write!(f, "config loading"),
            ProcessingStage::AnswerKey => write!(f, "answer key parsing"),
        }
    }
}

/// Errors raised around the inference core.
#[derive(Error, Debug)]
pub enum OMRError {
    /// Error occurred while decoding a document.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// JSON (de)serialization error.
    #[error("json")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results of fallible edge operations.
pub type OmrResult<T> = Result<T, OMRError>;

impl From<crate::core::config::ConfigError> for OMRError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

impl OMRError {
    /// Creates an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Wraps an error that occurred while decoding a document at `path`.
    pub fn decoding(
        kind: ProcessingStage,
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: path.into(),
            source: Box::new(source),
        }
    }
}
