//! Animation error types

use thiserror::Error;

/// Errors raised while building or driving animations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnimationError {
    /// A builder was given a configuration it cannot accept
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No evaluator was supplied and none is registered for the value type
    #[error("No evaluator registered for type {type_name}")]
    NoEvaluatorFound { type_name: &'static str },

    /// An operation was called in a lifecycle state that forbids it
    #[error("Illegal state: {0}")]
    IllegalState(String),
}

impl AnimationError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}

/// Result type for animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;
