//! # Error Types Module
//!
//! This module defines the error types used throughout the bot.
//! Storage failures never surface here: the ban store logs them and
//! reports a negative result instead.

use thiserror::Error;

/// Startup configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),
    #[error("environment variable {key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Outbound delivery errors reported by a messenger
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The request timed out and may succeed when retried
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Telegram refused the media caption as too long
    #[error("message caption is too long")]
    CaptionTooLong,
    /// Any other Bot API rejection
    #[error("telegram api error: {0}")]
    Api(String),
    /// Transport failure other than a timeout
    #[error("network error: {0}")]
    Network(String),
}

impl SendError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SendError::Timeout(_))
    }
}

/// Errors raised while relaying a submission to the review channel
#[derive(Debug, Error)]
pub enum RelayError {
    /// A chunk kept timing out after every retry
    #[error("delivery of chunk {chunk} timed out after {attempts} attempts")]
    DeliveryTimeout { chunk: usize, attempts: u32 },
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Malformed inline button payloads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("unknown payload prefix in {0:?}")]
    UnknownPrefix(String),
    #[error("unknown decision {0:?}")]
    UnknownDecision(String),
    #[error("invalid user id {0:?}")]
    InvalidUserId(String),
}
