//! Error taxonomy shared by the control-plane services.
//!
//! Every failure that can reach an API caller is one of four codes. The HTTP
//! layer maps them onto status codes and the JSON error envelope
//! (see `http::response`).

use axum::http::StatusCode;
use thiserror::Error;

use crate::store::StoreError;

/// Errors produced by control-plane operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// Malformed or missing input. Always fixable by the client.
    #[error("{0}")]
    Validation(String),

    /// Missing or incorrect node token / admin key.
    #[error("{0}")]
    Unauthorized(String),

    /// Unknown node, template or subscription.
    #[error("{0}")]
    NotFound(String),

    /// Server misconfiguration, e.g. no admin key configured.
    #[error("{0}")]
    Config(String),

    /// The document store failed. Not retried here.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl HubError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wire code used in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            HubError::Validation(_) => "VALIDATION",
            HubError::Unauthorized(_) => "UNAUTHORIZED",
            HubError::NotFound(_) => "NOT_FOUND",
            HubError::Config(_) | HubError::Store(_) => "CONFIG_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HubError::Validation(_) => StatusCode::BAD_REQUEST,
            HubError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HubError::NotFound(_) => StatusCode::NOT_FOUND,
            HubError::Config(_) | HubError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type for control-plane operations.
pub type HubResult<T> = Result<T, HubError>;
