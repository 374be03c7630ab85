//! Error is the `opm-inventory` error type.
use thiserror::Error as ThisError;

/// Error covers inventory Secret encode/decode and Kubernetes API failure.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Kube wraps any Kubernetes API client failure.
    #[error("kubernetes api: {0}")]
    Kube(#[from] kube::Error),
    /// Json wraps inventory body encode/decode failure.
    #[error("inventory body encoding: {0}")]
    Json(#[from] serde_json::Error),
    /// Malformed covers an inventory Secret present but missing its expected
    /// data key or shape.
    #[error("malformed inventory secret: {0}")]
    Malformed(String),
}

/// Result is this crate's fallible return type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
