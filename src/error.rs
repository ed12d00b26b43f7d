//! Error types for gateway operations

use thiserror::Error;

/// Gateway operation result type
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Backend operation result type
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised while serving an S3 request
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Bucket segment is not `owner@repo`
    #[error("Invalid bucket format. Expected format: owner@repo")]
    InvalidBucketFormat,

    /// Content backend call failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Listing target resolved to a single file
    #[error("Path is not a directory: {0}")]
    NotADirectory(String),

    /// Request body exceeded the configured limit
    #[error("request entity too large (limit {0} bytes)")]
    PayloadTooLarge(usize),

    /// Request body could not be read
    #[error("Failed to read request body: {0}")]
    Body(String),

    /// XML document could not be rendered
    #[error("XML serialization failed: {0}")]
    Xml(String),
}

impl GatewayError {
    /// True when the backend reported that the path does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Backend(BackendError::NotFound(_)))
    }
}

/// Errors reported by a content backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// Path (or repository) does not exist
    #[error("{0}")]
    NotFound(String),

    /// Any other non-success API response (conflict, rate limit, permissions...)
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Network or protocol failure talking to the backend
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Backend returned content that could not be decoded
    #[error("Failed to decode content: {0}")]
    Decode(String),

    /// Client could not be constructed from its configuration
    #[error("Invalid backend configuration: {0}")]
    Config(String),
}
