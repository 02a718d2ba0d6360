//! Compression of used assets through an external service.
//!
//! The service is an opaque [`Compressor`]: bytes in, smaller bytes out, or a
//! typed failure. [`TinifyClient`] talks to the TinyPNG API;
//! [`CompressionOrchestrator`] fans work out over a bounded pool.

pub mod orchestrator;
pub mod tinify;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::CompressionConfig;

pub use orchestrator::{
    CompressionOrchestrator, CompressionOutcome, CompressionRun, COMPRESSED_BACKUP_DIR,
};
pub use tinify::TinifyClient;

/// Why a compression attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressionError {
    #[error("No API key configured (set TINYPNG_API_KEY or compression.api_key)")]
    MissingApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Monthly compression quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("API key rejected: {0}")]
    Unauthorized(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("File error: {0}")]
    Io(String),

    #[error("Compression task panicked: {0}")]
    Panicked(String),
}

/// Result type alias for compression operations.
pub type CompressionResult<T> = Result<T, CompressionError>;

impl CompressionError {
    /// Stable identifier used as `error_kind` in outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            CompressionError::MissingApiKey => "missing-api-key",
            CompressionError::Network(_) => "network",
            CompressionError::QuotaExceeded(_) => "quota-exceeded",
            CompressionError::Unauthorized(_) => "unauthorized",
            CompressionError::UnsupportedFormat(_) => "unsupported-format",
            CompressionError::Service { .. } => "service",
            CompressionError::Io(_) => "io",
            CompressionError::Panicked(_) => "panic",
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            CompressionError::Network(_) => true,
            CompressionError::Service { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CompressionError {
    fn from(err: reqwest::Error) -> Self {
        CompressionError::Network(err.to_string())
    }
}

impl From<std::io::Error> for CompressionError {
    fn from(err: std::io::Error) -> Self {
        CompressionError::Io(err.to_string())
    }
}

/// `compress(bytes) -> bytes`, which may fail.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Compress the contents of `file_name`.
    async fn compress(&self, data: Vec<u8>, file_name: &str) -> CompressionResult<Vec<u8>>;

    /// Compressions used this billing period, if the service reports it.
    fn compression_count(&self) -> Option<u64> {
        None
    }
}

/// Stands in for a client that could not be built. Every call fails with the same error.
#[derive(Debug)]
pub struct UnavailableCompressor {
    error: CompressionError,
}

impl UnavailableCompressor {
    pub fn new(error: CompressionError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl Compressor for UnavailableCompressor {
    async fn compress(&self, _data: Vec<u8>, _file_name: &str) -> CompressionResult<Vec<u8>> {
        Err(self.error.clone())
    }
}

/// The TinyPNG client, or a compressor that records why it is unavailable.
///
/// A missing API key fails each used asset instead of the whole run.
pub fn compressor_from_config(config: &CompressionConfig) -> Arc<dyn Compressor> {
    match TinifyClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            tracing::error!("Compression unavailable: {}", err);
            Arc::new(UnavailableCompressor::new(err))
        }
    }
}
