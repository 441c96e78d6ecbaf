//! Error types for stream probing

use thiserror::Error;

/// Setup failures. Individual probes never return these; they report
/// `Latency::Unreachable` instead.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid request header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Concurrency limit must be at least 1")]
    ZeroConcurrency,
}
