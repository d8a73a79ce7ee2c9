//! Error types for the firmware metadata client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FwError {
    #[error("usage: {0}")]
    Usage(String),

    #[error("no {kind} found with {selector}")]
    NotFound { kind: &'static str, selector: String },

    #[error(
        "multiple {kind}s found with {selector} ({}): {}",
        .candidates.len(),
        .candidates.join(", ")
    )]
    Ambiguous {
        kind:       &'static str,
        selector:   String,
        candidates: Vec<String>,
    },

    #[error("invalid arguments for endpoint {endpoint}: missing {missing}")]
    InvalidArguments { endpoint: &'static str, missing: &'static str },

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timestamp {value:?}: {source}")]
    Timestamp {
        value:  String,
        source: chrono::ParseError,
    },

    #[error("decode: {0}")]
    Decode(String),

    #[error("Config: {0}")]
    Config(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl FwError {
    /// True for zero-match and multiple-match resolution failures.
    pub fn is_resolution(&self) -> bool {
        matches!(self, FwError::NotFound { .. } | FwError::Ambiguous { .. })
    }
}

pub type Result<T> = std::result::Result<T, FwError>;
