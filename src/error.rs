use std::path::PathBuf;

use thiserror::Error;

/// Failures that end a single page's export.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Figma API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response has no document for node {key}")]
    MissingDocument { key: String },

    #[error("page {page} timed out after {secs}s")]
    Timeout { page: String, secs: u64 },

    #[error("export task failed: {0}")]
    Task(String),

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<config::ConfigError> for ExportError {
    fn from(e: config::ConfigError) -> Self {
        ExportError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
