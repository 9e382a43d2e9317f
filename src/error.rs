use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MdexError {
    #[error("error getting {url}: {message}")]
    Transport { url: String, message: String },

    #[error("error getting {url}: {status}")]
    Remote { url: String, status: String },

    #[error("error getting {url}: not an image ({content_type})")]
    UnexpectedContentType { url: String, content_type: String },

    #[error("chapter {0} is empty")]
    EmptyUnit(String),

    #[error("chapter {unit}: no page arrived within {window_ms} ms")]
    Timeout { unit: String, window_ms: u128 },

    #[error("page worker of chapter {0} exited without reporting")]
    WorkerLost(String),

    #[error("chapter {unit}: failed to start worker thread: {message}")]
    Spawn { unit: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid MangaDex id or url: {0}")]
    InvalidId(String),

    #[error("MangaDex request failed: {0}")]
    MangadexHttp(String),

    #[error("MangaDex returned status {status}: {message}")]
    MangadexStatus { status: u16, message: String },

    #[error("failed to parse MangaDex response: {0}")]
    MangadexParse(String),
}

impl MdexError {
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            MdexError::Config(_)
                | MdexError::ConfigRead(_)
                | MdexError::ConfigParse(_)
                | MdexError::InvalidId(_)
        )
    }
}
