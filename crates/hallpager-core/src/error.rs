//! Error types for HallPager.

use thiserror::Error;

/// Every fallible operation in the workspace returns this error.
#[derive(Debug, Error)]
pub enum HallPagerError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid call: {0}")]
    Call(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used across HallPager crates.
pub type Result<T> = std::result::Result<T, HallPagerError>;
