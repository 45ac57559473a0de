// src/error.rs
//! Error types for the GGA monitor

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GgaError>;

#[derive(Debug, Error)]
pub enum GgaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Error: {0}")]
    Other(String),
}
