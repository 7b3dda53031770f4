//! Error types for colorbook

use thiserror::Error;

/// Errors raised while activating an artwork or handling engine setup.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Unset or invalid artwork selection / unusable configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing or malformed base image or shape data
    #[error("asset error: {0}")]
    Asset(String),
}

/// Errors from the saved-progress store and codec.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),

    #[error("no saved state for key '{0}'")]
    NotFound(String),

    #[error("saved image is {found_w}×{found_h}, canvas is {expected_w}×{expected_h}")]
    SizeMismatch {
        expected_w: u32,
        expected_h: u32,
        found_w: u32,
        found_h: u32,
    },

    #[error("store unavailable: {0}")]
    Store(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
