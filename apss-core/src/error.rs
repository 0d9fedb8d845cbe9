//! Error types for apss

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source exhausted: {0}")]
    SourceExhausted(&'static str),

    #[error("Key {key} out of bounds for cardinality {cardinality}")]
    KeyOutOfBounds { key: u32, cardinality: usize },

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, Error>;
