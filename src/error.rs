// src/error.rs
use quire_executor::PoolError;
use std::path::PathBuf;
use thiserror::Error;

/// Setup and teardown failures of a conversion run.
///
/// Per-job failures never surface here; they are recorded in the job's
/// [`JobResult`](crate::pipeline::JobResult) instead.
#[derive(Error, Debug)]
pub enum QuireError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input discovery failed for '{path}': {reason}")]
    Discovery { path: PathBuf, reason: String },

    #[error("Renderer pool error: {0}")]
    Pool(#[from] PoolError),
}

impl From<config::ConfigError> for QuireError {
    fn from(e: config::ConfigError) -> Self {
        QuireError::Config(e.to_string())
    }
}
