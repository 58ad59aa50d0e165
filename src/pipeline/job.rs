// src/pipeline/job.rs
use crate::render::MetaError;
use quire_executor::Unattempted;
use quire_traits::RenderError;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// One document to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub input: PathBuf,
    /// Path of the primary artifact. Extra artifacts are written next to it.
    pub output: PathBuf,
}

impl Job {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Why a single job failed.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("no renderer available: {0}")]
    RendererUnavailable(String),

    #[error("cancelled before start")]
    Cancelled,

    #[error("cannot read input: {0}")]
    InputUnreadable(#[source] io::Error),

    #[error("invalid document metadata: {0}")]
    InvalidMetadata(#[from] MetaError),

    #[error("cannot create output directory '{}': {source}", .path.display())]
    OutputLocationUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("cannot write '{}': {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("worker terminated before the job finished")]
    Aborted,
}

/// Machine-readable classification of a [`JobError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    RendererUnavailable,
    Cancelled,
    InputUnreadable,
    InvalidMetadata,
    OutputLocationUnavailable,
    RenderFailed,
    OutputWriteFailed,
    Aborted,
}

impl JobError {
    pub fn kind(&self) -> JobErrorKind {
        match self {
            JobError::RendererUnavailable(_) => JobErrorKind::RendererUnavailable,
            JobError::Cancelled => JobErrorKind::Cancelled,
            JobError::InputUnreadable(_) => JobErrorKind::InputUnreadable,
            JobError::InvalidMetadata(_) => JobErrorKind::InvalidMetadata,
            JobError::OutputLocationUnavailable { .. } => JobErrorKind::OutputLocationUnavailable,
            JobError::Render(_) => JobErrorKind::RenderFailed,
            JobError::OutputWrite { .. } => JobErrorKind::OutputWriteFailed,
            JobError::Aborted => JobErrorKind::Aborted,
        }
    }
}

impl From<Unattempted> for JobError {
    fn from(reason: Unattempted) -> Self {
        match reason {
            Unattempted::Cancelled => JobError::Cancelled,
            Unattempted::RendererUnavailable(reason) => JobError::RendererUnavailable(reason),
            Unattempted::WorkerAborted => JobError::Aborted,
        }
    }
}

/// What a successful job left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSuccess {
    /// Every file written, primary artifact first.
    pub written: Vec<PathBuf>,
    /// Total bytes across all written files.
    pub bytes: u64,
}

/// The outcome of one job, stored at the job's index in the batch.
#[derive(Debug)]
pub struct JobResult {
    pub index: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: Result<JobSuccess, JobError>,
    pub elapsed: Duration,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.outcome.as_ref().err()
    }
}
