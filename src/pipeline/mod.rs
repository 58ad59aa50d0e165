//! The batch conversion pipeline.
//!
//! A [`Converter`] owns a renderer pool and turns an ordered list of [`Job`]s
//! into exactly one [`JobResult`] per job, in the same order. Failures are
//! recorded per job; the batch itself never aborts.

pub mod builder;
pub mod job;
pub mod runner;
pub mod summary;

pub use builder::{BatchReport, Converter, ConverterBuilder, resolve_concurrency};
pub use job::{Job, JobError, JobErrorKind, JobResult, JobSuccess};
pub use runner::{JobRunner, run_job};
pub use summary::{BatchSummary, write_human, write_json};
