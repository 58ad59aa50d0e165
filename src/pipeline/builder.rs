// src/pipeline/builder.rs
use super::job::{Job, JobResult};
use super::runner::JobRunner;
use super::summary::BatchSummary;
use crate::error::QuireError;
use log::info;
use quire_executor::{BatchExecutor, CancelToken, RendererPool};
use quire_traits::{RenderOptions, RendererFactory};
use std::sync::Arc;
use std::time::Instant;

/// A builder for creating a [`Converter`].
#[derive(Debug, Clone, Default)]
pub struct ConverterBuilder {
    concurrency: usize,
    options: RenderOptions,
}

impl ConverterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of pooled renderers. `0` picks one per two logical CPUs.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the render configuration shared by every job of every batch.
    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Consumes the builder and creates the `Converter`. No renderer is
    /// started until the first batch needs one.
    pub fn build<F: RendererFactory>(self, factory: F) -> Converter<F> {
        let size = resolve_concurrency(self.concurrency);
        info!(
            "Converter using {} with up to {} renderer(s).",
            factory.name(),
            size
        );
        Converter {
            pool: Arc::new(RendererPool::new(factory, size)),
            options: self.options,
        }
    }
}

/// Resolves a requested pool size, where `0` means automatic.
pub fn resolve_concurrency(requested: usize) -> usize {
    if requested == 0 {
        (num_cpus::get() / 2).max(1)
    } else {
        requested
    }
}

/// The outcome of one batch: results in job order plus their totals.
#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<JobResult>,
    pub summary: BatchSummary,
}

/// Converts batches of documents through a pool of renderers.
pub struct Converter<F: RendererFactory> {
    pool: Arc<RendererPool<F>>,
    options: RenderOptions,
}

impl<F: RendererFactory> Converter<F> {
    pub fn pool(&self) -> &Arc<RendererPool<F>> {
        &self.pool
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Runs one batch. Never fails as a whole: every job gets a result.
    pub async fn convert(&self, jobs: Vec<Job>, cancel: &CancelToken) -> BatchReport {
        let start = Instant::now();
        let runner = Arc::new(JobRunner::new(jobs, self.options.clone()));
        let results = BatchExecutor::run(&self.pool, runner, cancel).await;
        let summary = BatchSummary::from_results(&results);
        info!(
            "Batch finished in {:?}: {} succeeded, {} failed.",
            start.elapsed(),
            summary.succeeded,
            summary.failed
        );
        BatchReport { results, summary }
    }

    /// Tears down every renderer the pool created.
    pub async fn shutdown(self) -> Result<(), QuireError> {
        self.pool.close().await?;
        Ok(())
    }
}
