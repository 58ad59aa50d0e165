// src/pipeline/runner.rs
use super::job::{Job, JobError, JobResult, JobSuccess};
use crate::render::derive_meta;
use async_trait::async_trait;
use log::{debug, warn};
use quire_executor::{BatchTask, Unattempted};
use quire_traits::{RenderOptions, RenderRequest, Renderer};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;

/// Converts the jobs of one batch, one job per [`BatchTask::run`] call.
pub struct JobRunner {
    jobs: Vec<Job>,
    options: RenderOptions,
}

impl JobRunner {
    pub fn new(jobs: Vec<Job>, options: RenderOptions) -> Self {
        Self { jobs, options }
    }
}

#[async_trait]
impl<R: Renderer> BatchTask<R> for JobRunner {
    type Output = JobResult;

    fn job_count(&self) -> usize {
        self.jobs.len()
    }

    async fn run(&self, index: usize, renderer: &mut R) -> JobResult {
        run_job(index, &self.jobs[index], renderer, &self.options).await
    }

    fn unattempted(&self, index: usize, reason: Unattempted) -> JobResult {
        let job = &self.jobs[index];
        JobResult {
            index,
            input: job.input.clone(),
            output: job.output.clone(),
            outcome: Err(reason.into()),
            elapsed: Duration::ZERO,
        }
    }
}

/// Runs a single job to completion and records how long it took, whatever
/// the outcome.
pub async fn run_job<R: Renderer>(
    index: usize,
    job: &Job,
    renderer: &mut R,
    options: &RenderOptions,
) -> JobResult {
    let start = Instant::now();
    let outcome = convert(job, renderer, options).await;
    let elapsed = start.elapsed();

    match &outcome {
        Ok(success) => debug!(
            "Job #{} ({}) wrote {} bytes in {:?}",
            index,
            job.input.display(),
            success.bytes,
            elapsed
        ),
        Err(e) => warn!("Job #{} ({}) failed: {}", index, job.input.display(), e),
    }

    JobResult {
        index,
        input: job.input.clone(),
        output: job.output.clone(),
        outcome,
        elapsed,
    }
}

async fn convert<R: Renderer>(
    job: &Job,
    renderer: &mut R,
    options: &RenderOptions,
) -> Result<JobSuccess, JobError> {
    let source = fs::read_to_string(&job.input)
        .await
        .map_err(JobError::InputUnreadable)?;

    let meta = derive_meta(&source, options)?;

    if let Some(dir) = job.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .map_err(|source| JobError::OutputLocationUnavailable {
                path: dir.to_path_buf(),
                source,
            })?;
    }

    let output = renderer
        .render(RenderRequest {
            source: &source,
            meta: &meta,
            options,
        })
        .await?;

    let mut written = Vec::with_capacity(1 + output.extras.len());
    write_artifact(&job.output, &output.primary).await?;
    written.push(job.output.clone());
    for extra in &output.extras {
        let path = job.output.with_extension(&extra.extension);
        write_artifact(&path, &extra.bytes).await?;
        written.push(path);
    }

    Ok(JobSuccess {
        written,
        bytes: output.total_bytes(),
    })
}

async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), JobError> {
    fs::write(path, bytes)
        .await
        .map_err(|source| JobError::OutputWrite {
            path: PathBuf::from(path),
            source,
        })
}
