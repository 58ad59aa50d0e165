// src/pipeline/summary.rs
use super::job::{JobErrorKind, JobResult};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

/// Success and failure totals for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[JobResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            if result.is_success() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            summary
        })
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Writes one line per job, failures naming their input, followed by a
/// totals line when more than one job ran.
pub fn write_human<W: Write>(results: &[JobResult], out: &mut W) -> io::Result<()> {
    for result in results {
        match &result.outcome {
            Ok(success) => writeln!(
                out,
                "ok      {} -> {} ({} ms)",
                result.input.display(),
                success
                    .written
                    .first()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| result.output.display().to_string()),
                result.elapsed.as_millis()
            )?,
            Err(e) => writeln!(out, "FAILED  {}: {}", result.input.display(), e)?,
        }
    }

    if results.len() > 1 {
        let summary = BatchSummary::from_results(results);
        writeln!(
            out,
            "{} of {} document(s) converted, {} failed",
            summary.succeeded,
            summary.total(),
            summary.failed
        )?;
    }
    Ok(())
}

#[derive(Serialize)]
struct Report<'a> {
    summary: BatchSummary,
    jobs: Vec<JobRecord<'a>>,
}

#[derive(Serialize)]
struct JobRecord<'a> {
    index: usize,
    input: &'a Path,
    output: &'a Path,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<JobErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    written: Option<&'a [std::path::PathBuf]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<u64>,
    elapsed_ms: u64,
}

impl<'a> From<&'a JobResult> for JobRecord<'a> {
    fn from(result: &'a JobResult) -> Self {
        let (status, error_kind, error, written, bytes) = match &result.outcome {
            Ok(success) => (
                "ok",
                None,
                None,
                Some(success.written.as_slice()),
                Some(success.bytes),
            ),
            Err(e) => ("failed", Some(e.kind()), Some(e.to_string()), None, None),
        };
        JobRecord {
            index: result.index,
            input: &result.input,
            output: &result.output,
            status,
            error_kind,
            error,
            written,
            bytes,
            elapsed_ms: result.elapsed.as_millis() as u64,
        }
    }
}

/// Writes a JSON report: the batch summary plus one record per job.
pub fn write_json<W: Write>(results: &[JobResult], out: &mut W) -> io::Result<()> {
    let report = Report {
        summary: BatchSummary::from_results(results),
        jobs: results.iter().map(JobRecord::from).collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::job::{JobError, JobSuccess};
    use std::path::PathBuf;
    use std::time::Duration;

    fn ok(index: usize, name: &str) -> JobResult {
        let output = PathBuf::from(format!("out/{}.pdf", name));
        JobResult {
            index,
            input: PathBuf::from(format!("{}.md", name)),
            output: output.clone(),
            outcome: Ok(JobSuccess {
                written: vec![output],
                bytes: 1024,
            }),
            elapsed: Duration::from_millis(42),
        }
    }

    fn failed(index: usize, name: &str, error: JobError) -> JobResult {
        JobResult {
            index,
            input: PathBuf::from(format!("{}.md", name)),
            output: PathBuf::from(format!("out/{}.pdf", name)),
            outcome: Err(error),
            elapsed: Duration::ZERO,
        }
    }

    fn batch() -> Vec<JobResult> {
        vec![
            ok(0, "a"),
            failed(1, "b", JobError::Cancelled),
            ok(2, "c"),
        ]
    }

    #[test]
    fn test_summary_counts() {
        let results = batch();
        let summary = BatchSummary::from_results(&results);
        assert_eq!(summary, BatchSummary { succeeded: 2, failed: 1 });
        assert_eq!(summary.total(), 3);
        assert!(!summary.is_success());
        assert!(BatchSummary::from_results(&[]).is_success());
    }

    #[test]
    fn test_aggregation_is_repeatable() {
        let results = batch();
        let first = BatchSummary::from_results(&results);
        let second = BatchSummary::from_results(&results);
        assert_eq!(first, second);

        let mut once = Vec::new();
        let mut twice = Vec::new();
        write_human(&results, &mut once).unwrap();
        write_human(&results, &mut twice).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_human_report_names_failed_inputs_and_totals() {
        let mut out = Vec::new();
        write_human(&batch(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "ok      a.md -> out/a.pdf (42 ms)");
        assert_eq!(lines[1], "FAILED  b.md: cancelled before start");
        assert_eq!(lines[3], "2 of 3 document(s) converted, 1 failed");
    }

    #[test]
    fn test_human_report_skips_totals_for_single_job() {
        let mut out = Vec::new();
        write_human(&[ok(0, "solo")], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_json_report() {
        let mut out = Vec::new();
        write_json(&batch(), &mut out).unwrap();
        let report: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(report["summary"]["succeeded"], 2);
        assert_eq!(report["summary"]["failed"], 1);

        let jobs = report["jobs"].as_array().unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0]["status"], "ok");
        assert_eq!(jobs[0]["bytes"], 1024);
        assert_eq!(jobs[0]["elapsed_ms"], 42);
        assert!(jobs[0].get("error_kind").is_none());
        assert_eq!(jobs[1]["index"], 1);
        assert_eq!(jobs[1]["input"], "b.md");
        assert_eq!(jobs[1]["status"], "failed");
        assert_eq!(jobs[1]["error_kind"], "cancelled");
        assert!(jobs[1].get("written").is_none());
    }
}
