// src/discovery.rs
use crate::error::QuireError;
use crate::pipeline::Job;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "markdown"];

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| MARKDOWN_EXTENSIONS.iter().any(|m| e.eq_ignore_ascii_case(m)))
}

fn discovery_error(path: &Path, reason: impl Into<String>) -> QuireError {
    QuireError::Discovery {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn markdown_files_in(dir: &Path) -> Result<Vec<PathBuf>, QuireError> {
    let entries = fs::read_dir(dir).map_err(|e| discovery_error(dir, e.to_string()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| discovery_error(dir, e.to_string()))?.path();
        if path.is_file() && is_markdown(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn output_for(input: &Path, out_dir: Option<&Path>, extension: &str) -> PathBuf {
    match (out_dir, input.file_stem()) {
        (Some(dir), Some(stem)) => {
            let mut name = stem.to_os_string();
            name.push(".");
            name.push(extension);
            dir.join(name)
        }
        _ => input.with_extension(extension),
    }
}

/// Expands command line inputs into jobs.
///
/// Files are taken as given; directories contribute their Markdown files
/// (non-recursive, sorted). Each output is `out_dir/<stem>.<extension>`, or
/// the input path with its extension replaced when no `out_dir` is given.
pub fn discover_jobs(
    inputs: &[PathBuf],
    out_dir: Option<&Path>,
    extension: &str,
) -> Result<Vec<Job>, QuireError> {
    let mut jobs = Vec::new();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

    for input in inputs {
        let files = if input.is_dir() {
            let found = markdown_files_in(input)?;
            if found.is_empty() {
                log::warn!("No Markdown files found in {}", input.display());
            }
            found
        } else if input.is_file() {
            vec![input.clone()]
        } else {
            return Err(discovery_error(input, "no such file or directory"));
        };

        for file in files {
            let output = output_for(&file, out_dir, extension);
            if output == file {
                return Err(discovery_error(
                    &file,
                    "output would overwrite the input".to_string(),
                ));
            }
            if let Some(previous) = claimed.insert(output.clone(), file.clone()) {
                return Err(discovery_error(
                    &file,
                    format!(
                        "output '{}' is already produced by '{}'",
                        output.display(),
                        previous.display()
                    ),
                ));
            }
            jobs.push(Job::new(file, output));
        }
    }

    log::debug!("Discovered {} job(s)", jobs.len());
    Ok(jobs)
}
