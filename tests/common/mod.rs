#![allow(dead_code)]

use async_trait::async_trait;
use quire::{Job, RenderError, Renderer, RendererFactory};
use quire_traits::{RenderOutput, RenderRequest};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Call counters shared between a [`CountingFactory`] and its renderers.
#[derive(Debug, Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub renders: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl Counters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

/// A factory whose renderers echo the document source after a delay.
///
/// A source containing a line `delay: <ms>` overrides the delay for that
/// document.
pub struct CountingFactory {
    pub counters: Arc<Counters>,
    render_delay: Duration,
    broken: bool,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            render_delay: Duration::ZERO,
            broken: false,
        }
    }

    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }

    /// Every `create` call fails, as if the engine binary were missing.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

#[async_trait]
impl RendererFactory for CountingFactory {
    type Renderer = CountingRenderer;

    async fn create(&self) -> Result<CountingRenderer, RenderError> {
        if self.broken {
            return Err(RenderError::Launch("engine binary not found".to_string()));
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(CountingRenderer {
            counters: Arc::clone(&self.counters),
            delay: self.render_delay,
        })
    }

    fn primary_extension(&self) -> &'static str {
        "out"
    }

    fn name(&self) -> &'static str {
        "CountingFactory"
    }
}

pub struct CountingRenderer {
    counters: Arc<Counters>,
    delay: Duration,
}

fn delay_override(source: &str) -> Option<Duration> {
    source
        .lines()
        .find_map(|line| line.strip_prefix("delay: "))
        .and_then(|ms| ms.trim().parse().ok())
        .map(Duration::from_millis)
}

#[async_trait]
impl Renderer for CountingRenderer {
    async fn render(&mut self, request: RenderRequest<'_>) -> Result<RenderOutput, RenderError> {
        self.counters.renders.fetch_add(1, Ordering::SeqCst);
        let delay = delay_override(request.source).unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(RenderOutput::new(request.source.as_bytes().to_vec()))
    }

    async fn shutdown(self) -> Result<(), RenderError> {
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A temporary directory holding Markdown inputs and an output directory.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn out_dir(&self) -> PathBuf {
        self.path().join("out")
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, contents).expect("write input");
        path
    }

    /// Writes `count` documents named `doc-<i>.md` and returns one job each.
    pub fn jobs(&self, count: usize, extension: &str) -> Vec<Job> {
        (0..count)
            .map(|i| {
                let input = self.write(&format!("doc-{}.md", i), &format!("# Document {}\n", i));
                Job::new(input, self.out_dir().join(format!("doc-{}.{}", i, extension)))
            })
            .collect()
    }
}
