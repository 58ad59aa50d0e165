//! Instrumented stub renderers shared by the unit tests of this crate.

use async_trait::async_trait;
use quire_traits::{RenderError, RenderOutput, RenderRequest, Renderer, RendererFactory};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub created: AtomicUsize,
    pub renders: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub dropped: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub(crate) struct StubFactory {
    pub counters: Arc<Counters>,
    pub render_delay: Duration,
    pub create_delay: Duration,
    /// Number of upcoming `create` calls that fail.
    pub failing_creates: AtomicUsize,
    pub failing_shutdowns: bool,
}

impl StubFactory {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            render_delay: Duration::ZERO,
            create_delay: Duration::ZERO,
            failing_creates: AtomicUsize::new(0),
            failing_shutdowns: false,
        }
    }

    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    pub fn failing_creates(self, count: usize) -> Self {
        self.failing_creates.store(count, Ordering::SeqCst);
        self
    }

    pub fn failing_shutdowns(mut self) -> Self {
        self.failing_shutdowns = true;
        self
    }
}

#[async_trait]
impl RendererFactory for StubFactory {
    type Renderer = StubRenderer;

    async fn create(&self) -> Result<StubRenderer, RenderError> {
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        let should_fail = self
            .failing_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(RenderError::Launch("stub engine missing".to_string()));
        }
        let id = self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(StubRenderer {
            id,
            counters: Arc::clone(&self.counters),
            delay: self.render_delay,
            failing_shutdown: self.failing_shutdowns,
        })
    }

    fn primary_extension(&self) -> &'static str {
        "txt"
    }

    fn name(&self) -> &'static str {
        "StubFactory"
    }
}

pub(crate) struct StubRenderer {
    pub id: usize,
    counters: Arc<Counters>,
    delay: Duration,
    failing_shutdown: bool,
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn render(&mut self, request: RenderRequest<'_>) -> Result<RenderOutput, RenderError> {
        self.counters.renders.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(RenderOutput::new(request.source.as_bytes().to_vec()))
    }

    async fn shutdown(self) -> Result<(), RenderError> {
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
        if self.failing_shutdown {
            Err(RenderError::Engine(format!("renderer {} refused to exit", self.id)))
        } else {
            Ok(())
        }
    }
}

impl Drop for StubRenderer {
    fn drop(&mut self) {
        self.counters.dropped.fetch_add(1, Ordering::SeqCst);
    }
}
