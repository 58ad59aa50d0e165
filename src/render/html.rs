//! A renderer without an external engine: the primary artifact is the
//! composed HTML page itself.

use super::markdown::compose_page;
use async_trait::async_trait;
use log::debug;
use quire_traits::{RenderError, RenderOutput, RenderRequest, Renderer, RendererFactory};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct HtmlRendererFactory {
    next_id: AtomicUsize,
}

impl HtmlRendererFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RendererFactory for HtmlRendererFactory {
    type Renderer = HtmlRenderer;

    async fn create(&self) -> Result<HtmlRenderer, RenderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("[HTML] Created renderer #{}.", id);
        Ok(HtmlRenderer { id, rendered: 0 })
    }

    fn primary_extension(&self) -> &'static str {
        "html"
    }

    fn name(&self) -> &'static str {
        "HtmlRendererFactory"
    }
}

#[derive(Debug)]
pub struct HtmlRenderer {
    id: usize,
    rendered: usize,
}

#[async_trait]
impl Renderer for HtmlRenderer {
    async fn render(&mut self, request: RenderRequest<'_>) -> Result<RenderOutput, RenderError> {
        let page = compose_page(request)?;
        self.rendered += 1;
        Ok(RenderOutput::new(page.into_bytes()))
    }

    async fn shutdown(self) -> Result<(), RenderError> {
        debug!(
            "[HTML] Renderer #{} shut down after {} document(s).",
            self.id, self.rendered
        );
        Ok(())
    }
}
