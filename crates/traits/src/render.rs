//! Renderer traits for abstracting the external rendering engine.
//!
//! A [`Renderer`] is one expensive, reusable unit of rendering capability
//! (typically one browser process). Renderers are produced on demand by a
//! [`RendererFactory`] and owned by a pool; callers never construct them
//! directly.

use crate::options::{DocumentMeta, RenderOptions};
use async_trait::async_trait;
use thiserror::Error;

/// Error type for renderer construction, rendering and teardown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Failed to launch rendering engine: {0}")]
    Launch(String),

    #[error("Rendering engine failed: {0}")]
    Engine(String),

    #[error("Failed to compose document: {0}")]
    Markup(String),

    #[error("Rendering engine timed out after {0} ms")]
    Timeout(u64),
}

/// Everything a renderer needs to produce one document.
///
/// The request only borrows its inputs; the shared options are passed through
/// verbatim from the batch configuration.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// The raw document body (Markdown).
    pub source: &'a str,
    /// Data derived from the document before rendering.
    pub meta: &'a DocumentMeta,
    /// Shared render configuration, immutable for the whole batch.
    pub options: &'a RenderOptions,
}

/// An auxiliary output produced alongside the primary document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File extension (without the dot) used when persisting this artifact.
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(extension: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            extension: extension.into(),
            bytes,
        }
    }
}

/// The rendered form of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    /// The final form (e.g. PDF bytes).
    pub primary: Vec<u8>,
    /// Intermediate forms requested by the options, in write order.
    pub extras: Vec<Artifact>,
}

impl RenderOutput {
    pub fn new(primary: Vec<u8>) -> Self {
        Self {
            primary,
            extras: Vec::new(),
        }
    }

    pub fn with_extra(mut self, artifact: Artifact) -> Self {
        self.extras.push(artifact);
        self
    }

    /// Total number of bytes across the primary form and every extra.
    pub fn total_bytes(&self) -> u64 {
        let extras: usize = self.extras.iter().map(|a| a.bytes.len()).sum();
        (self.primary.len() + extras) as u64
    }
}

/// A handle to a running rendering engine.
///
/// A renderer is used by at most one caller at a time, hence `&mut self`.
/// Dropping a renderer without calling [`Renderer::shutdown`] must still
/// release the underlying engine; `shutdown` exists so callers can observe
/// teardown failures.
#[async_trait]
pub trait Renderer: Send + 'static {
    /// Render a single document.
    async fn render(&mut self, request: RenderRequest<'_>) -> Result<RenderOutput, RenderError>;

    /// Tear the engine down, reporting any failure.
    async fn shutdown(self) -> Result<(), RenderError>;
}

/// Creates [`Renderer`] handles on demand.
///
/// # Implementations
///
/// - `HtmlRendererFactory`: composes standalone HTML pages, no external engine
/// - `ChromeRendererFactory`: one headless Chromium process per handle
#[async_trait]
pub trait RendererFactory: Send + Sync + 'static {
    type Renderer: Renderer;

    /// Construct a new renderer. This is expected to be slow.
    async fn create(&self) -> Result<Self::Renderer, RenderError>;

    /// Extension of the primary artifact produced by this factory's renderers.
    fn primary_extension(&self) -> &'static str;

    /// Returns a human-readable name for this factory (for logging/debugging).
    fn name(&self) -> &'static str;
}
