//! quire: batch Markdown conversion through a bounded pool of renderers.
//!
//! ## Layout
//!
//! - [`pipeline`]: jobs, the job runner, result aggregation and the
//!   [`Converter`] facade
//! - [`render`]: Markdown analysis plus the HTML and Chromium backends
//! - [`config`] / [`discovery`]: inputs consumed by the binary
//!
//! The renderer contracts live in `quire-traits`; the pool and the batch
//! executor live in `quire-executor`.
//!
//! ## Usage
//!
//! ```ignore
//! use quire::{CancelToken, ConverterBuilder, Job};
//! use quire::render::HtmlRendererFactory;
//!
//! let converter = ConverterBuilder::new()
//!     .with_concurrency(4)
//!     .build(HtmlRendererFactory::new());
//! let report = converter
//!     .convert(vec![Job::new("guide.md", "guide.html")], &CancelToken::new())
//!     .await;
//! converter.shutdown().await?;
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod pipeline;
pub mod render;

pub use config::{BatchSettings, BrowserSettings, OutputFormat, QuireConfig};
pub use discovery::discover_jobs;
pub use error::QuireError;
pub use pipeline::{
    BatchReport, BatchSummary, Converter, ConverterBuilder, Job, JobError, JobErrorKind, JobResult,
    JobSuccess,
};

// Re-export the foundation crates
pub use quire_executor::{CancelToken, PoolError, RendererPool};
pub use quire_traits::{
    DocumentMeta, Margins, PageSize, RenderError, RenderOptions, Renderer, RendererFactory,
    TocRange,
};
