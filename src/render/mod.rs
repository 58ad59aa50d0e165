//! Concrete renderer backends and the Markdown front end they share.
//!
//! ## Backends
//!
//! - [`HtmlRendererFactory`]: standalone HTML pages, no external engine
//! - [`ChromeRendererFactory`]: PDF via one headless Chromium per renderer
//!   (feature: `chrome`)

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod html;
pub mod markdown;

#[cfg(feature = "chrome")]
pub use chrome::{ChromeRenderer, ChromeRendererFactory};
pub use html::{HtmlRenderer, HtmlRendererFactory};
pub use markdown::{MetaError, compose_page, derive_meta};
