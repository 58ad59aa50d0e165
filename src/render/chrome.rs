//! PDF rendering through headless Chromium.
//!
//! Every [`ChromeRenderer`] owns one browser process, the task driving its
//! DevTools connection and a private profile directory. Renderers are meant to
//! live in a pool: launching a browser costs far more than printing a page.

use super::markdown::compose_page;
use crate::config::BrowserSettings;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use log::{debug, info, warn};
use quire_traits::{
    Artifact, RenderError, RenderOptions, RenderOutput, RenderRequest, Renderer, RendererFactory,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::task::JoinHandle;

const HANDLER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const PAGE_NUMBER_FOOTER: &str = concat!(
    "<div style=\"font-size: 8pt; width: 100%; text-align: center; color: #59636e;\">",
    "<span class=\"pageNumber\"></span> / <span class=\"totalPages\"></span>",
    "</div>"
);

pub struct ChromeRendererFactory {
    settings: BrowserSettings,
    next_id: AtomicUsize,
}

impl ChromeRendererFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            next_id: AtomicUsize::new(0),
        }
    }

    fn browser_config(&self, profile: &Path) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile)
            .launch_timeout(self.settings.launch_timeout())
            .args(self.settings.extra_args.iter().cloned());
        if let Some(executable) = &self.settings.executable {
            builder = builder.chrome_executable(executable);
        }
        if self.settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        builder.build().map_err(RenderError::Launch)
    }
}

#[async_trait]
impl RendererFactory for ChromeRendererFactory {
    type Renderer = ChromeRenderer;

    async fn create(&self) -> Result<ChromeRenderer, RenderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let profile = tempfile::Builder::new()
            .prefix("quire-chrome-")
            .tempdir()
            .map_err(|e| RenderError::Launch(format!("cannot create browser profile: {}", e)))?;
        let config = self.browser_config(profile.path())?;

        let timeout = self.settings.launch_timeout();
        let (browser, mut handler) = tokio::time::timeout(timeout, Browser::launch(config))
            .await
            .map_err(|_| RenderError::Timeout(timeout.as_millis() as u64))?
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("[CHROME-{}] DevTools handler error: {}", id, e);
                }
            }
        });

        info!("[CHROME-{}] Browser launched in {:?}.", id, start.elapsed());
        Ok(ChromeRenderer {
            id,
            browser,
            handler,
            profile,
            rendered: 0,
        })
    }

    fn primary_extension(&self) -> &'static str {
        "pdf"
    }

    fn name(&self) -> &'static str {
        "ChromeRendererFactory"
    }
}

/// One headless Chromium process.
///
/// Dropping the renderer kills the process; [`Renderer::shutdown`] closes it
/// gracefully and reports failures.
pub struct ChromeRenderer {
    id: usize,
    browser: Browser,
    handler: JoinHandle<()>,
    profile: TempDir,
    rendered: usize,
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&mut self, request: RenderRequest<'_>) -> Result<RenderOutput, RenderError> {
        let html = compose_page(request)?;

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(engine_error)?;
        let printed = print(&page, &html, request.options).await;
        if let Err(e) = page.close().await {
            warn!("[CHROME-{}] Failed to close page: {}", self.id, e);
        }
        let pdf = printed?;
        self.rendered += 1;

        let mut output = RenderOutput::new(pdf);
        if request.options.keep_html {
            output = output.with_extra(Artifact::new("html", html.into_bytes()));
        }
        Ok(output)
    }

    async fn shutdown(mut self) -> Result<(), RenderError> {
        debug!(
            "[CHROME-{}] Closing browser after {} document(s).",
            self.id, self.rendered
        );
        let closed = self.browser.close().await.map(|_| ()).map_err(engine_error);
        if let Err(e) = self.browser.wait().await {
            warn!("[CHROME-{}] Failed to reap browser process: {}", self.id, e);
        }
        if tokio::time::timeout(HANDLER_DRAIN_TIMEOUT, &mut self.handler)
            .await
            .is_err()
        {
            self.handler.abort();
        }
        if let Err(e) = self.profile.close() {
            warn!("[CHROME-{}] Failed to remove browser profile: {}", self.id, e);
        }
        closed
    }
}

async fn print(page: &Page, html: &str, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
    page.set_content(html).await.map_err(engine_error)?;
    page.pdf(pdf_params(options)).await.map_err(engine_error)
}

fn engine_error(e: chromiumoxide::error::CdpError) -> RenderError {
    RenderError::Engine(e.to_string())
}

fn pdf_params(options: &RenderOptions) -> PrintToPdfParams {
    let (width, height) = options.page.dimensions_in();
    let margins = options.margins;
    PrintToPdfParams {
        landscape: Some(options.landscape),
        print_background: Some(options.print_background),
        paper_width: Some(width),
        paper_height: Some(height),
        margin_top: Some(margins.top),
        margin_right: Some(margins.right),
        margin_bottom: Some(margins.bottom),
        margin_left: Some(margins.left),
        display_header_footer: Some(options.page_numbers),
        header_template: options.page_numbers.then(|| "<span></span>".to_string()),
        footer_template: options.page_numbers.then(|| PAGE_NUMBER_FOOTER.to_string()),
        ..Default::default()
    }
}
