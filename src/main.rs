use clap::{ArgAction, Parser, ValueEnum};
use log::{LevelFilter, info, warn};
use quire::pipeline::{write_human, write_json};
use quire::render::HtmlRendererFactory;
use quire::{
    BatchSummary, CancelToken, ConverterBuilder, OutputFormat, PageSize, QuireConfig, QuireError,
    RendererFactory, TocRange, discover_jobs,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::task::JoinHandle;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Human,
    Json,
}

/// Convert Markdown documents to PDF through a pool of headless Chromium
/// renderers.
#[derive(Parser, Debug)]
#[command(name = "quire", version)]
struct Cli {
    /// Markdown files, or directories whose Markdown files are converted.
    #[arg(required = true, value_name = "INPUTS")]
    inputs: Vec<PathBuf>,

    /// Configuration file (defaults to ./quire.toml when present).
    #[arg(long, value_name = "FILE", env = "QUIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for all outputs (defaults to next to each input).
    #[arg(short, long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Number of renderers to run in parallel (0 = automatic).
    #[arg(short = 'j', long, value_name = "N")]
    concurrency: Option<usize>,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Document title (defaults to the first heading).
    #[arg(long)]
    title: Option<String>,

    /// Paper size: a3, a4, a5, letter or legal.
    #[arg(long, value_name = "SIZE")]
    page: Option<PageSize>,

    #[arg(long)]
    landscape: bool,

    /// Prepend a table of contents.
    #[arg(long)]
    toc: bool,

    /// Heading levels in the table of contents, e.g. `1-3` (implies --toc).
    #[arg(long, value_name = "MIN-MAX")]
    toc_depth: Option<TocRange>,

    /// CSS file appended to the built-in stylesheet.
    #[arg(long, value_name = "FILE")]
    stylesheet: Option<PathBuf>,

    /// Keep the intermediate HTML next to each PDF.
    #[arg(long)]
    keep_html: bool,

    /// Print page numbers in the footer.
    #[arg(long)]
    page_numbers: bool,

    /// Stop starting new documents after this many seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Chromium executable.
    #[arg(long, value_name = "PATH")]
    chrome: Option<PathBuf>,

    /// Launch Chromium without its sandbox (needed in some containers).
    #[arg(long)]
    no_sandbox: bool,

    #[arg(long, value_enum, default_value_t = ReportFormat::Human)]
    report: ReportFormat,

    /// More logging (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Layers the command line over the loaded configuration.
    fn apply_to(&self, config: &mut QuireConfig) -> Result<(), QuireError> {
        let batch = &mut config.batch;
        if let Some(dir) = &self.out_dir {
            batch.out_dir = Some(dir.clone());
        }
        if let Some(concurrency) = self.concurrency {
            batch.concurrency = concurrency;
        }
        if let Some(format) = self.format {
            batch.format = format;
        }
        if let Some(timeout) = self.timeout {
            batch.timeout_secs = Some(timeout);
        }

        let render = &mut config.render;
        if let Some(title) = &self.title {
            render.title = Some(title.clone());
        }
        if let Some(page) = self.page {
            render.page = page;
        }
        render.landscape |= self.landscape;
        render.keep_html |= self.keep_html;
        render.page_numbers |= self.page_numbers;
        if let Some(range) = self.toc_depth {
            render.toc = Some(range);
        } else if self.toc && render.toc.is_none() {
            render.toc = Some(TocRange::default());
        }
        if let Some(path) = &self.stylesheet {
            let css = std::fs::read_to_string(path).map_err(|e| {
                QuireError::Config(format!("cannot read stylesheet '{}': {}", path.display(), e))
            })?;
            render.stylesheet = Some(css);
        }

        let browser = &mut config.browser;
        if let Some(chrome) = &self.chrome {
            browser.executable = Some(chrome.clone());
        }
        browser.no_sandbox |= self.no_sandbox;
        Ok(())
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
}

/// Cancels the batch on Ctrl-C or when the deadline passes. A second Ctrl-C
/// exits immediately.
fn spawn_cancel_watchers(cancel: &CancelToken, deadline: Option<Duration>) -> Vec<JoinHandle<()>> {
    let mut watchers = Vec::with_capacity(2);

    let token = cancel.clone();
    watchers.push(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing documents already in progress.");
            token.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted again; exiting.");
            std::process::exit(130);
        }
    }));

    if let Some(deadline) = deadline {
        let token = cancel.clone();
        watchers.push(tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            warn!("Batch deadline of {:?} reached; skipping documents not yet started.", deadline);
            token.cancel();
        }));
    }

    watchers
}

async fn convert<F: RendererFactory>(
    factory: F,
    inputs: &[PathBuf],
    config: &QuireConfig,
    report: ReportFormat,
) -> Result<BatchSummary, QuireError> {
    let extension = factory.primary_extension();
    let jobs = discover_jobs(inputs, config.batch.out_dir.as_deref(), extension)?;
    if jobs.is_empty() {
        warn!("Nothing to convert.");
        return Ok(BatchSummary::default());
    }
    info!("Converting {} document(s) to {}.", jobs.len(), extension);

    let converter = ConverterBuilder::new()
        .with_concurrency(config.batch.concurrency)
        .with_options(config.render.clone())
        .build(factory);

    let cancel = CancelToken::new();
    let watchers = spawn_cancel_watchers(&cancel, config.batch.timeout());
    let outcome = converter.convert(jobs, &cancel).await;
    for watcher in watchers {
        watcher.abort();
    }

    {
        let mut stdout = io::stdout().lock();
        match report {
            ReportFormat::Human => write_human(&outcome.results, &mut stdout)?,
            ReportFormat::Json => write_json(&outcome.results, &mut stdout)?,
        }
        stdout.flush()?;
    }

    if let Err(e) = converter.shutdown().await {
        warn!("Renderer teardown reported an error: {}", e);
    }
    Ok(outcome.summary)
}

#[cfg(feature = "chrome")]
async fn convert_pdf(
    inputs: &[PathBuf],
    config: &QuireConfig,
    report: ReportFormat,
) -> Result<BatchSummary, QuireError> {
    let factory = quire::render::ChromeRendererFactory::new(config.browser.clone());
    convert(factory, inputs, config, report).await
}

#[cfg(not(feature = "chrome"))]
async fn convert_pdf(
    _inputs: &[PathBuf],
    _config: &QuireConfig,
    _report: ReportFormat,
) -> Result<BatchSummary, QuireError> {
    Err(QuireError::Config(
        "PDF output requires the `chrome` feature; use --format html".to_string(),
    ))
}

async fn run(cli: Cli) -> Result<BatchSummary, QuireError> {
    let mut config = QuireConfig::load(cli.config.as_deref())?;
    cli.apply_to(&mut config)?;
    config.validate()?;

    match config.batch.format {
        OutputFormat::Html => {
            convert(HtmlRendererFactory::new(), &cli.inputs, &config, cli.report).await
        }
        OutputFormat::Pdf => convert_pdf(&cli.inputs, &config, cli.report).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("quire: {}", e);
            ExitCode::from(2)
        }
    }
}
