// src/config.rs
use crate::error::QuireError;
use quire_traits::RenderOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "quire.toml";

/// Prefix of the environment variables layered over the file,
/// e.g. `QUIRE__BATCH__CONCURRENCY=4`.
pub const ENV_PREFIX: &str = "QUIRE";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QuireConfig {
    pub batch: BatchSettings,
    pub render: RenderOptions,
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Renderer pool size. `0` selects one renderer per two logical CPUs.
    pub concurrency: usize,
    /// Deadline for the whole batch; jobs not yet started when it passes are
    /// reported as cancelled.
    pub timeout_secs: Option<u64>,
    pub format: OutputFormat,
    /// Directory for all outputs. Defaults to the directory of each input.
    pub out_dir: Option<PathBuf>,
}

impl BatchSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Html,
}

/// How each pooled Chromium process is launched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Chromium binary. Looked up on the system when unset.
    pub executable: Option<PathBuf>,
    pub no_sandbox: bool,
    pub launch_timeout_secs: u64,
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            no_sandbox: false,
            launch_timeout_secs: 20,
            extra_args: Vec::new(),
        }
    }
}

impl BrowserSettings {
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }
}

impl QuireConfig {
    /// Loads the configuration.
    ///
    /// Sources, lowest precedence first: the explicit `path` (which must
    /// exist) or else an optional `quire.toml` in the working directory, then
    /// `QUIRE__SECTION__KEY` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, QuireError> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                if !path.is_file() {
                    return Err(QuireError::Config(format!(
                        "configuration file '{}' does not exist",
                        path.display()
                    )));
                }
                log::debug!("Loading configuration from {}", path.display());
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                builder = builder
                    .add_source(config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("browser.extra_args"),
        );

        let config: QuireConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialize fine but cannot be honoured.
    pub fn validate(&self) -> Result<(), QuireError> {
        if let Some(range) = &self.render.toc {
            range
                .validate()
                .map_err(|e| QuireError::Config(e.to_string()))?;
        }
        let m = self.render.margins;
        if [m.top, m.right, m.bottom, m.left]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(QuireError::Config(
                "margins must be finite, non-negative inch values".to_string(),
            ));
        }
        if self.batch.timeout_secs == Some(0) {
            return Err(QuireError::Config(
                "batch timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}
