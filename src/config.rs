//! Runtime settings for a scraping run.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. Built-in defaults ([`Settings::default`])
//! 2. An optional YAML file (`--config settings.yaml`)
//! 3. Command-line flags and their environment variables ([`crate::cli::Cli`])
//!
//! Durations are expressed in seconds (milliseconds for the short search
//! overlay pause) so the YAML stays readable:
//!
//! ```yaml
//! base_url: https://apnews.com/
//! output_dir: output
//! results_settle_secs: 20
//! asset_failure_policy: skip
//! image_extension: from-content-type
//! ```

use crate::cli::Cli;
use crate::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// What to do with a card whose thumbnail download fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetFailurePolicy {
    /// Stop the extraction and surface the error.
    #[default]
    Abort,
    /// Log the failure and leave the card out of the output.
    Skip,
}

/// How the file extension of a downloaded thumbnail is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageExtension {
    /// Always `.jpg`, whatever the server sent.
    #[default]
    Fixed,
    /// Derived from the response `Content-Type`, falling back to `.jpg`.
    FromContentType,
}

/// Which output files a run writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Csv,
    Json,
    #[default]
    Both,
}

impl OutputFormat {
    pub fn writes_csv(self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::Both)
    }

    pub fn writes_json(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the news site; relative links are resolved against it.
    pub base_url: String,
    /// Directory receiving the table, the report and the thumbnails.
    pub output_dir: String,
    /// Where the HTML of a page whose date could not be resolved is saved.
    /// Defaults to `<output_dir>/date_error_page.html`.
    pub diagnostic_path: Option<String>,
    /// Category filters applied to the search results.
    pub categories: Vec<String>,
    pub headless: bool,
    pub ignore_https_errors: bool,
    /// Chrome/Chromium binary; auto-detected when unset.
    pub chrome_executable: Option<String>,
    /// Timeout for individual CDP requests.
    pub default_timeout_secs: u64,
    pub consent_timeout_secs: u64,
    pub search_overlay_pause_ms: u64,
    pub load_timeout_secs: u64,
    pub filter_timeout_secs: u64,
    pub results_timeout_secs: u64,
    pub results_settle_secs: u64,
    pub date_settle_secs: u64,
    pub download_timeout_secs: u64,
    pub asset_failure_policy: AssetFailurePolicy,
    pub image_extension: ImageExtension,
    pub format: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "https://apnews.com/".to_string(),
            output_dir: "output".to_string(),
            diagnostic_path: None,
            categories: vec!["Subsections".to_string(), "Stories".to_string()],
            headless: true,
            ignore_https_errors: true,
            chrome_executable: None,
            default_timeout_secs: 60,
            consent_timeout_secs: 60,
            search_overlay_pause_ms: 2000,
            load_timeout_secs: 60,
            filter_timeout_secs: 10,
            results_timeout_secs: 100,
            results_settle_secs: 20,
            date_settle_secs: 4,
            download_timeout_secs: 30,
            asset_failure_policy: AssetFailurePolicy::default(),
            image_extension: ImageExtension::default(),
            format: OutputFormat::default(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file, or use the defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self> {
        let settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                let settings: Settings = serde_yaml::from_str(&text)?;
                debug!(path, "Loaded settings file");
                settings
            }
            None => Settings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Overlay command-line values on top of these settings.
    pub fn apply_cli(mut self, cli: &Cli) -> Result<Self> {
        if let Some(dir) = &cli.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(base) = &cli.base_url {
            self.base_url = base.clone();
        }
        if !cli.categories.is_empty() {
            self.categories = cli.categories.clone();
        }
        if cli.headed {
            self.headless = false;
        }
        if cli.skip_failed_assets {
            self.asset_failure_policy = AssetFailurePolicy::Skip;
        }
        if cli.infer_image_extension {
            self.image_extension = ImageExtension::FromContentType;
        }
        if let Some(format) = cli.format {
            self.format = format;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        self.site_url()?;
        if self.output_dir.trim().is_empty() {
            return Err(ScrapeError::Config("output_dir must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn site_url(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| ScrapeError::Config(format!("invalid base_url {}: {e}", self.base_url)))
    }

    pub fn output_path(&self) -> &Path {
        Path::new(&self.output_dir)
    }

    pub fn diagnostic_file(&self) -> PathBuf {
        match &self.diagnostic_path {
            Some(path) => PathBuf::from(path),
            None => self.output_path().join("date_error_page.html"),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs)
    }

    pub fn search_overlay_pause(&self) -> Duration {
        Duration::from_millis(self.search_overlay_pause_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn filter_timeout(&self) -> Duration {
        Duration::from_secs(self.filter_timeout_secs)
    }

    pub fn results_timeout(&self) -> Duration {
        Duration::from_secs(self.results_timeout_secs)
    }

    pub fn results_settle(&self) -> Duration {
        Duration::from_secs(self.results_settle_secs)
    }

    pub fn date_settle(&self) -> Duration {
        Duration::from_secs(self.date_settle_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}
