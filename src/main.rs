//! # News Search Scraper
//!
//! Drives a headless browser through a news site's search flow, collects the
//! article cards from the results listing, enriches each one with its
//! publication date, a local copy of its thumbnail and a count of how often the
//! search phrase appears, and writes the lot as a CSV table and a JSON report.
//!
//! ## Usage
//!
//! ```sh
//! news_search_scraper "trump and biden" -c Stories -o ./output
//! ```
//!
//! ## Architecture
//!
//! 1. **Session**: accept consent, submit the query, apply category filters
//! 2. **Listing**: parse the rendered results into article cards
//! 3. **Enrichment**: resolve each card's date, download its thumbnail, count the phrase
//! 4. **Output**: write `news_data.csv` and `news_data.json`

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod config;
mod counter;
mod date;
mod error;
mod fetch;
mod listing;
mod models;
mod outputs;
mod pipeline;
mod session;
#[cfg(test)]
mod testing;
mod utils;

use browser::{BrowserOptions, ChromeBrowser};
use cli::Cli;
use config::Settings;
use fetch::ReqwestFetcher;
use date::default_strategies;
use pipeline::run_search;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_search_scraper starting up");

    let args = Cli::parse();
    debug!(?args.output_dir, ?args.config, "Parsed CLI arguments");

    let settings = Settings::load(args.config.as_deref())?.apply_cli(&args)?;
    info!(
        base_url = %settings.base_url,
        output_dir = %settings.output_dir,
        categories = ?settings.categories,
        "Settings resolved"
    );

    ensure_writable_dir(&settings.output_dir).await?;

    let http = Arc::new(ReqwestFetcher::new(settings.download_timeout())?);
    let browser = Arc::new(
        ChromeBrowser::launch(&BrowserOptions {
            headless: settings.headless,
            ignore_https_errors: settings.ignore_https_errors,
            default_timeout: settings.default_timeout(),
            executable: settings.chrome_executable.as_ref().map(PathBuf::from),
            ..BrowserOptions::default()
        })
        .await?,
    );

    let extraction = match run_search(
        browser,
        http,
        default_strategies(),
        &settings,
        &args.search_phrase,
    )
    .await
    {
        Ok(extraction) => extraction,
        Err(e) => {
            error!(error = %e, "Run failed");
            return Err(e.into());
        }
    };

    // Records enriched before an abort are still written out.
    let written = outputs::write_outputs(&settings, &args.search_phrase, extraction.records).await?;
    for path in &written {
        info!(path = %path.display(), "Output written");
    }
    if let Some(e) = extraction.aborted {
        error!(error = %e, "Run aborted; outputs hold the articles processed before the failure");
        return Err(e.into());
    }

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs_f64(),
        "news_search_scraper finished"
    );

    Ok(())
}
