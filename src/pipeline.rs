//! End-to-end composition: search session, listing extraction, enrichment.

use crate::browser::Browser;
use crate::config::Settings;
use crate::date::{DateResolver, DateStrategy};
use crate::error::{Result, ScrapeError};
use crate::fetch::{AssetFetcher, HttpFetch};
use crate::listing::{Extraction, ListingExtractor};
use crate::session::SearchSession;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Runs one search and returns its enriched records in listing order.
///
/// The browser and HTTP client are passed in; their lifecycle belongs to the
/// caller. No retries happen at this level.
pub struct Pipeline {
    session: SearchSession,
    extractor: ListingExtractor,
}

impl Pipeline {
    pub fn new(
        browser: Arc<dyn Browser>,
        http: Arc<dyn HttpFetch>,
        date_strategies: Vec<DateStrategy>,
        settings: &Settings,
    ) -> Result<Self> {
        let session = SearchSession::new(Arc::clone(&browser), settings);
        let dates = DateResolver::new(browser, date_strategies, settings)?;
        let assets = AssetFetcher::new(http, settings.image_extension);
        let extractor = ListingExtractor::new(dates, assets, settings)?;
        Ok(Self { session, extractor })
    }

    #[instrument(level = "info", skip(self))]
    pub async fn execute(&self, search_phrase: &str, categories: &[String]) -> Result<Extraction> {
        if search_phrase.trim().is_empty() {
            return Err(ScrapeError::InvalidInput("search phrase must not be empty".to_string()));
        }
        let t0 = Instant::now();

        let html = self.session.run(search_phrase, categories).await?;
        let extraction = self.extractor.extract(&html, search_phrase).await;

        let records = &extraction.records;
        info!(
            count = records.len(),
            dates_missing = records.iter().filter(|r| r.published_at.is_none()).count(),
            aborted = extraction.aborted.is_some(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Pipeline finished"
        );
        Ok(extraction)
    }
}

/// Build a [`Pipeline`], execute it with the configured categories and shut
/// `browser` down afterwards, whatever the outcome.
#[instrument(level = "info", skip_all)]
pub async fn run_search(
    browser: Arc<dyn Browser>,
    http: Arc<dyn HttpFetch>,
    date_strategies: Vec<DateStrategy>,
    settings: &Settings,
    search_phrase: &str,
) -> Result<Extraction> {
    let outcome = match Pipeline::new(Arc::clone(&browser), http, date_strategies, settings) {
        Ok(pipeline) => pipeline.execute(search_phrase, &settings.categories).await,
        Err(e) => Err(e),
    };

    if let Err(e) = browser.shutdown().await {
        error!(error = %e, "Browser shutdown failed");
    }
    outcome
}
