//! The interactive search flow on the news site.
//!
//! A run walks a fixed sequence of stages:
//!
//! ```text
//! Start → ConsentHandled → QuerySubmitted → FiltersApplied → ResultsSettled → Done
//! ```
//!
//! Only the query submission is mandatory. The consent overlay, the filter
//! panel and each category filter may be absent, and every wait is bounded;
//! a missing affordance or an expired wait is logged and the run carries on
//! with whatever the page has rendered.

use crate::browser::{Browser, BrowserPage, ElementState, LoadState, WaitUntil};
use crate::config::Settings;
use crate::error::{Result, ScrapeError};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

const CONSENT_BUTTON: &str = "#onetrust-accept-btn-handler";
const SEARCH_BUTTON: &str = "button.SearchOverlay-search-button";
const SEARCH_INPUT: &str = "input.SearchOverlay-search-input";
const SEARCH_SUBMIT: &str = "button.SearchOverlay-search-submit";
const FILTER_PANEL: &str = "div.SearchResultsModule-filters-content";
const FILTER_TITLE: &str = "div.SearchResultsModule-filters-title";
const FILTER_LABEL_TAG: &str = "span";
const RESULTS_MODULE: &str = "div.SearchResultsModule";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Start,
    ConsentHandled,
    QuerySubmitted,
    FiltersApplied,
    ResultsSettled,
    Done,
}

pub struct SearchSession {
    browser: Arc<dyn Browser>,
    settings: Settings,
}

impl SearchSession {
    pub fn new(browser: Arc<dyn Browser>, settings: &Settings) -> Self {
        Self {
            browser,
            settings: settings.clone(),
        }
    }

    /// Search for `search_phrase`, apply `categories` and return the rendered
    /// results document.
    #[instrument(level = "info", skip(self))]
    pub async fn run(&self, search_phrase: &str, categories: &[String]) -> Result<String> {
        if let Err(e) = self.browser.clear_cookies().await {
            warn!(error = %e, "Could not clear cookies; continuing");
        }
        let page = self.browser.new_page().await?;
        let result = self.drive(page.as_ref(), search_phrase, categories).await;
        if let Err(e) = page.close().await {
            debug!(error = %e, "Session page close error (ignored)");
        }
        result
    }

    async fn drive(
        &self,
        page: &dyn BrowserPage,
        search_phrase: &str,
        categories: &[String],
    ) -> Result<String> {
        let mut stage = SessionStage::Start;
        let mut html = None;

        while stage != SessionStage::Done {
            stage = match stage {
                SessionStage::Start => {
                    self.handle_consent(page).await?;
                    SessionStage::ConsentHandled
                }
                SessionStage::ConsentHandled => {
                    self.submit_query(page, search_phrase).await?;
                    SessionStage::QuerySubmitted
                }
                SessionStage::QuerySubmitted => {
                    self.apply_filters(page, categories).await;
                    SessionStage::FiltersApplied
                }
                SessionStage::FiltersApplied => {
                    self.settle_results(page).await;
                    SessionStage::ResultsSettled
                }
                SessionStage::ResultsSettled => {
                    html = Some(page.content().await?);
                    SessionStage::Done
                }
                SessionStage::Done => SessionStage::Done,
            };
            debug!(?stage, "Search session advanced");
        }

        let html = html.ok_or_else(|| ScrapeError::Parse("no results document captured".to_string()))?;
        info!(bytes = html.len(), "Captured results page");
        Ok(html)
    }

    async fn handle_consent(&self, page: &dyn BrowserPage) -> Result<()> {
        page.goto(&self.settings.base_url, WaitUntil::Load).await?;

        let shown = page
            .wait_for_selector(CONSENT_BUTTON, ElementState::Visible, self.settings.consent_timeout())
            .await?;
        if !shown {
            info!("No consent prompt; continuing");
            return Ok(());
        }
        match page.click(CONSENT_BUTTON).await {
            Ok(()) => info!("Accepted consent prompt"),
            Err(e) => warn!(error = %e, "Could not dismiss consent prompt; continuing"),
        }
        Ok(())
    }

    async fn submit_query(&self, page: &dyn BrowserPage, search_phrase: &str) -> Result<()> {
        page.click(SEARCH_BUTTON).await?;
        sleep(self.settings.search_overlay_pause()).await;
        page.fill(SEARCH_INPUT, search_phrase).await?;
        page.click(SEARCH_SUBMIT).await?;

        let loaded = page
            .wait_for_load_state(LoadState::DomContentLoaded, self.settings.load_timeout())
            .await?;
        if !loaded {
            warn!(timeout = ?self.settings.load_timeout(), "Results document still loading; continuing");
        }
        info!(%search_phrase, "Submitted search");
        Ok(())
    }

    async fn apply_filters(&self, page: &dyn BrowserPage, categories: &[String]) {
        if categories.is_empty() {
            debug!("No category filters requested");
            return;
        }

        let timeout = self.settings.filter_timeout();
        let panel = page
            .wait_for_selector(FILTER_PANEL, ElementState::Visible, timeout)
            .await
            .unwrap_or(false);
        if !panel {
            warn!("Filter panel not found; continuing without filters");
            return;
        }
        if let Err(e) = page.click(FILTER_PANEL).await {
            warn!(error = %e, "Could not open filter panel; continuing without filters");
            return;
        }

        let mut applied = 0usize;
        for category in categories {
            match page.click_text(FILTER_LABEL_TAG, category, timeout).await {
                Ok(true) => {
                    applied += 1;
                    debug!(%category, "Selected filter");
                }
                Ok(false) => warn!(%category, "Filter not found; skipping"),
                Err(e) => warn!(%category, error = %e, "Unable to click filter; skipping"),
            }
        }

        if let Err(e) = page.press(FILTER_TITLE, "Enter").await {
            warn!(error = %e, "Could not confirm filters");
        }
        info!(applied, requested = categories.len(), "Applied category filters");
    }

    async fn settle_results(&self, page: &dyn BrowserPage) {
        let timeout = self.settings.results_timeout();
        match page.wait_for_load_state(LoadState::Load, timeout).await {
            Ok(true) => {}
            Ok(false) => warn!(?timeout, "Results page did not finish loading; continuing"),
            Err(e) => warn!(error = %e, "Load state check failed; continuing"),
        }
        match page
            .wait_for_selector(RESULTS_MODULE, ElementState::Attached, timeout)
            .await
        {
            Ok(true) => debug!("Results module attached"),
            Ok(false) => warn!("Results module not found; the listing may be empty"),
            Err(e) => warn!(error = %e, "Results module check failed; continuing"),
        }
        sleep(self.settings.results_settle()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBrowser, fast_settings};

    const ROOT: &str = "https://apnews.com/";
    const RESULTS: &str = "<html><body><div class=\"SearchResultsModule\">results</div></body></html>";

    fn full_site() -> FakeBrowser {
        FakeBrowser::new()
            .with_document(ROOT, RESULTS)
            .with_selector(CONSENT_BUTTON)
            .with_selector(SEARCH_BUTTON)
            .with_selector(SEARCH_INPUT)
            .with_selector(SEARCH_SUBMIT)
            .with_selector(FILTER_PANEL)
            .with_selector(FILTER_TITLE)
            .with_selector(RESULTS_MODULE)
            .with_text("Stories")
    }

    fn categories(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_full_flow_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(full_site());
        let session = SearchSession::new(browser.clone(), &fast_settings(dir.path()));

        let html = session
            .run("trump and biden", &categories(&["Stories", "Subsections"]))
            .await
            .unwrap();

        assert_eq!(html, RESULTS);
        assert_eq!(
            browser.actions(),
            vec![
                "clear_cookies".to_string(),
                format!("goto {ROOT}"),
                format!("click {CONSENT_BUTTON}"),
                format!("click {SEARCH_BUTTON}"),
                format!("fill {SEARCH_INPUT}=trump and biden"),
                format!("click {SEARCH_SUBMIT}"),
                format!("click {FILTER_PANEL}"),
                "click_text span:Stories".to_string(),
                format!("press {FILTER_TITLE}:Enter"),
            ]
        );
        assert_eq!(browser.closed(), 1);
    }

    #[tokio::test]
    async fn test_missing_consent_prompt_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(
            FakeBrowser::new()
                .with_document(ROOT, RESULTS)
                .with_selector(SEARCH_BUTTON)
                .with_selector(SEARCH_INPUT)
                .with_selector(SEARCH_SUBMIT),
        );
        let session = SearchSession::new(browser.clone(), &fast_settings(dir.path()));

        let html = session.run("election", &[]).await.unwrap();

        assert_eq!(html, RESULTS);
        assert!(!browser.actions().iter().any(|a| a.contains(CONSENT_BUTTON)));
    }

    #[tokio::test]
    async fn test_missing_filter_panel_skips_filters() {
        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(
            FakeBrowser::new()
                .with_document(ROOT, RESULTS)
                .with_selector(SEARCH_BUTTON)
                .with_selector(SEARCH_INPUT)
                .with_selector(SEARCH_SUBMIT)
                .with_text("Stories"),
        );
        let session = SearchSession::new(browser.clone(), &fast_settings(dir.path()));

        let html = session.run("election", &categories(&["Stories"])).await.unwrap();

        assert_eq!(html, RESULTS);
        assert!(!browser.actions().iter().any(|a| a.starts_with("click_text")));
    }

    #[tokio::test]
    async fn test_missing_search_control_fails_and_releases_page() {
        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(FakeBrowser::new().with_document(ROOT, RESULTS));
        let session = SearchSession::new(browser.clone(), &fast_settings(dir.path()));

        let err = session.run("election", &[]).await.unwrap_err();

        assert!(matches!(err, ScrapeError::SelectorNotFound(_)));
        assert_eq!(browser.opened(), 1);
        assert_eq!(browser.closed(), 1);
    }
}
