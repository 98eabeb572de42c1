//! Publication date resolution for individual articles.
//!
//! Article templates differ (regular stories, long-form "projects" pages) and
//! drift over time, so extraction runs through an ordered table of
//! [`DateStrategy`] entries. The first strategy whose predicate matches the
//! article URL is applied; there is no second chance for later entries.
//!
//! | Strategy | Applies to | Returns |
//! |----------|-----------|---------|
//! | `projects-byline` | `<site>/projects/...` | text of `p.story-by-copy`, verbatim |
//! | `page-timestamp` | everything else | `data-timestamp` of the `bsp-timestamp` inside `div.Page-datePublished`, else `div.Page-dateModified` |
//!
//! Resolution never fails the caller: misses are logged, the page HTML is
//! kept as a diagnostic snapshot and `None` is returned.

use crate::browser::{Browser, BrowserPage, WaitUntil};
use crate::config::Settings;
use crate::error::{Result, ScrapeError};
use crate::utils::{resolve_url, truncate_for_log};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

static STORY_BYLINE: Lazy<Selector> = Lazy::new(|| Selector::parse("p.story-by-copy").unwrap());
static DATE_PUBLISHED: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.Page-datePublished").unwrap());
static DATE_MODIFIED: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.Page-dateModified").unwrap());
static TIMESTAMP: Lazy<Selector> = Lazy::new(|| Selector::parse("bsp-timestamp").unwrap());

/// One named way of pulling a date out of an article page.
#[derive(Clone)]
pub struct DateStrategy {
    pub name: &'static str,
    /// Whether this strategy handles `article` (second argument is the site root).
    pub applies: fn(&Url, &Url) -> bool,
    pub extract: fn(&Html) -> Result<String>,
}

impl std::fmt::Debug for DateStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateStrategy").field("name", &self.name).finish()
    }
}

/// The built-in strategy table, most specific first.
pub fn default_strategies() -> Vec<DateStrategy> {
    vec![
        DateStrategy {
            name: "projects-byline",
            applies: is_projects_page,
            extract: extract_byline,
        },
        DateStrategy {
            name: "page-timestamp",
            applies: |_, _| true,
            extract: extract_page_timestamp,
        },
    ]
}

fn is_projects_page(article: &Url, site: &Url) -> bool {
    let bare_host = |url: &Url| url.host_str().map(|h| h.trim_start_matches("www.").to_ascii_lowercase());
    bare_host(article).is_some()
        && bare_host(article) == bare_host(site)
        && article.path().starts_with("/projects/")
}

fn extract_byline(document: &Html) -> Result<String> {
    document
        .select(&STORY_BYLINE)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or_else(|| ScrapeError::SelectorNotFound("p.story-by-copy".to_string()))
}

fn extract_page_timestamp(document: &Html) -> Result<String> {
    let container = document
        .select(&DATE_PUBLISHED)
        .next()
        .or_else(|| document.select(&DATE_MODIFIED).next())
        .ok_or_else(|| {
            ScrapeError::SelectorNotFound(
                "div.Page-datePublished or div.Page-dateModified".to_string(),
            )
        })?;

    let timestamp = container
        .select(&TIMESTAMP)
        .next()
        .ok_or_else(|| ScrapeError::SelectorNotFound("bsp-timestamp".to_string()))?;

    timestamp
        .value()
        .attr("data-timestamp")
        .map(str::to_string)
        .ok_or_else(|| ScrapeError::Parse("bsp-timestamp without data-timestamp".to_string()))
}

/// Visits article pages and extracts their publication timestamp.
pub struct DateResolver {
    browser: Arc<dyn Browser>,
    site: Url,
    strategies: Vec<DateStrategy>,
    settle: Duration,
    diagnostic_path: PathBuf,
}

impl DateResolver {
    /// `strategies` are tried in order; see [`default_strategies`].
    pub fn new(
        browser: Arc<dyn Browser>,
        strategies: Vec<DateStrategy>,
        settings: &Settings,
    ) -> Result<Self> {
        if strategies.is_empty() {
            return Err(ScrapeError::Config("no date strategies configured".to_string()));
        }
        Ok(Self {
            browser,
            site: settings.site_url()?,
            strategies,
            settle: settings.date_settle(),
            diagnostic_path: settings.diagnostic_file(),
        })
    }

    /// Resolve the publication date of `article_url`, or `None` on any failure.
    ///
    /// A fresh page is opened for the visit and closed again on every path.
    #[instrument(level = "info", skip(self))]
    pub async fn resolve(&self, article_url: &str) -> Option<String> {
        let url = match resolve_url(&self.site, article_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Unparseable article URL; no date");
                return None;
            }
        };

        let page = match self.browser.new_page().await {
            Ok(page) => page,
            Err(e) => {
                error!(error = %e, "Could not open a page for date resolution");
                return None;
            }
        };

        let outcome = self.visit(page.as_ref(), &url).await;
        let date = match outcome {
            Ok(date) => {
                info!(%date, "Resolved article date");
                Some(date)
            }
            Err(e) => {
                warn!(error = %e, "Date resolution failed");
                self.save_diagnostic(page.as_ref()).await;
                None
            }
        };

        if let Err(e) = page.close().await {
            debug!(error = %e, "Page close error (ignored)");
        }
        date
    }

    async fn visit(&self, page: &dyn BrowserPage, url: &Url) -> Result<String> {
        page.goto(url.as_str(), WaitUntil::Commit).await?;
        sleep(self.settle).await;
        let html = page.content().await?;
        self.extract(url, &html)
    }

    /// Apply the first matching strategy to an already rendered page.
    pub fn extract(&self, url: &Url, html: &str) -> Result<String> {
        let strategy = self
            .strategies
            .iter()
            .find(|s| (s.applies)(url, &self.site))
            .ok_or_else(|| ScrapeError::Parse(format!("no date strategy for {url}")))?;
        debug!(strategy = strategy.name, "Applying date strategy");
        let document = Html::parse_document(html);
        (strategy.extract)(&document)
    }

    async fn save_diagnostic(&self, page: &dyn BrowserPage) {
        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                debug!(error = %e, "No page content to snapshot");
                return;
            }
        };
        match fs::write(&self.diagnostic_path, &html).await {
            Ok(()) => warn!(
                path = %self.diagnostic_path.display(),
                preview = %truncate_for_log(&html, 200),
                "Saved page HTML for inspection"
            ),
            Err(e) => error!(
                path = %self.diagnostic_path.display(),
                error = %e,
                "Failed to save diagnostic snapshot"
            ),
        }
    }
}
