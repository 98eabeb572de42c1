//! Search-results listing extraction.
//!
//! The listing page holds one promo card per article:
//!
//! ```html
//! <div class="PagePromo" data-mobile-alt-layout="true" data-origintemplate="PagePromo">
//!   <div class="PagePromo-title"><a class="Link" href="...">Title</a></div>
//!   <div class="PagePromo-description">Description</div>
//!   <img class="Image" src="...">
//! </div>
//! ```
//!
//! Extraction has two halves. [`parse_cards`] is pure and turns the markup
//! into owned [`ArticleCard`]s in document order. [`ListingExtractor::extract`]
//! then enriches each card, one at a time, with its publication date, a
//! downloaded thumbnail and the phrase count.

use crate::config::{AssetFailurePolicy, Settings};
use crate::counter;
use crate::date::DateResolver;
use crate::error::{Result, ScrapeError};
use crate::fetch::AssetFetcher;
use crate::models::{ArticleCard, ArticleRecord};
use crate::utils::{normalize_whitespace, resolve_url};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

static CARD: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"div.PagePromo[data-mobile-alt-layout="true"][data-origintemplate="PagePromo"]"#,
    )
    .unwrap()
});
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("div.PagePromo-title").unwrap());
static DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.PagePromo-description").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.Link").unwrap());
static IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img.Image").unwrap());

/// Parse every article card of a rendered listing, in document order.
///
/// Cards missing a required part are skipped with a warning. Repeated links
/// keep only their first card.
pub fn parse_cards(html: &str) -> Vec<ArticleCard> {
    let document = Html::parse_document(html);
    let mut total = 0usize;

    let cards: Vec<ArticleCard> = document
        .select(&CARD)
        .enumerate()
        .filter_map(|(index, element)| {
            total += 1;
            match parse_card(element) {
                Ok(card) => Some(card),
                Err(e) => {
                    warn!(index, error = %e, "Skipping incomplete article card");
                    None
                }
            }
        })
        .collect();

    let valid = cards.len();
    let cards: Vec<ArticleCard> = cards.into_iter().unique_by(|c| c.link.clone()).collect();
    if cards.len() < valid {
        debug!(duplicates = valid - cards.len(), "Dropped cards with repeated links");
    }

    info!(found = total, kept = cards.len(), "Parsed listing cards");
    cards
}

fn parse_card(card: ElementRef) -> Result<ArticleCard> {
    let title = card
        .select(&TITLE)
        .next()
        .ok_or_else(|| ScrapeError::SelectorNotFound("div.PagePromo-title".to_string()))?;
    let description = card
        .select(&DESCRIPTION)
        .next()
        .ok_or_else(|| ScrapeError::SelectorNotFound("div.PagePromo-description".to_string()))?;
    let link = required_attr(card, &LINK, "a.Link", "href")?;
    let image_url = required_attr(card, &IMAGE, "img.Image", "src")?;

    Ok(ArticleCard {
        title: normalize_whitespace(&title.text().collect::<String>()),
        description: normalize_whitespace(&description.text().collect::<String>()),
        link,
        image_url,
    })
}

fn required_attr(card: ElementRef, selector: &Selector, name: &str, attr: &str) -> Result<String> {
    let element = card
        .select(selector)
        .next()
        .ok_or_else(|| ScrapeError::SelectorNotFound(name.to_string()))?;
    match element.value().attr(attr).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ScrapeError::SelectorNotFound(format!("{name}[{attr}]"))),
    }
}

/// Records enriched so far, plus the error that stopped extraction early.
#[derive(Debug)]
pub struct Extraction {
    pub records: Vec<ArticleRecord>,
    /// Set when a thumbnail failure aborted the run under
    /// [`AssetFailurePolicy::Abort`]; `records` then holds the cards before it.
    pub aborted: Option<ScrapeError>,
}

/// Turns a rendered listing into enriched [`ArticleRecord`]s.
pub struct ListingExtractor {
    dates: DateResolver,
    assets: AssetFetcher,
    site: Url,
    image_dir: PathBuf,
    on_asset_failure: AssetFailurePolicy,
}

impl ListingExtractor {
    pub fn new(dates: DateResolver, assets: AssetFetcher, settings: &Settings) -> Result<Self> {
        Ok(Self {
            dates,
            assets,
            site: settings.site_url()?,
            image_dir: settings.output_path().to_path_buf(),
            on_asset_failure: settings.asset_failure_policy,
        })
    }

    /// Extract and enrich every card of `html`, sequentially and in document order.
    ///
    /// A thumbnail failure under [`AssetFailurePolicy::Abort`] stops at that
    /// card and is reported in [`Extraction::aborted`].
    #[instrument(level = "info", skip(self, html), fields(html_bytes = html.len()))]
    pub async fn extract(&self, html: &str, search_phrase: &str) -> Extraction {
        let cards = parse_cards(html);
        let mut records = Vec::with_capacity(cards.len());

        for (index, card) in cards.into_iter().enumerate() {
            match self.enrich(card, search_phrase).await {
                Ok(record) => records.push(record),
                Err(e) if e.is_fetch_failure() || matches!(e, ScrapeError::Io(_)) => {
                    match self.on_asset_failure {
                        AssetFailurePolicy::Abort => {
                            error!(
                                index,
                                kept = records.len(),
                                error = %e,
                                "Thumbnail download failed; aborting extraction"
                            );
                            return Extraction {
                                records,
                                aborted: Some(e),
                            };
                        }
                        AssetFailurePolicy::Skip => {
                            warn!(index, error = %e, "Thumbnail download failed; skipping article");
                        }
                    }
                }
                Err(e) => warn!(index, error = %e, "Skipping article with unusable markup"),
            }
        }

        info!(count = records.len(), "Extracted article records");
        Extraction {
            records,
            aborted: None,
        }
    }

    #[instrument(level = "info", skip_all, fields(link = %card.link))]
    async fn enrich(&self, card: ArticleCard, search_phrase: &str) -> Result<ArticleRecord> {
        let published_at = self.dates.resolve(&card.link).await;

        let image_url = resolve_url(&self.site, &card.image_url)
            .map_err(|e| ScrapeError::Parse(format!("bad image URL {}: {e}", card.image_url)))?;
        let local_image_path = self
            .assets
            .save_thumbnail(image_url.as_str(), &self.image_dir)
            .await?;

        let occurrence_count = counter::count(&card.title, &card.description, search_phrase);
        debug!(occurrence_count, date = ?published_at, "Enriched article");

        Ok(ArticleRecord {
            title: card.title,
            published_at,
            description: card.description,
            link: card.link,
            image_url: card.image_url,
            search_phrase: search_phrase.to_string(),
            occurrence_count,
            local_image_path: local_image_path.to_string_lossy().into_owned(),
        })
    }
}
