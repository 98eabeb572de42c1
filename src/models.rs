//! Data models for listing cards, enriched article records and run reports.
//!
//! - [`ArticleCard`]: a card as parsed from the search-results listing
//! - [`ArticleRecord`]: one fully enriched row of output
//! - [`RunReport`]: the JSON sidecar written next to the table

use serde::{Deserialize, Serialize};

/// A raw article card from the listing page, before enrichment.
///
/// All fields are owned so the parsed document can be dropped before any
/// browser or network work starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleCard {
    /// Normalized title text.
    pub title: String,
    /// Normalized description text.
    pub description: String,
    /// The card's primary link, as found in the markup.
    pub link: String,
    /// The thumbnail `src`, as found in the markup.
    pub image_url: String,
}

/// One row of output.
///
/// Serialized field names follow the column names of the output table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleRecord {
    pub title: String,
    /// Raw timestamp: a numeric epoch-like string or free text, depending on
    /// which date strategy matched. `None` when resolution failed.
    #[serde(rename = "date")]
    pub published_at: Option<String>,
    pub description: String,
    /// Identifies the article for the duration of a run.
    pub link: String,
    pub image_url: String,
    pub search_phrase: String,
    #[serde(rename = "appears_of_search_phrase")]
    pub occurrence_count: usize,
    #[serde(rename = "image_file_path")]
    pub local_image_path: String,
}

impl ArticleRecord {
    /// Column names of the output table, in order.
    pub const COLUMNS: [&'static str; 8] = [
        "title",
        "date",
        "description",
        "link",
        "image_url",
        "search_phrase",
        "appears_of_search_phrase",
        "image_file_path",
    ];

    /// Cells in [`ArticleRecord::COLUMNS`] order. A missing date is an empty cell.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.title.clone(),
            self.published_at.clone().unwrap_or_default(),
            self.description.clone(),
            self.link.clone(),
            self.image_url.clone(),
            self.search_phrase.clone(),
            self.occurrence_count.to_string(),
            self.local_image_path.clone(),
        ]
    }
}

/// Everything one run produced, serialized to JSON.
#[derive(Debug, Deserialize, Serialize)]
pub struct RunReport {
    /// Local time the report was generated, RFC 3339.
    pub generated_at: String,
    pub search_phrase: String,
    pub categories: Vec<String>,
    /// Number of articles whose date could not be resolved.
    pub dates_missing: usize,
    pub articles: Vec<ArticleRecord>,
}

impl RunReport {
    pub fn new(search_phrase: &str, categories: &[String], articles: Vec<ArticleRecord>) -> Self {
        let dates_missing = articles.iter().filter(|a| a.published_at.is_none()).count();
        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            search_phrase: search_phrase.to_string(),
            categories: categories.to_vec(),
            dates_missing,
            articles,
        }
    }
}
