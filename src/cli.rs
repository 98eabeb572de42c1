//! Command-line interface definitions.
//!
//! Every option can also come from an environment variable. Values given here
//! override the YAML settings file (see [`crate::config`]).

use crate::config::OutputFormat;
use clap::Parser;

/// Search a news site for a phrase and tabulate the matching articles.
///
/// # Examples
///
/// ```sh
/// # Default categories, output under ./output
/// news_search_scraper "trump and biden"
///
/// # Custom categories and output directory, watching the browser
/// news_search_scraper "climate" -c Stories -c Videos -o /tmp/news --headed
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Phrase to search for
    #[arg(env = "NEWS_SEARCH_PHRASE", value_parser = non_blank)]
    pub search_phrase: String,

    /// Category filter to apply; repeat for several (defaults to Subsections and Stories)
    #[arg(short = 'c', long = "category")]
    pub categories: Vec<String>,

    /// Output directory for the table, report and thumbnails
    #[arg(short, long, env = "NEWS_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// Optional path to a settings YAML file
    #[arg(long, env = "NEWS_SCRAPER_CONFIG")]
    pub config: Option<String>,

    /// Root URL of the news site
    #[arg(long, env = "NEWS_BASE_URL")]
    pub base_url: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Leave out articles whose thumbnail cannot be downloaded instead of aborting
    #[arg(long)]
    pub skip_failed_assets: bool,

    /// Name thumbnails after the served content type instead of always `.jpg`
    #[arg(long)]
    pub infer_image_extension: bool,

    /// Which output files to write
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

fn non_blank(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err("search phrase must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}
