//! Paginated news listing scraper.
//!
//! Targets WordPress block-theme listings such as
//! [whitehouse.gov/news](https://www.whitehouse.gov/news/), where page `n`
//! lives at `{listing}/page/{n}/` and every article is announced by
//!
//! ```html
//! <h2 class="wp-block-post-title has-heading-4-font-size">
//!   <a href="https://www.whitehouse.gov/...">Title</a>
//! </h2>
//! ```
//!
//! Headings that do not carry both class markers are ignored.

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::PageFetcher;
use crate::error::FetchError;
use crate::models::{Link, Page};

/// Default listing crawled when none is configured.
pub const DEFAULT_LISTING_URL: &str = "https://www.whitehouse.gov/news";

static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h2.wp-block-post-title.has-heading-4-font-size")
        .expect("heading selector is valid")
});

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));

/// Extract article links from a listing page.
///
/// Takes the first `a[href]` inside each matching heading. Duplicates are
/// dropped keeping the first occurrence, so the result follows page order.
pub fn extract_links(html: &str) -> Vec<Link> {
    let document = Html::parse_document(html);
    document
        .select(&HEADING_SELECTOR)
        .filter_map(|heading| heading.select(&ANCHOR_SELECTOR).next())
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .unique()
        .collect()
}

/// HTTP [`PageFetcher`] for a paginated listing.
#[derive(Debug, Clone)]
pub struct ListingFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl ListingFetcher {
    /// Create a fetcher for the listing rooted at `listing_url`.
    ///
    /// A trailing slash is optional: `https://site/news` and
    /// `https://site/news/` paginate identically.
    pub fn new(client: reqwest::Client, listing_url: &str) -> Result<Self, url::ParseError> {
        let mut normalized = listing_url.trim().trim_end_matches('/').to_string();
        normalized.push('/');
        let base_url = Url::parse(&normalized)?;
        Ok(Self { client, base_url })
    }

    /// URL of page `page`, e.g. `https://www.whitehouse.gov/news/page/2/`.
    pub fn page_url(&self, page: u32) -> String {
        format!("{}page/{}/", self.base_url, page)
    }
}

impl PageFetcher for ListingFetcher {
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, page: u32) -> Result<Page, FetchError> {
        let url = self.page_url(page);
        info!(%url, "Scraping listing page");

        let unavailable = |reason: String| FetchError::PageUnavailable { page, reason };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "Listing page returned a non-success status");
            return Err(unavailable(format!("HTTP {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let links = extract_links(&html);
        debug!(?links, "Extracted links");

        if links.is_empty() {
            return Err(FetchError::NoArticlesFound { page });
        }

        info!(count = links.len(), "Extracted article links");
        Ok(Page {
            number: page,
            links,
        })
    }
}
