//! Incremental discovery over a paginated, newest-first listing.
//!
//! Starting at page 1, each page is compared against the [`Ledger`]:
//!
//! - every link on the page is new: the page is absorbed (appended to the
//!   batch and merged into the ledger) and the next page is fetched;
//! - at least one link is already known: the page straddles the last-seen
//!   watermark, so the crawl stops and **none** of that page's links are
//!   taken;
//! - the fetch fails: the crawl stops.
//!
//! This relies on the listing being served newest-first with stable
//! pagination. If the site reorders entries between runs, links can be
//! missed or the crawl can stop early.

use std::fmt;

use tracing::{info, instrument, warn};

use crate::batch::BatchWriter;
use crate::error::FetchError;
use crate::ledger::Ledger;
use crate::models::Link;
use crate::scrapers::PageFetcher;

/// Why a crawl run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The page could not be fetched or had no articles.
    Fetch(FetchError),
    /// The page held `known` link(s) already in the ledger.
    KnownLink { page: u32, known: usize },
    /// The configured page cap was reached before fetching `page`.
    PageLimit { page: u32 },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Fetch(e) => write!(f, "{e}"),
            StopReason::KnownLink { page, known } => write!(
                f,
                "encountered {known} already-known link(s) on page {page}"
            ),
            StopReason::PageLimit { page } => {
                write!(f, "page limit reached before page {page}")
            }
        }
    }
}

/// Result of one crawl run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOutcome {
    /// Links discovered this run, in discovery order.
    pub new_links: Vec<Link>,
    /// Why the loop ended.
    pub stop: StopReason,
    /// Page number being evaluated when the loop ended.
    pub stopped_at: u32,
    /// Pages whose links were all new and were taken into the batch.
    pub pages_absorbed: u32,
}

impl CrawlOutcome {
    /// True when page 1 itself could not be fetched. In that case nothing
    /// is persisted and nothing is dispatched.
    pub fn first_page_failed(&self) -> bool {
        matches!(self.stop, StopReason::Fetch(_)) && self.stopped_at == 1
    }

    /// Whether the dispatch stage should follow this crawl.
    pub fn should_dispatch(&self, no_dispatch: bool) -> bool {
        !no_dispatch && !self.first_page_failed()
    }
}

/// Drives pagination and applies the stopping heuristic.
#[derive(Debug)]
pub struct Crawler<F> {
    fetcher: F,
    max_pages: Option<u32>,
}

impl<F> Crawler<F>
where
    F: PageFetcher,
{
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            max_pages: None,
        }
    }

    /// Stop after absorbing `max_pages` pages. Unbounded by default, which on
    /// a first run with an empty ledger walks the whole listing.
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Run the crawl against `ledger`, appending absorbed pages to `batch`.
    ///
    /// The ledger is extended in memory only; persisting it is up to the
    /// caller. Only writing the batch file can fail this call, fetch
    /// failures end up in [`CrawlOutcome::stop`].
    #[instrument(level = "info", skip_all, fields(known = ledger.len()))]
    pub async fn run(
        &self,
        ledger: &mut Ledger,
        batch: &mut BatchWriter,
    ) -> std::io::Result<CrawlOutcome> {
        let mut page: u32 = 1;
        let mut pages_absorbed = 0;
        let mut new_links = Vec::new();

        let stop = loop {
            if self.max_pages.is_some_and(|max| page > max) {
                info!(page, "Page limit reached. Stopping.");
                break StopReason::PageLimit { page };
            }

            let fetched = match self.fetcher.fetch(page).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    warn!(page, error = %e, "Could not read listing page. Stopping.");
                    break StopReason::Fetch(e);
                }
            };

            let total = fetched.links.len();
            let fresh: Vec<Link> = fetched
                .links
                .into_iter()
                .filter(|link| !ledger.contains(link))
                .collect();

            if fresh.len() < total {
                let known = total - fresh.len();
                info!(page, known, "Encountered at least one known link. Stopping.");
                break StopReason::KnownLink { page, known };
            }

            info!(page = fetched.number, count = fresh.len(), "Found new links on page");
            batch.append(&fresh).await?;
            ledger.merge(fresh.iter().cloned());
            new_links.extend(fresh);
            pages_absorbed += 1;
            page += 1;
        };

        info!(
            new_links = new_links.len(),
            pages_absorbed,
            stop = %stop,
            "Crawl finished"
        );

        Ok(CrawlOutcome {
            new_links,
            stop,
            stopped_at: page,
            pages_absorbed,
        })
    }
}
