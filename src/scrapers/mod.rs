//! Listing page scrapers.
//!
//! A scraper turns one page of a paginated news listing into a [`Page`] of
//! article links. The crawler only depends on the [`PageFetcher`] trait, so
//! a different site (or a fake in tests) can be swapped in.
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | WordPress block-theme news listing | [`listing`] | HTML scraping of `/page/{n}/` |

use crate::error::FetchError;
use crate::models::Page;

pub mod listing;

/// Fetch and parse one page of a paginated listing.
pub trait PageFetcher {
    /// Fetch page `page` (1-based).
    ///
    /// Any failure, including "this page does not exist", is a [`FetchError`];
    /// the caller decides whether to stop.
    async fn fetch(&self, page: u32) -> Result<Page, FetchError>;
}
