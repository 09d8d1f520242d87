//! Data models shared by the crawl and dispatch stages.
//!
//! - [`Link`]: an article URL, compared by exact string match
//! - [`Page`]: the links extracted from one listing page, in page order
//! - [`Target`]: a chat channel the summaries are posted to
//! - [`LinkSummary`]: the structured response returned by the LLM
//! - [`EnrichedLink`]: a link joined with its normalized summary

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TargetError;

/// An article URL. No normalization is applied: two links are the same
/// only if their strings are identical.
pub type Link = String;

/// Links extracted from a single listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number the links were fetched from.
    pub number: u32,
    /// Article links in the order they appear on the page, without duplicates.
    pub links: Vec<Link>,
}

/// A delivery destination, identified by its numeric channel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target(pub u64);

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Target)
            .map_err(|_| TargetError::Invalid(s.trim().to_string()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured metadata the LLM returns for a link.
///
/// `date` is expected as `MM/YYYY` but is normalized before use, see
/// [`crate::enrichment::normalize_date`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkSummary {
    /// The article headline.
    pub title: String,
    /// A neutral, paragraph-length summary of the article.
    pub summary: String,
    /// Publication month of the article.
    pub date: String,
}

/// A link with the enrichment applied, ready to be formatted as a message.
///
/// Lives for a single dispatch pass and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedLink {
    pub link: Link,
    pub title: String,
    /// Publication month, always `MM/YYYY`.
    pub date: String,
    pub summary: String,
}

impl EnrichedLink {
    pub fn new(link: Link, summary: LinkSummary) -> Self {
        Self {
            link,
            title: summary.title,
            date: summary.date,
            summary: summary.summary,
        }
    }
}
