//! Error taxonomy for the crawl and dispatch stages.
//!
//! Each stage surfaces its own error enum so callers can decide how far a
//! failure propagates: a [`FetchError`] ends one crawl run, a [`TargetError`]
//! only skips one destination, while an [`EnrichmentError`] aborts a dispatch.
//! [`AppError`] wraps all of them for the pipeline entry points.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used by the pipeline entry points.
pub type Result<T> = std::result::Result<T, AppError>;

/// A listing page could not be turned into links.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport failure, timeout or non-success HTTP status.
    #[error("page {page} unavailable: {reason}")]
    PageUnavailable { page: u32, reason: String },

    /// The page loaded but no article heading carried a link.
    #[error("no article links found on page {page}")]
    NoArticlesFound { page: u32 },
}

/// Reading or appending the link ledger failed.
///
/// A ledger file that does not exist yet is not an error; it loads as empty.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The enrichment service could not produce a complete summary for a link.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentError {
    #[error("enrichment service unreachable for {link}: {reason}")]
    Unreachable { link: String, reason: String },

    #[error("malformed enrichment response for {link}: {reason}")]
    MalformedResponse { link: String, reason: String },
}

/// A single delivery destination had to be skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("invalid target id '{0}'")]
    Invalid(String),

    #[error("could not resolve target {target}: {reason}")]
    Unresolvable { target: String, reason: String },

    #[error("delivery to {target} stopped after {delivered} message(s): {reason}")]
    DeliveryFailed {
        target: String,
        delivered: usize,
        reason: String,
    },
}

/// Missing inputs or credentials.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("batch file {} not found; no links to post", .0.display())]
    MissingBatchFile(PathBuf),

    #[error("targets file {} not found; no channels to post to", .0.display())]
    MissingTargetsFile(PathBuf),

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("LLM configuration error: {0}")]
    Llm(String),
}

/// The chat platform refused or failed a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("could not connect to chat platform: {0}")]
    Connect(String),

    #[error("chat platform rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("chat transport error: {0}")]
    Transport(String),
}

/// Umbrella error for the pipeline stages.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}
