//! Two-stage pipeline wiring.
//!
//! The crawl stage writes the batch file and grows the ledger; the dispatch
//! stage reads the batch back and delivers it. Both stages are independently
//! runnable and only share the files named in [`Paths`].

use std::path::PathBuf;

use tracing::{info, instrument, warn};

use crate::batch::{BatchWriter, clear_batch, read_batch};
use crate::chat::ChatClient;
use crate::crawler::{CrawlOutcome, Crawler};
use crate::dispatcher::{DispatchOutcome, Dispatcher, SkipReason};
use crate::enrichment::Enricher;
use crate::error::{ConfigError, Result};
use crate::ledger::Ledger;
use crate::models::Link;
use crate::scrapers::PageFetcher;
use crate::targets::read_targets;

pub const DEFAULT_LEDGER_FILE: &str = "known_links.txt";
pub const DEFAULT_BATCH_FILE: &str = "new_links.txt";
pub const DEFAULT_TARGETS_FILE: &str = "targets.txt";

/// Files shared between the two stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub ledger: PathBuf,
    pub batch: PathBuf,
    pub targets: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            ledger: DEFAULT_LEDGER_FILE.into(),
            batch: DEFAULT_BATCH_FILE.into(),
            targets: DEFAULT_TARGETS_FILE.into(),
        }
    }
}

/// Crawl the listing and persist what was found.
///
/// The batch file is reset before the first fetch. The ledger is persisted
/// whatever the stop reason, except when page 1 itself failed, in which case
/// nothing is written to it.
#[instrument(level = "info", skip(fetcher))]
pub async fn run_crawl<F>(
    fetcher: F,
    max_pages: Option<u32>,
    paths: &Paths,
) -> Result<CrawlOutcome>
where
    F: PageFetcher,
{
    let mut ledger = Ledger::load(&paths.ledger).await?;
    let mut batch = BatchWriter::create(&paths.batch).await?;

    let outcome = Crawler::new(fetcher)
        .with_max_pages(max_pages)
        .run(&mut ledger, &mut batch)
        .await?;

    if outcome.first_page_failed() {
        warn!(stop = %outcome.stop, "First listing page failed; ledger left untouched");
        return Ok(outcome);
    }

    let appended = ledger.persist().await?;
    info!(
        appended,
        known = ledger.len(),
        batch = batch.written(),
        "Ledger updated"
    );
    Ok(outcome)
}

/// How the crawl stage runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Stop after this many listing pages.
    pub max_pages: Option<u32>,
    /// Leave the batch for a later `dispatch` run.
    pub no_dispatch: bool,
}

/// Crawl, then run `dispatch` unless the crawl rules it out.
///
/// `dispatch` is not called when `no_dispatch` is set or when page 1 could
/// not be fetched, so nothing it would build (clients, credentials) is
/// needed in those cases.
pub async fn run_crawl_stage<F, D>(
    fetcher: F,
    options: CrawlOptions,
    paths: &Paths,
    dispatch: D,
) -> Result<CrawlOutcome>
where
    F: PageFetcher,
    D: AsyncFnOnce() -> Result<()>,
{
    let outcome = run_crawl(fetcher, options.max_pages, paths).await?;
    info!(
        new_links = outcome.new_links.len(),
        pages = outcome.pages_absorbed,
        stop = %outcome.stop,
        "Crawl stage complete"
    );

    if outcome.should_dispatch(options.no_dispatch) {
        dispatch().await?;
    } else if options.no_dispatch {
        info!("Dispatch disabled for this run");
    } else {
        warn!("Listing unavailable; not dispatching");
    }
    Ok(outcome)
}

/// Inputs for a dispatch run, or why there is nothing to do.
#[derive(Debug)]
pub enum Prepared {
    Ready {
        batch: Vec<Link>,
        targets: Vec<String>,
    },
    Skipped(SkipReason),
}

/// Read the batch and targets files.
///
/// Checked in order: batch file present, batch non-empty, targets file
/// present, targets non-empty. Nothing is built or contacted here, so a skip
/// costs no credentials.
#[instrument(level = "info")]
pub async fn prepare_dispatch(paths: &Paths) -> Result<Prepared> {
    let Some(batch) = read_batch(&paths.batch).await? else {
        return Ok(skip(SkipReason::Config(ConfigError::MissingBatchFile(
            paths.batch.clone(),
        ))));
    };
    if batch.is_empty() {
        return Ok(skip(SkipReason::EmptyBatch));
    }

    let Some(targets) = read_targets(&paths.targets).await? else {
        return Ok(skip(SkipReason::Config(ConfigError::MissingTargetsFile(
            paths.targets.clone(),
        ))));
    };
    if targets.is_empty() {
        return Ok(skip(SkipReason::NoTargets));
    }

    info!(links = batch.len(), targets = targets.len(), "Dispatch inputs loaded");
    Ok(Prepared::Ready { batch, targets })
}

fn skip(reason: SkipReason) -> Prepared {
    info!(reason = %reason, "Skipping dispatch");
    Prepared::Skipped(reason)
}

/// Deliver a prepared batch. With `clear` set the batch file is truncated
/// once the dispatch completes; a failed dispatch leaves it for a retry.
pub async fn run_dispatch<E, C>(
    enricher: &E,
    chat: &mut C,
    batch: &[Link],
    targets: &[String],
    paths: &Paths,
    clear: bool,
) -> Result<DispatchOutcome>
where
    E: Enricher,
    C: ChatClient,
{
    let outcome = Dispatcher::new(enricher, chat)
        .dispatch(batch, targets)
        .await?;

    if clear && matches!(outcome, DispatchOutcome::Completed(_)) {
        clear_batch(&paths.batch).await?;
    }
    Ok(outcome)
}
