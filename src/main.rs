//! # News Relay
//!
//! Watches a paginated news listing for links that have not been seen before,
//! has an LLM write a short summary of each one, and posts the summaries to
//! Discord channels.
//!
//! ## Usage
//!
//! ```sh
//! news_relay                      # crawl, then dispatch
//! news_relay crawl --no-dispatch  # crawl only
//! news_relay dispatch             # dispatch the last batch
//! ```
//!
//! ## Architecture
//!
//! 1. **Crawl**: walk the listing from page 1 until a page holds a known link,
//!    writing every fully-new page to the batch file and the ledger
//! 2. **Enrich**: ask the LLM for a title, date and summary of each batch link
//! 3. **Deliver**: post one embed per link to every channel in the targets file

use std::error::Error;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use news_relay::api::{RetryAsk, TemplateAsk};
use news_relay::chat::discord::DiscordClient;
use news_relay::cli::{Cli, Command};
use news_relay::dispatcher::DispatchOutcome;
use news_relay::enrichment::LlmEnricher;
use news_relay::error::{AppError, ConfigError};
use news_relay::pipeline::{self, CrawlOptions, Prepared};
use news_relay::scrapers::listing::ListingFetcher;
use news_relay::utils::create_http_client;

/// Retries per enrichment request before the link counts as unreachable.
const ENRICH_MAX_RETRIES: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_relay starting up");

    let args = Cli::parse();
    debug!(command = ?args.command(), paths = ?args.paths(), "Parsed CLI arguments");

    if let Err(e) = run(&args).await {
        error!(error = %e, "news_relay failed");
        return Err(e.into());
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

async fn run(args: &Cli) -> Result<(), AppError> {
    let http = create_http_client(args.http_timeout())?;

    match args.command() {
        Command::Crawl {
            no_dispatch,
            max_pages,
        } => {
            let fetcher = ListingFetcher::new(http.clone(), &args.listing_url)?;
            let options = CrawlOptions {
                max_pages,
                no_dispatch,
            };
            pipeline::run_crawl_stage(fetcher, options, &args.paths(), async move || {
                dispatch(args, http).await
            })
            .await?;
            Ok(())
        }
        Command::Dispatch => dispatch(args, http).await,
    }
}

async fn dispatch(args: &Cli, http: reqwest::Client) -> Result<(), AppError> {
    let paths = args.paths();
    let (batch, targets) = match pipeline::prepare_dispatch(&paths).await? {
        Prepared::Ready { batch, targets } => (batch, targets),
        Prepared::Skipped(reason) => {
            info!(reason = %reason, "Nothing to dispatch");
            return Ok(());
        }
    };

    let token = args
        .discord_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or(ConfigError::MissingCredential("DISCORD_BOT_TOKEN"))?;

    let asker = TemplateAsk::load(args.config.as_deref(), &args.template).await?;
    let enricher = LlmEnricher::new(
        RetryAsk::new(asker, ENRICH_MAX_RETRIES, std::time::Duration::from_secs(1)),
        args.enrichment_timeout(),
    );
    let mut chat = DiscordClient::new(http, &args.discord_api, token.trim());

    let outcome = pipeline::run_dispatch(
        &enricher,
        &mut chat,
        &batch,
        &targets,
        &paths,
        args.clear_batch,
    )
    .await?;

    match outcome {
        DispatchOutcome::Completed(report) => {
            for skipped in &report.skipped {
                warn!(reason = %skipped, "Target skipped");
            }
            info!(
                enriched = report.enriched,
                delivered = report.total_delivered(),
                served_targets = report.served_targets(),
                skipped = report.skipped.len(),
                "Dispatch stage complete"
            );
        }
        DispatchOutcome::Skipped(reason) => info!(reason = %reason, "Nothing to dispatch"),
    }
    Ok(())
}
