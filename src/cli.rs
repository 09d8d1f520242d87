//! Command-line interface definitions for News Relay.
//!
//! Every option has a default or an environment fallback, so a bare
//! `news_relay` runs the crawl stage followed by the dispatch stage.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::api::DEFAULT_TEMPLATE;
use crate::chat::discord::DEFAULT_API_BASE;
use crate::pipeline::{DEFAULT_BATCH_FILE, DEFAULT_LEDGER_FILE, DEFAULT_TARGETS_FILE, Paths};
use crate::scrapers::listing::DEFAULT_LISTING_URL;

/// Command-line arguments for News Relay.
///
/// # Examples
///
/// ```sh
/// # Crawl, then post whatever is new
/// news_relay
///
/// # Crawl at most three pages and leave delivery for later
/// news_relay crawl --no-dispatch --max-pages 3
///
/// # Post the last batch and empty it afterwards
/// DISCORD_BOT_TOKEN=... news_relay dispatch --clear-batch
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Ledger of every link seen so far
    #[arg(long, global = true, default_value = DEFAULT_LEDGER_FILE)]
    pub ledger: PathBuf,

    /// Batch file handed from the crawl stage to the dispatch stage
    #[arg(long, global = true, default_value = DEFAULT_BATCH_FILE)]
    pub batch: PathBuf,

    /// Channel ids to post to, one per line
    #[arg(long, global = true, default_value = DEFAULT_TARGETS_FILE)]
    pub targets: PathBuf,

    /// Listing page 1; page N is fetched from `{url}/page/{N}/`
    #[arg(long, global = true, env = "NEWS_RELAY_LISTING_URL", default_value = DEFAULT_LISTING_URL)]
    pub listing_url: String,

    /// Discord bot token
    #[arg(long, global = true, env = "DISCORD_BOT_TOKEN", hide_env_values = true)]
    pub discord_token: Option<String>,

    /// Discord REST API root
    #[arg(long, global = true, default_value = DEFAULT_API_BASE)]
    pub discord_api: String,

    /// Optional path to the awful_aj config.yaml file
    #[arg(short, long, global = true, env = "AWFUL_AJ_CONFIG")]
    pub config: Option<String>,

    /// awful_aj chat template used to enrich links
    #[arg(long, global = true, default_value = DEFAULT_TEMPLATE)]
    pub template: String,

    /// Truncate the batch file after a completed dispatch
    #[arg(long, global = true)]
    pub clear_batch: bool,

    /// Timeout for listing and chat HTTP requests, in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Timeout for enriching a single link, retries included, in seconds
    #[arg(long, global = true, default_value_t = 120)]
    pub enrichment_timeout_secs: u64,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Discover new links, then dispatch them (the default)
    Crawl {
        /// Only update the ledger and batch file
        #[arg(long)]
        no_dispatch: bool,

        /// Stop after this many listing pages
        #[arg(long)]
        max_pages: Option<u32>,
    },
    /// Post the links of the last crawl
    Dispatch,
}

impl Cli {
    /// The subcommand to run; no subcommand means a full crawl.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Crawl {
            no_dispatch: false,
            max_pages: None,
        })
    }

    pub fn paths(&self) -> Paths {
        Paths {
            ledger: self.ledger.clone(),
            batch: self.batch.clone(),
            targets: self.targets.clone(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_secs(self.enrichment_timeout_secs)
    }
}
