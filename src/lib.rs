//! News Relay: incremental crawl of a news listing, LLM summaries of the new
//! links, and delivery of those summaries to chat channels.
//!
//! The binary in `main.rs` is a thin wrapper around [`pipeline`]. Everything
//! that talks to the outside world sits behind a trait
//! ([`scrapers::PageFetcher`], [`enrichment::Enricher`], [`api::AskAsync`],
//! [`chat::ChatClient`]) so the stages can be driven with fakes.

pub mod api;
pub mod batch;
pub mod chat;
pub mod cli;
pub mod crawler;
pub mod dispatcher;
pub mod enrichment;
pub mod error;
pub mod ledger;
pub mod models;
pub mod outputs;
pub mod pipeline;
pub mod scrapers;
pub mod targets;
pub mod utils;
