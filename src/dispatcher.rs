//! Notification dispatch: enrich every new link, then post one card per link
//! to every target.
//!
//! # Order of operations
//!
//! 1. Preconditions: an empty batch or an empty targets list ends the run
//!    before anything else happens.
//! 2. Enrichment: each link is enriched exactly once, in batch order. If any
//!    link fails, the whole dispatch is aborted before connecting to the chat
//!    platform. Nothing is posted and the batch file is left in place, so the
//!    stage can simply be run again.
//! 3. Delivery: connect, then for each target resolve it and post every card
//!    in batch order. A target that cannot be used is skipped with a warning;
//!    the other targets are still served.
//! 4. Teardown: the chat client is closed whether or not delivery succeeded.

use std::fmt;

use tracing::{error, info, instrument, warn};

use crate::chat::ChatClient;
use crate::enrichment::Enricher;
use crate::error::{AppError, ConfigError, TargetError};
use crate::models::{EnrichedLink, Link, Target};
use crate::outputs::embed::{Embed, build_embed};
use crate::targets::parse_targets;

/// Why a dispatch run did nothing.
#[derive(Debug)]
pub enum SkipReason {
    /// The batch or targets file is missing.
    Config(ConfigError),
    /// The batch file holds no links.
    EmptyBatch,
    /// The targets file holds no entries.
    NoTargets,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Config(e) => write!(f, "{e}"),
            SkipReason::EmptyBatch => write!(f, "no new links found to dispatch"),
            SkipReason::NoTargets => write!(f, "no targets listed; no channels to post to"),
        }
    }
}

/// What a completed dispatch did.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Links enriched (always the whole batch when the run completes).
    pub enriched: usize,
    /// Messages delivered per resolved target, in target-list order. A target
    /// whose delivery stopped early appears with its partial count.
    pub delivered: Vec<(Target, usize)>,
    /// Targets that were skipped, with the reason.
    pub skipped: Vec<TargetError>,
}

impl DispatchReport {
    /// Messages delivered to `target`.
    pub fn delivered_to(&self, target: Target) -> usize {
        self.delivered
            .iter()
            .find(|(t, _)| *t == target)
            .map_or(0, |(_, count)| *count)
    }

    /// Targets that received every message of the batch.
    pub fn served_targets(&self) -> usize {
        self.delivered
            .iter()
            .filter(|(_, count)| *count == self.enriched)
            .count()
    }

    pub fn total_delivered(&self) -> usize {
        self.delivered.iter().map(|(_, count)| count).sum()
    }
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Skipped(SkipReason),
    Completed(DispatchReport),
}

/// Enriches a batch and delivers it through a chat client.
pub struct Dispatcher<'a, E, C> {
    enricher: &'a E,
    chat: &'a mut C,
}

impl<'a, E, C> Dispatcher<'a, E, C>
where
    E: Enricher,
    C: ChatClient,
{
    pub fn new(enricher: &'a E, chat: &'a mut C) -> Self {
        Self { enricher, chat }
    }

    /// Deliver `batch` to every entry of `targets`.
    ///
    /// Returns an error only when enrichment fails or the chat client cannot
    /// connect; per-target problems are reported in [`DispatchReport::skipped`].
    #[instrument(level = "info", skip_all, fields(links = batch.len(), targets = targets.len()))]
    pub async fn dispatch(
        &mut self,
        batch: &[Link],
        targets: &[String],
    ) -> Result<DispatchOutcome, AppError> {
        if batch.is_empty() {
            info!("No new links found to dispatch.");
            return Ok(DispatchOutcome::Skipped(SkipReason::EmptyBatch));
        }
        if targets.is_empty() {
            info!("No targets listed. No channels to post to.");
            return Ok(DispatchOutcome::Skipped(SkipReason::NoTargets));
        }

        info!("Building embeds");
        let embeds = self.build_embeds(batch).await?;

        let identity = self.chat.connect().await?;
        info!(%identity, "Connected to chat platform");

        let mut report = self.deliver(&embeds, targets).await;
        report.enriched = embeds.len();

        self.chat.close().await;
        info!(
            delivered = report.total_delivered(),
            served_targets = report.served_targets(),
            skipped_targets = report.skipped.len(),
            "All links posted. Shutting down."
        );
        Ok(DispatchOutcome::Completed(report))
    }

    async fn build_embeds(&self, batch: &[Link]) -> Result<Vec<Embed>, AppError> {
        let mut embeds = Vec::with_capacity(batch.len());
        for (index, link) in batch.iter().enumerate() {
            let summary = self.enricher.enrich(link).await.map_err(|e| {
                error!(index, %link, error = %e, "Enrichment failed; aborting dispatch");
                e
            })?;
            let enriched = EnrichedLink::new(link.clone(), summary);
            embeds.push(build_embed(&enriched));
        }
        Ok(embeds)
    }

    async fn deliver(&self, embeds: &[Embed], entries: &[String]) -> DispatchReport {
        let (targets, rejected) = parse_targets(entries);
        let mut report = DispatchReport {
            skipped: rejected,
            ..Default::default()
        };

        for target in targets {
            let channel = match self.chat.resolve(target).await {
                Ok(channel) => channel,
                Err(e) => {
                    warn!(%target, error = %e, "Could not resolve channel. Skipping.");
                    report.skipped.push(e);
                    continue;
                }
            };

            info!(%target, count = embeds.len(), "Posting new links to channel");
            let mut delivered = 0;
            for embed in embeds {
                if let Err(e) = self.chat.send(&channel, embed).await {
                    warn!(
                        %target,
                        delivered,
                        error = %e,
                        "Delivery failed. Skipping rest of channel."
                    );
                    report.skipped.push(TargetError::DeliveryFailed {
                        target: target.to_string(),
                        delivered,
                        reason: e.to_string(),
                    });
                    break;
                }
                delivered += 1;
            }
            report.delivered.push((target, delivered));
        }

        report
    }
}
