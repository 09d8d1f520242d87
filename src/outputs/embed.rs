//! Card (embed) formatting for chat delivery.
//!
//! One [`Embed`] is built per enriched link and posted unchanged to every
//! target. Field lengths are clamped to the limits chat platforms enforce so
//! an unusually long summary cannot get the whole message rejected.

use serde::Serialize;

use crate::models::EnrichedLink;
use crate::utils::clamp_chars;

pub const TITLE_LIMIT: usize = 256;
pub const DESCRIPTION_LIMIT: usize = 4096;
pub const FOOTER_LIMIT: usize = 2048;

/// A titled, linked card with the bare link repeated in the footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub description: String,
    pub footer: EmbedFooter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Build the card for one enriched link.
///
/// The description reads `_{MM/YYYY}_— {summary}`.
pub fn build_embed(enriched: &EnrichedLink) -> Embed {
    let description = format!("_{}_— {}", enriched.date, enriched.summary);
    Embed {
        title: clamp_chars(&enriched.title, TITLE_LIMIT),
        url: enriched.link.clone(),
        description: clamp_chars(&description, DESCRIPTION_LIMIT),
        footer: EmbedFooter {
            text: clamp_chars(&enriched.link, FOOTER_LIMIT),
        },
    }
}
