//! Output formatting for delivered messages.
//!
//! # Submodules
//!
//! - [`embed`]: Converts an [`EnrichedLink`](crate::models::EnrichedLink) into
//!   the card posted to each chat channel
//!
//! # Card Layout
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ Title (links to the article)             │
//! │ _03/2025_— Paragraph-length summary ...  │
//! │ https://example.gov/article/  (footer)   │
//! └──────────────────────────────────────────┘
//! ```

pub mod embed;
