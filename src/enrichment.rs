//! Enrichment: turning a bare link into a title, a month and a summary.
//!
//! The dispatcher only sees the [`Enricher`] trait. [`LlmEnricher`] is the
//! production implementation; it sends the link to the LLM through an
//! [`AskAsync`] transport and validates the JSON it gets back against the
//! fixed `{title, summary, date}` schema. A response that does not fit is an
//! [`EnrichmentError::MalformedResponse`], never a half-filled summary.

use std::time::Duration;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::api::AskAsync;
use crate::error::EnrichmentError;
use crate::models::LinkSummary;
use crate::utils::{looks_truncated, truncate_for_log};

/// Produce structured metadata for a link.
pub trait Enricher {
    async fn enrich(&self, link: &str) -> Result<LinkSummary, EnrichmentError>;
}

impl<T: Enricher> Enricher for &T {
    async fn enrich(&self, link: &str) -> Result<LinkSummary, EnrichmentError> {
        (**self).enrich(link).await
    }
}

/// [`Enricher`] backed by an LLM.
#[derive(Debug)]
pub struct LlmEnricher<A> {
    asker: A,
    timeout: Duration,
}

impl<A> LlmEnricher<A>
where
    A: AskAsync<Response = String>,
{
    /// `timeout` bounds each ask, retries included.
    pub fn new(asker: A, timeout: Duration) -> Self {
        Self { asker, timeout }
    }

    async fn ask_once(&self, link: &str) -> Result<String, EnrichmentError> {
        let unreachable = |reason: String| EnrichmentError::Unreachable {
            link: link.to_string(),
            reason,
        };
        match timeout(self.timeout, self.asker.ask(link)).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => Err(unreachable(e.to_string())),
            Err(_) => Err(unreachable(format!(
                "no response within {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

impl<A> Enricher for LlmEnricher<A>
where
    A: AskAsync<Response = String>,
{
    #[instrument(level = "info", skip(self))]
    async fn enrich(&self, link: &str) -> Result<LinkSummary, EnrichmentError> {
        let mut raw = self.ask_once(link).await?;
        let mut decoded = decode(&raw);

        if let Err(ref e) = decoded {
            if looks_truncated(e) {
                warn!(error = %e, "EOF while parsing; re-asking once");
                raw = self.ask_once(link).await?;
                decoded = decode(&raw);
            }
        }

        let summary = decoded.map_err(|e| {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&raw, 300),
                "Model returned non-conforming JSON"
            );
            EnrichmentError::MalformedResponse {
                link: link.to_string(),
                reason: e.to_string(),
            }
        })?;

        let summary = validate(link, summary)?;
        info!(title = %summary.title, date = %summary.date, "Enriched link");
        Ok(summary)
    }
}

/// Parse a raw LLM response, tolerating a surrounding Markdown code fence.
fn decode(raw: &str) -> Result<LinkSummary, serde_json::Error> {
    serde_json::from_str(strip_code_fence(raw))
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line. A one-line
    // reply has no newline, so the info string runs straight into the body.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Check a decoded summary for blank fields and normalize its date.
pub fn validate(link: &str, summary: LinkSummary) -> Result<LinkSummary, EnrichmentError> {
    let malformed = |reason: String| EnrichmentError::MalformedResponse {
        link: link.to_string(),
        reason,
    };

    let title = summary.title.trim();
    if title.is_empty() {
        return Err(malformed("empty title".into()));
    }
    let body = summary.summary.trim();
    if body.is_empty() {
        return Err(malformed("empty summary".into()));
    }
    let date = normalize_date(&summary.date)
        .ok_or_else(|| malformed(format!("unrecognized date '{}'", summary.date)))?;
    debug!(raw_date = %summary.date, %date, "Normalized date");

    Ok(LinkSummary {
        title: title.to_string(),
        summary: body.to_string(),
        date,
    })
}

static MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\s*/\s*(\d{4})$").expect("month/year regex is valid"));

static ISO_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").expect("ISO month regex is valid"));

/// Normalize a publication date to `MM/YYYY`.
///
/// Accepts `MM/YYYY`, `M/YYYY`, `YYYY-MM`, `YYYY-MM-DD`, `MM/DD/YYYY`,
/// `Month D, YYYY` and `Month YYYY`. Returns `None` for anything else.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();

    let (month, year) = if let Some(caps) = MONTH_YEAR.captures(raw) {
        (caps[1].parse::<u32>().ok()?, caps[2].parse::<i32>().ok()?)
    } else if let Some(caps) = ISO_MONTH.captures(raw) {
        (caps[2].parse::<u32>().ok()?, caps[1].parse::<i32>().ok()?)
    } else {
        let date = ["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%B %d %Y"]
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
            .or_else(|| NaiveDate::parse_from_str(&format!("1 {raw}"), "%d %B %Y").ok())?;
        return Some(date.format("%m/%Y").to_string());
    };

    if !(1..=12).contains(&month) {
        return None;
    }
    Some(format!("{month:02}/{year:04}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::error::Error;

    /// Replays canned responses in order.
    #[derive(Debug)]
    struct Scripted {
        responses: RefCell<Vec<Result<String, String>>>,
        delay: Option<Duration>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<&str, &str>>) -> Self {
            Self {
                responses: RefCell::new(
                    responses
                        .into_iter()
                        .rev()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                delay: None,
            }
        }
    }

    impl AskAsync for Scripted {
        type Response = String;

        async fn ask(&self, _text: &str) -> Result<String, Box<dyn Error>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.responses.borrow_mut().pop();
            match next {
                Some(Ok(raw)) => Ok(raw),
                Some(Err(e)) => Err(e.into()),
                None => Err("no more responses".into()),
            }
        }
    }

    fn enricher(responses: Vec<Result<&str, &str>>) -> LlmEnricher<Scripted> {
        LlmEnricher::new(Scripted::new(responses), Duration::from_secs(5))
    }

    const LINK: &str = "https://example.gov/briefings/one/";

    #[tokio::test]
    async fn test_enrich_valid_response() {
        let e = enricher(vec![Ok(
            r#"{"title": " Fact Sheet ", "summary": "The summary.", "date": "3/2025"}"#,
        )]);
        let summary = e.enrich(LINK).await.unwrap();
        assert_eq!(summary.title, "Fact Sheet");
        assert_eq!(summary.summary, "The summary.");
        assert_eq!(summary.date, "03/2025");
    }

    #[tokio::test]
    async fn test_enrich_strips_code_fence() {
        let e = enricher(vec![Ok(
            "```json\n{\"title\": \"T\", \"summary\": \"S\", \"date\": \"2025-01\"}\n```",
        )]);
        let summary = e.enrich(LINK).await.unwrap();
        assert_eq!(summary.date, "01/2025");
    }

    #[tokio::test]
    async fn test_enrich_one_line_code_fence() {
        // Only one response is scripted: a re-ask would fail as unreachable.
        let e = enricher(vec![Ok(
            r#"```json{"title": "T", "summary": "S", "date": "05/2025"}```"#,
        )]);
        let summary = e.enrich(LINK).await.unwrap();
        assert_eq!(summary.title, "T");
        assert_eq!(summary.date, "05/2025");
    }

    #[tokio::test]
    async fn test_enrich_reasks_once_on_truncation() {
        let e = enricher(vec![
            Ok(r#"{"title": "T", "summ"#),
            Ok(r#"{"title": "T", "summary": "S", "date": "04/2024"}"#),
        ]);
        let summary = e.enrich(LINK).await.unwrap();
        assert_eq!(summary.date, "04/2024");
    }

    #[tokio::test]
    async fn test_enrich_missing_field_is_malformed() {
        let e = enricher(vec![Ok(r#"{"title": "T", "summary": "S"}"#)]);
        let err = e.enrich(LINK).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_enrich_blank_summary_is_malformed() {
        let e = enricher(vec![Ok(r#"{"title": "T", "summary": "  ", "date": "04/2024"}"#)]);
        let err = e.enrich(LINK).await.unwrap_err();
        assert_eq!(
            err,
            EnrichmentError::MalformedResponse {
                link: LINK.to_string(),
                reason: "empty summary".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_enrich_bad_date_is_malformed() {
        let e = enricher(vec![Ok(r#"{"title": "T", "summary": "S", "date": "sometime"}"#)]);
        let err = e.enrich(LINK).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_enrich_transport_failure_is_unreachable() {
        let e = enricher(vec![Err("connection refused")]);
        let err = e.enrich(LINK).await.unwrap_err();
        assert_eq!(
            err,
            EnrichmentError::Unreachable {
                link: LINK.to_string(),
                reason: "connection refused".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrich_timeout_is_unreachable() {
        let mut scripted = Scripted::new(vec![Ok("{}")]);
        scripted.delay = Some(Duration::from_secs(60));
        let e = LlmEnricher::new(scripted, Duration::from_secs(1));

        let err = e.enrich(LINK).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Unreachable { .. }));
    }

    #[test]
    fn test_normalize_date_formats() {
        assert_eq!(normalize_date("03/2025").as_deref(), Some("03/2025"));
        assert_eq!(normalize_date("3/2025").as_deref(), Some("03/2025"));
        assert_eq!(normalize_date("2025-11").as_deref(), Some("11/2025"));
        assert_eq!(normalize_date("2025-11-04").as_deref(), Some("11/2025"));
        assert_eq!(normalize_date("11/04/2025").as_deref(), Some("11/2025"));
        assert_eq!(normalize_date("November 4, 2025").as_deref(), Some("11/2025"));
        assert_eq!(normalize_date("January 2026").as_deref(), Some("01/2026"));
    }

    #[test]
    fn test_normalize_date_rejects_garbage() {
        assert_eq!(normalize_date("13/2025"), None);
        assert_eq!(normalize_date("00/2025"), None);
        assert_eq!(normalize_date("2025-02-30"), None);
        assert_eq!(normalize_date("unknown"), None);
        assert_eq!(normalize_date(""), None);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```\n"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```json{\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```{\"a\": 1}```"), "{\"a\": 1}");
    }
}
