//! LLM API interaction with exponential backoff retry logic.
//!
//! This module is the transport half of the enrichment service: it sends
//! text to an OpenAI-compatible LLM API through `awful_aj` and returns the raw
//! response. Interpreting the response is left to [`crate::enrichment`].
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait defining async LLM interaction
//! - [`TemplateAsk`]: asks through `awful_aj` with a chat template
//! - [`RetryAsk`]: decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - Exponential backoff starting at `base_delay`
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay

use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};

use awful_aj::api::ask;
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use rand::{Rng, rng};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::error::ConfigError;

/// Name of the chat template used to enrich links.
pub const DEFAULT_TEMPLATE: &str = "link_enricher";

/// Trait for async LLM interaction.
///
/// Implementors send text to an LLM and receive a response. Decorators such
/// as [`RetryAsk`] and test doubles implement it too.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = TemplateAsk::load(None, DEFAULT_TEMPLATE).await?;
    /// let retry_client = RetryAsk::new(client, 5, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let mut delay = self
                        .base_delay
                        .saturating_mul(1u32 << (attempt - 1).min(16));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Asks through `awful_aj::api::ask` with a loaded config and chat template.
///
/// The template carries the system prompt and the response schema; the link
/// itself is the user message.
#[derive(Debug)]
pub struct TemplateAsk {
    /// LLM configuration (API keys, endpoints, model settings).
    config: AwfulJadeConfig,
    /// Chat template defining the conversation structure.
    template: ChatTemplate,
}

impl TemplateAsk {
    pub fn new(config: AwfulJadeConfig, template: ChatTemplate) -> Self {
        Self { config, template }
    }

    /// Load the `awful_aj` configuration and the named chat template.
    ///
    /// `config_path` defaults to `config.yaml` in the `awful_aj` config dir.
    #[instrument(level = "info")]
    pub async fn load(config_path: Option<&str>, template_name: &str) -> Result<Self, ConfigError> {
        let config_path = match config_path {
            Some(path) => path.to_string(),
            None => config_dir()
                .map_err(|e| ConfigError::Llm(format!("no awful_aj config dir: {e}")))?
                .join("config.yaml")
                .to_string_lossy()
                .into_owned(),
        };
        let config = config::load_config(&config_path)
            .map_err(|e| ConfigError::Llm(format!("failed to load {config_path}: {e}")))?;
        info!(%config_path, "Loaded LLM configuration");

        let template = template::load_template(template_name)
            .await
            .map_err(|e| {
                ConfigError::Llm(format!("failed to load template {template_name}: {e}"))
            })?;
        info!(template = template_name, "Loaded chat template");

        Ok(Self::new(config, template))
    }
}

impl AskAsync for TemplateAsk {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(&self.config, text.to_string(), &self.template, None, None).await;
        let dt = t0.elapsed();

        match &res {
            Ok(_) => info!(elapsed_ms = dt.as_millis(), "API call succeeded"),
            Err(e) => warn!(elapsed_ms = dt.as_millis(), error = %e, "API call failed"),
        }
        res
    }
}
