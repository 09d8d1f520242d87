//! Discord delivery over the REST API.
//!
//! Uses three endpoints, all authenticated with `Authorization: Bot {token}`:
//!
//! - `GET /users/@me`: verifies the token on [`connect`](ChatClient::connect)
//! - `GET /channels/{id}`: resolves a target
//! - `POST /channels/{id}/messages`: posts one embed
//!
//! A `429 Too Many Requests` on resolve or send is retried after the
//! `retry_after` the API reports, up to [`MAX_ATTEMPTS`] attempts.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::{Channel, ChatClient};
use crate::error::{DeliveryError, TargetError};
use crate::models::Target;
use crate::outputs::embed::Embed;

/// Default Discord API root.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Attempts per request when rate limited.
pub const MAX_ATTEMPTS: usize = 3;

/// Longest rate-limit pause honoured before giving up on a message.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct CurrentUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    embeds: &'a [Embed],
}

#[derive(Debug, Deserialize)]
struct RateLimited {
    retry_after: f64,
}

/// [`ChatClient`] for a Discord bot.
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    /// Bot username once connected.
    user: Option<String>,
}

impl DiscordClient {
    pub fn new(http: reqwest::Client, api_base: &str, token: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            user: None,
        }
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

/// How long a `429` response asks us to wait.
async fn retry_after(resp: reqwest::Response) -> Duration {
    resp.json::<RateLimited>()
        .await
        .map(|r| Duration::from_secs_f64(r.retry_after.clamp(0.0, MAX_RETRY_AFTER.as_secs_f64())))
        .unwrap_or(Duration::from_secs(1))
}

impl fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordClient")
            .field("api_base", &self.api_base)
            .field("user", &self.user)
            .finish()
    }
}

impl ChatClient for DiscordClient {
    #[instrument(level = "info", skip_all)]
    async fn connect(&mut self) -> Result<String, DeliveryError> {
        let resp = self
            .http
            .get(self.url("/users/@me"))
            .header(AUTHORIZATION, self.authorization())
            .send()
            .await
            .map_err(|e| DeliveryError::Connect(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DeliveryError::Connect(format!("HTTP {status}")));
        }

        let user: CurrentUser = resp
            .json()
            .await
            .map_err(|e| DeliveryError::Connect(e.to_string()))?;
        info!(user = %user.username, "Bot logged in");
        self.user = Some(user.username.clone());
        Ok(user.username)
    }

    #[instrument(level = "info", skip(self))]
    async fn resolve(&self, target: Target) -> Result<Channel, TargetError> {
        let unresolvable = |reason: String| TargetError::Unresolvable {
            target: target.to_string(),
            reason,
        };

        let url = self.url(&format!("/channels/{target}"));

        let mut attempt = 0;
        let resp = loop {
            attempt += 1;
            let resp = self
                .http
                .get(&url)
                .header(AUTHORIZATION, self.authorization())
                .send()
                .await
                .map_err(|e| unresolvable(e.to_string()))?;

            let status = resp.status();
            if status.is_success() {
                break resp;
            }
            if status != StatusCode::TOO_MANY_REQUESTS {
                return Err(unresolvable(format!("HTTP {status}")));
            }
            if attempt >= MAX_ATTEMPTS {
                return Err(unresolvable(format!(
                    "still rate limited after {attempt} attempts"
                )));
            }

            let wait = retry_after(resp).await;
            warn!(attempt, ?wait, "Rate limited; waiting before retry");
            sleep(wait).await;
        };

        let info: ChannelInfo = resp.json().await.map_err(|e| unresolvable(e.to_string()))?;
        debug!(name = ?info.name, "Resolved channel");
        Ok(Channel {
            target,
            name: info.name,
        })
    }

    #[instrument(level = "debug", skip_all, fields(target = %channel.target))]
    async fn send(&self, channel: &Channel, embed: &Embed) -> Result<(), DeliveryError> {
        if self.user.is_none() {
            return Err(DeliveryError::Connect("client is not connected".into()));
        }

        let body = CreateMessage {
            embeds: std::slice::from_ref(embed),
        };
        let url = self.url(&format!("/channels/{}/messages", channel.target));

        let mut attempt = 0;
        loop {
            attempt += 1;
            let resp = self
                .http
                .post(&url)
                .header(AUTHORIZATION, self.authorization())
                .json(&body)
                .send()
                .await
                .map_err(|e| DeliveryError::Transport(e.to_string()))?;

            let status = resp.status();
            if status.is_success() {
                debug!(title = %embed.title, "Message posted");
                return Ok(());
            }

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                let wait = retry_after(resp).await;
                warn!(attempt, ?wait, "Rate limited; waiting before retry");
                sleep(wait).await;
                continue;
            }

            let body = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
    }

    async fn close(&mut self) {
        if let Some(user) = self.user.take() {
            info!(%user, "Bot connection closed");
        }
    }
}
