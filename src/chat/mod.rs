//! Chat platform delivery.
//!
//! The dispatcher talks to the platform only through [`ChatClient`], a
//! two-phase contract: [`connect`](ChatClient::connect) once, then resolve
//! targets and send messages, then [`close`](ChatClient::close). There is no
//! long-lived event loop; the client is constructed per dispatch run.
//!
//! | Platform | Module | Transport |
//! |----------|--------|-----------|
//! | Discord | [`discord`] | REST API v10 with a bot token |

use crate::error::{DeliveryError, TargetError};
use crate::models::Target;
use crate::outputs::embed::Embed;

pub mod discord;

/// A resolved delivery destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub target: Target,
    pub name: Option<String>,
}

/// Narrow interface to a chat platform.
pub trait ChatClient {
    /// Authenticate and return the identity the messages will be posted as.
    async fn connect(&mut self) -> Result<String, DeliveryError>;

    /// Look up a target; an unknown or inaccessible channel is an error.
    async fn resolve(&self, target: Target) -> Result<Channel, TargetError>;

    /// Post one card to a resolved channel.
    async fn send(&self, channel: &Channel, embed: &Embed) -> Result<(), DeliveryError>;

    /// Tear down the session. Safe to call when not connected.
    async fn close(&mut self);
}
