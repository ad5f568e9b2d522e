//! Collaborator interfaces the relay core consumes.
//!
//! The chat platform adapter implements [`ChannelDirectory`] and
//! [`EndpointProvider`], and feeds normalized [`InboundMessage`]s into the
//! service.

use {async_trait::async_trait, mirrorlink_common::ChannelId, serde::Serialize};

use crate::{Result, payload::MirroredMessage};

/// A message event as delivered by the platform gateway, stripped down to
/// what the relay needs.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub channel_id: ChannelId,
    /// Posted by a bot, webhook or other automated identity.
    pub author_is_automated: bool,
    /// Platform-generated message (joins, pins, boosts, ...).
    pub is_system_message: bool,
    pub content: String,
    pub attachments: Vec<InboundAttachment>,
    pub embeds: Vec<InboundEmbed>,
    pub author_display_name: String,
    pub author_avatar_url: Option<String>,
    pub server_display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundAttachment {
    pub url: String,
    pub filename: String,
}

/// An embed attached to an inbound message.
///
/// `kind` is the platform's embed type (`"rich"`, `"image"`, `"link"`, ...);
/// `data` is the embed object in the platform's own JSON shape so the adapter
/// can re-emit it untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEmbed {
    pub kind: Option<String>,
    pub data: serde_json::Value,
}

impl InboundEmbed {
    pub fn is_rich(&self) -> bool {
        self.kind.as_deref() == Some("rich")
    }
}

/// A live channel as reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedChannel {
    pub id: ChannelId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}

/// An outbound posting target bound to one channel, able to send under an
/// arbitrary display name and avatar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelayEndpoint {
    /// Channel this endpoint posts into.
    pub channel_id: ChannelId,
    /// Platform identifier of the endpoint (e.g. a webhook ID).
    pub endpoint_id: String,
}

/// Looks up live channels.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Resolve a channel ID.
    ///
    /// Returns [`Error::ChannelResolution`](crate::Error::ChannelResolution)
    /// when the channel does not exist; any other error is treated as
    /// transient.
    async fn resolve(&self, channel_id: &ChannelId) -> Result<ResolvedChannel>;
}

/// Provisions relay endpoints and posts through them.
#[async_trait]
pub trait EndpointProvider: Send + Sync {
    /// Find an existing endpoint in `channel_id` carrying the reserved `name`.
    async fn find_named_endpoint(
        &self,
        channel_id: &ChannelId,
        name: &str,
    ) -> Result<Option<RelayEndpoint>>;

    /// Create a new endpoint in `channel_id` under the reserved `name`.
    async fn create_endpoint(&self, channel_id: &ChannelId, name: &str) -> Result<RelayEndpoint>;

    /// Post a mirrored message through `endpoint`.
    async fn send(&self, endpoint: &RelayEndpoint, payload: &MirroredMessage) -> Result<()>;

    /// Post one payload through every endpoint in `targets` concurrently.
    ///
    /// Returns one result per target, in `targets` order. Providers override
    /// this to share per-payload work across targets, such as fetching
    /// attachments once.
    async fn send_all(
        &self,
        targets: &[RelayEndpoint],
        payload: &MirroredMessage,
    ) -> Vec<Result<()>> {
        let sends = targets.iter().map(|endpoint| self.send(endpoint, payload));
        futures::future::join_all(sends).await
    }

    /// Called whenever a new relay table is published, with the endpoints it
    /// routes to. Anything the provider holds for other endpoints is stale.
    fn retain_endpoints(&self, _active: &[RelayEndpoint]) {}
}
