use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use {
    async_trait::async_trait,
    serenity::all::{
        CreateAllowedMentions, CreateAttachment, CreateEmbed, CreateWebhook, Embed,
        ExecuteWebhook, Http, Webhook, WebhookType,
    },
    tracing::{debug, warn},
};

use {
    mirrorlink_common::ChannelId,
    mirrorlink_relay::{
        EndpointProvider, Error, MirroredMessage, RelayEndpoint, Result,
        payload::{AllowedMentions, AttachmentRef, MentionKind},
    },
};

use crate::directory::snowflake;

const AUDIT_LOG_REASON: &str = "Mirror bot webhook for message forwarding";

/// Relay endpoints backed by channel webhooks.
///
/// Webhooks found or created during provisioning are cached by ID so sends
/// don't refetch them. The cache follows the published relay table.
pub struct DiscordWebhooks {
    http: Arc<Http>,
    client: reqwest::Client,
    webhooks: RwLock<HashMap<String, Webhook>>,
}

impl DiscordWebhooks {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            client: reqwest::Client::new(),
            webhooks: RwLock::new(HashMap::new()),
        }
    }

    fn remember(&self, channel_id: &ChannelId, webhook: Webhook) -> RelayEndpoint {
        let endpoint = RelayEndpoint {
            channel_id: channel_id.clone(),
            endpoint_id: webhook.id.to_string(),
        };
        self.webhooks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(endpoint.endpoint_id.clone(), webhook);
        endpoint
    }

    fn cached(&self, endpoint_id: &str) -> Option<Webhook> {
        self.webhooks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(endpoint_id)
            .cloned()
    }

    async fn download(&self, attachment: &AttachmentRef) -> anyhow::Result<CreateAttachment> {
        let bytes = self
            .client
            .get(&attachment.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(CreateAttachment::bytes(
            bytes.to_vec(),
            attachment.filename.clone(),
        ))
    }

    /// Fetch every attachment of `payload` for re-upload.
    async fn download_all(&self, payload: &MirroredMessage) -> anyhow::Result<Vec<CreateAttachment>> {
        let mut files = Vec::with_capacity(payload.attachments().len());
        for attachment in payload.attachments() {
            files.push(self.download(attachment).await?);
        }
        Ok(files)
    }

    async fn deliver(
        &self,
        endpoint: &RelayEndpoint,
        payload: &MirroredMessage,
        files: &[CreateAttachment],
    ) -> Result<()> {
        let webhook = self.cached(&endpoint.endpoint_id).ok_or_else(|| {
            Error::send(
                &endpoint.channel_id,
                std::io::Error::other(format!("webhook {} not provisioned", endpoint.endpoint_id)),
            )
        })?;

        webhook
            .execute(&self.http, false, build(payload, files))
            .await
            .map_err(|e| Error::send(&endpoint.channel_id, e))?;

        debug!(
            target_channel = %endpoint.channel_id,
            source = %payload.source_label(),
            "relayed message via webhook"
        );
        Ok(())
    }
}

fn build(payload: &MirroredMessage, files: &[CreateAttachment]) -> ExecuteWebhook {
    let mut builder = ExecuteWebhook::new()
        .username(payload.username())
        .allowed_mentions(allowed_mentions(payload.allowed_mentions()));

    if let Some(content) = payload.content() {
        builder = builder.content(content);
    }
    if let Some(avatar) = payload.avatar_url() {
        builder = builder.avatar_url(avatar);
    }

    let embeds = rich_embeds(payload.embeds());
    if !embeds.is_empty() {
        builder = builder.embeds(embeds);
    }

    builder.add_files(files.iter().cloned())
}

/// Translate the relay's mention policy. Mirrored payloads always carry the
/// empty policy, which serializes to `"parse": []`.
fn allowed_mentions(policy: &AllowedMentions) -> CreateAllowedMentions {
    let parse = policy.parse();
    CreateAllowedMentions::new()
        .everyone(parse.contains(&MentionKind::Everyone))
        .all_users(parse.contains(&MentionKind::Users))
        .all_roles(parse.contains(&MentionKind::Roles))
        .replied_user(false)
}

fn rich_embeds(raw: &[serde_json::Value]) -> Vec<CreateEmbed> {
    raw.iter()
        .filter_map(|value| match serde_json::from_value::<Embed>(value.clone()) {
            Ok(embed) => Some(CreateEmbed::from(embed)),
            Err(e) => {
                warn!(error = %e, "dropping embed that failed to decode");
                None
            },
        })
        .collect()
}

/// Only incoming webhooks that expose their token can be executed by us.
fn is_usable(webhook: &Webhook, name: &str) -> bool {
    webhook.kind == WebhookType::Incoming
        && webhook.token.is_some()
        && webhook.name.as_deref() == Some(name)
}

#[async_trait]
impl EndpointProvider for DiscordWebhooks {
    async fn find_named_endpoint(
        &self,
        channel_id: &ChannelId,
        name: &str,
    ) -> Result<Option<RelayEndpoint>> {
        let Some(id) = snowflake(channel_id) else {
            return Err(Error::channel_resolution(channel_id, "not a Discord channel id"));
        };
        let webhooks = id
            .webhooks(&self.http)
            .await
            .map_err(|e| Error::endpoint_provision(channel_id, e))?;

        Ok(webhooks
            .into_iter()
            .find(|w| is_usable(w, name))
            .map(|w| self.remember(channel_id, w)))
    }

    async fn create_endpoint(&self, channel_id: &ChannelId, name: &str) -> Result<RelayEndpoint> {
        let Some(id) = snowflake(channel_id) else {
            return Err(Error::channel_resolution(channel_id, "not a Discord channel id"));
        };
        let webhook = id
            .create_webhook(
                &self.http,
                CreateWebhook::new(name).audit_log_reason(AUDIT_LOG_REASON),
            )
            .await
            .map_err(|e| Error::endpoint_provision(channel_id, e))?;
        Ok(self.remember(channel_id, webhook))
    }

    async fn send(&self, endpoint: &RelayEndpoint, payload: &MirroredMessage) -> Result<()> {
        let files = self
            .download_all(payload)
            .await
            .map_err(|e| Error::send(&endpoint.channel_id, std::io::Error::other(e.to_string())))?;
        self.deliver(endpoint, payload, &files).await
    }

    /// Attachments are downloaded once and re-uploaded to every target.
    async fn send_all(
        &self,
        targets: &[RelayEndpoint],
        payload: &MirroredMessage,
    ) -> Vec<Result<()>> {
        let files = match self.download_all(payload).await {
            Ok(files) => files,
            Err(e) => {
                warn!(source = %payload.source_label(), error = %e, "attachment download failed");
                let message = e.to_string();
                return targets
                    .iter()
                    .map(|t| Err(Error::send(&t.channel_id, std::io::Error::other(message.clone()))))
                    .collect();
            },
        };
        let sends = targets
            .iter()
            .map(|endpoint| self.deliver(endpoint, payload, &files));
        futures::future::join_all(sends).await
    }

    fn retain_endpoints(&self, active: &[RelayEndpoint]) {
        let mut webhooks = self.webhooks.write().unwrap_or_else(|e| e.into_inner());
        let before = webhooks.len();
        webhooks.retain(|id, _| active.iter().any(|e| &e.endpoint_id == id));
        if webhooks.len() != before {
            debug!(
                dropped = before - webhooks.len(),
                remaining = webhooks.len(),
                "pruned webhook cache"
            );
        }
    }
}
