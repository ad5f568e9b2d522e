use std::sync::Arc;

use {
    secrecy::{ExposeSecret, Secret},
    serenity::all::{Client, GatewayIntents, Http},
};

use {
    mirrorlink_config::MirrorlinkConfig,
    mirrorlink_relay::{JsonLinkStore, MirrorService},
};

use crate::{DiscordDirectory, DiscordWebhooks, MirrorHandler};

/// Gateway intents the mirror needs: guild channels, guild messages and
/// their content.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
}

/// Wire a [`MirrorService`] to the Discord REST API and the configured link
/// file. The service is not initialized.
pub fn mirror_service(http: Arc<Http>, config: &MirrorlinkConfig) -> Arc<MirrorService> {
    let store = Arc::new(JsonLinkStore::new(config.links.resolved_path()));
    Arc::new(MirrorService::new(
        store,
        Arc::new(DiscordDirectory::new(Arc::clone(&http))),
        Arc::new(DiscordWebhooks::new(http)),
        config.discord.webhook_name.clone(),
    ))
}

pub async fn build_client(token: &Secret<String>, handler: MirrorHandler) -> anyhow::Result<Client> {
    let client = Client::builder(token.expose_secret(), intents())
        .event_handler(handler)
        .await?;
    Ok(client)
}
