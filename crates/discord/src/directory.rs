use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use {
    async_trait::async_trait,
    serenity::{
        all::{Channel, GuildId, Http},
        http::HttpError,
    },
    tracing::debug,
};

use {
    mirrorlink_common::ChannelId,
    mirrorlink_relay::{ChannelDirectory, Error, ResolvedChannel, Result},
};

/// Discord JSON error code for "Unknown Channel".
const UNKNOWN_CHANNEL: isize = 10003;
/// Discord JSON error code for "Missing Access".
const MISSING_ACCESS: isize = 50001;

/// Parse a relay channel ID into a Discord snowflake.
pub(crate) fn snowflake(channel_id: &ChannelId) -> Option<serenity::all::ChannelId> {
    channel_id
        .as_str()
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|v| *v != 0)
        .map(serenity::all::ChannelId::new)
}

/// The channel is gone for the bot: deleted, or the bot lost access to it
/// (kicked from the server).
fn is_gone(err: &serenity::Error) -> bool {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) => {
            matches!(resp.status_code.as_u16(), 403 | 404)
                || matches!(resp.error.code, UNKNOWN_CHANNEL | MISSING_ACCESS)
        },
        _ => false,
    }
}

fn resolved(channel_id: &ChannelId, name: &str, server_name: Option<String>) -> ResolvedChannel {
    ResolvedChannel {
        id: channel_id.clone(),
        name: name.to_string(),
        server_name,
    }
}

/// Resolves channel IDs through the Discord REST API.
///
/// Server names are fetched once per guild and cached.
pub struct DiscordDirectory {
    http: Arc<Http>,
    guild_names: RwLock<HashMap<GuildId, String>>,
}

impl DiscordDirectory {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            guild_names: RwLock::new(HashMap::new()),
        }
    }

    fn cached_guild_name(&self, guild_id: GuildId) -> Option<String> {
        self.guild_names
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&guild_id)
            .cloned()
    }

    fn remember_guild_name(&self, guild_id: GuildId, name: String) {
        self.guild_names
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(guild_id, name);
    }

    /// Best effort: a failed lookup leaves the server unnamed.
    async fn guild_name(&self, guild_id: GuildId) -> Option<String> {
        if let Some(name) = self.cached_guild_name(guild_id) {
            return Some(name);
        }
        match guild_id.to_partial_guild(&self.http).await {
            Ok(guild) => {
                self.remember_guild_name(guild_id, guild.name.clone());
                Some(guild.name)
            },
            Err(e) => {
                debug!(guild_id = %guild_id, error = %e, "guild name lookup failed");
                None
            },
        }
    }
}

#[async_trait]
impl ChannelDirectory for DiscordDirectory {
    async fn resolve(&self, channel_id: &ChannelId) -> Result<ResolvedChannel> {
        let Some(id) = snowflake(channel_id) else {
            return Err(Error::channel_resolution(channel_id, "not a Discord channel id"));
        };

        match id.to_channel(&self.http).await {
            Ok(Channel::Guild(channel)) => {
                let server_name = self.guild_name(channel.guild_id).await;
                Ok(resolved(channel_id, &channel.name, server_name))
            },
            Ok(_) => Err(Error::channel_resolution(
                channel_id,
                "not a server text channel",
            )),
            Err(e) if is_gone(&e) => Err(Error::channel_resolution(channel_id, e)),
            Err(e) => Err(Error::unavailable(format!(
                "lookup of channel {channel_id} failed: {e}"
            ))),
        }
    }
}
