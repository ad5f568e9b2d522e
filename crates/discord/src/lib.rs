//! Discord adapter for the mirrorlink relay.
//!
//! Implements the relay's channel directory and endpoint provider on top of
//! serenity's HTTP client and webhooks, and feeds gateway events and `/mirror`
//! slash commands into a [`MirrorService`](mirrorlink_relay::MirrorService).

pub mod bot;
pub mod commands;
pub mod directory;
pub mod handler;
pub mod inbound;
pub mod webhooks;

pub use {
    bot::{build_client, intents, mirror_service},
    directory::DiscordDirectory,
    handler::MirrorHandler,
    webhooks::DiscordWebhooks,
};
