//! Discord event handler for serenity.

use std::sync::Arc;

use {
    serenity::{
        all::{Context, EventHandler, Interaction, Message, Ready},
        async_trait,
    },
    tracing::{debug, info, warn},
};

use mirrorlink_relay::{DispatchOutcome, MirrorService};

use crate::{commands, inbound};

/// Feeds gateway events into a [`MirrorService`].
pub struct MirrorHandler {
    pub service: Arc<MirrorService>,
    pub register_commands: bool,
}

impl MirrorHandler {
    pub fn new(service: Arc<MirrorService>, register_commands: bool) -> Self {
        Self {
            service,
            register_commands,
        }
    }
}

#[async_trait]
impl EventHandler for MirrorHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            mirrored = self.service.mirrored_count(),
            "discord bot ready"
        );

        if self.register_commands
            && let Err(e) = commands::register(&ctx).await
        {
            warn!(error = %e, "failed to register slash commands");
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let server_name = msg.guild_id.and_then(|g| g.name(&ctx.cache));
        let inbound = inbound::normalize(&msg, server_name);

        match self.service.dispatch(&inbound).await {
            DispatchOutcome::Ignored { reason } => {
                debug!(channel_id = %msg.channel_id, ?reason, "message not relayed");
            },
            DispatchOutcome::Relayed(report) => {
                if report.failed.is_empty() {
                    debug!(
                        channel_id = %msg.channel_id,
                        delivered = report.delivered.len(),
                        "mirrored message"
                    );
                } else {
                    warn!(
                        channel_id = %msg.channel_id,
                        delivered = report.delivered.len(),
                        failed = report.failed.len(),
                        "message only partially mirrored"
                    );
                }
            },
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        if command.data.name != commands::COMMAND_NAME {
            return;
        }
        if let Err(e) = commands::handle(&ctx, &command, &self.service).await {
            warn!(error = %e, "failed to answer /mirror");
        }
    }
}
