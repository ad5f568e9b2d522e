//! The `/mirror` slash command.

use std::fmt::Write as _;

use {
    serenity::all::{
        Command, CommandInteraction, CommandOptionType, Context, CreateCommand,
        CreateCommandOption, CreateInteractionResponse, CreateInteractionResponseMessage,
        Permissions,
    },
    tracing::{info, warn},
};

use {
    mirrorlink_common::ChannelId,
    mirrorlink_relay::{
        LinkChange, LinkEntry, LinkOutcome, LinkStatus, MirrorService, RebuildReport,
        UnlinkOutcome,
    },
};

pub const COMMAND_NAME: &str = "mirror";

/// Parsed `/mirror` subcommand. Every subcommand acts on the channel the
/// command was invoked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorCommand {
    Link,
    Unlink,
    List,
    Status,
}

impl MirrorCommand {
    pub fn parse(subcommand: &str) -> Option<Self> {
        match subcommand {
            "link" => Some(Self::Link),
            "unlink" => Some(Self::Unlink),
            "list" => Some(Self::List),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

pub fn definition() -> CreateCommand {
    CreateCommand::new(COMMAND_NAME)
        .description("Mirror messages between linked channels")
        .default_member_permissions(Permissions::MANAGE_CHANNELS)
        .dm_permission(false)
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "link",
            "Add this channel to the mirror network",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "unlink",
            "Remove this channel from the mirror network",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "list",
            "Show every linked channel",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "status",
            "Show whether this channel is linked",
        ))
}

/// Register `/mirror` as a global command.
pub async fn register(ctx: &Context) -> anyhow::Result<()> {
    Command::set_global_commands(&ctx.http, vec![definition()]).await?;
    info!(command = COMMAND_NAME, "registered slash command");
    Ok(())
}

/// Run one `/mirror` interaction and reply ephemerally.
pub async fn handle(
    ctx: &Context,
    interaction: &CommandInteraction,
    service: &MirrorService,
) -> anyhow::Result<()> {
    let subcommand = interaction
        .data
        .options
        .first()
        .map(|o| o.name.as_str())
        .unwrap_or_default();
    let channel_id = ChannelId::new(interaction.channel_id.to_string());

    let reply = match MirrorCommand::parse(subcommand) {
        Some(command) => execute(command, &channel_id, service).await,
        None => {
            warn!(subcommand, "unknown /mirror subcommand");
            format!("Unknown subcommand `{subcommand}`.")
        },
    };

    info!(
        user = %interaction.user.name,
        channel_id = %channel_id,
        subcommand,
        "handled /mirror"
    );

    interaction
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(reply)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn execute(command: MirrorCommand, channel_id: &ChannelId, service: &MirrorService) -> String {
    match command {
        MirrorCommand::Link => match service.link(channel_id).await {
            Ok(change) => render_link(&change),
            Err(e) => render_error("link", &e),
        },
        MirrorCommand::Unlink => match service.unlink(channel_id).await {
            Ok(change) => render_unlink(&change),
            Err(e) => render_error("unlink", &e),
        },
        MirrorCommand::List => match service.list().await {
            Ok(entries) => render_list(&entries),
            Err(e) => render_error("list", &e),
        },
        MirrorCommand::Status => match service.status(channel_id).await {
            Ok(status) => render_status(&status),
            Err(e) => render_error("check", &e),
        },
    }
}

fn render_rebuild(out: &mut String, rebuild: Option<&RebuildReport>) {
    let Some(rebuild) = rebuild else {
        return;
    };
    if rebuild.insufficient_channels {
        out.push_str("\nLink at least one more channel to start mirroring.");
    }
    if !rebuild.failed.is_empty() {
        let failed: Vec<String> = rebuild.failed.iter().map(|c| format!("<#{c}>")).collect();
        let _ = write!(
            out,
            "\nCould not set up a webhook in {}. Check the bot's Manage Webhooks permission.",
            failed.join(", ")
        );
    }
}

pub fn render_link(change: &LinkChange<LinkOutcome>) -> String {
    let mut out = match change.outcome {
        LinkOutcome::Linked => format!(
            "This channel is now linked. The network has {} channel(s).",
            change.network_size
        ),
        LinkOutcome::AlreadyLinked => "This channel is already linked.".to_string(),
    };
    render_rebuild(&mut out, change.rebuild.as_ref());
    out
}

pub fn render_unlink(change: &LinkChange<UnlinkOutcome>) -> String {
    let mut out = match change.outcome {
        UnlinkOutcome::Unlinked => format!(
            "This channel is no longer linked. {} channel(s) remain.",
            change.network_size
        ),
        UnlinkOutcome::NotLinked => "This channel is not linked.".to_string(),
    };
    render_rebuild(&mut out, change.rebuild.as_ref());
    out
}

pub fn render_list(entries: &[LinkEntry]) -> String {
    if entries.is_empty() {
        return "No channels are linked.".to_string();
    }
    let mut out = format!("Linked channels ({}):", entries.len());
    for entry in entries {
        match &entry.channel {
            Some(channel) => match channel.server_name.as_deref() {
                Some(server) => {
                    let _ =
                        write!(out, "\n- <#{}> (#{} in {server})", entry.channel_id, channel.name);
                },
                None => {
                    let _ = write!(out, "\n- <#{}> (#{})", entry.channel_id, channel.name);
                },
            },
            None => {
                let _ = write!(out, "\n- {} (unavailable)", entry.channel_id);
            },
        }
    }
    out
}

pub fn render_status(status: &LinkStatus) -> String {
    if status.linked {
        format!(
            "This channel is linked. The network has {} channel(s).",
            status.network_size
        )
    } else {
        format!(
            "This channel is not linked. The network has {} channel(s).",
            status.network_size
        )
    }
}

pub fn render_error(action: &str, err: &mirrorlink_relay::Error) -> String {
    warn!(action, error = %err, "/mirror command failed");
    match action {
        "list" => format!("Could not list linked channels: {err}"),
        _ => format!("Could not {action} this channel: {err}"),
    }
}
