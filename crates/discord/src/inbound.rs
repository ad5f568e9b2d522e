//! Normalization of gateway messages into relay input.

use {
    serenity::all::{Message, MessageType},
    tracing::warn,
};

use mirrorlink_relay::{InboundAttachment, InboundEmbed, InboundMessage};

/// Join, pin and boost notices and the like. Replies and command invocations
/// count as regular user content.
pub fn is_system_kind(kind: MessageType) -> bool {
    !matches!(
        kind,
        MessageType::Regular
            | MessageType::InlineReply
            | MessageType::ChatInputCommand
            | MessageType::ContextMenuCommand
    )
}

/// The author's global display name, falling back to their username.
pub fn author_display_name(username: &str, global_name: Option<&str>) -> String {
    global_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(username)
        .to_string()
}

/// Build the relay's view of a gateway message. Messages posted by any bot
/// or webhook, including other mirror deployments, are flagged automated.
pub fn normalize(msg: &Message, server_name: Option<String>) -> InboundMessage {
    let embeds = msg
        .embeds
        .iter()
        .filter_map(|embed| match serde_json::to_value(embed) {
            Ok(data) => Some(InboundEmbed {
                kind: embed.kind.clone(),
                data,
            }),
            Err(e) => {
                warn!(message_id = %msg.id, error = %e, "failed to encode embed");
                None
            },
        })
        .collect();

    InboundMessage {
        channel_id: msg.channel_id.to_string().into(),
        author_is_automated: msg.author.bot || msg.webhook_id.is_some(),
        is_system_message: is_system_kind(msg.kind),
        content: msg.content.clone(),
        attachments: msg
            .attachments
            .iter()
            .map(|a| InboundAttachment {
                url: a.url.clone(),
                filename: a.filename.clone(),
            })
            .collect(),
        embeds,
        author_display_name: author_display_name(
            &msg.author.name,
            msg.author.global_name.as_deref(),
        ),
        author_avatar_url: Some(msg.author.face()),
        server_display_name: server_name,
    }
}
