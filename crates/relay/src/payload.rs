use {serde::Serialize, tracing::debug};

use crate::plugin::{InboundEmbed, InboundMessage};

/// Webhook display names are capped at this many characters by the platform.
pub const MAX_DISPLAY_NAME_LEN: usize = 80;

const FALLBACK_AUTHOR: &str = "Unknown user";
const FALLBACK_SERVER: &str = "unknown server";

/// A file attached to the original message, re-uploaded by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRef {
    pub url: String,
    pub filename: String,
}

/// Mention kinds the platform may resolve into pings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionKind {
    Users,
    Roles,
    Everyone,
}

/// Outbound mention-parsing policy.
///
/// Serializes to the platform's `allowed_mentions` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowedMentions {
    parse: Vec<MentionKind>,
}

impl AllowedMentions {
    /// Parse nothing: no user, role, `@everyone` or `@here` ping is ever
    /// triggered.
    pub fn none() -> Self {
        Self { parse: Vec::new() }
    }

    pub fn parse(&self) -> &[MentionKind] {
        &self.parse
    }

    pub fn is_none(&self) -> bool {
        self.parse.is_empty()
    }
}

/// The payload sent to every target endpoint for one inbound message.
///
/// Only constructible through [`MirroredMessage::from_inbound`], which always
/// disables mention parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MirroredMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<serde_json::Value>,
    allowed_mentions: AllowedMentions,
    #[serde(skip)]
    source_label: String,
}

impl MirroredMessage {
    pub fn from_inbound(msg: &InboundMessage) -> Self {
        let content = (!msg.content.is_empty()).then(|| msg.content.clone());

        let attachments = msg
            .attachments
            .iter()
            .map(|a| AttachmentRef {
                url: a.url.clone(),
                filename: a.filename.clone(),
            })
            .collect();

        let embeds: Vec<serde_json::Value> = msg
            .embeds
            .iter()
            .filter(|e| e.is_rich())
            .map(|e| e.data.clone())
            .collect();
        let dropped = msg.embeds.len() - embeds.len();
        if dropped > 0 {
            debug!(dropped, "skipping platform-generated embeds");
        }

        let server = msg
            .server_display_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(FALLBACK_SERVER);

        Self {
            content,
            username: display_name(&msg.author_display_name, server),
            avatar_url: msg.author_avatar_url.clone(),
            attachments,
            embeds,
            allowed_mentions: AllowedMentions::none(),
            source_label: format!("{server}/{}", msg.channel_id),
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    pub fn attachments(&self) -> &[AttachmentRef] {
        &self.attachments
    }

    pub fn embeds(&self) -> &[serde_json::Value] {
        &self.embeds
    }

    pub fn allowed_mentions(&self) -> &AllowedMentions {
        &self.allowed_mentions
    }

    /// `server/channel` label of the origin, for logs.
    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    /// Nothing to post: no text, no files, no rich embeds.
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.attachments.is_empty() && self.embeds.is_empty()
    }
}

/// `"{author} (from {server})"`, trimmed to the platform limit.
///
/// The server suffix is what lets a moderator correlate the same person
/// across servers, so when the name is too long the author part is
/// shortened first.
fn display_name(author: &str, server: &str) -> String {
    let author = match author.trim() {
        "" => FALLBACK_AUTHOR,
        a => a,
    };
    let suffix = format!(" (from {server})");
    let full = format!("{author}{suffix}");
    if full.chars().count() <= MAX_DISPLAY_NAME_LEN {
        return full;
    }

    let suffix_len = suffix.chars().count();
    if suffix_len + 1 >= MAX_DISPLAY_NAME_LEN {
        return full.chars().take(MAX_DISPLAY_NAME_LEN).collect();
    }
    let keep = MAX_DISPLAY_NAME_LEN - suffix_len - 1;
    let mut out: String = author.chars().take(keep).collect();
    out.push('…');
    out.push_str(&suffix);
    out
}
