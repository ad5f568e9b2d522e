//! Config schema types (discord, links, health).

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Default name of the webhook the relay looks for (and creates) in every
/// linked channel.
pub const DEFAULT_WEBHOOK_NAME: &str = "Mirror Bot";

/// Environment variable consulted when the config file carries no token.
pub const TOKEN_ENV_VAR: &str = "DISCORD_TOKEN";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorlinkConfig {
    pub discord: DiscordConfig,
    pub links: LinksConfig,
    pub health: HealthConfig,
}

/// Discord bot account settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token. Usually left as `${DISCORD_TOKEN}` so the secret stays in
    /// the environment.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Reserved webhook name used to find or provision relay endpoints.
    pub webhook_name: String,

    /// Register the `/mirror` slash command when the gateway becomes ready.
    pub register_commands: bool,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"[REDACTED]")
            .field("webhook_name", &self.webhook_name)
            .field("register_commands", &self.register_commands)
            .finish()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(format!("${{{TOKEN_ENV_VAR}}}")),
            webhook_name: DEFAULT_WEBHOOK_NAME.to_string(),
            register_commands: true,
        }
    }
}

impl DiscordConfig {
    /// The token to log in with.
    ///
    /// Falls back to `DISCORD_TOKEN` when the configured value is empty or an
    /// unresolved `${...}` placeholder.
    pub fn resolve_token(&self) -> Option<Secret<String>> {
        let configured = self.token.expose_secret().trim();
        if !configured.is_empty() && !configured.starts_with("${") {
            return Some(Secret::new(configured.to_string()));
        }
        std::env::var(TOKEN_ENV_VAR)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(Secret::new)
    }
}

/// Where the linked channel list is persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Path of the JSON link file. Defaults to `~/.mirrorlink/links.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl LinksConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| crate::loader::data_dir().join("links.json"))
    }
}

/// Liveness endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = MirrorlinkConfig::default();
        assert_eq!(cfg.discord.webhook_name, "Mirror Bot");
        assert!(cfg.discord.register_commands);
        assert_eq!(cfg.discord.token.expose_secret(), "${DISCORD_TOKEN}");
        assert!(cfg.links.path.is_none());
        assert!(cfg.health.enabled);
        assert_eq!(cfg.health.port, 8080);
    }

    #[test]
    fn deserialize_partial_toml() {
        let raw = r#"
            [discord]
            token = "abc.def"
            webhook_name = "Sync Relay"

            [links]
            path = "/var/lib/mirrorlink/links.json"
        "#;
        let cfg: MirrorlinkConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.discord.token.expose_secret(), "abc.def");
        assert_eq!(cfg.discord.webhook_name, "Sync Relay");
        // defaults for unspecified fields
        assert!(cfg.discord.register_commands);
        assert_eq!(cfg.health.bind, "127.0.0.1");
        assert_eq!(
            cfg.links.resolved_path(),
            PathBuf::from("/var/lib/mirrorlink/links.json")
        );
    }

    #[test]
    fn configured_token_wins_over_env() {
        let cfg = DiscordConfig {
            token: Secret::new("from-file".into()),
            ..Default::default()
        };
        let token = cfg.resolve_token().unwrap();
        assert_eq!(token.expose_secret(), "from-file");
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = DiscordConfig {
            token: Secret::new("super-secret".into()),
            ..Default::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn serialize_keeps_placeholder() {
        let cfg = MirrorlinkConfig::default();
        let out = toml::to_string_pretty(&cfg).unwrap();
        assert!(out.contains("${DISCORD_TOKEN}"));
        assert!(!out.contains("path ="));
    }
}
