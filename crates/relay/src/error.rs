use std::error::Error as StdError;

use mirrorlink_common::ChannelId;

/// Crate-wide result type for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed relay errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The channel no longer exists (or never did).
    #[error("channel {channel_id} could not be resolved: {message}")]
    ChannelResolution {
        channel_id: ChannelId,
        message: String,
    },

    /// Fetching or creating the relay endpoint for a channel failed.
    #[error("failed to provision relay endpoint for channel {channel_id}: {source}")]
    EndpointProvision {
        channel_id: ChannelId,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Transport failure while delivering a mirrored message.
    #[error("failed to relay message to channel {channel_id}: {source}")]
    Send {
        channel_id: ChannelId,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Reading or writing the link store failed.
    #[error("link store {context} failed: {source}")]
    Persistence {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A collaborator is temporarily unreachable; the caller may retry.
    #[error("relay operation unavailable: {message}")]
    Unavailable { message: String },

    /// Input payload or parameter is invalid.
    #[error("invalid relay input: {message}")]
    InvalidInput { message: String },
}

impl Error {
    #[must_use]
    pub fn channel_resolution(channel_id: &ChannelId, message: impl std::fmt::Display) -> Self {
        Self::ChannelResolution {
            channel_id: channel_id.clone(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn endpoint_provision(
        channel_id: &ChannelId,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::EndpointProvision {
            channel_id: channel_id.clone(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn send(channel_id: &ChannelId, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Send {
            channel_id: channel_id.clone(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn persistence(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    /// Whether this error means the channel is gone for good, as opposed to a
    /// transient lookup failure.
    pub fn is_channel_gone(&self) -> bool {
        matches!(self, Self::ChannelResolution { .. })
    }
}
