//! Shared types used across all mirrorlink crates.

pub mod types;

pub use types::ChannelId;
