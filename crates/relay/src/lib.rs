//! Channel mirroring core.
//!
//! A [`LinkRegistry`] owns the set of linked channels and persists it through a
//! [`LinkStore`]. A [`RelayFabric`] derives one relay table from that set and
//! fans every inbound message out to the other linked channels through an
//! [`EndpointProvider`]. [`MirrorService`] ties both together behind an
//! explicit `initialize()` / `shutdown()` lifecycle.

pub mod error;
pub mod fabric;
pub mod gating;
pub mod payload;
pub mod plugin;
pub mod registry;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use {
    error::{Error, Result},
    fabric::{
        DispatchOutcome, DispatchReport, IgnoreReason, RebuildReport, RelayFabric, RelayTable,
    },
    payload::{AllowedMentions, AttachmentRef, MirroredMessage},
    plugin::{
        ChannelDirectory, EndpointProvider, InboundAttachment, InboundEmbed, InboundMessage,
        RelayEndpoint, ResolvedChannel,
    },
    registry::{LinkEntry, LinkOutcome, LinkRegistry, LinkStatus, UnlinkOutcome},
    service::{InitReport, LinkChange, MirrorService},
    store::{JsonLinkStore, LinkStore},
};
