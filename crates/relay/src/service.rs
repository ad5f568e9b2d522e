use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use {
    mirrorlink_common::ChannelId,
    serde::Serialize,
    tokio::sync::{Mutex, MutexGuard},
    tracing::{info, warn},
};

use crate::{
    Error, Result,
    fabric::{DispatchOutcome, IgnoreReason, RebuildReport, RelayFabric},
    plugin::{ChannelDirectory, EndpointProvider, InboundMessage},
    registry::{LinkEntry, LinkOutcome, LinkRegistry, LinkStatus, UnlinkOutcome},
    store::LinkStore,
};

/// Result of a registry mutation, handed to the command layer for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkChange<O> {
    pub outcome: O,
    pub network_size: usize,
    /// Present when the mutation changed the link set and the relay table was
    /// rebuilt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild: Option<RebuildReport>,
}

/// Summary of [`MirrorService::initialize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitReport {
    pub loaded: usize,
    pub dropped: Vec<ChannelId>,
    pub rebuild: RebuildReport,
}

/// Owns the link registry and relay fabric for one bot identity.
///
/// Registry mutations and the rebuild they trigger run under one async
/// mutex, so concurrent commands publish tables in the order they committed.
/// Dispatch never takes that mutex; it reads the fabric's current snapshot.
///
/// Registry operations fail with [`Error::Unavailable`] until the persisted
/// links were loaded by [`initialize`](Self::initialize). They keep working
/// after [`shutdown`](Self::shutdown).
pub struct MirrorService {
    registry: Mutex<LinkRegistry>,
    fabric: RelayFabric,
    directory: Arc<dyn ChannelDirectory>,
    running: AtomicBool,
}

impl MirrorService {
    pub fn new(
        store: Arc<dyn LinkStore>,
        directory: Arc<dyn ChannelDirectory>,
        provider: Arc<dyn EndpointProvider>,
        endpoint_name: impl Into<String>,
    ) -> Self {
        Self {
            registry: Mutex::new(LinkRegistry::new(store)),
            fabric: RelayFabric::new(provider, endpoint_name),
            directory,
            running: AtomicBool::new(false),
        }
    }

    /// Load the persisted links, drop channels deleted while offline, and
    /// build the relay table. Dispatch is a no-op until this succeeds.
    pub async fn initialize(&self) -> Result<InitReport> {
        let mut registry = self.registry.lock().await;
        let loaded = registry.load().await?;
        let dropped = registry.reconcile(self.directory.as_ref()).await?;
        let rebuild = self.fabric.rebuild(registry.links()).await;
        self.running.store(true, Ordering::SeqCst);
        info!(
            loaded,
            dropped = dropped.len(),
            mirrored = rebuild.provisioned,
            "mirror service initialized"
        );
        Ok(InitReport {
            loaded,
            dropped,
            rebuild,
        })
    }

    /// Stop relaying and drop every route. The persisted link set is kept.
    pub async fn shutdown(&self) {
        let _registry = self.registry.lock().await;
        self.running.store(false, Ordering::SeqCst);
        self.fabric.clear();
        info!("mirror service stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn loaded_registry(&self) -> Result<MutexGuard<'_, LinkRegistry>> {
        let registry = self.registry.lock().await;
        if !registry.is_loaded() {
            return Err(Error::unavailable("service not initialized"));
        }
        Ok(registry)
    }

    pub async fn link(&self, channel_id: &ChannelId) -> Result<LinkChange<LinkOutcome>> {
        let mut registry = self.loaded_registry().await?;
        let outcome = registry.link(channel_id).await?;
        let rebuild = match outcome {
            LinkOutcome::Linked => self.rebuild_locked(&registry).await,
            LinkOutcome::AlreadyLinked => None,
        };
        Ok(LinkChange {
            outcome,
            network_size: registry.len(),
            rebuild,
        })
    }

    pub async fn unlink(&self, channel_id: &ChannelId) -> Result<LinkChange<UnlinkOutcome>> {
        let mut registry = self.loaded_registry().await?;
        let outcome = registry.unlink(channel_id).await?;
        let rebuild = match outcome {
            UnlinkOutcome::Unlinked => self.rebuild_locked(&registry).await,
            UnlinkOutcome::NotLinked => None,
        };
        Ok(LinkChange {
            outcome,
            network_size: registry.len(),
            rebuild,
        })
    }

    async fn rebuild_locked(&self, registry: &LinkRegistry) -> Option<RebuildReport> {
        if !self.is_running() {
            return None;
        }
        Some(self.fabric.rebuild(registry.links()).await)
    }

    pub async fn list(&self) -> Result<Vec<LinkEntry>> {
        let registry = self.loaded_registry().await?;
        Ok(registry.list(self.directory.as_ref()).await)
    }

    pub async fn status(&self, channel_id: &ChannelId) -> Result<LinkStatus> {
        Ok(self.loaded_registry().await?.status(channel_id))
    }

    /// Mirror one inbound message. Safe to call concurrently with link
    /// commands.
    pub async fn dispatch(&self, msg: &InboundMessage) -> DispatchOutcome {
        if !self.is_running() {
            warn!(channel_id = %msg.channel_id, "dispatch before initialize, ignoring");
            return DispatchOutcome::Ignored {
                reason: IgnoreReason::NotMirrored,
            };
        }
        self.fabric.dispatch(msg).await
    }

    /// Channels with an active route in the current relay table.
    pub fn mirrored_count(&self) -> usize {
        self.fabric.snapshot().len()
    }

    /// Linked channel count, if the links are loaded and the registry is not
    /// mid-mutation.
    pub fn try_linked_count(&self) -> Option<usize> {
        self.registry
            .try_lock()
            .ok()
            .filter(|r| r.is_loaded())
            .map(|r| r.len())
    }
}
