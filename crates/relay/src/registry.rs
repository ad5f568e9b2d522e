use std::sync::Arc;

use {
    mirrorlink_common::ChannelId,
    serde::Serialize,
    tracing::{info, warn},
};

use crate::{
    Error, Result,
    plugin::{ChannelDirectory, ResolvedChannel},
    store::LinkStore,
};

/// Result of [`LinkRegistry::link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOutcome {
    Linked,
    AlreadyLinked,
}

/// Result of [`LinkRegistry::unlink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlinkOutcome {
    Unlinked,
    NotLinked,
}

/// One row of [`LinkRegistry::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkEntry {
    pub channel_id: ChannelId,
    /// The channel resolved against the live directory.
    pub live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ResolvedChannel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub linked: bool,
    pub network_size: usize,
}

/// Authoritative, ordered set of linked channels.
///
/// Every mutation persists the candidate list first and only commits it in
/// memory once the store accepted it.
pub struct LinkRegistry {
    links: Vec<ChannelId>,
    store: Arc<dyn LinkStore>,
    loaded: bool,
}

impl LinkRegistry {
    /// An empty registry backed by `store`. Call [`load`](Self::load) to read
    /// the persisted list.
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self {
            links: Vec::new(),
            store,
            loaded: false,
        }
    }

    /// Replace the in-memory list with the persisted one.
    ///
    /// Duplicate IDs in the file keep their first position.
    pub async fn load(&mut self) -> Result<usize> {
        let mut loaded = self.store.load().await?;
        let before = loaded.len();
        let mut seen = std::collections::HashSet::new();
        loaded.retain(|id| seen.insert(id.clone()));
        if loaded.len() != before {
            warn!(
                duplicates = before - loaded.len(),
                "link file contained duplicate channels"
            );
        }
        self.links = loaded;
        self.loaded = true;
        Ok(self.links.len())
    }

    /// Whether [`load`](Self::load) has succeeded at least once. Until then
    /// the in-memory list says nothing about the persisted one.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Linked channels in insertion order.
    pub fn links(&self) -> &[ChannelId] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn contains(&self, channel_id: &ChannelId) -> bool {
        self.links.contains(channel_id)
    }

    pub async fn link(&mut self, channel_id: &ChannelId) -> Result<LinkOutcome> {
        validate(channel_id)?;
        if self.contains(channel_id) {
            return Ok(LinkOutcome::AlreadyLinked);
        }
        let mut candidate = self.links.clone();
        candidate.push(channel_id.clone());
        self.commit(candidate).await?;
        info!(channel_id = %channel_id, network_size = self.len(), "channel linked");
        Ok(LinkOutcome::Linked)
    }

    pub async fn unlink(&mut self, channel_id: &ChannelId) -> Result<UnlinkOutcome> {
        validate(channel_id)?;
        if !self.contains(channel_id) {
            return Ok(UnlinkOutcome::NotLinked);
        }
        let candidate: Vec<ChannelId> = self
            .links
            .iter()
            .filter(|id| *id != channel_id)
            .cloned()
            .collect();
        self.commit(candidate).await?;
        info!(channel_id = %channel_id, network_size = self.len(), "channel unlinked");
        Ok(UnlinkOutcome::Unlinked)
    }

    /// Linked channels annotated with whether each still resolves.
    pub async fn list(&self, directory: &dyn ChannelDirectory) -> Vec<LinkEntry> {
        let lookups = self.links.iter().map(|id| directory.resolve(id));
        let resolved = futures::future::join_all(lookups).await;
        self.links
            .iter()
            .zip(resolved)
            .map(|(id, res)| match res {
                Ok(channel) => LinkEntry {
                    channel_id: id.clone(),
                    live: true,
                    channel: Some(channel),
                },
                Err(e) => {
                    if !e.is_channel_gone() {
                        warn!(channel_id = %id, error = %e, "channel lookup failed");
                    }
                    LinkEntry {
                        channel_id: id.clone(),
                        live: false,
                        channel: None,
                    }
                },
            })
            .collect()
    }

    pub fn status(&self, channel_id: &ChannelId) -> LinkStatus {
        LinkStatus {
            linked: self.contains(channel_id),
            network_size: self.len(),
        }
    }

    /// Drop every linked channel that no longer exists and persist the result.
    ///
    /// Only definitive "channel gone" answers remove an entry; transient
    /// lookup failures keep it. Returns the removed IDs.
    pub async fn reconcile(&mut self, directory: &dyn ChannelDirectory) -> Result<Vec<ChannelId>> {
        let mut kept = Vec::with_capacity(self.links.len());
        let mut dropped = Vec::new();
        for id in &self.links {
            match directory.resolve(id).await {
                Ok(_) => kept.push(id.clone()),
                Err(e) if e.is_channel_gone() => {
                    warn!(channel_id = %id, error = %e, "dropping stale linked channel");
                    dropped.push(id.clone());
                },
                Err(e) => {
                    warn!(channel_id = %id, error = %e, "could not verify linked channel, keeping it");
                    kept.push(id.clone());
                },
            }
        }
        if !dropped.is_empty() {
            self.commit(kept).await?;
            info!(
                dropped = dropped.len(),
                remaining = self.len(),
                "reconciled linked channels"
            );
        }
        Ok(dropped)
    }

    async fn commit(&mut self, candidate: Vec<ChannelId>) -> Result<()> {
        self.store.save(&candidate).await?;
        self.links = candidate;
        Ok(())
    }
}

fn validate(channel_id: &ChannelId) -> Result<()> {
    if channel_id.as_str().trim().is_empty() {
        return Err(Error::invalid_input("channel id must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{FakeDirectory, MemoryStore, ids},
    };

    async fn registry_with(initial: &[&str]) -> (LinkRegistry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with(ids(initial)));
        let mut registry = LinkRegistry::new(store.clone());
        registry.load().await.unwrap();
        (registry, store)
    }

    #[tokio::test]
    async fn link_is_idempotent() {
        let (mut registry, store) = registry_with(&[]).await;
        let a = ChannelId::from("a");

        assert_eq!(registry.link(&a).await.unwrap(), LinkOutcome::Linked);
        assert_eq!(registry.link(&a).await.unwrap(), LinkOutcome::AlreadyLinked);

        assert_eq!(registry.links(), ids(&["a"]).as_slice());
        assert_eq!(store.saved(), ids(&["a"]));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn unlink_then_link_restores_single_entry() {
        let (mut registry, store) = registry_with(&["a", "b"]).await;
        let a = ChannelId::from("a");

        assert_eq!(registry.unlink(&a).await.unwrap(), UnlinkOutcome::Unlinked);
        assert_eq!(registry.unlink(&a).await.unwrap(), UnlinkOutcome::NotLinked);
        assert_eq!(registry.link(&a).await.unwrap(), LinkOutcome::Linked);

        assert_eq!(registry.links(), ids(&["b", "a"]).as_slice());
        assert_eq!(store.saved(), ids(&["b", "a"]));
    }

    #[tokio::test]
    async fn failed_save_leaves_memory_untouched() {
        let (mut registry, store) = registry_with(&["a"]).await;
        store.fail_saves(true);

        let err = registry.link(&ChannelId::from("b")).await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert_eq!(registry.links(), ids(&["a"]).as_slice());

        let err = registry.unlink(&ChannelId::from("a")).await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert_eq!(registry.links(), ids(&["a"]).as_slice());
        assert_eq!(store.saved(), ids(&["a"]));
    }

    #[tokio::test]
    async fn empty_id_rejected() {
        let (mut registry, store) = registry_with(&[]).await;
        let err = registry.link(&ChannelId::from("  ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn load_drops_duplicates() {
        let (registry, _) = registry_with(&["a", "b", "a"]).await;
        assert_eq!(registry.links(), ids(&["a", "b"]).as_slice());
    }

    #[tokio::test]
    async fn status_reports_membership_and_size() {
        let (registry, _) = registry_with(&["a", "b", "c"]).await;
        assert_eq!(registry.status(&ChannelId::from("b")), LinkStatus {
            linked: true,
            network_size: 3,
        });
        assert_eq!(registry.status(&ChannelId::from("z")), LinkStatus {
            linked: false,
            network_size: 3,
        });
    }

    #[tokio::test]
    async fn list_annotates_liveness_in_order() {
        let (registry, _) = registry_with(&["a", "gone", "c"]).await;
        let directory = FakeDirectory::live(&["a", "c"]);

        let entries = registry.list(&directory).await;
        let summary: Vec<(&str, bool)> = entries
            .iter()
            .map(|e| (e.channel_id.as_str(), e.live))
            .collect();
        assert_eq!(summary, vec![("a", true), ("gone", false), ("c", true)]);
        assert_eq!(entries[0].channel.as_ref().unwrap().name, "chan-a");
    }

    #[tokio::test]
    async fn reconcile_drops_missing_channels_and_persists() {
        let (mut registry, store) = registry_with(&["a", "gone", "c"]).await;
        let directory = FakeDirectory::live(&["a", "c"]);

        let dropped = registry.reconcile(&directory).await.unwrap();
        assert_eq!(dropped, ids(&["gone"]));
        assert_eq!(registry.links(), ids(&["a", "c"]).as_slice());
        assert_eq!(store.saved(), ids(&["a", "c"]));
    }

    #[tokio::test]
    async fn reconcile_keeps_channels_on_transient_errors() {
        let (mut registry, store) = registry_with(&["a", "flaky"]).await;
        let directory = FakeDirectory::live(&["a"]).with_unavailable(&["flaky"]);

        let dropped = registry.reconcile(&directory).await.unwrap();
        assert!(dropped.is_empty());
        assert_eq!(registry.links(), ids(&["a", "flaky"]).as_slice());
        assert_eq!(store.save_count(), 0);
    }
}
