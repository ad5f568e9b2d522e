//! In-process fakes for the collaborator traits.

use std::{
    collections::HashSet,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use {async_trait::async_trait, mirrorlink_common::ChannelId};

use crate::{
    Error, Result,
    payload::MirroredMessage,
    plugin::{ChannelDirectory, EndpointProvider, RelayEndpoint, ResolvedChannel},
    store::LinkStore,
};

pub fn ids(raw: &[&str]) -> Vec<ChannelId> {
    raw.iter().map(|s| ChannelId::from(*s)).collect()
}

fn set(raw: &[&str]) -> HashSet<ChannelId> {
    ids(raw).into_iter().collect()
}

// ── Link store ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    links: Mutex<Vec<ChannelId>>,
    saves: AtomicUsize,
    fail: AtomicBool,
}

impl MemoryStore {
    pub fn with(links: Vec<ChannelId>) -> Self {
        Self {
            links: Mutex::new(links),
            ..Default::default()
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Vec<ChannelId> {
        self.links.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn load(&self) -> Result<Vec<ChannelId>> {
        Ok(self.saved())
    }

    async fn save(&self, links: &[ChannelId]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::persistence(
                "write",
                std::io::Error::other("disk full"),
            ));
        }
        *self.links.lock().unwrap() = links.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Channel directory ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeDirectory {
    live: HashSet<ChannelId>,
    unavailable: HashSet<ChannelId>,
}

impl FakeDirectory {
    pub fn live(raw: &[&str]) -> Self {
        Self {
            live: set(raw),
            ..Default::default()
        }
    }

    pub fn with_unavailable(mut self, raw: &[&str]) -> Self {
        self.unavailable = set(raw);
        self
    }
}

#[async_trait]
impl ChannelDirectory for FakeDirectory {
    async fn resolve(&self, channel_id: &ChannelId) -> Result<ResolvedChannel> {
        if self.unavailable.contains(channel_id) {
            return Err(Error::unavailable("gateway timeout"));
        }
        if self.live.contains(channel_id) {
            Ok(ResolvedChannel {
                id: channel_id.clone(),
                name: format!("chan-{channel_id}"),
                server_name: Some("Guild".into()),
            })
        } else {
            Err(Error::channel_resolution(channel_id, "unknown channel"))
        }
    }
}

// ── Endpoint provider ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeProvider {
    existing: Mutex<HashSet<ChannelId>>,
    created: Mutex<Vec<ChannelId>>,
    fail_provision: HashSet<ChannelId>,
    fail_send: HashSet<ChannelId>,
    sent: Mutex<Vec<(ChannelId, MirroredMessage)>>,
    retained: Mutex<Option<Vec<ChannelId>>>,
}

impl FakeProvider {
    pub fn with_existing(self, raw: &[&str]) -> Self {
        *self.existing.lock().unwrap() = set(raw);
        self
    }

    pub fn failing_provision(mut self, raw: &[&str]) -> Self {
        self.fail_provision = set(raw);
        self
    }

    pub fn failing_send(mut self, raw: &[&str]) -> Self {
        self.fail_send = set(raw);
        self
    }

    pub fn created(&self) -> Vec<ChannelId> {
        self.created.lock().unwrap().clone()
    }

    pub fn sent_channels(&self) -> Vec<ChannelId> {
        self.sent.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn sent_payloads(&self) -> Vec<MirroredMessage> {
        self.sent.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }

    /// Channels passed to the most recent `retain_endpoints` call.
    pub fn retained(&self) -> Option<Vec<ChannelId>> {
        self.retained.lock().unwrap().clone()
    }

    fn endpoint(channel_id: &ChannelId) -> RelayEndpoint {
        RelayEndpoint {
            channel_id: channel_id.clone(),
            endpoint_id: format!("wh-{channel_id}"),
        }
    }
}

#[async_trait]
impl EndpointProvider for FakeProvider {
    async fn find_named_endpoint(
        &self,
        channel_id: &ChannelId,
        _name: &str,
    ) -> Result<Option<RelayEndpoint>> {
        if self.fail_provision.contains(channel_id) {
            return Err(Error::endpoint_provision(
                channel_id,
                std::io::Error::other("missing permissions"),
            ));
        }
        let found = self.existing.lock().unwrap().contains(channel_id);
        Ok(found.then(|| Self::endpoint(channel_id)))
    }

    async fn create_endpoint(&self, channel_id: &ChannelId, _name: &str) -> Result<RelayEndpoint> {
        self.existing.lock().unwrap().insert(channel_id.clone());
        self.created.lock().unwrap().push(channel_id.clone());
        Ok(Self::endpoint(channel_id))
    }

    async fn send(&self, endpoint: &RelayEndpoint, payload: &MirroredMessage) -> Result<()> {
        if self.fail_send.contains(&endpoint.channel_id) {
            return Err(Error::send(
                &endpoint.channel_id,
                std::io::Error::other("connection reset"),
            ));
        }
        self.sent
            .lock()
            .unwrap()
            .push((endpoint.channel_id.clone(), payload.clone()));
        Ok(())
    }

    fn retain_endpoints(&self, active: &[RelayEndpoint]) {
        let active = active.iter().map(|e| e.channel_id.clone()).collect();
        *self.retained.lock().unwrap() = Some(active);
    }
}
