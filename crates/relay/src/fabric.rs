use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use {
    mirrorlink_common::ChannelId,
    serde::Serialize,
    tracing::{debug, info, warn},
};

use crate::{
    Result,
    gating::check_relayable,
    payload::MirroredMessage,
    plugin::{EndpointProvider, InboundMessage, RelayEndpoint},
};

/// Source channel → endpoints of every *other* provisioned channel.
///
/// Built in one piece by [`RelayFabric::rebuild`] and never edited in place.
#[derive(Debug, Default)]
pub struct RelayTable {
    routes: HashMap<ChannelId, Vec<RelayEndpoint>>,
}

impl RelayTable {
    /// Cross-link the provisioned endpoints, preserving their order.
    fn from_endpoints(endpoints: &[RelayEndpoint]) -> Self {
        let routes = endpoints
            .iter()
            .map(|source| {
                let targets = endpoints
                    .iter()
                    .filter(|t| t.channel_id != source.channel_id)
                    .cloned()
                    .collect();
                (source.channel_id.clone(), targets)
            })
            .collect();
        Self { routes }
    }

    pub fn targets(&self, source: &ChannelId) -> Option<&[RelayEndpoint]> {
        self.routes.get(source).map(Vec::as_slice)
    }

    /// Number of channels with an active route.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn contains(&self, channel_id: &ChannelId) -> bool {
        self.routes.contains_key(channel_id)
    }
}

/// Outcome of one [`RelayFabric::rebuild`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub linked: usize,
    pub provisioned: usize,
    pub failed: Vec<ChannelId>,
    /// Fewer than two channels linked; nothing to mirror.
    pub insufficient_channels: bool,
}

/// Why an inbound message produced no sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    AutomatedAuthor,
    SystemMessage,
    /// The source channel has no route in the current table.
    NotMirrored,
    /// No text, files or rich embeds to forward.
    EmptyPayload,
}

/// Per-target result of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: Vec<ChannelId>,
    pub failed: Vec<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Ignored { reason: IgnoreReason },
    Relayed(DispatchReport),
}

/// Holds the current [`RelayTable`] and executes fan-out.
///
/// The table sits behind an `Arc` swapped under a short write lock: a
/// dispatch clones the `Arc` and works on that snapshot, so it always sees
/// either the previous table or the next one, never a half-built one.
pub struct RelayFabric {
    provider: Arc<dyn EndpointProvider>,
    endpoint_name: String,
    table: RwLock<Arc<RelayTable>>,
}

impl RelayFabric {
    pub fn new(provider: Arc<dyn EndpointProvider>, endpoint_name: impl Into<String>) -> Self {
        Self {
            provider,
            endpoint_name: endpoint_name.into(),
            table: RwLock::new(Arc::new(RelayTable::default())),
        }
    }

    /// The table currently used for dispatch.
    pub fn snapshot(&self) -> Arc<RelayTable> {
        Arc::clone(&self.table.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn publish(&self, table: RelayTable) {
        *self.table.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(table);
    }

    /// Drop every route.
    pub fn clear(&self) {
        self.publish(RelayTable::default());
        self.provider.retain_endpoints(&[]);
    }

    /// Discard the current table and derive a new one from `links`.
    ///
    /// Endpoint provisioning failures are isolated: the failing channel is
    /// left out of the table and the remaining channels are still linked to
    /// each other.
    pub async fn rebuild(&self, links: &[ChannelId]) -> RebuildReport {
        let mut report = RebuildReport {
            linked: links.len(),
            ..Default::default()
        };

        if links.len() < 2 {
            info!(linked = links.len(), "insufficient channels to mirror");
            self.clear();
            report.insufficient_channels = true;
            return report;
        }

        let provisioning = links.iter().map(|id| self.provision(id));
        let results = futures::future::join_all(provisioning).await;

        let mut endpoints = Vec::with_capacity(links.len());
        for (id, result) in links.iter().zip(results) {
            match result {
                Ok(endpoint) => endpoints.push(endpoint),
                Err(e) => {
                    warn!(channel_id = %id, error = %e, "failed to provision relay endpoint");
                    report.failed.push(id.clone());
                },
            }
        }
        report.provisioned = endpoints.len();

        self.publish(RelayTable::from_endpoints(&endpoints));
        self.provider.retain_endpoints(&endpoints);

        if report.failed.is_empty() {
            info!(channels = report.provisioned, "relay table rebuilt");
        } else {
            warn!(
                channels = report.provisioned,
                failed = report.failed.len(),
                "relay table rebuilt with provisioning failures"
            );
        }
        report
    }

    /// Reuse the endpoint tagged with the reserved name, or create one.
    async fn provision(&self, channel_id: &ChannelId) -> Result<RelayEndpoint> {
        if let Some(existing) = self
            .provider
            .find_named_endpoint(channel_id, &self.endpoint_name)
            .await?
        {
            debug!(channel_id = %channel_id, endpoint_id = %existing.endpoint_id, "reusing relay endpoint");
            return Ok(existing);
        }
        let created = self
            .provider
            .create_endpoint(channel_id, &self.endpoint_name)
            .await?;
        info!(channel_id = %channel_id, endpoint_id = %created.endpoint_id, "created relay endpoint");
        Ok(created)
    }

    /// Mirror one inbound message to every other linked channel.
    ///
    /// Sends run concurrently and independently; a failed target is logged
    /// and counted without affecting the others.
    pub async fn dispatch(&self, msg: &InboundMessage) -> DispatchOutcome {
        if let Err(reason) = check_relayable(msg) {
            return DispatchOutcome::Ignored { reason };
        }

        let table = self.snapshot();
        let targets = match table.targets(&msg.channel_id) {
            Some(targets) if !targets.is_empty() => targets,
            _ => {
                return DispatchOutcome::Ignored {
                    reason: IgnoreReason::NotMirrored,
                };
            },
        };

        let payload = MirroredMessage::from_inbound(msg);
        if payload.is_empty() {
            debug!(channel_id = %msg.channel_id, "nothing to mirror");
            return DispatchOutcome::Ignored {
                reason: IgnoreReason::EmptyPayload,
            };
        }

        let results = self.provider.send_all(targets, &payload).await;

        let mut report = DispatchReport {
            attempted: targets.len(),
            ..Default::default()
        };
        for (endpoint, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => report.delivered.push(endpoint.channel_id.clone()),
                Err(e) => {
                    warn!(
                        source = %payload.source_label(),
                        target = %endpoint.channel_id,
                        error = %e,
                        "failed to mirror message"
                    );
                    report.failed.push(endpoint.channel_id.clone());
                },
            }
        }

        debug!(
            source = %payload.source_label(),
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "mirrored message"
        );
        DispatchOutcome::Relayed(report)
    }
}
