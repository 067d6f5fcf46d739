// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Poller
//!
//! Reconciles one resource kind on one compute node: fetch, diff against the
//! cache, persist, update the cache, emit.
//!
//! # Algorithm
//!
//! ```text
//! enumerate(kind, node) ──err──► log, outcome.probe_error, cache untouched
//!     │
//!     ▼
//! for each snapshot:
//!     old = cache.get ─► diff(old, new) ─► unchanged? skip
//!                           │
//!                           ▼
//!              repository.save ─► cache.put ─► derive + emit
//!
//! stale = cached ids for (node, kind) - current ids
//!     derive removal events ─► repository.delete_by_ids (batch)
//!     ─► emit ─► cache.delete
//!
//! child kinds: sync each host's child id list to the cache
//! ```
//!
//! [`ResourcePoller::load`] seeds the cache from the repository before a
//! node's first poll, so a restarted collector diffs against stored state.
//!
//! # Failure Isolation
//!
//! Every snapshot is its own unit of work. A diff or storage failure for one
//! resource is logged and that id is reported as skipped; the batch carries
//! on. A failed save leaves the cache stale, so the next cycle retries the
//! same change.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::cache::{InventoryCache, SessionState};
use crate::diff::diff;
use crate::domain::{ConnectionState, Resource, ResourceKind};
use crate::errors::{InventoryResult, RepositoryError};
use crate::events::{emit_all, DerivedEvent, EventSink};
use crate::probe::{HostProbe, NodeDescriptor};
use crate::repository::{Filter, Repository, SortDirection};
use crate::rules::derive_events;

/// What one poll of one kind did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollOutcome {
    pub kind: ResourceKind,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    /// Ids whose processing failed this cycle
    pub skipped: Vec<String>,
    /// Events accepted by the sink
    pub events: usize,
    /// Set when enumeration failed and nothing was reconciled
    pub probe_error: Option<String>,
}

impl PollOutcome {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
            skipped: Vec::new(),
            events: 0,
            probe_error: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.probe_error.is_some()
    }

    /// Whether the poll changed any inventory
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty())
    }
}

enum Applied {
    Unchanged,
    Added,
    Updated,
}

/// Reconciler for one resource kind
#[derive(Clone)]
pub struct ResourcePoller {
    kind: ResourceKind,
    probe: Arc<dyn HostProbe>,
    repository: Arc<dyn Repository>,
    sink: Arc<dyn EventSink>,
    cache: InventoryCache,
}

impl ResourcePoller {
    pub fn new(
        kind: ResourceKind,
        probe: Arc<dyn HostProbe>,
        repository: Arc<dyn Repository>,
        sink: Arc<dyn EventSink>,
        cache: InventoryCache,
    ) -> Self {
        Self {
            kind,
            probe,
            repository,
            sink,
            cache,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Reconcile this kind for one node
    #[instrument(skip(self, node), fields(node_id = %node.id, kind = %self.kind))]
    pub async fn poll(&self, node: &NodeDescriptor, correlation_id: Uuid) -> PollOutcome {
        let mut outcome = PollOutcome::new(self.kind);

        let snapshots = match self.probe.enumerate(self.kind, node).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(error = %e, "Enumeration failed; keeping cached state");
                outcome.probe_error = Some(e.to_string());
                return outcome;
            }
        };

        let snapshots = self.prepare(snapshots, &node.id);
        let current: BTreeSet<String> = snapshots.iter().map(Resource::key).collect();

        for snapshot in snapshots {
            let key = snapshot.key();
            match self.apply(snapshot, correlation_id, &mut outcome.events).await {
                Ok(Applied::Added) => outcome.added.push(key),
                Ok(Applied::Updated) => outcome.updated.push(key),
                Ok(Applied::Unchanged) => {}
                Err(e) => {
                    warn!(resource_id = %key, error = %e, "Skipping resource this cycle");
                    outcome.skipped.push(key);
                }
            }
        }

        let stale: Vec<String> = self
            .cache
            .ids_for_node(self.kind, &node.id)
            .difference(&current)
            .cloned()
            .collect();
        self.remove(&stale, correlation_id, &mut outcome).await;

        if self.kind.is_host_child() {
            self.sync_host_children(&node.id).await;
        }

        debug!(
            added = outcome.added.len(),
            updated = outcome.updated.len(),
            removed = outcome.removed.len(),
            skipped = outcome.skipped.len(),
            "Poll complete"
        );
        outcome
    }

    /// Remove every cached resource of this kind on a node
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn purge(&self, node_id: &str, correlation_id: Uuid) -> PollOutcome {
        let mut outcome = PollOutcome::new(self.kind);
        let all: Vec<String> = self.cache.ids_for_node(self.kind, node_id).into_iter().collect();
        self.remove(&all, correlation_id, &mut outcome).await;
        if self.kind.is_host_child() {
            self.sync_host_children(node_id).await;
        }
        outcome
    }

    /// Seed the cache with the stored rows of this kind for a node
    ///
    /// Rows already cached are kept as they are. Returns how many rows were
    /// loaded.
    pub async fn load(&self, node_id: &str) -> Result<usize, RepositoryError> {
        let rows = self
            .repository
            .get_all_by_filters(
                self.kind,
                &[Filter::eq("node_id", node_id)],
                None,
                SortDirection::Ascending,
            )
            .await?;

        let mut loaded = 0;
        for row in rows {
            if self.cache.get(self.kind, &row.resource.key()).is_none() {
                self.cache.put(row.resource);
                loaded += 1;
            }
        }
        debug!(node_id, kind = %self.kind, loaded, "Stored inventory loaded");
        Ok(loaded)
    }

    /// Set the connection state of every cached host of a node
    ///
    /// Changes go through the regular diff and rules, so a flip yields
    /// `Host.Connected` or `Host.Disconnected`.
    pub async fn set_host_connection(
        &self,
        node_id: &str,
        state: ConnectionState,
        correlation_id: Uuid,
    ) -> PollOutcome {
        let mut outcome = PollOutcome::new(ResourceKind::Host);
        for key in self.cache.ids_for_node(ResourceKind::Host, node_id) {
            let Some(mut resource) = self.cache.get(ResourceKind::Host, &key) else {
                continue;
            };
            let Some(host) = resource.as_host_mut() else {
                continue;
            };
            if host.connection_state == state {
                continue;
            }
            host.connection_state = state;

            match self.apply(resource, correlation_id, &mut outcome.events).await {
                Ok(Applied::Unchanged) => {}
                Ok(_) => outcome.updated.push(key),
                Err(e) => {
                    warn!(node_id, resource_id = %key, error = %e, "Could not record host connectivity");
                    outcome.skipped.push(key);
                }
            }
        }
        outcome
    }

    /// Stamp node ownership, drop duplicate ids, fill host child lists
    fn prepare(&self, snapshots: Vec<Resource>, node_id: &str) -> Vec<Resource> {
        let mut seen = BTreeSet::new();
        let mut prepared = Vec::with_capacity(snapshots.len());
        // Host connectivity of a disconnected node is owned by its session
        let hold_disconnected = self.kind == ResourceKind::Host
            && self
                .cache
                .get_node_session(node_id)
                .map_or(false, |record| record.state == SessionState::Disconnected);

        for mut snapshot in snapshots {
            let key = snapshot.key();
            if key.is_empty() || !seen.insert(key.clone()) {
                warn!(resource_id = %key, "Dropping snapshot with empty or duplicate id");
                continue;
            }
            if snapshot.kind() != self.kind {
                warn!(resource_id = %key, actual = %snapshot.kind(), "Dropping snapshot of unexpected kind");
                continue;
            }

            snapshot.set_node_id(node_id);
            if let Some(host) = snapshot.as_host_mut() {
                if hold_disconnected {
                    host.connection_state = ConnectionState::Disconnected;
                }
                for child in ResourceKind::HOST_CHILDREN {
                    host.set_child_ids(child, self.cache.children_of(child, &key));
                }
            }
            prepared.push(snapshot);
        }

        prepared
    }

    /// Diff one snapshot against the cache and make it current
    async fn apply(
        &self,
        snapshot: Resource,
        correlation_id: Uuid,
        delivered: &mut usize,
    ) -> InventoryResult<Applied> {
        let old = self.cache.get(self.kind, &snapshot.key());
        let delta = diff(old.as_ref(), Some(&snapshot))?;
        if !delta.is_changed() {
            return Ok(Applied::Unchanged);
        }

        self.repository.save(&snapshot).await?;

        let events = derive_events(self.kind, old.as_ref(), Some(&snapshot), &delta);
        let applied = if old.is_some() {
            Applied::Updated
        } else {
            Applied::Added
        };
        self.cache.put(snapshot);

        *delivered += emit_all(self.sink.as_ref(), events, correlation_id).await;
        Ok(applied)
    }

    /// Delete stale resources: decide, persist, announce, then drop from cache
    async fn remove(&self, ids: &[String], correlation_id: Uuid, outcome: &mut PollOutcome) {
        if ids.is_empty() {
            return;
        }

        let doomed: Vec<(String, Vec<DerivedEvent>)> = ids
            .iter()
            .filter_map(|id| {
                let old = self.cache.get(self.kind, id)?;
                let delta = diff(Some(&old), None).ok()?;
                Some((id.clone(), derive_events(self.kind, Some(&old), None, &delta)))
            })
            .collect();
        let doomed_ids: Vec<String> = doomed.iter().map(|(id, _)| id.clone()).collect();

        if let Err(e) = self.repository.delete_by_ids(self.kind, &doomed_ids).await {
            warn!(
                count = doomed_ids.len(),
                error = %e,
                "Batch delete failed; keeping stale resources cached for retry"
            );
            outcome.skipped.extend(doomed_ids);
            return;
        }

        for (id, events) in doomed {
            outcome.events += emit_all(self.sink.as_ref(), events, correlation_id).await;
            self.cache.delete(self.kind, &id);
            outcome.removed.push(id);
        }
    }

    /// Bring the child id list of this kind on every host of the node in
    /// line with the cache
    async fn sync_host_children(&self, node_id: &str) {
        for host_key in self.cache.ids_for_node(ResourceKind::Host, node_id) {
            let Some(mut resource) = self.cache.get(ResourceKind::Host, &host_key) else {
                continue;
            };
            let children = self.cache.children_of(self.kind, &host_key);
            let Some(host) = resource.as_host_mut() else {
                continue;
            };
            if host.child_ids(self.kind).iter().eq(children.iter()) {
                continue;
            }
            host.set_child_ids(self.kind, children);

            match self.repository.save(&resource).await {
                Ok(()) => {
                    self.cache.put(resource);
                }
                Err(e) => warn!(
                    node_id,
                    resource_id = %host_key,
                    child_kind = %self.kind,
                    error = %e,
                    "Could not persist host child list"
                ),
            }
        }
    }
}
