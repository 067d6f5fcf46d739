// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Manager
//!
//! Top-level scheduler. Keeps the session set in step with the node
//! registry and drives two independent worker pools.
//!
//! # Cycle
//!
//! ```text
//! idle ──► refreshing nodes (if the refresh interval elapsed)
//!      ──► polling all (bounded pool, waits for every node)
//!      ──► idle
//! ```
//!
//! # Pools
//!
//! ```text
//! inventory:  Semaphore(inventory_workers) + JoinSet, one task per node
//! perf:       buffer_unordered(perf_workers), one future per node
//! ```
//!
//! The inventory cycle never overlaps itself: the next cycle starts only
//! after every spawned poll has finished. The perf cycle runs on its own
//! interval and is never gated by inventory polling.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{InventoryCache, NodeSessionRecord};
use crate::config::InventoryConfig;
use crate::events::EventSink;
use crate::perf::{PerfMonitor, PerfOutcome};
use crate::probe::{HostProbe, NodeDescriptor, NodeRegistry, TimeoutProbe};
use crate::repository::Repository;
use crate::session::{
    ComputeNodeSession, PollReport, PollStatus, SessionContext, SessionSettings, SessionState,
};

/// Result of one node-set refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub kept: Vec<String>,
    /// Set when the registry could not be read; the session set is unchanged
    pub registry_error: Option<String>,
}

/// Result of one inventory cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub refresh: Option<RefreshReport>,
    /// One report per node, sorted by node id
    pub nodes: Vec<PollReport>,
}

impl CycleReport {
    pub fn node(&self, node_id: &str) -> Option<&PollReport> {
        self.nodes.iter().find(|r| r.node_id == node_id)
    }

    /// Nodes whose poll hit a probe failure or failed liveness
    pub fn failed_nodes(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|r| r.status == PollStatus::Unreachable || r.has_probe_failure())
            .map(|r| r.node_id.as_str())
            .collect()
    }

    pub fn events(&self) -> usize {
        self.nodes.iter().map(PollReport::events).sum()
    }
}

/// Scheduler for every compute node session
pub struct InventoryManager {
    config: InventoryConfig,
    registry: Arc<dyn NodeRegistry>,
    context: SessionContext,
    perf: Arc<PerfMonitor>,
    sessions: RwLock<HashMap<String, Arc<ComputeNodeSession>>>,
    last_refresh: Mutex<Option<Instant>>,
}

impl InventoryManager {
    /// Build a manager; every probe call is bounded by `probe_timeout`
    pub fn new(
        config: InventoryConfig,
        registry: Arc<dyn NodeRegistry>,
        probe: Arc<dyn HostProbe>,
        repository: Arc<dyn Repository>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let probe: Arc<dyn HostProbe> = Arc::new(TimeoutProbe::new(probe, config.probe_timeout));
        let perf = Arc::new(PerfMonitor::from_config(&config));
        Self {
            registry,
            context: SessionContext {
                probe,
                repository,
                sink,
                cache: InventoryCache::new(),
            },
            perf,
            sessions: RwLock::new(HashMap::new()),
            last_refresh: Mutex::new(None),
            config,
        }
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Shared inventory cache
    pub fn cache(&self) -> &InventoryCache {
        &self.context.cache
    }

    pub fn perf(&self) -> &PerfMonitor {
        &self.perf
    }

    /// Ids of the managed nodes, sorted
    pub fn node_ids(&self) -> Vec<String> {
        let ids: BTreeSet<String> = self.sessions.read().keys().cloned().collect();
        ids.into_iter().collect()
    }

    pub fn session(&self, node_id: &str) -> Option<Arc<ComputeNodeSession>> {
        self.sessions.read().get(node_id).cloned()
    }

    pub fn node_record(&self, node_id: &str) -> Option<NodeSessionRecord> {
        self.context.cache.get_node_session(node_id)
    }

    /// One full cycle: refresh the node set when due, then poll every node
    #[instrument(skip(self))]
    pub async fn update(&self) -> CycleReport {
        let refresh = if self.refresh_due() {
            Some(self.refresh_nodes().await)
        } else {
            None
        };

        let mut report = self.poll_all().await;
        report.refresh = refresh;
        info!(
            nodes = report.nodes.len(),
            failed = report.failed_nodes().len(),
            events = report.events(),
            "Inventory cycle complete"
        );
        report
    }

    fn refresh_due(&self) -> bool {
        self.last_refresh
            .lock()
            .map_or(true, |at| at.elapsed() >= self.config.node_refresh_interval)
    }

    /// Sync sessions with the registry
    ///
    /// New nodes get a session; vanished nodes and nodes whose service has
    /// been inactive beyond the removal threshold are torn down with their
    /// inventory. A registry failure leaves the session set untouched.
    #[instrument(skip(self))]
    pub async fn refresh_nodes(&self) -> RefreshReport {
        let mut report = RefreshReport::default();

        let listed = match self.registry.list_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(error = %e, "Node registry unavailable; keeping current node set");
                report.registry_error = Some(e.to_string());
                return report;
            }
        };
        *self.last_refresh.lock() = Some(Instant::now());

        let now = Utc::now();
        let mut desired: HashMap<String, NodeDescriptor> = HashMap::new();
        for node in listed {
            if node
                .liveness
                .inactive_beyond(now, self.config.node_removal_threshold)
            {
                info!(node_id = %node.id, "Node service inactive beyond removal threshold");
                continue;
            }
            desired.insert(node.id.clone(), node);
        }

        let (vanished, kept): (Vec<Arc<ComputeNodeSession>>, Vec<Arc<ComputeNodeSession>>) = {
            let mut sessions = self.sessions.write();
            let vanished_ids: Vec<String> = sessions
                .keys()
                .filter(|id| !desired.contains_key(*id))
                .cloned()
                .collect();
            let vanished = vanished_ids
                .iter()
                .filter_map(|id| sessions.remove(id))
                .collect();
            (vanished, sessions.values().cloned().collect())
        };

        for session in vanished {
            session.remove().await;
            self.perf.forget_node(session.node_id());
            report.removed.push(session.node_id().to_string());
        }

        for session in kept {
            if let Some(descriptor) = desired.remove(session.node_id()) {
                session.update_descriptor(descriptor);
            }
            report.kept.push(session.node_id().to_string());
        }

        let settings = SessionSettings::from(&self.config);
        for (node_id, descriptor) in desired {
            let session = Arc::new(ComputeNodeSession::new(descriptor, &self.context, settings));
            self.sessions.write().insert(node_id.clone(), session);
            info!(node_id = %node_id, "Compute node added");
            report.added.push(node_id);
        }

        report.added.sort();
        report.removed.sort();
        report.kept.sort();
        report
    }

    /// Poll every node on the bounded inventory pool and wait for all of them
    #[instrument(skip(self))]
    pub async fn poll_all(&self) -> CycleReport {
        let started_at = Utc::now();
        let sessions: Vec<Arc<ComputeNodeSession>> =
            self.sessions.read().values().cloned().collect();

        let permits = Arc::new(Semaphore::new(self.config.inventory_workers.max(1)));
        let mut tasks = JoinSet::new();

        for session in sessions {
            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(error = %e, "Inventory pool closed");
                    break;
                }
            };
            tasks.spawn(async move {
                let report = session.poll().await;
                drop(permit);
                report
            });
        }

        let mut nodes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => nodes.push(report),
                Err(e) => error!(error = %e, "Node poll task failed"),
            }
        }
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        CycleReport {
            started_at,
            finished_at: Utc::now(),
            refresh: None,
            nodes,
        }
    }

    /// Sample performance of every active node on the perf pool
    #[instrument(skip(self))]
    pub async fn run_performance_cycle(&self) -> Vec<PerfOutcome> {
        let nodes: Vec<NodeDescriptor> = self
            .context
            .cache
            .all_node_sessions()
            .into_values()
            .filter(|record| record.state == SessionState::Active)
            .map(|record| record.descriptor)
            .collect();

        let probe = self.context.probe.clone();
        let sink = self.context.sink.clone();
        let perf = self.perf.clone();

        let mut outcomes: Vec<PerfOutcome> = stream::iter(nodes)
            .map(|node| {
                let (probe, sink, perf) = (probe.clone(), sink.clone(), perf.clone());
                async move { perf.poll_node(probe.as_ref(), sink.as_ref(), &node).await }
            })
            .buffer_unordered(self.config.perf_workers.max(1))
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        debug!(nodes = outcomes.len(), "Performance cycle complete");
        outcomes
    }

    /// Drive the inventory and perf cycles until `shutdown` flips to true
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval = ?self.config.poll_interval,
            perf_interval = ?self.config.perf_interval,
            "Inventory manager starting"
        );

        let inventory = {
            let manager = self.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(manager.config.poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            manager.update().await;
                        }
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
            })
        };

        let performance = {
            let manager = self.clone();
            let mut shutdown = shutdown;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(manager.config.perf_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            manager.run_performance_cycle().await;
                        }
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
            })
        };

        for (name, handle) in [("inventory", inventory), ("performance", performance)] {
            if let Err(e) = handle.await {
                error!(task = name, error = %e, "Polling task aborted");
            }
        }
        info!("Inventory manager stopped");
    }
}
