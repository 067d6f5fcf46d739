// Copyright (c) 2025 - Cowboy AI, Inc.
//! Compute Node Session
//!
//! Per-node connectivity tracking and poll orchestration. A session owns the
//! four resource pollers of its node and runs them in dependency order.
//!
//! # Lifecycle
//!
//! ```text
//!              ConnectivityLost
//!   Active ──────────────────────► Disconnected
//!     ▲  ◄──────────────────────     │
//!     │          Reconnected         │
//!     │                              │
//!     └──── Deregistered ──► Removed ◄┘ Deregistered
//! ```
//!
//! The state machine is pure; its output names the effect the session then
//! performs (flip host connectivity, purge the node's inventory).
//!
//! A disconnected node reconnects only after a poll in which every kind
//! enumerated; a failed retry stays disconnected and waits out the next
//! backoff window.
//!
//! # Bookkeeping
//!
//! Mutable per-node state (state, failure counter, backoff deadline) lives in
//! the node table of the [`InventoryCache`], not in the session, so the
//! session itself can be shared freely between tasks.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub use crate::cache::SessionState;

use crate::cache::{InventoryCache, NodeSessionRecord};
use crate::config::InventoryConfig;
use crate::domain::{ConnectionState, ResourceKind};
use crate::events::EventSink;
use crate::poller::{PollOutcome, ResourcePoller};
use crate::probe::{HostProbe, NodeDescriptor};
use crate::repository::Repository;
use crate::state_machine::{StateMachine, TransitionError, TransitionResult};

/// Inputs driving the session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    ConnectivityLost,
    Reconnected,
    Deregistered,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    MarkHostsDisconnected,
    MarkHostsConnected,
    PurgeInventory,
}

impl StateMachine for SessionState {
    type Input = SessionInput;
    type Output = SessionEffect;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use SessionInput::*;
        use SessionState::*;

        match (self, input) {
            (Active, ConnectivityLost) => Ok((Disconnected, SessionEffect::MarkHostsDisconnected)),
            (Disconnected, Reconnected) => Ok((Active, SessionEffect::MarkHostsConnected)),
            (Active | Disconnected, Deregistered) => Ok((Removed, SessionEffect::PurgeInventory)),
            (Removed, _) => Err(TransitionError::Terminal(format!("{self:?}"))),
            (state, input) => Err(TransitionError::InvalidTransition {
                from: format!("{state:?}"),
                input: format!("{input:?}"),
            }),
        }
    }

    fn valid_inputs(&self) -> Vec<Self::Input> {
        match self {
            SessionState::Active => vec![SessionInput::ConnectivityLost, SessionInput::Deregistered],
            SessionState::Disconnected => vec![SessionInput::Reconnected, SessionInput::Deregistered],
            SessionState::Removed => Vec::new(),
        }
    }
}

/// Tuning knobs of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub max_failed_attempts: u32,
    pub heartbeat_staleness: Duration,
    pub retry_backoff_base: Duration,
    pub retry_backoff_max: Duration,
}

impl SessionSettings {
    /// Delay before reconnect attempt number `attempts`
    ///
    /// `base * 2^(attempts - 1)`, capped at the configured maximum.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        self.retry_backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.retry_backoff_max)
    }
}

impl From<&InventoryConfig> for SessionSettings {
    fn from(config: &InventoryConfig) -> Self {
        Self {
            max_failed_attempts: config.max_failed_attempts,
            heartbeat_staleness: config.heartbeat_staleness,
            retry_backoff_base: config.retry_backoff_base,
            retry_backoff_max: config.retry_backoff_max,
        }
    }
}

/// Collaborators shared by every session
#[derive(Clone)]
pub struct SessionContext {
    pub probe: Arc<dyn HostProbe>,
    pub repository: Arc<dyn Repository>,
    pub sink: Arc<dyn EventSink>,
    pub cache: InventoryCache,
}

/// How a poll ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    /// Pollers ran (individual kinds may still have failed)
    Completed,
    /// Reconnect backoff still running
    Skipped,
    /// Stored inventory could not be loaded; retried next cycle
    Deferred,
    /// Liveness check failed
    Unreachable,
    /// Session no longer exists
    Removed,
}

/// What one poll of one node did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub node_id: String,
    pub correlation_id: Uuid,
    pub status: PollStatus,
    pub state: SessionState,
    pub failed_attempts: u32,
    pub inactive: bool,
    /// Per kind, in poll order
    pub outcomes: Vec<PollOutcome>,
}

impl PollReport {
    pub fn outcome(&self, kind: ResourceKind) -> Option<&PollOutcome> {
        self.outcomes.iter().find(|o| o.kind == kind)
    }

    pub fn events(&self) -> usize {
        self.outcomes.iter().map(|o| o.events).sum()
    }

    /// Whether any poller failed to enumerate
    pub fn has_probe_failure(&self) -> bool {
        self.outcomes.iter().any(PollOutcome::is_failed)
    }
}

/// Polling session of one compute node
pub struct ComputeNodeSession {
    node_id: String,
    probe: Arc<dyn HostProbe>,
    cache: InventoryCache,
    pollers: Vec<ResourcePoller>,
    settings: SessionSettings,
}

impl ComputeNodeSession {
    /// Create the session and register its bookkeeping record
    pub fn new(descriptor: NodeDescriptor, context: &SessionContext, settings: SessionSettings) -> Self {
        let node_id = descriptor.id.clone();
        if context.cache.get_node_session(&node_id).is_none() {
            context.cache.put_node_session(NodeSessionRecord::new(descriptor));
        }

        let pollers = ResourceKind::POLL_ORDER
            .into_iter()
            .map(|kind| {
                ResourcePoller::new(
                    kind,
                    context.probe.clone(),
                    context.repository.clone(),
                    context.sink.clone(),
                    context.cache.clone(),
                )
            })
            .collect();

        Self {
            node_id,
            probe: context.probe.clone(),
            cache: context.cache.clone(),
            pollers,
            settings,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Current bookkeeping record
    pub fn record(&self) -> Option<NodeSessionRecord> {
        self.cache.get_node_session(&self.node_id)
    }

    pub fn state(&self) -> SessionState {
        self.record().map_or(SessionState::Removed, |r| r.state)
    }

    /// Replace the registry entry (address, credentials, liveness)
    pub fn update_descriptor(&self, descriptor: NodeDescriptor) {
        self.cache
            .update_node_session(&self.node_id, |record| record.descriptor = descriptor);
    }

    pub async fn poll(&self) -> PollReport {
        self.poll_at(Utc::now()).await
    }

    /// Poll every kind of this node as of `now`
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn poll_at(&self, now: DateTime<Utc>) -> PollReport {
        let correlation_id = Uuid::now_v7();
        let Some(record) = self.record() else {
            return self.report(correlation_id, PollStatus::Removed, Vec::new());
        };
        if record.state == SessionState::Removed {
            return self.report(correlation_id, PollStatus::Removed, Vec::new());
        }
        if record.in_backoff(now) {
            debug!(next_retry_at = ?record.next_retry_at, "Reconnect backoff running; skipping poll");
            return self.report(correlation_id, PollStatus::Skipped, Vec::new());
        }

        if !self.ensure_loaded().await {
            return self.report(correlation_id, PollStatus::Deferred, Vec::new());
        }

        self.cache
            .update_node_session(&self.node_id, |r| r.last_polled_at = Some(now));

        let descriptor = record.descriptor;
        let stale = descriptor
            .liveness
            .is_stale(now, self.settings.heartbeat_staleness);
        let alive = !stale && self.probe.check_liveness(&descriptor).await;

        if !alive {
            warn!(heartbeat_stale = stale, "Node failed liveness check");
            self.register_failure(now, true, correlation_id).await;
            return self.report(correlation_id, PollStatus::Unreachable, Vec::new());
        }

        let mut outcomes = Vec::with_capacity(self.pollers.len());
        for poller in &self.pollers {
            outcomes.push(poller.poll(&descriptor, correlation_id).await);
        }

        if outcomes.iter().any(PollOutcome::is_failed) {
            self.register_failure(now, false, correlation_id).await;
        } else {
            self.cache.update_node_session(&self.node_id, |r| {
                r.failed_attempts = 0;
                r.inactive = false;
                r.next_retry_at = None;
                r.last_success_at = Some(now);
            });
            // Reconnect only once every kind has been reconciled
            if record.state == SessionState::Disconnected {
                info!("Node reachable again");
                if let Some(marked) = self.apply(SessionInput::Reconnected, correlation_id).await {
                    outcomes.extend(marked);
                }
            }
        }

        self.report(correlation_id, PollStatus::Completed, outcomes)
    }

    /// Tear the node down: purge its inventory children first, then hosts,
    /// and drop its bookkeeping
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn remove(&self) -> Vec<PollOutcome> {
        let correlation_id = Uuid::now_v7();
        // Purge must see inventory stored before a restart too
        self.ensure_loaded().await;
        let outcomes = match self.apply(SessionInput::Deregistered, correlation_id).await {
            Some(outcomes) => outcomes,
            None => Vec::new(),
        };
        self.cache.delete_node_session(&self.node_id);
        info!(
            removed = outcomes.iter().map(|o| o.removed.len()).sum::<usize>(),
            "Node session removed"
        );
        outcomes
    }

    /// Read the node's stored inventory into the cache once
    ///
    /// Returns false when the repository could not be read; the poll is then
    /// deferred rather than diffed against an empty cache.
    async fn ensure_loaded(&self) -> bool {
        if self.record().map_or(false, |r| r.inventory_loaded) {
            return true;
        }
        for poller in &self.pollers {
            if let Err(e) = poller.load(&self.node_id).await {
                warn!(kind = %poller.kind(), error = %e, "Could not load stored inventory; deferring poll");
                return false;
            }
        }
        self.cache
            .update_node_session(&self.node_id, |r| r.inventory_loaded = true);
        true
    }

    /// Count a failed poll; disconnect when connectivity was lost or the
    /// failure budget is exhausted. A node that is already disconnected stays
    /// so and waits out the next backoff window.
    async fn register_failure(&self, now: DateTime<Utc>, connectivity_lost: bool, correlation_id: Uuid) {
        let settings = self.settings;
        let disconnect = self.cache.update_node_session(&self.node_id, |r| {
            r.failed_attempts += 1;
            if r.failed_attempts > settings.max_failed_attempts {
                r.inactive = true;
            }
            let disconnect =
                connectivity_lost || r.inactive || r.state == SessionState::Disconnected;
            if disconnect {
                let delay = settings.backoff(r.failed_attempts);
                r.next_retry_at = Some(now + to_chrono(delay));
            }
            warn!(
                failed_attempts = r.failed_attempts,
                inactive = r.inactive,
                "Poll failure recorded"
            );
            disconnect
        });

        if disconnect == Some(true) && self.state() == SessionState::Active {
            self.apply(SessionInput::ConnectivityLost, correlation_id).await;
        }
    }

    /// Run one lifecycle transition and perform its effect
    async fn apply(&self, input: SessionInput, correlation_id: Uuid) -> Option<Vec<PollOutcome>> {
        let current = self.state();
        let (next, effect) = match current.transition(&input) {
            Ok(step) => step,
            Err(e) => {
                debug!(error = %e, "Ignoring lifecycle input");
                return None;
            }
        };
        self.cache
            .update_node_session(&self.node_id, |r| r.state = next);
        info!(from = ?current, to = ?next, "Session state changed");

        let outcomes = match effect {
            SessionEffect::MarkHostsDisconnected => {
                vec![self.mark_hosts(ConnectionState::Disconnected, correlation_id).await]
            }
            SessionEffect::MarkHostsConnected => {
                vec![self.mark_hosts(ConnectionState::Connected, correlation_id).await]
            }
            SessionEffect::PurgeInventory => {
                let mut outcomes = Vec::with_capacity(self.pollers.len());
                for poller in self.pollers.iter().rev() {
                    outcomes.push(poller.purge(&self.node_id, correlation_id).await);
                }
                outcomes
            }
        };
        Some(outcomes)
    }

    async fn mark_hosts(&self, state: ConnectionState, correlation_id: Uuid) -> PollOutcome {
        match self.pollers.iter().find(|p| p.kind() == ResourceKind::Host) {
            Some(hosts) => hosts.set_host_connection(&self.node_id, state, correlation_id).await,
            None => PollOutcome::new(ResourceKind::Host),
        }
    }

    fn report(&self, correlation_id: Uuid, status: PollStatus, outcomes: Vec<PollOutcome>) -> PollReport {
        let record = self.record();
        PollReport {
            node_id: self.node_id.clone(),
            correlation_id,
            status,
            state: record.as_ref().map_or(SessionState::Removed, |r| r.state),
            failed_attempts: record.as_ref().map_or(0, |r| r.failed_attempts),
            inactive: record.as_ref().map_or(false, |r| r.inactive),
            outcomes,
        }
    }
}

fn to_chrono(delay: Duration) -> chrono::Duration {
    chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::days(365))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_table() {
        let (state, effect) = SessionState::Active
            .transition(&SessionInput::ConnectivityLost)
            .unwrap();
        assert_eq!(state, SessionState::Disconnected);
        assert_eq!(effect, SessionEffect::MarkHostsDisconnected);

        let (state, effect) = state.transition(&SessionInput::Reconnected).unwrap();
        assert_eq!(state, SessionState::Active);
        assert_eq!(effect, SessionEffect::MarkHostsConnected);

        let (state, effect) = state.transition(&SessionInput::Deregistered).unwrap();
        assert_eq!(state, SessionState::Removed);
        assert_eq!(effect, SessionEffect::PurgeInventory);
    }

    #[test]
    fn test_invalid_and_terminal_transitions() {
        assert!(matches!(
            SessionState::Active.transition(&SessionInput::Reconnected),
            Err(TransitionError::InvalidTransition { .. })
        ));
        assert!(matches!(
            SessionState::Removed.transition(&SessionInput::Deregistered),
            Err(TransitionError::Terminal(_))
        ));
        assert!(SessionState::Removed.valid_inputs().is_empty());
    }

    #[test]
    fn test_valid_inputs_match_transitions() {
        for state in [SessionState::Active, SessionState::Disconnected] {
            for input in state.valid_inputs() {
                assert!(state.can_transition(&input), "{state:?} on {input:?}");
            }
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let settings = SessionSettings {
            max_failed_attempts: 3,
            heartbeat_staleness: Duration::from_secs(120),
            retry_backoff_base: Duration::from_secs(10),
            retry_backoff_max: Duration::from_secs(60),
        };
        assert_eq!(settings.backoff(1), Duration::from_secs(10));
        assert_eq!(settings.backoff(2), Duration::from_secs(20));
        assert_eq!(settings.backoff(3), Duration::from_secs(40));
        assert_eq!(settings.backoff(4), Duration::from_secs(60));
        assert_eq!(settings.backoff(40), Duration::from_secs(60));
    }
}
