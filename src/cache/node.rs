// Copyright (c) 2025 - Cowboy AI, Inc.
//! Per-node polling bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::probe::NodeDescriptor;

/// Connectivity state of a compute node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Reachable, polled normally
    Active,
    /// Unreachable or backing service inactive
    Disconnected,
    /// Gone from the registry (terminal)
    Removed,
}

/// Polling and connectivity bookkeeping for one compute node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSessionRecord {
    /// Registry entry the session was created from
    pub descriptor: NodeDescriptor,

    /// Connectivity state
    pub state: SessionState,

    /// Consecutive polls that hit a probe failure
    pub failed_attempts: u32,

    /// Set once `failed_attempts` exceeds the configured maximum
    pub inactive: bool,

    /// Whether the node's stored inventory has been read into the cache
    pub inventory_loaded: bool,

    pub last_polled_at: Option<DateTime<Utc>>,

    pub last_success_at: Option<DateTime<Utc>>,

    /// Earliest time the next reconnect attempt may run
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl NodeSessionRecord {
    pub fn new(descriptor: NodeDescriptor) -> Self {
        Self {
            descriptor,
            state: SessionState::Active,
            failed_attempts: 0,
            inactive: false,
            inventory_loaded: false,
            last_polled_at: None,
            last_success_at: None,
            next_retry_at: None,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.descriptor.id
    }

    /// Whether a poll at `now` must be skipped because of backoff
    pub fn in_backoff(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at.map_or(false, |at| now < at)
    }
}
