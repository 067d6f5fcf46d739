// Copyright (c) 2025 - Cowboy AI, Inc.
//! Hypervisor Probes and Node Registry
//!
//! The collector never speaks a hypervisor wire protocol itself. It consumes
//! two collaborator interfaces:
//!
//! - [`HostProbe`]: structured snapshots and liveness for one compute node
//! - [`NodeRegistry`]: the external list of compute nodes to manage
//!
//! # Timeouts
//!
//! A hung probe call must not pin a worker slot forever. Wrap any probe in
//! [`TimeoutProbe`] to turn a call that exceeds the deadline into
//! [`ProbeError::Timeout`], which the poller treats like any other probe
//! failure.
//!
//! ```text
//! ResourcePoller ──► TimeoutProbe ──► HostProbe impl ──► hypervisor
//!                       │
//!                       └── deadline ──► ProbeError::Timeout
//! ```

pub mod file;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{Resource, ResourceKind};
use crate::errors::{ProbeError, RegistryError};
use crate::perf::PerfSample;

pub use file::{FileHostProbe, FileNodeRegistry};

/// Login material for a hypervisor endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Liveness information published by the node registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessInfo {
    /// Whether the node's backing compute service is enabled and up
    #[serde(default = "default_service_active")]
    pub service_active: bool,

    /// Last heartbeat reported by the compute service
    #[serde(default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
}

fn default_service_active() -> bool {
    true
}

impl Default for LivenessInfo {
    fn default() -> Self {
        Self {
            service_active: true,
            last_heartbeat: None,
        }
    }
}

impl LivenessInfo {
    /// Whether the registry considers the node down at `now`
    ///
    /// A node without heartbeat data is judged by its service flag alone.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        if !self.service_active {
            return true;
        }
        self.last_heartbeat
            .map_or(false, |beat| elapsed(beat, now) > threshold)
    }

    /// Whether the backing service has been inactive for longer than `threshold`
    pub fn inactive_beyond(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        !self.service_active
            && self
                .last_heartbeat
                .map_or(true, |beat| elapsed(beat, now) > threshold)
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

/// One entry of the external node registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Stable compute node id
    pub id: String,

    /// Hypervisor endpoint (URI or host name)
    pub address: String,

    #[serde(default, skip_serializing)]
    pub credentials: Option<Credentials>,

    #[serde(default)]
    pub liveness: LivenessInfo,
}

impl NodeDescriptor {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            credentials: None,
            liveness: LivenessInfo::default(),
        }
    }
}

/// Structured access to one hypervisor
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// Current snapshots of every resource of `kind` on the node
    async fn enumerate(
        &self,
        kind: ResourceKind,
        node: &NodeDescriptor,
    ) -> Result<Vec<Resource>, ProbeError>;

    /// Whether the hypervisor answers at all
    async fn check_liveness(&self, node: &NodeDescriptor) -> bool;

    /// Current utilisation of the node's host and VMs
    async fn sample_performance(
        &self,
        _node: &NodeDescriptor,
    ) -> Result<Vec<PerfSample>, ProbeError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl<P: HostProbe + ?Sized> HostProbe for std::sync::Arc<P> {
    async fn enumerate(
        &self,
        kind: ResourceKind,
        node: &NodeDescriptor,
    ) -> Result<Vec<Resource>, ProbeError> {
        (**self).enumerate(kind, node).await
    }

    async fn check_liveness(&self, node: &NodeDescriptor) -> bool {
        (**self).check_liveness(node).await
    }

    async fn sample_performance(
        &self,
        node: &NodeDescriptor,
    ) -> Result<Vec<PerfSample>, ProbeError> {
        (**self).sample_performance(node).await
    }
}

/// External source of truth for the compute node set
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>, RegistryError>;
}

/// Fixed node list
#[derive(Debug, Clone, Default)]
pub struct StaticNodeRegistry {
    nodes: Vec<NodeDescriptor>,
}

impl StaticNodeRegistry {
    pub fn new(nodes: Vec<NodeDescriptor>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl NodeRegistry for StaticNodeRegistry {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>, RegistryError> {
        Ok(self.nodes.clone())
    }
}

/// Enforces a deadline on every call of the wrapped probe
#[derive(Debug, Clone)]
pub struct TimeoutProbe<P> {
    inner: P,
    timeout: Duration,
}

impl<P: HostProbe> TimeoutProbe<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<P: HostProbe> HostProbe for TimeoutProbe<P> {
    async fn enumerate(
        &self,
        kind: ResourceKind,
        node: &NodeDescriptor,
    ) -> Result<Vec<Resource>, ProbeError> {
        tokio::time::timeout(self.timeout, self.inner.enumerate(kind, node))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
    }

    async fn check_liveness(&self, node: &NodeDescriptor) -> bool {
        match tokio::time::timeout(self.timeout, self.inner.check_liveness(node)).await {
            Ok(alive) => alive,
            Err(_) => {
                warn!(node_id = %node.id, timeout = ?self.timeout, "Liveness check timed out");
                false
            }
        }
    }

    async fn sample_performance(
        &self,
        node: &NodeDescriptor,
    ) -> Result<Vec<PerfSample>, ProbeError> {
        tokio::time::timeout(self.timeout, self.inner.sample_performance(node))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowProbe;

    #[async_trait]
    impl HostProbe for SlowProbe {
        async fn enumerate(
            &self,
            _kind: ResourceKind,
            _node: &NodeDescriptor,
        ) -> Result<Vec<Resource>, ProbeError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }

        async fn check_liveness(&self, _node: &NodeDescriptor) -> bool {
            tokio::time::sleep(Duration::from_secs(60)).await;
            true
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_probe_converts_hang_into_error() {
        let probe = TimeoutProbe::new(SlowProbe, Duration::from_millis(50));
        let node = NodeDescriptor::new("n1", "qemu:///system");

        let result = probe.enumerate(ResourceKind::Host, &node).await;
        assert_eq!(result, Err(ProbeError::Timeout(Duration::from_millis(50))));
        assert!(!probe.check_liveness(&node).await);
    }

    #[tokio::test]
    async fn test_default_sample_performance_is_empty() {
        let probe = TimeoutProbe::new(SlowProbe, Duration::from_secs(1));
        let samples = probe
            .sample_performance(&NodeDescriptor::new("n1", "x"))
            .await
            .unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_liveness_staleness() {
        let now = Utc::now();
        let threshold = Duration::from_secs(120);

        let fresh = LivenessInfo {
            service_active: true,
            last_heartbeat: Some(now - chrono::Duration::seconds(30)),
        };
        assert!(!fresh.is_stale(now, threshold));

        let stale = LivenessInfo {
            service_active: true,
            last_heartbeat: Some(now - chrono::Duration::seconds(300)),
        };
        assert!(stale.is_stale(now, threshold));

        let disabled = LivenessInfo {
            service_active: false,
            last_heartbeat: Some(now),
        };
        assert!(disabled.is_stale(now, threshold));
        assert!(!disabled.inactive_beyond(now, threshold));
        assert!(disabled.inactive_beyond(now + chrono::Duration::seconds(600), threshold));

        assert!(!LivenessInfo::default().is_stale(now, threshold));
    }

    #[test]
    fn test_credentials_are_redacted() {
        let creds = Credentials {
            username: "admin".to_string(),
            secret: "hunter2".to_string(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_static_registry() {
        let registry = StaticNodeRegistry::new(vec![NodeDescriptor::new("n1", "a")]);
        assert_eq!(registry.list_nodes().await.unwrap().len(), 1);
    }
}
