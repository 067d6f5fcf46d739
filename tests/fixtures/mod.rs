// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-inventory
//!
//! Deterministic inventory data and scripted collaborators shared by the
//! integration tests.
//!
//! # Design Principles
//! - Ids and timestamps are fixed constants
//! - Probe and registry are scripted per node and per kind; tests change the
//!   script between polls to simulate hypervisor changes
//! - Failures are injected explicitly, never by timing
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use cim_inventory::config::InventoryConfig;
use cim_inventory::domain::{
    ActivityState, ConnectionState, EntityKind, Host, PortGroup, PowerState, Resource,
    ResourceKind, StorageVolume, VirtualMachine, VirtualSwitch,
};
use cim_inventory::errors::{ProbeError, RegistryError};
use cim_inventory::events::CollectingEventSink;
use cim_inventory::perf::PerfSample;
use cim_inventory::probe::{HostProbe, LivenessInfo, NodeDescriptor, NodeRegistry};
use cim_inventory::repository::InMemoryRepository;

pub const NODE_A: &str = "node-a";
pub const NODE_B: &str = "node-b";
pub const NODE_C: &str = "node-c";

pub const HOST_1: &str = "H1";
pub const HOST_2: &str = "H2";
pub const VM_1: &str = "V1";
pub const VM_2: &str = "V2";
pub const VOLUME_1: &str = "S1";
pub const VOLUME_2: &str = "S2";
pub const SWITCH_1: &str = "N1";

// Fixed test timestamp (2026-01-19T12:00:00Z)
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

/// Parse the fixed timestamp
pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

/// Normalized form of a fixture id
pub fn key(id: &str) -> String {
    id.trim().to_lowercase()
}

pub fn host(id: &str) -> Host {
    Host {
        id: id.to_string(),
        node_id: String::new(),
        name: format!("hv-{}", key(id)),
        hypervisor_type: "kvm".to_string(),
        hypervisor_version: Some("8.2.0".to_string()),
        connection_state: ConnectionState::Connected,
        cpu_count: 16,
        memory_mb: 65536,
        os_profile: None,
        interfaces: Vec::new(),
        vm_ids: Vec::new(),
        volume_ids: Vec::new(),
        switch_ids: Vec::new(),
    }
}

pub fn vm(id: &str, host_id: &str, power_state: PowerState) -> VirtualMachine {
    VirtualMachine {
        id: id.to_string(),
        node_id: String::new(),
        host_id: host_id.to_string(),
        name: format!("vm-{}", key(id)),
        power_state,
        vcpus: 2,
        memory_mb: 4096,
        os_type: Some("linux".to_string()),
        disks: Vec::new(),
        interfaces: Vec::new(),
    }
}

pub fn volume(id: &str, host_id: &str, state: ActivityState) -> StorageVolume {
    StorageVolume {
        id: id.to_string(),
        node_id: String::new(),
        host_id: host_id.to_string(),
        name: format!("pool-{}", key(id)),
        pool_type: "dir".to_string(),
        connection_state: state,
        capacity_bytes: 1 << 40,
        allocated_bytes: 1 << 30,
        path: Some(format!("/var/lib/libvirt/{}", key(id))),
    }
}

pub fn port_group(id: &str, vlan_id: u16) -> PortGroup {
    PortGroup {
        id: id.to_string(),
        name: format!("pg-{}", key(id)),
        vlan_id: Some(vlan_id),
        active_ports: 0,
    }
}

pub fn switch(id: &str, host_id: &str, port_groups: Vec<PortGroup>) -> VirtualSwitch {
    VirtualSwitch {
        id: id.to_string(),
        node_id: String::new(),
        host_id: host_id.to_string(),
        name: format!("br-{}", key(id)),
        switch_type: "linux_bridge".to_string(),
        connection_state: ActivityState::Active,
        mtu: Some(1500),
        subnets: Vec::new(),
        port_groups,
    }
}

pub fn node(id: &str) -> NodeDescriptor {
    NodeDescriptor::new(id, format!("qemu+ssh://{id}/system"))
}

/// Node whose backing service has been down since `since`
pub fn inactive_node(id: &str, since: DateTime<Utc>) -> NodeDescriptor {
    NodeDescriptor {
        liveness: LivenessInfo {
            service_active: false,
            last_heartbeat: Some(since),
        },
        ..node(id)
    }
}

pub fn perf_sample(kind: EntityKind, id: &str, cpu: f64, memory: f64) -> PerfSample {
    PerfSample {
        node_id: String::new(),
        entity_kind: kind,
        entity_id: id.to_string(),
        name: format!("{}-{}", kind, key(id)),
        cpu_percent: cpu,
        memory_percent: memory,
        timestamp: fixed_timestamp(),
    }
}

/// Configuration with small pools and short, deterministic timings
pub fn test_config() -> InventoryConfig {
    InventoryConfig {
        poll_interval: Duration::from_secs(60),
        node_refresh_interval: Duration::from_secs(300),
        perf_interval: Duration::from_secs(30),
        inventory_workers: 2,
        perf_workers: 2,
        probe_timeout: Duration::from_secs(5),
        max_failed_attempts: 2,
        heartbeat_staleness: Duration::from_secs(120),
        node_removal_threshold: Duration::from_secs(3600),
        retry_backoff_base: Duration::from_secs(10),
        retry_backoff_max: Duration::from_secs(60),
        cpu_threshold_percent: 90.0,
        memory_threshold_percent: 90.0,
        perf_history_len: 5,
    }
}

#[derive(Default)]
struct NodeScript {
    resources: HashMap<ResourceKind, Vec<Resource>>,
    failing: HashMap<ResourceKind, ProbeError>,
    hanging: bool,
    unreachable: bool,
    perf: Vec<PerfSample>,
    perf_error: Option<ProbeError>,
    enumerate_calls: usize,
}

/// Scripted hypervisor probe
#[derive(Default)]
pub struct FakeProbe {
    nodes: Mutex<HashMap<String, NodeScript>>,
}

impl FakeProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace every snapshot of the resource's kind on a node with the
    /// current list plus this resource (same id replaced)
    pub fn put(&self, node_id: &str, resource: impl Into<Resource>) {
        let resource = resource.into();
        let mut nodes = self.nodes.lock();
        let list = nodes
            .entry(node_id.to_string())
            .or_default()
            .resources
            .entry(resource.kind())
            .or_default();
        list.retain(|r| r.key() != resource.key());
        list.push(resource);
    }

    /// Stop reporting a resource
    pub fn remove(&self, node_id: &str, kind: ResourceKind, id: &str) {
        if let Some(script) = self.nodes.lock().get_mut(node_id) {
            if let Some(list) = script.resources.get_mut(&kind) {
                list.retain(|r| r.key() != key(id));
            }
        }
    }

    pub fn clear(&self, node_id: &str, kind: ResourceKind) {
        if let Some(script) = self.nodes.lock().get_mut(node_id) {
            script.resources.remove(&kind);
        }
    }

    /// Make enumeration of one kind fail until healed
    pub fn fail(&self, node_id: &str, kind: ResourceKind, error: ProbeError) {
        self.nodes
            .lock()
            .entry(node_id.to_string())
            .or_default()
            .failing
            .insert(kind, error);
    }

    pub fn heal(&self, node_id: &str, kind: ResourceKind) {
        if let Some(script) = self.nodes.lock().get_mut(node_id) {
            script.failing.remove(&kind);
        }
    }

    /// Make every call for a node block far beyond any timeout
    pub fn hang(&self, node_id: &str, hanging: bool) {
        self.nodes
            .lock()
            .entry(node_id.to_string())
            .or_default()
            .hanging = hanging;
    }

    pub fn set_reachable(&self, node_id: &str, reachable: bool) {
        self.nodes
            .lock()
            .entry(node_id.to_string())
            .or_default()
            .unreachable = !reachable;
    }

    pub fn set_perf(&self, node_id: &str, samples: Vec<PerfSample>) {
        self.nodes
            .lock()
            .entry(node_id.to_string())
            .or_default()
            .perf = samples;
    }

    pub fn fail_perf(&self, node_id: &str, error: ProbeError) {
        self.nodes
            .lock()
            .entry(node_id.to_string())
            .or_default()
            .perf_error = Some(error);
    }

    /// Enumerate calls made for a node so far
    pub fn enumerate_calls(&self, node_id: &str) -> usize {
        self.nodes
            .lock()
            .get(node_id)
            .map_or(0, |script| script.enumerate_calls)
    }

    fn is_hanging(&self, node_id: &str) -> bool {
        self.nodes.lock().get(node_id).map_or(false, |s| s.hanging)
    }

    async fn hang_if_scripted(&self, node_id: &str) {
        if self.is_hanging(node_id) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }
}

#[async_trait]
impl HostProbe for FakeProbe {
    async fn enumerate(
        &self,
        kind: ResourceKind,
        node: &NodeDescriptor,
    ) -> Result<Vec<Resource>, ProbeError> {
        self.hang_if_scripted(&node.id).await;

        let mut nodes = self.nodes.lock();
        let script = nodes.entry(node.id.clone()).or_default();
        script.enumerate_calls += 1;
        if let Some(error) = script.failing.get(&kind) {
            return Err(error.clone());
        }
        Ok(script.resources.get(&kind).cloned().unwrap_or_default())
    }

    async fn check_liveness(&self, node: &NodeDescriptor) -> bool {
        self.hang_if_scripted(&node.id).await;
        self.nodes
            .lock()
            .get(&node.id)
            .map_or(true, |script| !script.unreachable)
    }

    async fn sample_performance(
        &self,
        node: &NodeDescriptor,
    ) -> Result<Vec<PerfSample>, ProbeError> {
        self.hang_if_scripted(&node.id).await;
        let nodes = self.nodes.lock();
        match nodes.get(&node.id) {
            Some(script) => match &script.perf_error {
                Some(error) => Err(error.clone()),
                None => Ok(script.perf.clone()),
            },
            None => Ok(Vec::new()),
        }
    }
}

/// Scripted node registry
#[derive(Default)]
pub struct FakeRegistry {
    nodes: Mutex<Vec<NodeDescriptor>>,
    failing: Mutex<bool>,
    calls: Mutex<usize>,
}

impl FakeRegistry {
    pub fn with_nodes(nodes: Vec<NodeDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            nodes: Mutex::new(nodes),
            ..Self::default()
        })
    }

    pub fn set_nodes(&self, nodes: Vec<NodeDescriptor>) {
        *self.nodes.lock() = nodes;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl NodeRegistry for FakeRegistry {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>, RegistryError> {
        *self.calls.lock() += 1;
        if *self.failing.lock() {
            return Err(RegistryError::Unavailable("registry offline".to_string()));
        }
        Ok(self.nodes.lock().clone())
    }
}

/// Collaborators wired the way the manager wires them
pub struct Harness {
    pub probe: Arc<FakeProbe>,
    pub repository: Arc<InMemoryRepository>,
    pub sink: CollectingEventSink,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            probe: FakeProbe::new(),
            repository: Arc::new(InMemoryRepository::new()),
            sink: CollectingEventSink::new(),
        }
    }
}

/// Keys of a set of ids, for comparing against outcomes
pub fn keys(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| key(id)).collect()
}

/// Ids in a set, sorted
pub fn sorted(ids: HashSet<String>) -> Vec<String> {
    let mut ids: Vec<String> = ids.into_iter().collect();
    ids.sort();
    ids
}
