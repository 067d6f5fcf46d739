// Copyright (c) 2025 - Cowboy AI, Inc.
//! Hypervisor Host
//!
//! A host is the root of a node's resource tree. Besides its own hardware
//! and OS profile it carries the ids of the VMs, volumes and switches it owns;
//! those lists are maintained by the reconciler so they always match the
//! child resources currently believed to exist.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::network::NetworkInterface;
use super::ResourceKind;
use crate::diff::{normalize_id, Diffable, Field, FieldSpec, Scalar};

/// Connectivity between the collector and a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating system reported by the hypervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsProfile {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub kernel: Option<String>,
}

/// Hypervisor host snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Hypervisor-assigned UUID
    pub id: String,

    /// Compute node this host was observed through
    #[serde(default)]
    pub node_id: String,

    pub name: String,

    /// Hypervisor flavour (kvm, esxi, hyperv, ...)
    pub hypervisor_type: String,

    #[serde(default)]
    pub hypervisor_version: Option<String>,

    pub connection_state: ConnectionState,

    pub cpu_count: u32,

    pub memory_mb: u64,

    #[serde(default)]
    pub os_profile: Option<OsProfile>,

    /// Physical network interfaces
    #[serde(default)]
    pub interfaces: Vec<NetworkInterface>,

    /// Owned virtual machines (sorted)
    #[serde(default)]
    pub vm_ids: Vec<String>,

    /// Owned storage volumes (sorted)
    #[serde(default)]
    pub volume_ids: Vec<String>,

    /// Owned virtual switches (sorted)
    #[serde(default)]
    pub switch_ids: Vec<String>,
}

/// Fields that mirror child inventory rather than describe the host itself
pub const HOST_CHILD_FIELDS: [&str; 3] = ["vm_ids", "volume_ids", "switch_ids"];

static HOST_SCHEMA: &[FieldSpec] = &[
    FieldSpec::scalar("id"),
    FieldSpec::scalar("node_id"),
    FieldSpec::scalar("name"),
    FieldSpec::scalar("hypervisor_type"),
    FieldSpec::scalar("hypervisor_version"),
    FieldSpec::scalar("connection_state"),
    FieldSpec::scalar("cpu_count"),
    FieldSpec::scalar("memory_mb"),
    FieldSpec::nested("os_profile"),
    FieldSpec::keyed("interfaces"),
    FieldSpec::list("vm_ids"),
    FieldSpec::list("volume_ids"),
    FieldSpec::list("switch_ids"),
];

static OS_PROFILE_SCHEMA: &[FieldSpec] = &[
    FieldSpec::scalar("name"),
    FieldSpec::scalar("version"),
    FieldSpec::scalar("kernel"),
];

impl Host {
    /// Owned child ids of the given kind
    pub fn child_ids(&self, kind: ResourceKind) -> &[String] {
        match kind {
            ResourceKind::VirtualMachine => &self.vm_ids,
            ResourceKind::StorageVolume => &self.volume_ids,
            ResourceKind::VirtualSwitch => &self.switch_ids,
            ResourceKind::Host => &[],
        }
    }

    /// Replace the owned child ids of the given kind
    ///
    /// Ids are stored sorted and deduplicated so list comparison is stable.
    pub fn set_child_ids<I>(&mut self, kind: ResourceKind, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut ids: Vec<String> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();

        match kind {
            ResourceKind::VirtualMachine => self.vm_ids = ids,
            ResourceKind::StorageVolume => self.volume_ids = ids,
            ResourceKind::VirtualSwitch => self.switch_ids = ids,
            ResourceKind::Host => {}
        }
    }
}

impl Diffable for OsProfile {
    fn diff_key(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> &'static [FieldSpec] {
        OS_PROFILE_SCHEMA
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        match name {
            "name" => Some(Field::Scalar(self.name.as_str().into())),
            "version" => Some(Field::Scalar(self.version.as_str().into())),
            "kernel" => Some(Field::Scalar(self.kernel.as_deref().into())),
            _ => None,
        }
    }
}

impl Diffable for Host {
    fn diff_key(&self) -> String {
        normalize_id(&self.id)
    }

    fn schema(&self) -> &'static [FieldSpec] {
        HOST_SCHEMA
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        let value = match name {
            "id" => Field::Scalar(normalize_id(&self.id).into()),
            "node_id" => Field::Scalar(self.node_id.as_str().into()),
            "name" => Field::Scalar(self.name.as_str().into()),
            "hypervisor_type" => Field::Scalar(self.hypervisor_type.as_str().into()),
            "hypervisor_version" => Field::Scalar(self.hypervisor_version.as_deref().into()),
            "connection_state" => Field::Scalar(self.connection_state.as_str().into()),
            "cpu_count" => Field::Scalar(self.cpu_count.into()),
            "memory_mb" => Field::Scalar(self.memory_mb.into()),
            "os_profile" => Field::Nested(self.os_profile.as_ref().map(|p| p as &dyn Diffable)),
            "interfaces" => Field::Keyed(
                self.interfaces
                    .iter()
                    .map(|i| i as &dyn Diffable)
                    .collect(),
            ),
            "vm_ids" => Field::List(self.vm_ids.iter().map(Scalar::from).collect()),
            "volume_ids" => Field::List(self.volume_ids.iter().map(Scalar::from).collect()),
            "switch_ids" => Field::List(self.switch_ids.iter().map(Scalar::from).collect()),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Host {
        Host {
            id: "H1".to_string(),
            node_id: "node-1".to_string(),
            name: "hv01".to_string(),
            hypervisor_type: "kvm".to_string(),
            hypervisor_version: Some("8.2".to_string()),
            connection_state: ConnectionState::Connected,
            cpu_count: 32,
            memory_mb: 262_144,
            os_profile: None,
            interfaces: Vec::new(),
            vm_ids: Vec::new(),
            volume_ids: Vec::new(),
            switch_ids: Vec::new(),
        }
    }

    #[test]
    fn test_set_child_ids_sorts_and_dedups() {
        let mut h = host();
        h.set_child_ids(
            ResourceKind::VirtualMachine,
            vec!["vm-b".to_string(), "vm-a".to_string(), "vm-b".to_string()],
        );
        assert_eq!(h.child_ids(ResourceKind::VirtualMachine), ["vm-a", "vm-b"]);
        assert!(h.child_ids(ResourceKind::StorageVolume).is_empty());
    }

    #[test]
    fn test_every_schema_field_is_served() {
        let h = host();
        for spec in h.schema() {
            assert!(h.field(spec.name).is_some(), "missing {}", spec.name);
        }
    }

    #[test]
    fn test_diff_key_is_normalized() {
        assert_eq!(host().diff_key(), "h1");
    }
}
