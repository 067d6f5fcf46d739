// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Sum Type
//!
//! Flat tagged union over every top-level resource kind. The cache,
//! repository and pollers handle resources through this type; kind-specific
//! code matches on the variant.

use serde::{Deserialize, Serialize};

use super::{Host, ResourceKind, StorageVolume, VirtualMachine, VirtualSwitch};
use crate::diff::{normalize_id, Diffable, Field, FieldSpec};

/// Snapshot of any top-level resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "snapshot", rename_all = "snake_case")]
pub enum Resource {
    Host(Host),
    VirtualMachine(VirtualMachine),
    StorageVolume(StorageVolume),
    VirtualSwitch(VirtualSwitch),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Host(_) => ResourceKind::Host,
            Resource::VirtualMachine(_) => ResourceKind::VirtualMachine,
            Resource::StorageVolume(_) => ResourceKind::StorageVolume,
            Resource::VirtualSwitch(_) => ResourceKind::VirtualSwitch,
        }
    }

    /// Id exactly as reported by the hypervisor
    pub fn raw_id(&self) -> &str {
        match self {
            Resource::Host(h) => &h.id,
            Resource::VirtualMachine(vm) => &vm.id,
            Resource::StorageVolume(v) => &v.id,
            Resource::VirtualSwitch(s) => &s.id,
        }
    }

    /// Normalized id used as cache and repository key
    pub fn key(&self) -> String {
        normalize_id(self.raw_id())
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::Host(h) => &h.name,
            Resource::VirtualMachine(vm) => &vm.name,
            Resource::StorageVolume(v) => &v.name,
            Resource::VirtualSwitch(s) => &s.name,
        }
    }

    pub fn node_id(&self) -> &str {
        match self {
            Resource::Host(h) => &h.node_id,
            Resource::VirtualMachine(vm) => &vm.node_id,
            Resource::StorageVolume(v) => &v.node_id,
            Resource::VirtualSwitch(s) => &s.node_id,
        }
    }

    /// Attribute the resource to the node it was observed through
    pub fn set_node_id(&mut self, node_id: &str) {
        let slot = match self {
            Resource::Host(h) => &mut h.node_id,
            Resource::VirtualMachine(vm) => &mut vm.node_id,
            Resource::StorageVolume(v) => &mut v.node_id,
            Resource::VirtualSwitch(s) => &mut s.node_id,
        };
        if slot != node_id {
            *slot = node_id.to_string();
        }
    }

    /// Normalized id of the owning host (children only)
    pub fn host_key(&self) -> Option<String> {
        match self {
            Resource::Host(_) => None,
            Resource::VirtualMachine(vm) => Some(normalize_id(&vm.host_id)),
            Resource::StorageVolume(v) => Some(normalize_id(&v.host_id)),
            Resource::VirtualSwitch(s) => Some(normalize_id(&s.host_id)),
        }
    }

    pub fn as_host(&self) -> Option<&Host> {
        match self {
            Resource::Host(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_host_mut(&mut self) -> Option<&mut Host> {
        match self {
            Resource::Host(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_vm(&self) -> Option<&VirtualMachine> {
        match self {
            Resource::VirtualMachine(vm) => Some(vm),
            _ => None,
        }
    }

    pub fn as_volume(&self) -> Option<&StorageVolume> {
        match self {
            Resource::StorageVolume(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_switch(&self) -> Option<&VirtualSwitch> {
        match self {
            Resource::VirtualSwitch(s) => Some(s),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn Diffable {
        match self {
            Resource::Host(h) => h,
            Resource::VirtualMachine(vm) => vm,
            Resource::StorageVolume(v) => v,
            Resource::VirtualSwitch(s) => s,
        }
    }
}

impl Diffable for Resource {
    fn diff_key(&self) -> String {
        format!("{}/{}", self.kind(), self.key())
    }

    fn schema(&self) -> &'static [FieldSpec] {
        self.inner().schema()
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        self.inner().field(name)
    }
}

impl From<Host> for Resource {
    fn from(host: Host) -> Self {
        Resource::Host(host)
    }
}

impl From<VirtualMachine> for Resource {
    fn from(vm: VirtualMachine) -> Self {
        Resource::VirtualMachine(vm)
    }
}

impl From<StorageVolume> for Resource {
    fn from(volume: StorageVolume) -> Self {
        Resource::StorageVolume(volume)
    }
}

impl From<VirtualSwitch> for Resource {
    fn from(switch: VirtualSwitch) -> Self {
        Resource::VirtualSwitch(switch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{diff, ResourceDelta};
    use crate::domain::{ActivityState, PowerState};

    fn volume() -> StorageVolume {
        StorageVolume {
            id: "VOL-1".to_string(),
            node_id: String::new(),
            host_id: "h1".to_string(),
            name: "images".to_string(),
            pool_type: "dir".to_string(),
            connection_state: ActivityState::Active,
            capacity_bytes: 100,
            allocated_bytes: 10,
            path: None,
        }
    }

    #[test]
    fn test_key_and_host_key_are_normalized() {
        let r = Resource::from(volume());
        assert_eq!(r.key(), "vol-1");
        assert_eq!(r.host_key().as_deref(), Some("h1"));
        assert_eq!(r.kind(), ResourceKind::StorageVolume);
    }

    #[test]
    fn test_set_node_id() {
        let mut r = Resource::from(volume());
        r.set_node_id("node-7");
        assert_eq!(r.node_id(), "node-7");
    }

    #[test]
    fn test_cross_kind_diff_is_rejected() {
        let vm = Resource::from(VirtualMachine {
            id: "vol-1".to_string(),
            node_id: String::new(),
            host_id: "h1".to_string(),
            name: "x".to_string(),
            power_state: PowerState::Active,
            vcpus: 1,
            memory_mb: 512,
            os_type: None,
            disks: Vec::new(),
            interfaces: Vec::new(),
        });
        let vol = Resource::from(volume());
        assert!(diff(Some(&vol), Some(&vm)).is_err());
        assert_eq!(diff(Some(&vol), Some(&vol)).unwrap(), ResourceDelta::Unchanged);
    }

    #[test]
    fn test_tagged_serialization() {
        let json = serde_json::to_value(Resource::from(volume())).unwrap();
        assert_eq!(json["kind"], "storage_volume");
        assert_eq!(json["snapshot"]["name"], "images");
    }
}
