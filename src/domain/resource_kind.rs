// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Resource Kinds
//!
//! Defines the taxonomy of resources the collector tracks. [`ResourceKind`]
//! covers the top-level kinds that are enumerated and persisted on their own;
//! [`EntityKind`] additionally names the nested records that can be the
//! subject of an event.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level resource kinds, each with its own poller and repository table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Hypervisor host
    Host,
    /// Virtual machine
    VirtualMachine,
    /// Storage volume or pool
    StorageVolume,
    /// Virtual switch with its subnets and port groups
    VirtualSwitch,
}

impl ResourceKind {
    /// Every kind, in the order pollers run within one node poll
    pub const POLL_ORDER: [ResourceKind; 4] = [
        ResourceKind::Host,
        ResourceKind::StorageVolume,
        ResourceKind::VirtualSwitch,
        ResourceKind::VirtualMachine,
    ];

    /// Child kinds owned by a host
    pub const HOST_CHILDREN: [ResourceKind; 3] = [
        ResourceKind::VirtualMachine,
        ResourceKind::StorageVolume,
        ResourceKind::VirtualSwitch,
    ];

    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::VirtualMachine => "virtual_machine",
            Self::StorageVolume => "storage_volume",
            Self::VirtualSwitch => "virtual_switch",
        }
    }

    /// Whether resources of this kind are owned by a host
    pub fn is_host_child(&self) -> bool {
        !matches!(self, Self::Host)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Anything that can be the subject of an inventory event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Host,
    VirtualMachine,
    StorageVolume,
    VirtualSwitch,
    Subnet,
    PortGroup,
}

impl EntityKind {
    /// Short segment used in subjects (`inventory.{segment}.{operation}`)
    pub fn subject_segment(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::VirtualMachine => "vm",
            Self::StorageVolume => "storage",
            Self::VirtualSwitch => "network",
            Self::Subnet => "subnet",
            Self::PortGroup => "portgroup",
        }
    }
}

impl From<ResourceKind> for EntityKind {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Host => EntityKind::Host,
            ResourceKind::VirtualMachine => EntityKind::VirtualMachine,
            ResourceKind::StorageVolume => EntityKind::StorageVolume,
            ResourceKind::VirtualSwitch => EntityKind::VirtualSwitch,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.subject_segment())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_order_starts_with_host_and_ends_with_vms() {
        assert_eq!(ResourceKind::POLL_ORDER[0], ResourceKind::Host);
        assert_eq!(ResourceKind::POLL_ORDER[3], ResourceKind::VirtualMachine);
    }

    #[test]
    fn test_serialization_matches_as_str() {
        for kind in ResourceKind::POLL_ORDER {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_host_children() {
        assert!(!ResourceKind::Host.is_host_child());
        assert!(ResourceKind::HOST_CHILDREN
            .iter()
            .all(|kind| kind.is_host_child()));
    }
}
