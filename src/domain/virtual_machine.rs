// Copyright (c) 2025 - Cowboy AI, Inc.
//! Virtual Machine
//!
//! VM snapshots as observed from the hypervisor, including attached disks and
//! virtual NICs. Power state drives most of the VM lifecycle events.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::network::NetworkInterface;
use crate::diff::{normalize_id, Diffable, Field, FieldSpec};

/// VM power state as reported by the hypervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    /// Running
    Active,
    /// Suspended in memory
    Paused,
    /// Powered off
    Stopped,
    /// Guest shut down
    Shutdown,
    /// Hypervisor reports a fault
    Error,
    /// State could not be determined
    Unknown,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Shutdown => "shutdown",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Parse from the normalized scalar form
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "stopped" => Some(Self::Stopped),
            "shutdown" => Some(Self::Shutdown),
            "error" => Some(Self::Error),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Virtual disk attached to a VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub id: String,
    /// Guest device name (vda, sdb, ...)
    pub device: String,
    /// Backing storage volume
    #[serde(default)]
    pub volume_id: Option<String>,
    pub capacity_bytes: u64,
    #[serde(default)]
    pub bus: Option<String>,
}

/// Virtual machine snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: String,

    #[serde(default)]
    pub node_id: String,

    /// Owning host
    pub host_id: String,

    pub name: String,

    pub power_state: PowerState,

    pub vcpus: u32,

    pub memory_mb: u64,

    #[serde(default)]
    pub os_type: Option<String>,

    #[serde(default)]
    pub disks: Vec<Disk>,

    #[serde(default)]
    pub interfaces: Vec<NetworkInterface>,
}

static DISK_SCHEMA: &[FieldSpec] = &[
    FieldSpec::scalar("id"),
    FieldSpec::scalar("device"),
    FieldSpec::scalar("volume_id"),
    FieldSpec::scalar("capacity_bytes"),
    FieldSpec::scalar("bus"),
];

static VM_SCHEMA: &[FieldSpec] = &[
    FieldSpec::scalar("id"),
    FieldSpec::scalar("node_id"),
    FieldSpec::scalar("host_id"),
    FieldSpec::scalar("name"),
    FieldSpec::scalar("power_state"),
    FieldSpec::scalar("vcpus"),
    FieldSpec::scalar("memory_mb"),
    FieldSpec::scalar("os_type"),
    FieldSpec::keyed("disks"),
    FieldSpec::keyed("interfaces"),
];

impl Diffable for Disk {
    fn diff_key(&self) -> String {
        normalize_id(&self.id)
    }

    fn schema(&self) -> &'static [FieldSpec] {
        DISK_SCHEMA
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        let value = match name {
            "id" => Field::Scalar(normalize_id(&self.id).into()),
            "device" => Field::Scalar(self.device.as_str().into()),
            "volume_id" => Field::Scalar(self.volume_id.as_deref().map(normalize_id).into()),
            "capacity_bytes" => Field::Scalar(self.capacity_bytes.into()),
            "bus" => Field::Scalar(self.bus.as_deref().into()),
            _ => return None,
        };
        Some(value)
    }
}

impl Diffable for VirtualMachine {
    fn diff_key(&self) -> String {
        normalize_id(&self.id)
    }

    fn schema(&self) -> &'static [FieldSpec] {
        VM_SCHEMA
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        let value = match name {
            "id" => Field::Scalar(normalize_id(&self.id).into()),
            "node_id" => Field::Scalar(self.node_id.as_str().into()),
            "host_id" => Field::Scalar(normalize_id(&self.host_id).into()),
            "name" => Field::Scalar(self.name.as_str().into()),
            "power_state" => Field::Scalar(self.power_state.as_str().into()),
            "vcpus" => Field::Scalar(self.vcpus.into()),
            "memory_mb" => Field::Scalar(self.memory_mb.into()),
            "os_type" => Field::Scalar(self.os_type.as_deref().into()),
            "disks" => Field::Keyed(self.disks.iter().map(|d| d as &dyn Diffable).collect()),
            "interfaces" => Field::Keyed(
                self.interfaces
                    .iter()
                    .map(|i| i as &dyn Diffable)
                    .collect(),
            ),
            _ => return None,
        };
        Some(value)
    }
}
