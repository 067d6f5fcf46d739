// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Domain Models
//!
//! Snapshots of the virtual infrastructure as reported by a hypervisor.
//! Every record implements [`Diffable`](crate::diff::Diffable) so that two
//! observations of the same resource can be compared structurally.
//!
//! # Resource Tree
//!
//! ```text
//! ComputeNode
//!   └── Host
//!         ├── VirtualMachine ── Disk, NetworkInterface
//!         ├── StorageVolume
//!         └── VirtualSwitch ─── Subnet, PortGroup
//! ```
//!
//! Hosts reference their children by id; children carry the owning host id.

pub mod host;
pub mod network;
pub mod resource;
pub mod resource_kind;
pub mod storage;
pub mod virtual_machine;

pub use host::{ConnectionState, Host, OsProfile, HOST_CHILD_FIELDS};
pub use network::{ActivityState, NetworkInterface, PortGroup, Subnet, VirtualSwitch};
pub use resource::Resource;
pub use resource_kind::{EntityKind, ResourceKind};
pub use storage::StorageVolume;
pub use virtual_machine::{Disk, PowerState, VirtualMachine};
