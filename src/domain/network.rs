// Copyright (c) 2025 - Cowboy AI, Inc.
//! Virtual Networking
//!
//! Virtual switches with their subnets and port groups, plus the network
//! interface record shared by hosts (physical NICs) and VMs (virtual NICs).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diff::{normalize_id, Diffable, Field, FieldSpec, Scalar};

/// Administrative state of a switch or storage volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    Active,
    Inactive,
}

impl ActivityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network interface, keyed by MAC address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub mac_address: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub ip_addresses: Vec<String>,

    /// Switch the interface is plugged into (VM NICs)
    #[serde(default)]
    pub switch_id: Option<String>,

    #[serde(default)]
    pub port_group: Option<String>,

    #[serde(default)]
    pub mtu: Option<u32>,

    #[serde(default = "default_link_up")]
    pub link_up: bool,
}

fn default_link_up() -> bool {
    true
}

/// IP subnet defined on a switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub name: String,
    pub cidr: String,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub dhcp_enabled: bool,
}

/// Port group defined on a switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub vlan_id: Option<u16>,
    #[serde(default)]
    pub active_ports: u32,
}

/// Virtual switch snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualSwitch {
    pub id: String,

    #[serde(default)]
    pub node_id: String,

    /// Owning host
    pub host_id: String,

    pub name: String,

    /// Switch flavour (linux_bridge, ovs, vswitch, ...)
    pub switch_type: String,

    pub connection_state: ActivityState,

    #[serde(default)]
    pub mtu: Option<u32>,

    #[serde(default)]
    pub subnets: Vec<Subnet>,

    #[serde(default)]
    pub port_groups: Vec<PortGroup>,
}

impl VirtualSwitch {
    /// Port group by normalized key
    pub fn port_group(&self, key: &str) -> Option<&PortGroup> {
        self.port_groups.iter().find(|pg| pg.diff_key() == key)
    }
}

static INTERFACE_SCHEMA: &[FieldSpec] = &[
    FieldSpec::scalar("mac_address"),
    FieldSpec::scalar("name"),
    FieldSpec::list("ip_addresses"),
    FieldSpec::scalar("switch_id"),
    FieldSpec::scalar("port_group"),
    FieldSpec::scalar("mtu"),
    FieldSpec::scalar("link_up"),
];

static SUBNET_SCHEMA: &[FieldSpec] = &[
    FieldSpec::scalar("id"),
    FieldSpec::scalar("name"),
    FieldSpec::scalar("cidr"),
    FieldSpec::scalar("gateway"),
    FieldSpec::scalar("dhcp_enabled"),
];

static PORT_GROUP_SCHEMA: &[FieldSpec] = &[
    FieldSpec::scalar("id"),
    FieldSpec::scalar("name"),
    FieldSpec::scalar("vlan_id"),
    FieldSpec::scalar("active_ports"),
];

static SWITCH_SCHEMA: &[FieldSpec] = &[
    FieldSpec::scalar("id"),
    FieldSpec::scalar("node_id"),
    FieldSpec::scalar("host_id"),
    FieldSpec::scalar("name"),
    FieldSpec::scalar("switch_type"),
    FieldSpec::scalar("connection_state"),
    FieldSpec::scalar("mtu"),
    FieldSpec::keyed("subnets"),
    FieldSpec::keyed("port_groups"),
];

impl Diffable for NetworkInterface {
    fn diff_key(&self) -> String {
        normalize_id(&self.mac_address)
    }

    fn schema(&self) -> &'static [FieldSpec] {
        INTERFACE_SCHEMA
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        let value = match name {
            "mac_address" => Field::Scalar(normalize_id(&self.mac_address).into()),
            "name" => Field::Scalar(self.name.as_deref().into()),
            "ip_addresses" => Field::List(self.ip_addresses.iter().map(Scalar::from).collect()),
            "switch_id" => Field::Scalar(self.switch_id.as_deref().map(normalize_id).into()),
            "port_group" => Field::Scalar(self.port_group.as_deref().into()),
            "mtu" => Field::Scalar(self.mtu.into()),
            "link_up" => Field::Scalar(self.link_up.into()),
            _ => return None,
        };
        Some(value)
    }
}

impl Diffable for Subnet {
    fn diff_key(&self) -> String {
        normalize_id(&self.id)
    }

    fn schema(&self) -> &'static [FieldSpec] {
        SUBNET_SCHEMA
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        let value = match name {
            "id" => Field::Scalar(normalize_id(&self.id).into()),
            "name" => Field::Scalar(self.name.as_str().into()),
            "cidr" => Field::Scalar(self.cidr.as_str().into()),
            "gateway" => Field::Scalar(self.gateway.as_deref().into()),
            "dhcp_enabled" => Field::Scalar(self.dhcp_enabled.into()),
            _ => return None,
        };
        Some(value)
    }
}

impl Diffable for PortGroup {
    fn diff_key(&self) -> String {
        normalize_id(&self.id)
    }

    fn schema(&self) -> &'static [FieldSpec] {
        PORT_GROUP_SCHEMA
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        let value = match name {
            "id" => Field::Scalar(normalize_id(&self.id).into()),
            "name" => Field::Scalar(self.name.as_str().into()),
            "vlan_id" => Field::Scalar(self.vlan_id.into()),
            "active_ports" => Field::Scalar(self.active_ports.into()),
            _ => return None,
        };
        Some(value)
    }
}

impl Diffable for VirtualSwitch {
    fn diff_key(&self) -> String {
        normalize_id(&self.id)
    }

    fn schema(&self) -> &'static [FieldSpec] {
        SWITCH_SCHEMA
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        let value = match name {
            "id" => Field::Scalar(normalize_id(&self.id).into()),
            "node_id" => Field::Scalar(self.node_id.as_str().into()),
            "host_id" => Field::Scalar(normalize_id(&self.host_id).into()),
            "name" => Field::Scalar(self.name.as_str().into()),
            "switch_type" => Field::Scalar(self.switch_type.as_str().into()),
            "connection_state" => Field::Scalar(self.connection_state.as_str().into()),
            "mtu" => Field::Scalar(self.mtu.into()),
            "subnets" => Field::Keyed(self.subnets.iter().map(|s| s as &dyn Diffable).collect()),
            "port_groups" => Field::Keyed(
                self.port_groups
                    .iter()
                    .map(|p| p as &dyn Diffable)
                    .collect(),
            ),
            _ => return None,
        };
        Some(value)
    }
}
