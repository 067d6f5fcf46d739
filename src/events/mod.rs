// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Events
//!
//! Vocabulary of lifecycle and threshold events the collector emits, and the
//! envelope they travel in.
//!
//! # Event Flow
//!
//! ```text
//! ResourceDelta ──► rules::derive_events ──► DerivedEvent
//!                                                │  + event_id, timestamp,
//!                                                │    correlation_id
//!                                                ▼
//!                                          InventoryEvent ──► EventSink
//! ```
//!
//! Rules produce [`DerivedEvent`]s as pure data. The poller wraps each one in
//! an [`InventoryEvent`] envelope when it is handed to a sink.

pub mod sink;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{EntityKind, Resource};

pub use sink::{emit_all, CollectingEventSink, EventSink, LoggingEventSink, NullEventSink};

/// Every event the collector can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "Host.Added")]
    HostAdded,
    #[serde(rename = "Host.Removed")]
    HostRemoved,
    #[serde(rename = "Host.Connected")]
    HostConnected,
    #[serde(rename = "Host.Disconnected")]
    HostDisconnected,
    #[serde(rename = "Host.Updated")]
    HostUpdated,

    #[serde(rename = "Vm.Created")]
    VmCreated,
    #[serde(rename = "Vm.Deleted")]
    VmDeleted,
    #[serde(rename = "Vm.Started")]
    VmStarted,
    #[serde(rename = "Vm.Resumed")]
    VmResumed,
    #[serde(rename = "Vm.Suspended")]
    VmSuspended,
    #[serde(rename = "Vm.Stopped")]
    VmStopped,
    #[serde(rename = "Vm.Shutdown")]
    VmShutdown,
    #[serde(rename = "Vm.Reconfigured")]
    VmReconfigured,

    #[serde(rename = "Storage.Created")]
    StorageCreated,
    #[serde(rename = "Storage.Deleted")]
    StorageDeleted,
    #[serde(rename = "Storage.Enabled")]
    StorageEnabled,
    #[serde(rename = "Storage.Disabled")]
    StorageDisabled,

    #[serde(rename = "Network.Added")]
    NetworkAdded,
    #[serde(rename = "Network.Removed")]
    NetworkRemoved,
    #[serde(rename = "Network.Enabled")]
    NetworkEnabled,
    #[serde(rename = "Network.Disabled")]
    NetworkDisabled,

    #[serde(rename = "PortGroup.Added")]
    PortGroupAdded,
    #[serde(rename = "PortGroup.Removed")]
    PortGroupRemoved,
    #[serde(rename = "PortGroup.Reconfigured")]
    PortGroupReconfigured,

    #[serde(rename = "Perf.ThresholdExceeded")]
    PerfThresholdExceeded,
    #[serde(rename = "Perf.ThresholdCleared")]
    PerfThresholdCleared,
}

impl EventType {
    /// Dotted name, e.g. `Vm.Started`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HostAdded => "Host.Added",
            Self::HostRemoved => "Host.Removed",
            Self::HostConnected => "Host.Connected",
            Self::HostDisconnected => "Host.Disconnected",
            Self::HostUpdated => "Host.Updated",
            Self::VmCreated => "Vm.Created",
            Self::VmDeleted => "Vm.Deleted",
            Self::VmStarted => "Vm.Started",
            Self::VmResumed => "Vm.Resumed",
            Self::VmSuspended => "Vm.Suspended",
            Self::VmStopped => "Vm.Stopped",
            Self::VmShutdown => "Vm.Shutdown",
            Self::VmReconfigured => "Vm.Reconfigured",
            Self::StorageCreated => "Storage.Created",
            Self::StorageDeleted => "Storage.Deleted",
            Self::StorageEnabled => "Storage.Enabled",
            Self::StorageDisabled => "Storage.Disabled",
            Self::NetworkAdded => "Network.Added",
            Self::NetworkRemoved => "Network.Removed",
            Self::NetworkEnabled => "Network.Enabled",
            Self::NetworkDisabled => "Network.Disabled",
            Self::PortGroupAdded => "PortGroup.Added",
            Self::PortGroupRemoved => "PortGroup.Removed",
            Self::PortGroupReconfigured => "PortGroup.Reconfigured",
            Self::PerfThresholdExceeded => "Perf.ThresholdExceeded",
            Self::PerfThresholdCleared => "Perf.ThresholdCleared",
        }
    }

    /// Operation part of the name, lowercased for subjects (`started`)
    pub fn operation(&self) -> String {
        let name = self.as_str();
        name.split_once('.')
            .map_or(name, |(_, op)| op)
            .to_ascii_lowercase()
    }

    /// Whether the event reports a resource leaving the inventory
    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            Self::HostRemoved
                | Self::VmDeleted
                | Self::StorageDeleted
                | Self::NetworkRemoved
                | Self::PortGroupRemoved
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity an event is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,

    /// Normalized id
    pub id: String,

    pub name: String,

    /// Compute node the entity was observed through
    pub node_id: String,
}

impl EntityRef {
    pub fn new(
        kind: EntityKind,
        id: impl Into<String>,
        name: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
            node_id: node_id.into(),
        }
    }

    /// Reference to a top-level resource
    pub fn for_resource(resource: &Resource) -> Self {
        Self::new(
            resource.kind().into(),
            resource.key(),
            resource.name(),
            resource.node_id(),
        )
    }
}

/// Extra attributes attached to an event
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Output of the event rules, before it is stamped for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedEvent {
    pub event_type: EventType,
    pub subject: EntityRef,
    #[serde(default)]
    pub attributes: Attributes,
}

impl DerivedEvent {
    pub fn new(event_type: EventType, subject: EntityRef) -> Self {
        Self {
            event_type,
            subject,
            attributes: Attributes::new(),
        }
    }

    /// Attach an attribute
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Wrap for delivery
    pub fn into_event(self, correlation_id: Uuid) -> InventoryEvent {
        InventoryEvent {
            event_id: Uuid::now_v7(),
            correlation_id,
            timestamp: Utc::now(),
            event_type: self.event_type,
            subject: self.subject,
            attributes: self.attributes,
        }
    }
}

/// Event envelope handed to an [`EventSink`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryEvent {
    /// Unique event id (UUID v7, time-ordered)
    pub event_id: Uuid,

    /// Shared by every event of one node poll
    pub correlation_id: Uuid,

    pub timestamp: DateTime<Utc>,

    pub event_type: EventType,

    pub subject: EntityRef,

    #[serde(default)]
    pub attributes: Attributes,
}

impl InventoryEvent {
    /// Attribute lookup
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_serializes_as_dotted_name() {
        let json = serde_json::to_string(&EventType::VmStarted).unwrap();
        assert_eq!(json, "\"Vm.Started\"");

        let parsed: EventType = serde_json::from_str("\"PortGroup.Reconfigured\"").unwrap();
        assert_eq!(parsed, EventType::PortGroupReconfigured);
    }

    #[test]
    fn test_operation_segment() {
        assert_eq!(EventType::PerfThresholdExceeded.operation(), "thresholdexceeded");
        assert_eq!(EventType::HostAdded.operation(), "added");
    }

    #[test]
    fn test_envelope_carries_rule_output() {
        let correlation = Uuid::now_v7();
        let event = DerivedEvent::new(
            EventType::VmReconfigured,
            EntityRef::new(EntityKind::VirtualMachine, "vm-1", "web", "node-1"),
        )
        .with("changed_fields", vec!["vcpus"])
        .into_event(correlation);

        assert_eq!(event.correlation_id, correlation);
        assert_eq!(event.event_type, EventType::VmReconfigured);
        assert_eq!(
            event.attribute("changed_fields"),
            Some(&serde_json::json!(["vcpus"]))
        );
    }

    #[test]
    fn test_removal_events() {
        assert!(EventType::StorageDeleted.is_removal());
        assert!(!EventType::StorageDisabled.is_removal());
    }
}
