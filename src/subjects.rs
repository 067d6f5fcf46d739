// Copyright (c) 2025 - Cowboy AI, Inc.

//! NATS subject hierarchy for inventory events
//!
//! # Subject Pattern
//!
//! Every inventory event is published on:
//!
//! ```text
//! inventory.{entity}.{operation}
//! ```
//!
//! where `entity` is the [`EntityKind`] segment (`host`, `vm`, `storage`,
//! `network`, `portgroup`) and `operation` is the lowercased second half of
//! the event name (`Vm.Started` → `started`).
//!
//! This allows for:
//! - Precise subscriptions (`inventory.vm.started`)
//! - Entity-level wildcards (`inventory.vm.>`)
//! - Operation wildcards across entities (`inventory.*.deleted`)
//! - Global subscriptions (`inventory.>`)
//!
//! # Examples
//!
//! ```rust
//! use cim_inventory::domain::EntityKind;
//! use cim_inventory::events::EventType;
//! use cim_inventory::subjects::SubjectBuilder;
//!
//! let subject = SubjectBuilder::new()
//!     .entity(EntityKind::VirtualMachine)
//!     .event(EventType::VmStarted)
//!     .build();
//! assert_eq!(subject.as_deref(), Some("inventory.vm.started"));
//!
//! let wildcard = SubjectBuilder::new()
//!     .entity(EntityKind::Host)
//!     .build_wildcard();
//! assert_eq!(wildcard.as_deref(), Some("inventory.host.>"));
//! ```

use crate::domain::EntityKind;
use crate::events::{EventType, InventoryEvent};

/// Root namespace for all inventory subjects
pub const INVENTORY_ROOT: &str = "inventory";

/// Builder for inventory NATS subjects
#[derive(Debug, Clone, Default)]
pub struct SubjectBuilder {
    entity: Option<EntityKind>,
    operation: Option<String>,
}

impl SubjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entity segment
    pub fn entity(mut self, entity: EntityKind) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Set the operation segment from an event type
    pub fn event(mut self, event_type: EventType) -> Self {
        self.operation = Some(event_type.operation());
        self
    }

    /// Set a raw operation segment (`*` for all operations)
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Build the complete subject
    ///
    /// Returns `None` unless both entity and operation are set.
    pub fn build(self) -> Option<String> {
        let entity = self.entity?;
        let operation = self.operation?;
        Some(format!(
            "{}.{}.{}",
            INVENTORY_ROOT,
            entity.subject_segment(),
            operation
        ))
    }

    /// Build a subscription for every operation on this entity
    ///
    /// Returns: `inventory.{entity}.>`
    pub fn build_wildcard(self) -> Option<String> {
        let entity = self.entity?;
        Some(format!("{}.{}.>", INVENTORY_ROOT, entity.subject_segment()))
    }

    /// Build a subscription for this operation on every entity
    ///
    /// Returns: `inventory.*.{operation}`
    pub fn build_operation_wildcard(self) -> Option<String> {
        let operation = self.operation?;
        Some(format!("{}.*.{}", INVENTORY_ROOT, operation))
    }

    /// Build a subscription for all inventory events
    ///
    /// Returns: `inventory.>`
    pub fn build_all() -> String {
        format!("{}.>", INVENTORY_ROOT)
    }
}

/// Subject an event is published on
pub fn for_event(event: &InventoryEvent) -> String {
    format!(
        "{}.{}.{}",
        INVENTORY_ROOT,
        event.subject.kind.subject_segment(),
        event.event_type.operation()
    )
}

/// Convenience functions for common subscriptions
pub mod subjects {
    use super::*;

    pub fn all_host_events() -> String {
        format!("{}.{}.>", INVENTORY_ROOT, EntityKind::Host.subject_segment())
    }

    pub fn all_vm_events() -> String {
        format!(
            "{}.{}.>",
            INVENTORY_ROOT,
            EntityKind::VirtualMachine.subject_segment()
        )
    }

    pub fn all_storage_events() -> String {
        format!(
            "{}.{}.>",
            INVENTORY_ROOT,
            EntityKind::StorageVolume.subject_segment()
        )
    }

    pub fn all_network_events() -> String {
        format!(
            "{}.{}.>",
            INVENTORY_ROOT,
            EntityKind::VirtualSwitch.subject_segment()
        )
    }

    /// Every removal (`Host.Removed`, `Vm.Deleted`, ...) across entities
    pub fn all_removals() -> Vec<String> {
        vec![
            format!("{}.*.removed", INVENTORY_ROOT),
            format!("{}.*.deleted", INVENTORY_ROOT),
        ]
    }

    /// Threshold alarms raised and cleared by the performance monitor
    pub fn all_threshold_events() -> Vec<String> {
        [EventType::PerfThresholdExceeded, EventType::PerfThresholdCleared]
            .iter()
            .map(|event| format!("{}.*.{}", INVENTORY_ROOT, event.operation()))
            .collect()
    }

    pub fn all_inventory_events() -> String {
        SubjectBuilder::build_all()
    }
}
