// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event Rules
//!
//! Pure mapping from a structural diff to the lifecycle events it implies.
//! No I/O and no clock: the same inputs always give the same events in the
//! same order.
//!
//! # Rule Table
//!
//! ```text
//! Host     added/removed          Host.Added / Host.Removed
//!          connection flip        Host.Connected / Host.Disconnected
//!          other change           Host.Updated (child id lists excluded)
//!
//! VM       added/removed          Vm.Created / Vm.Deleted
//!          power state → active   Vm.Resumed (from paused) / Vm.Started
//!          power state → paused   Vm.Suspended
//!          power state → stopped  Vm.Stopped
//!          power state → shutdown Vm.Shutdown
//!          other change           Vm.Reconfigured
//!
//! Storage  added/removed          Storage.Created / Storage.Deleted
//!          state flip             Storage.Enabled / Storage.Disabled
//!
//! Switch   added/removed          Network.Added / Network.Removed
//!          state flip             Network.Enabled / Network.Disabled
//!          port group add/remove  PortGroup.Added / PortGroup.Removed
//!          port group change      PortGroup.Reconfigured
//! ```
//!
//! # Tie-break
//!
//! A state flip is the most specific signal for a resource. When it is
//! present, the resource's other changed fields produce no extra event and
//! are not attached to the flip.

use serde_json::Value;

use crate::diff::{RecordDelta, ResourceDelta, ScalarChange};
use crate::domain::{
    EntityKind, PowerState, Resource, ResourceKind, VirtualSwitch, HOST_CHILD_FIELDS,
};
use crate::events::{DerivedEvent, EntityRef, EventType};

/// Field carrying the connectivity or administrative state of every kind
const CONNECTION_STATE: &str = "connection_state";
const POWER_STATE: &str = "power_state";
const PORT_GROUPS: &str = "port_groups";

/// Derive the events implied by one resource's delta
///
/// `old` and `new` are the snapshots the delta was computed from. Inputs that
/// disagree with the delta (an update without both snapshots) yield nothing.
pub fn derive_events(
    kind: ResourceKind,
    old: Option<&Resource>,
    new: Option<&Resource>,
    delta: &ResourceDelta,
) -> Vec<DerivedEvent> {
    match (delta, old, new) {
        (ResourceDelta::Unchanged, _, _) => Vec::new(),
        (ResourceDelta::Added, _, Some(new)) => vec![lifecycle(kind, true, new)],
        (ResourceDelta::Removed, Some(old), _) => vec![lifecycle(kind, false, old)],
        (ResourceDelta::Updated(changes), Some(old), Some(new)) => match kind {
            ResourceKind::Host => host_updated(new, changes),
            ResourceKind::VirtualMachine => vm_updated(new, changes),
            ResourceKind::StorageVolume => storage_updated(new, changes),
            ResourceKind::VirtualSwitch => switch_updated(old, new, changes),
        },
        _ => Vec::new(),
    }
}

fn lifecycle(kind: ResourceKind, added: bool, resource: &Resource) -> DerivedEvent {
    let event_type = match (kind, added) {
        (ResourceKind::Host, true) => EventType::HostAdded,
        (ResourceKind::Host, false) => EventType::HostRemoved,
        (ResourceKind::VirtualMachine, true) => EventType::VmCreated,
        (ResourceKind::VirtualMachine, false) => EventType::VmDeleted,
        (ResourceKind::StorageVolume, true) => EventType::StorageCreated,
        (ResourceKind::StorageVolume, false) => EventType::StorageDeleted,
        (ResourceKind::VirtualSwitch, true) => EventType::NetworkAdded,
        (ResourceKind::VirtualSwitch, false) => EventType::NetworkRemoved,
    };
    DerivedEvent::new(event_type, EntityRef::for_resource(resource))
}

fn host_updated(new: &Resource, changes: &RecordDelta) -> Vec<DerivedEvent> {
    if let Some(flip) = changes.scalar(CONNECTION_STATE) {
        let event_type = match flip.new.as_str() {
            Some("connected") => Some(EventType::HostConnected),
            Some("disconnected") => Some(EventType::HostDisconnected),
            _ => None,
        };
        if let Some(event_type) = event_type {
            return vec![state_flip(event_type, new, flip)];
        }
    }

    let fields: Vec<&str> = changes
        .changed_fields()
        .into_iter()
        .filter(|field| !HOST_CHILD_FIELDS.contains(field))
        .collect();
    if fields.is_empty() {
        return Vec::new();
    }

    vec![DerivedEvent::new(EventType::HostUpdated, EntityRef::for_resource(new))
        .with("changed_fields", fields)]
}

/// Event for a VM power state transition, if the target state has one
pub fn power_transition_event(from: Option<PowerState>, to: PowerState) -> Option<EventType> {
    match to {
        PowerState::Active if from == Some(PowerState::Paused) => Some(EventType::VmResumed),
        PowerState::Active => Some(EventType::VmStarted),
        PowerState::Paused => Some(EventType::VmSuspended),
        PowerState::Stopped => Some(EventType::VmStopped),
        PowerState::Shutdown => Some(EventType::VmShutdown),
        PowerState::Error | PowerState::Unknown => None,
    }
}

fn vm_updated(new: &Resource, changes: &RecordDelta) -> Vec<DerivedEvent> {
    let subject = EntityRef::for_resource(new);

    if let Some(flip) = changes.scalar(POWER_STATE) {
        let from = flip.old.as_str().and_then(PowerState::parse);
        let to = flip.new.as_str().and_then(PowerState::parse);
        if let Some(event_type) = to.and_then(|to| power_transition_event(from, to)) {
            return vec![state_flip(event_type, new, flip)];
        }

        // Unmapped target state: report as a reconfiguration including the flip
        return vec![DerivedEvent::new(EventType::VmReconfigured, subject)
            .with("changed_fields", changes.changed_fields())
            .with("previous_state", scalar_value(&flip.old))
            .with("current_state", scalar_value(&flip.new))];
    }

    vec![DerivedEvent::new(EventType::VmReconfigured, subject)
        .with("changed_fields", changes.changed_fields())]
}

fn storage_updated(new: &Resource, changes: &RecordDelta) -> Vec<DerivedEvent> {
    activity_flip(
        new,
        changes,
        EventType::StorageEnabled,
        EventType::StorageDisabled,
    )
    .into_iter()
    .collect()
}

fn switch_updated(old: &Resource, new: &Resource, changes: &RecordDelta) -> Vec<DerivedEvent> {
    let mut events: Vec<DerivedEvent> = activity_flip(
        new,
        changes,
        EventType::NetworkEnabled,
        EventType::NetworkDisabled,
    )
    .into_iter()
    .collect();

    // Port groups are entities of their own; a switch flip does not absorb them
    if let (Some(old), Some(new), Some(groups)) =
        (old.as_switch(), new.as_switch(), changes.collection(PORT_GROUPS))
    {
        for key in &groups.add {
            events.extend(port_group_event(EventType::PortGroupAdded, new, key));
        }
        for key in &groups.delete {
            events.extend(port_group_event(EventType::PortGroupRemoved, old, key));
        }
        for (key, group_changes) in &groups.update {
            events.extend(
                port_group_event(EventType::PortGroupReconfigured, new, key)
                    .map(|e| e.with("changed_fields", group_changes.changed_fields())),
            );
        }
    }

    events
}

fn activity_flip(
    new: &Resource,
    changes: &RecordDelta,
    enabled: EventType,
    disabled: EventType,
) -> Option<DerivedEvent> {
    let flip = changes.scalar(CONNECTION_STATE)?;
    let event_type = match flip.new.as_str() {
        Some("active") => enabled,
        Some("inactive") => disabled,
        _ => return None,
    };
    Some(state_flip(event_type, new, flip))
}

fn port_group_event(
    event_type: EventType,
    switch: &VirtualSwitch,
    key: &str,
) -> Option<DerivedEvent> {
    let group = switch.port_group(key)?;
    let subject = EntityRef::new(EntityKind::PortGroup, key, &group.name, &switch.node_id);
    Some(
        DerivedEvent::new(event_type, subject)
            .with("switch_id", crate::diff::normalize_id(&switch.id))
            .with("switch_name", switch.name.as_str()),
    )
}

fn state_flip(event_type: EventType, new: &Resource, flip: &ScalarChange) -> DerivedEvent {
    DerivedEvent::new(event_type, EntityRef::for_resource(new))
        .with("previous_state", scalar_value(&flip.old))
        .with("current_state", scalar_value(&flip.new))
}

fn scalar_value(scalar: &crate::diff::Scalar) -> Value {
    scalar.as_str().map_or(Value::Null, Value::from)
}
