// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for the Structural Diff
//!
//! The poller trusts three things about `diff`: identical snapshots never
//! produce work, presence alone decides Added/Removed, and a change is seen
//! no matter which side is considered old.

use std::collections::{BTreeMap, BTreeSet};

use cim_inventory::diff::{diff, ResourceDelta};
use cim_inventory::domain::{Disk, PowerState, Resource, VirtualMachine};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn power_state() -> impl Strategy<Value = PowerState> {
    prop_oneof![
        Just(PowerState::Active),
        Just(PowerState::Paused),
        Just(PowerState::Stopped),
        Just(PowerState::Shutdown),
        Just(PowerState::Error),
        Just(PowerState::Unknown),
    ]
}

fn disk(id: String) -> impl Strategy<Value = Disk> {
    (
        "vd[a-f]",
        proptest::option::of("vol-[0-9]{1,3}"),
        1u64..(1 << 40),
        proptest::option::of(prop_oneof![Just("virtio".to_string()), Just("scsi".to_string())]),
    )
        .prop_map(move |(device, volume_id, capacity_bytes, bus)| Disk {
            id: id.clone(),
            device,
            volume_id,
            capacity_bytes,
            bus,
        })
}

/// Disks with unique ids (keyed collections reject duplicates)
fn disks() -> impl Strategy<Value = Vec<Disk>> {
    proptest::collection::btree_set("disk-[0-9]{1,2}", 0..4).prop_flat_map(|ids| {
        ids.into_iter()
            .map(disk)
            .collect::<Vec<_>>()
    })
}

fn virtual_machine() -> impl Strategy<Value = VirtualMachine> {
    (
        "vm-[0-9a-f]{4}",
        "[a-z][a-z0-9-]{0,11}",
        power_state(),
        1u32..64,
        512u64..262_144,
        proptest::option::of(prop_oneof![Just("linux".to_string()), Just("windows".to_string())]),
        disks(),
    )
        .prop_map(|(id, name, power_state, vcpus, memory_mb, os_type, disks)| VirtualMachine {
            id,
            node_id: "node-a".to_string(),
            host_id: "h1".to_string(),
            name,
            power_state,
            vcpus,
            memory_mb,
            os_type,
            disks,
            interfaces: Vec::new(),
        })
}

/// Two versions of the same VM
fn vm_pair() -> impl Strategy<Value = (VirtualMachine, VirtualMachine)> {
    (virtual_machine(), virtual_machine()).prop_map(|(old, mut new)| {
        new.id = old.id.clone();
        (old, new)
    })
}

fn field_set(delta: &ResourceDelta) -> BTreeSet<&'static str> {
    delta.changed_fields().into_iter().collect()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// A snapshot compared with itself never yields work
    #[test]
    fn prop_identical_snapshots_are_unchanged(vm in virtual_machine()) {
        let resource = Resource::from(vm);
        let delta = diff(Some(&resource), Some(&resource)).unwrap();
        prop_assert_eq!(delta, ResourceDelta::Unchanged);
    }

    /// Presence alone decides additions and removals
    #[test]
    fn prop_presence_decides_added_and_removed(vm in virtual_machine()) {
        let resource = Resource::from(vm);
        prop_assert_eq!(diff(None, Some(&resource)).unwrap(), ResourceDelta::Added);
        prop_assert_eq!(diff(Some(&resource), None).unwrap(), ResourceDelta::Removed);
        prop_assert_eq!(diff::<Resource>(None, None).unwrap(), ResourceDelta::Unchanged);
    }

    /// Swapping old and new reports the same set of changed fields
    #[test]
    fn prop_changed_fields_are_symmetric((old, new) in vm_pair()) {
        let forward = diff(Some(&old), Some(&new)).unwrap();
        let backward = diff(Some(&new), Some(&old)).unwrap();
        prop_assert_eq!(forward.is_changed(), backward.is_changed());
        prop_assert_eq!(field_set(&forward), field_set(&backward));
    }

    /// Id casing and padding never register as a change
    #[test]
    fn prop_id_normalization_is_invisible(vm in virtual_machine()) {
        let mut shouting = vm.clone();
        shouting.id = format!("  {}  ", vm.id.to_uppercase());
        let delta = diff(Some(&vm), Some(&shouting)).unwrap();
        prop_assert_eq!(delta, ResourceDelta::Unchanged);
    }

    /// Reordering a keyed collection is not a change
    #[test]
    fn prop_disk_order_is_irrelevant(vm in virtual_machine()) {
        let mut reversed = vm.clone();
        reversed.disks.reverse();
        prop_assert_eq!(diff(Some(&vm), Some(&reversed)).unwrap(), ResourceDelta::Unchanged);
    }

    /// A single scalar edit is reported as exactly that field
    #[test]
    fn prop_single_field_edit_is_isolated(vm in virtual_machine(), extra in 1u32..16) {
        let mut edited = vm.clone();
        edited.vcpus += extra;
        let delta = diff(Some(&vm), Some(&edited)).unwrap();
        prop_assert_eq!(delta.changed_fields(), vec!["vcpus"]);
    }

    /// Disk collection deltas partition the key space
    #[test]
    fn prop_disk_delta_partitions_keys((old, new) in vm_pair()) {
        let delta = diff(Some(&old), Some(&new)).unwrap();
        let Some(disks) = delta.as_update().and_then(|d| d.collection("disks")) else {
            return Ok(());
        };

        let old_keys: BTreeSet<String> = old.disks.iter().map(|d| d.id.to_lowercase()).collect();
        let new_keys: BTreeSet<String> = new.disks.iter().map(|d| d.id.to_lowercase()).collect();

        let expected_add: BTreeSet<String> = new_keys.difference(&old_keys).cloned().collect();
        let expected_delete: BTreeSet<String> = old_keys.difference(&new_keys).cloned().collect();
        prop_assert_eq!(&disks.add, &expected_add);
        prop_assert_eq!(&disks.delete, &expected_delete);

        let updated: BTreeMap<_, _> = disks.update.iter().collect();
        for key in updated.keys() {
            prop_assert!(old_keys.contains(*key) && new_keys.contains(*key));
        }
    }
}
