// Copyright (c) 2025 - Cowboy AI, Inc.
//! Structural Diff
//!
//! Generic recursive comparator producing a typed delta between two versions
//! of a resource tree. Each resource kind declares its schema once, as a
//! static list of `(field name, field kind)` pairs, and hands out field values
//! on demand. The diff routine walks the schema, never the concrete type.
//!
//! # Field Kinds
//!
//! ```text
//! Scalar      old != new on the normalized value
//! Nested      recurse, bucketed under the field name
//! Keyed       add / delete / update buckets keyed by the entry's own key
//! List        ordered equality of normalized elements
//! ```
//!
//! # Guarantees
//!
//! - Inputs are only borrowed; nothing is mutated
//! - Output maps are ordered, so equal inputs give byte-identical deltas
//! - `diff(x, x)` is always [`ResourceDelta::Unchanged`]

pub mod scalar;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::errors::DiffError;

pub use scalar::{normalize_id, Scalar};

/// Shape of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Single comparable value
    Scalar,
    /// Optional nested record
    Nested,
    /// Collection of nested records keyed by their own key
    Keyed,
    /// Ordered collection of scalar values
    List,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            FieldKind::Scalar => "scalar",
            FieldKind::Nested => "nested",
            FieldKind::Keyed => "keyed collection",
            FieldKind::List => "list",
        }
    }
}

/// One entry of a record schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn scalar(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Scalar,
        }
    }

    pub const fn nested(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Nested,
        }
    }

    pub const fn keyed(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Keyed,
        }
    }

    pub const fn list(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::List,
        }
    }
}

/// Field value handed out by a [`Diffable`] record
pub enum Field<'a> {
    Scalar(Scalar),
    Nested(Option<&'a dyn Diffable>),
    Keyed(Vec<&'a dyn Diffable>),
    List(Vec<Scalar>),
}

impl Field<'_> {
    fn kind(&self) -> FieldKind {
        match self {
            Field::Scalar(_) => FieldKind::Scalar,
            Field::Nested(_) => FieldKind::Nested,
            Field::Keyed(_) => FieldKind::Keyed,
            Field::List(_) => FieldKind::List,
        }
    }
}

/// Capability shared by every record that takes part in diffing
///
/// Resources and their nested sub-objects implement this by declaring a
/// static schema and mapping field names to values.
pub trait Diffable {
    /// Stable identity of the record (normalized)
    fn diff_key(&self) -> String;

    /// Declared field set, in a fixed order
    fn schema(&self) -> &'static [FieldSpec];

    /// Value of a declared field
    fn field(&self, name: &str) -> Option<Field<'_>>;
}

/// Change to a single scalar field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalarChange {
    pub old: Scalar,
    pub new: Scalar,
}

/// Change to a nested single object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedDelta {
    Added,
    Removed,
    Update(RecordDelta),
}

/// Change to a keyed collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionDelta {
    /// Keys present only in the new collection
    pub add: BTreeSet<String>,
    /// Keys present only in the old collection
    pub delete: BTreeSet<String>,
    /// Keys present in both whose entries differ
    pub update: BTreeMap<String, RecordDelta>,
}

impl CollectionDelta {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.delete.is_empty() && self.update.is_empty()
    }
}

/// Change to one declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldDelta {
    Scalar(ScalarChange),
    Nested(NestedDelta),
    Collection(CollectionDelta),
    List { old: Vec<Scalar>, new: Vec<Scalar> },
}

/// Per-field changes between two versions of one record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordDelta {
    pub fields: BTreeMap<&'static str, FieldDelta>,
}

impl RecordDelta {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of the changed fields, in schema-independent sorted order
    pub fn changed_fields(&self) -> Vec<&'static str> {
        self.fields.keys().copied().collect()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Scalar change for a field, if that field changed
    pub fn scalar(&self, field: &str) -> Option<&ScalarChange> {
        match self.fields.get(field) {
            Some(FieldDelta::Scalar(change)) => Some(change),
            _ => None,
        }
    }

    /// Keyed collection change for a field, if that field changed
    pub fn collection(&self, field: &str) -> Option<&CollectionDelta> {
        match self.fields.get(field) {
            Some(FieldDelta::Collection(delta)) => Some(delta),
            _ => None,
        }
    }
}

/// Whole-resource outcome of a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", content = "delta", rename_all = "snake_case")]
pub enum ResourceDelta {
    Unchanged,
    Added,
    Removed,
    Updated(RecordDelta),
}

impl ResourceDelta {
    pub fn is_changed(&self) -> bool {
        !matches!(self, ResourceDelta::Unchanged)
    }

    /// Top-level changed field names (empty unless `Updated`)
    pub fn changed_fields(&self) -> Vec<&'static str> {
        match self {
            ResourceDelta::Updated(delta) => delta.changed_fields(),
            _ => Vec::new(),
        }
    }

    pub fn as_update(&self) -> Option<&RecordDelta> {
        match self {
            ResourceDelta::Updated(delta) => Some(delta),
            _ => None,
        }
    }
}

/// Compare two versions of a resource
///
/// `None` stands for "not known": `(None, Some)` is an addition,
/// `(Some, None)` a removal, `(None, None)` no change.
pub fn diff<T: Diffable>(old: Option<&T>, new: Option<&T>) -> Result<ResourceDelta, DiffError> {
    match (old, new) {
        (None, None) => Ok(ResourceDelta::Unchanged),
        (None, Some(_)) => Ok(ResourceDelta::Added),
        (Some(_), None) => Ok(ResourceDelta::Removed),
        (Some(old), Some(new)) => {
            let (old_key, new_key) = (old.diff_key(), new.diff_key());
            if old_key != new_key {
                return Err(DiffError::IdentityMismatch {
                    old: old_key,
                    new: new_key,
                });
            }

            let delta = diff_records(old, new)?;
            if delta.is_empty() {
                Ok(ResourceDelta::Unchanged)
            } else {
                Ok(ResourceDelta::Updated(delta))
            }
        }
    }
}

/// Compare two records field by field along the old record's schema
pub fn diff_records(old: &dyn Diffable, new: &dyn Diffable) -> Result<RecordDelta, DiffError> {
    let mut delta = RecordDelta::default();

    for spec in old.schema() {
        let old_value = checked_field(old, spec)?;
        let new_value = checked_field(new, spec)?;

        let change = match (old_value, new_value) {
            (Field::Scalar(o), Field::Scalar(n)) => {
                (o != n).then_some(FieldDelta::Scalar(ScalarChange { old: o, new: n }))
            }
            (Field::List(o), Field::List(n)) => (o != n).then_some(FieldDelta::List { old: o, new: n }),
            (Field::Nested(o), Field::Nested(n)) => diff_nested(o, n)?.map(FieldDelta::Nested),
            (Field::Keyed(o), Field::Keyed(n)) => {
                let collection = diff_keyed(spec.name, &o, &n)?;
                (!collection.is_empty()).then_some(FieldDelta::Collection(collection))
            }
            // checked_field already enforced the declared kind on both sides
            _ => None,
        };

        if let Some(change) = change {
            delta.fields.insert(spec.name, change);
        }
    }

    Ok(delta)
}

fn checked_field<'a>(record: &'a dyn Diffable, spec: &FieldSpec) -> Result<Field<'a>, DiffError> {
    let value = record.field(spec.name).ok_or_else(|| DiffError::MissingField {
        field: spec.name.to_string(),
    })?;

    if value.kind() != spec.kind {
        return Err(DiffError::ShapeMismatch {
            field: spec.name.to_string(),
            expected: spec.kind.name(),
            actual: value.kind().name(),
        });
    }

    Ok(value)
}

fn diff_nested(
    old: Option<&dyn Diffable>,
    new: Option<&dyn Diffable>,
) -> Result<Option<NestedDelta>, DiffError> {
    match (old, new) {
        (None, None) => Ok(None),
        (None, Some(_)) => Ok(Some(NestedDelta::Added)),
        (Some(_), None) => Ok(Some(NestedDelta::Removed)),
        (Some(o), Some(n)) => {
            let delta = diff_records(o, n)?;
            Ok((!delta.is_empty()).then_some(NestedDelta::Update(delta)))
        }
    }
}

fn diff_keyed(
    field: &str,
    old: &[&dyn Diffable],
    new: &[&dyn Diffable],
) -> Result<CollectionDelta, DiffError> {
    let old_by_key = index_by_key(field, old)?;
    let new_by_key = index_by_key(field, new)?;

    let mut delta = CollectionDelta::default();

    for (key, new_entry) in &new_by_key {
        match old_by_key.get(key) {
            None => {
                delta.add.insert(key.clone());
            }
            Some(old_entry) => {
                let entry_delta = diff_records(*old_entry, *new_entry)?;
                if !entry_delta.is_empty() {
                    delta.update.insert(key.clone(), entry_delta);
                }
            }
        }
    }

    for key in old_by_key.keys() {
        if !new_by_key.contains_key(key) {
            delta.delete.insert(key.clone());
        }
    }

    Ok(delta)
}

fn index_by_key<'a>(
    field: &str,
    entries: &[&'a dyn Diffable],
) -> Result<BTreeMap<String, &'a dyn Diffable>, DiffError> {
    let mut index = BTreeMap::new();
    for entry in entries {
        let key = entry.diff_key();
        if key.is_empty() {
            return Err(DiffError::EmptyKey {
                field: field.to_string(),
            });
        }
        if index.insert(key.clone(), *entry).is_some() {
            return Err(DiffError::DuplicateKey {
                field: field.to_string(),
                key,
            });
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone)]
    struct Port {
        id: String,
        speed: Option<u32>,
    }

    #[derive(Debug, Clone)]
    struct Profile {
        name: String,
    }

    #[derive(Debug, Clone)]
    struct Device {
        id: String,
        label: String,
        profile: Option<Profile>,
        ports: Vec<Port>,
        tags: Vec<String>,
    }

    static PORT_SCHEMA: &[FieldSpec] = &[FieldSpec::scalar("id"), FieldSpec::scalar("speed")];
    static PROFILE_SCHEMA: &[FieldSpec] = &[FieldSpec::scalar("name")];
    static DEVICE_SCHEMA: &[FieldSpec] = &[
        FieldSpec::scalar("id"),
        FieldSpec::scalar("label"),
        FieldSpec::nested("profile"),
        FieldSpec::keyed("ports"),
        FieldSpec::list("tags"),
    ];

    impl Diffable for Port {
        fn diff_key(&self) -> String {
            normalize_id(&self.id)
        }
        fn schema(&self) -> &'static [FieldSpec] {
            PORT_SCHEMA
        }
        fn field(&self, name: &str) -> Option<Field<'_>> {
            match name {
                "id" => Some(Field::Scalar(self.id.as_str().into())),
                "speed" => Some(Field::Scalar(self.speed.into())),
                _ => None,
            }
        }
    }

    impl Diffable for Profile {
        fn diff_key(&self) -> String {
            self.name.clone()
        }
        fn schema(&self) -> &'static [FieldSpec] {
            PROFILE_SCHEMA
        }
        fn field(&self, name: &str) -> Option<Field<'_>> {
            match name {
                "name" => Some(Field::Scalar(self.name.as_str().into())),
                _ => None,
            }
        }
    }

    impl Diffable for Device {
        fn diff_key(&self) -> String {
            normalize_id(&self.id)
        }
        fn schema(&self) -> &'static [FieldSpec] {
            DEVICE_SCHEMA
        }
        fn field(&self, name: &str) -> Option<Field<'_>> {
            match name {
                "id" => Some(Field::Scalar(self.id.as_str().into())),
                "label" => Some(Field::Scalar(self.label.as_str().into())),
                "profile" => Some(Field::Nested(
                    self.profile.as_ref().map(|p| p as &dyn Diffable),
                )),
                "ports" => Some(Field::Keyed(
                    self.ports.iter().map(|p| p as &dyn Diffable).collect(),
                )),
                "tags" => Some(Field::List(
                    self.tags.iter().map(Scalar::from).collect(),
                )),
                _ => None,
            }
        }
    }

    fn device() -> Device {
        Device {
            id: "dev-1".to_string(),
            label: "edge".to_string(),
            profile: Some(Profile {
                name: "linux".to_string(),
            }),
            ports: vec![
                Port {
                    id: "p1".to_string(),
                    speed: Some(1000),
                },
                Port {
                    id: "p2".to_string(),
                    speed: None,
                },
            ],
            tags: vec!["a".to_string(), "b".to_string()],
        }
    }

    #[test]
    fn test_identical_records_unchanged() {
        let d = device();
        assert_eq!(diff(Some(&d), Some(&d.clone())).unwrap(), ResourceDelta::Unchanged);
    }

    #[test]
    fn test_added_removed_and_none() {
        let d = device();
        assert_eq!(diff(None, Some(&d)).unwrap(), ResourceDelta::Added);
        assert_eq!(diff(Some(&d), None).unwrap(), ResourceDelta::Removed);
        assert_eq!(diff::<Device>(None, None).unwrap(), ResourceDelta::Unchanged);
    }

    #[test]
    fn test_scalar_change() {
        let old = device();
        let mut new = device();
        new.label = "core".to_string();

        let delta = diff(Some(&old), Some(&new)).unwrap();
        assert_eq!(delta.changed_fields(), vec!["label"]);
        assert_eq!(
            delta.as_update().unwrap().scalar("label"),
            Some(&ScalarChange {
                old: "edge".into(),
                new: "core".into(),
            })
        );
    }

    #[test]
    fn test_nested_update_bucketed_by_field() {
        let old = device();
        let mut new = device();
        new.profile = Some(Profile {
            name: "bsd".to_string(),
        });

        let delta = diff(Some(&old), Some(&new)).unwrap();
        match delta.as_update().unwrap().fields.get("profile") {
            Some(FieldDelta::Nested(NestedDelta::Update(inner))) => {
                assert_eq!(inner.changed_fields(), vec!["name"]);
            }
            other => panic!("unexpected nested delta: {:?}", other),
        }
    }

    #[test]
    fn test_keyed_collection_buckets() {
        let old = device();
        let mut new = device();
        new.ports.remove(1);
        new.ports[0].speed = Some(10_000);
        new.ports.push(Port {
            id: "p3".to_string(),
            speed: None,
        });

        let delta = diff(Some(&old), Some(&new)).unwrap();
        let ports = delta.as_update().unwrap().collection("ports").unwrap();
        assert_eq!(ports.add, BTreeSet::from(["p3".to_string()]));
        assert_eq!(ports.delete, BTreeSet::from(["p2".to_string()]));
        assert_eq!(ports.update.keys().collect::<Vec<_>>(), vec!["p1"]);
    }

    #[test]
    fn test_collection_order_does_not_matter() {
        let old = device();
        let mut new = device();
        new.ports.reverse();
        assert_eq!(diff(Some(&old), Some(&new)).unwrap(), ResourceDelta::Unchanged);
    }

    #[test]
    fn test_list_order_matters() {
        let old = device();
        let mut new = device();
        new.tags.reverse();
        assert_eq!(diff(Some(&old), Some(&new)).unwrap().changed_fields(), vec!["tags"]);
    }

    #[test]
    fn test_absent_vs_empty_scalar() {
        let old = device();
        let mut new = device();
        new.ports[1].speed = Some(0);
        assert!(diff(Some(&old), Some(&new)).unwrap().is_changed());
    }

    #[test]
    fn test_duplicate_key_is_error() {
        let old = device();
        let mut new = device();
        new.ports[1].id = "P1".to_string();

        let err = diff(Some(&old), Some(&new)).unwrap_err();
        assert_eq!(
            err,
            DiffError::DuplicateKey {
                field: "ports".to_string(),
                key: "p1".to_string(),
            }
        );
    }

    #[test]
    fn test_identity_mismatch_is_error() {
        let old = device();
        let mut new = device();
        new.id = "dev-2".to_string();
        assert!(matches!(
            diff(Some(&old), Some(&new)),
            Err(DiffError::IdentityMismatch { .. })
        ));
    }

    #[test]
    fn test_diff_does_not_mutate_and_is_stable() {
        let old = device();
        let mut new = device();
        new.label = "core".to_string();
        new.ports.pop();

        let first = diff(Some(&old), Some(&new)).unwrap();
        let second = diff(Some(&old), Some(&new)).unwrap();
        assert_eq!(first, second);
        assert_eq!(old.label, "edge");
        assert_eq!(new.ports.len(), 1);
    }
}
