// Copyright (c) 2025 - Cowboy AI, Inc.
//! Storage Volume

use serde::{Deserialize, Serialize};

use super::network::ActivityState;
use crate::diff::{normalize_id, Diffable, Field, FieldSpec};

/// Storage volume (or pool) snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageVolume {
    pub id: String,

    #[serde(default)]
    pub node_id: String,

    /// Owning host
    pub host_id: String,

    pub name: String,

    /// Backend type (dir, lvm, nfs, iscsi, vmfs, ...)
    pub pool_type: String,

    pub connection_state: ActivityState,

    pub capacity_bytes: u64,

    pub allocated_bytes: u64,

    #[serde(default)]
    pub path: Option<String>,
}

static VOLUME_SCHEMA: &[FieldSpec] = &[
    FieldSpec::scalar("id"),
    FieldSpec::scalar("node_id"),
    FieldSpec::scalar("host_id"),
    FieldSpec::scalar("name"),
    FieldSpec::scalar("pool_type"),
    FieldSpec::scalar("connection_state"),
    FieldSpec::scalar("capacity_bytes"),
    FieldSpec::scalar("allocated_bytes"),
    FieldSpec::scalar("path"),
];

impl Diffable for StorageVolume {
    fn diff_key(&self) -> String {
        normalize_id(&self.id)
    }

    fn schema(&self) -> &'static [FieldSpec] {
        VOLUME_SCHEMA
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        let value = match name {
            "id" => Field::Scalar(normalize_id(&self.id).into()),
            "node_id" => Field::Scalar(self.node_id.as_str().into()),
            "host_id" => Field::Scalar(normalize_id(&self.host_id).into()),
            "name" => Field::Scalar(self.name.as_str().into()),
            "pool_type" => Field::Scalar(self.pool_type.as_str().into()),
            "connection_state" => Field::Scalar(self.connection_state.as_str().into()),
            "capacity_bytes" => Field::Scalar(self.capacity_bytes.into()),
            "allocated_bytes" => Field::Scalar(self.allocated_bytes.into()),
            "path" => Field::Scalar(self.path.as_deref().into()),
            _ => return None,
        };
        Some(value)
    }
}
