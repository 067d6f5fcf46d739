// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Repository
//!
//! Durable storage of resource snapshots, one table per [`ResourceKind`].
//! The reconciler only needs the narrow interface below; backends decide how
//! rows are laid out.
//!
//! # Row Model
//!
//! ```text
//! id ─► snapshot
//!       deleted                 soft-delete flag
//!       created_epoch_ms
//!       last_modified_epoch_ms
//!       deleted_epoch_ms
//! ```
//!
//! `get_by_ids` and `get_all` never return soft-deleted rows. Filtered
//! queries return them only when a [`Filter::ChangesSince`] predicate is
//! present, so change feeds see deletions.

pub mod memory;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::diff::{Diffable, Field, Scalar};
use crate::domain::{Resource, ResourceKind};
use crate::errors::RepositoryError;

pub use memory::{InMemoryRepository, RepositoryStats};

/// Field names served from row metadata rather than the snapshot
pub const DELETED: &str = "deleted";
pub const CREATED_EPOCH_MS: &str = "created_epoch_ms";
pub const LAST_MODIFIED_EPOCH_MS: &str = "last_modified_epoch_ms";
pub const DELETED_EPOCH_MS: &str = "deleted_epoch_ms";

/// Persisted snapshot with its row metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub resource: Resource,
    pub deleted: bool,
    pub created_epoch_ms: i64,
    pub last_modified_epoch_ms: i64,
    pub deleted_epoch_ms: Option<i64>,
}

impl StoredRecord {
    /// Scalar value of a snapshot field or metadata column
    pub fn value(&self, field: &str) -> Result<Scalar, RepositoryError> {
        let value = match field {
            DELETED => Scalar::from(self.deleted),
            CREATED_EPOCH_MS => Scalar::from(self.created_epoch_ms),
            LAST_MODIFIED_EPOCH_MS => Scalar::from(self.last_modified_epoch_ms),
            DELETED_EPOCH_MS => Scalar::from(self.deleted_epoch_ms),
            _ => match self.resource.field(field) {
                Some(Field::Scalar(value)) => value,
                Some(_) => {
                    return Err(RepositoryError::InvalidQuery(format!(
                        "field '{field}' is not a scalar column"
                    )))
                }
                None => {
                    return Err(RepositoryError::InvalidQuery(format!(
                        "unknown field '{field}' for {}",
                        self.resource.kind()
                    )))
                }
            },
        };
        Ok(value)
    }

    /// Whether the row was created, modified or deleted at or after `epoch_ms`
    pub fn changed_since(&self, epoch_ms: i64) -> bool {
        self.created_epoch_ms >= epoch_ms
            || self.last_modified_epoch_ms >= epoch_ms
            || self.deleted_epoch_ms.map_or(false, |at| at >= epoch_ms)
    }
}

/// Query predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Column equals value (compared on normalized scalars)
    Eq { field: String, value: Scalar },

    /// Column is one of the values
    In { field: String, values: Vec<Scalar> },

    /// Row changed at or after the epoch (milliseconds)
    ChangesSince(i64),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Evaluate against one row
    pub fn matches(&self, record: &StoredRecord) -> Result<bool, RepositoryError> {
        match self {
            Filter::Eq { field, value } => Ok(&record.value(field)? == value),
            Filter::In { field, values } => {
                let actual = record.value(field)?;
                Ok(values.contains(&actual))
            }
            Filter::ChangesSince(epoch_ms) => Ok(record.changed_since(*epoch_ms)),
        }
    }
}

/// Sort direction for filtered queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Compare scalars numerically when both sides are numbers
pub fn compare_scalars(a: &Scalar, b: &Scalar) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// Persistent store of resource snapshots
#[async_trait]
pub trait Repository: Send + Sync {
    /// Insert or replace a snapshot
    async fn save(&self, resource: &Resource) -> Result<(), RepositoryError>;

    /// Soft-delete rows by id, returning how many live rows were deleted
    async fn delete_by_ids(
        &self,
        kind: ResourceKind,
        ids: &[String],
    ) -> Result<usize, RepositoryError>;

    async fn get_by_ids(
        &self,
        kind: ResourceKind,
        ids: &[String],
    ) -> Result<Vec<Resource>, RepositoryError>;

    async fn get_all(&self, kind: ResourceKind) -> Result<Vec<Resource>, RepositoryError>;

    /// Rows matching every filter, optionally sorted by a column
    async fn get_all_by_filters(
        &self,
        kind: ResourceKind,
        filters: &[Filter],
        sort_key: Option<&str>,
        direction: SortDirection,
    ) -> Result<Vec<StoredRecord>, RepositoryError>;
}
