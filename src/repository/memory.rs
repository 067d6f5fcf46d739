// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-Memory Repository
//!
//! Reference [`Repository`] backend. Keeps soft-deleted rows and epoch
//! timestamps like a database table would, and exposes fault injection so
//! tests can exercise the reconciler's storage failure paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::debug;

use super::{compare_scalars, Filter, Repository, SortDirection, StoredRecord};
use crate::diff::normalize_id;
use crate::domain::{Resource, ResourceKind};
use crate::errors::RepositoryError;

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Write counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryStats {
    /// Successful `save` calls
    pub saves: u64,
    /// Rows soft-deleted
    pub deletes: u64,
    /// `delete_by_ids` calls that reached the backend
    pub delete_batches: u64,
}

/// Repository backed by in-process tables
pub struct InMemoryRepository {
    tables: RwLock<HashMap<ResourceKind, BTreeMap<String, StoredRecord>>>,
    available: AtomicBool,
    rejected: Mutex<HashSet<String>>,
    stats: Mutex<RepositoryStats>,
    clock: Clock,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(|| Utc::now().timestamp_millis()))
    }

    /// Repository stamping rows with a caller-supplied epoch clock
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            rejected: Mutex::new(HashSet::new()),
            stats: Mutex::new(RepositoryStats::default()),
            clock,
        }
    }

    /// Simulate the backend going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    /// Reject every future write of one resource id
    pub fn reject_writes_for(&self, id: &str) {
        self.rejected.lock().insert(normalize_id(id));
    }

    pub fn accept_writes_for(&self, id: &str) {
        self.rejected.lock().remove(&normalize_id(id));
    }

    pub fn stats(&self) -> RepositoryStats {
        *self.stats.lock()
    }

    /// Raw row, including soft-deleted ones
    pub fn row(&self, kind: ResourceKind, id: &str) -> Option<StoredRecord> {
        self.tables
            .read()
            .get(&kind)
            .and_then(|table| table.get(&normalize_id(id)))
            .cloned()
    }

    /// Number of live rows of a kind
    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.tables
            .read()
            .get(&kind)
            .map_or(0, |table| table.values().filter(|r| !r.deleted).count())
    }

    fn ensure_available(&self) -> Result<(), RepositoryError> {
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::Unavailable(
                "in-memory backend switched off".to_string(),
            ))
        }
    }

    fn live_rows<F>(&self, kind: ResourceKind, mut keep: F) -> Vec<Resource>
    where
        F: FnMut(&str) -> bool,
    {
        self.tables
            .read()
            .get(&kind)
            .map(|table| {
                table
                    .iter()
                    .filter(|(id, row)| !row.deleted && keep(id.as_str()))
                    .map(|(_, row)| row.resource.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save(&self, resource: &Resource) -> Result<(), RepositoryError> {
        self.ensure_available()?;

        let (kind, key) = (resource.kind(), resource.key());
        if self.rejected.lock().contains(&key) {
            return Err(RepositoryError::WriteRejected {
                kind,
                id: key,
                reason: "write rejected by fault injection".to_string(),
            });
        }

        let now = (self.clock)();
        let mut tables = self.tables.write();
        let table = tables.entry(kind).or_default();
        match table.get_mut(&key) {
            Some(row) => {
                row.resource = resource.clone();
                row.deleted = false;
                row.deleted_epoch_ms = None;
                row.last_modified_epoch_ms = now;
            }
            None => {
                table.insert(
                    key.clone(),
                    StoredRecord {
                        resource: resource.clone(),
                        deleted: false,
                        created_epoch_ms: now,
                        last_modified_epoch_ms: now,
                        deleted_epoch_ms: None,
                    },
                );
            }
        }
        drop(tables);

        self.stats.lock().saves += 1;
        debug!(kind = %kind, resource_id = %key, "Saved snapshot");
        Ok(())
    }

    async fn delete_by_ids(
        &self,
        kind: ResourceKind,
        ids: &[String],
    ) -> Result<usize, RepositoryError> {
        self.ensure_available()?;

        let now = (self.clock)();
        let mut deleted = 0;
        {
            let mut tables = self.tables.write();
            if let Some(table) = tables.get_mut(&kind) {
                for id in ids {
                    if let Some(row) = table.get_mut(&normalize_id(id)) {
                        if !row.deleted {
                            row.deleted = true;
                            row.deleted_epoch_ms = Some(now);
                            row.last_modified_epoch_ms = now;
                            deleted += 1;
                        }
                    }
                }
            }
        }

        let mut stats = self.stats.lock();
        stats.deletes += deleted as u64;
        stats.delete_batches += 1;
        Ok(deleted)
    }

    async fn get_by_ids(
        &self,
        kind: ResourceKind,
        ids: &[String],
    ) -> Result<Vec<Resource>, RepositoryError> {
        self.ensure_available()?;
        let wanted: HashSet<String> = ids.iter().map(|id| normalize_id(id)).collect();
        Ok(self.live_rows(kind, |id| wanted.contains(id)))
    }

    async fn get_all(&self, kind: ResourceKind) -> Result<Vec<Resource>, RepositoryError> {
        self.ensure_available()?;
        Ok(self.live_rows(kind, |_| true))
    }

    async fn get_all_by_filters(
        &self,
        kind: ResourceKind,
        filters: &[Filter],
        sort_key: Option<&str>,
        direction: SortDirection,
    ) -> Result<Vec<StoredRecord>, RepositoryError> {
        self.ensure_available()?;

        let include_deleted = filters
            .iter()
            .any(|f| matches!(f, Filter::ChangesSince(_)));

        let rows: Vec<StoredRecord> = self
            .tables
            .read()
            .get(&kind)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default();

        let mut matched = Vec::new();
        for row in rows {
            if row.deleted && !include_deleted {
                continue;
            }
            let mut keep = true;
            for filter in filters {
                if !filter.matches(&row)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                matched.push(row);
            }
        }

        if let Some(key) = sort_key {
            let mut keyed = Vec::with_capacity(matched.len());
            for row in matched {
                keyed.push((row.value(key)?, row));
            }
            keyed.sort_by(|(a, _), (b, _)| match direction {
                SortDirection::Ascending => compare_scalars(a, b),
                SortDirection::Descending => compare_scalars(b, a),
            });
            matched = keyed.into_iter().map(|(_, row)| row).collect();
        }

        Ok(matched)
    }
}
