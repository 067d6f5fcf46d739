// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Cache
//!
//! Process-wide table of the last-known snapshot of every managed resource,
//! plus per-node polling bookkeeping. The cache is an explicit object with an
//! injected lifetime: the manager creates it and hands a cheap clone of the
//! handle to every session and poller.
//!
//! # Tables
//!
//! ```text
//! (ResourceKind, id) ──► Resource
//! node_id            ──► NodeSessionRecord
//! ```
//!
//! # Locking
//!
//! A single `RwLock` guards both tables, so every accessor is atomic with
//! respect to every other. Accessors return owned clones; no guard ever
//! escapes a method, which keeps references out of `.await` points.

mod node;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::diff::normalize_id;
use crate::domain::{Resource, ResourceKind};

pub use node::{NodeSessionRecord, SessionState};

#[derive(Debug, Default)]
struct Tables {
    resources: HashMap<ResourceKind, HashMap<String, Resource>>,
    nodes: HashMap<String, NodeSessionRecord>,
}

/// Thread-safe in-memory inventory
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InventoryCache {
    inner: Arc<RwLock<Tables>>,
}

impl InventoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-known snapshot of a resource
    pub fn get(&self, kind: ResourceKind, id: &str) -> Option<Resource> {
        let tables = self.inner.read();
        tables
            .resources
            .get(&kind)
            .and_then(|table| table.get(&normalize_id(id)))
            .cloned()
    }

    /// Store a snapshot under its own kind and normalized id
    ///
    /// Returns the snapshot it replaced, if any.
    pub fn put(&self, resource: Resource) -> Option<Resource> {
        let (kind, key) = (resource.kind(), resource.key());
        let mut tables = self.inner.write();
        tables.resources.entry(kind).or_default().insert(key, resource)
    }

    pub fn delete(&self, kind: ResourceKind, id: &str) -> Option<Resource> {
        let mut tables = self.inner.write();
        tables
            .resources
            .get_mut(&kind)
            .and_then(|table| table.remove(&normalize_id(id)))
    }

    /// Every cached resource of a kind, keyed by normalized id
    pub fn all(&self, kind: ResourceKind) -> BTreeMap<String, Resource> {
        let tables = self.inner.read();
        tables
            .resources
            .get(&kind)
            .map(|table| {
                table
                    .iter()
                    .map(|(id, resource)| (id.clone(), resource.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, kind: ResourceKind) -> usize {
        self.inner
            .read()
            .resources
            .get(&kind)
            .map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().resources.values().all(HashMap::is_empty)
    }

    /// Ids of cached resources of a kind attributed to a node
    pub fn ids_for_node(&self, kind: ResourceKind, node_id: &str) -> BTreeSet<String> {
        self.select(kind, |resource| resource.node_id() == node_id)
    }

    /// Ids of cached children of a kind owned by a host
    pub fn children_of(&self, kind: ResourceKind, host_id: &str) -> BTreeSet<String> {
        let host_key = normalize_id(host_id);
        self.select(kind, |resource| {
            resource.host_key().as_deref() == Some(host_key.as_str())
        })
    }

    fn select<F>(&self, kind: ResourceKind, predicate: F) -> BTreeSet<String>
    where
        F: Fn(&Resource) -> bool,
    {
        let tables = self.inner.read();
        tables
            .resources
            .get(&kind)
            .map(|table| {
                table
                    .iter()
                    .filter(|(_, resource)| predicate(resource))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_node_session(&self, node_id: &str) -> Option<NodeSessionRecord> {
        self.inner.read().nodes.get(node_id).cloned()
    }

    pub fn put_node_session(&self, record: NodeSessionRecord) -> Option<NodeSessionRecord> {
        let mut tables = self.inner.write();
        tables.nodes.insert(record.node_id().to_string(), record)
    }

    pub fn delete_node_session(&self, node_id: &str) -> Option<NodeSessionRecord> {
        self.inner.write().nodes.remove(node_id)
    }

    pub fn all_node_sessions(&self) -> BTreeMap<String, NodeSessionRecord> {
        let tables = self.inner.read();
        tables
            .nodes
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    /// Mutate a node record in place under the write lock
    ///
    /// Returns `None` when the node has no record.
    pub fn update_node_session<R, F>(&self, node_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut NodeSessionRecord) -> R,
    {
        let mut tables = self.inner.write();
        tables.nodes.get_mut(node_id).map(f)
    }
}
