// Copyright (c) 2025 - Cowboy AI, Inc.
//! File-Backed Probe and Registry
//!
//! Lets the collector run against JSON fixtures instead of live hypervisors.
//! Files are re-read on every call, so editing them between cycles shows up
//! as inventory changes.
//!
//! # Layout
//!
//! ```text
//! <root>/nodes.json                 registry: [NodeDescriptor]
//! <root>/<node_id>/hosts.json       [Host]
//! <root>/<node_id>/vms.json         [VirtualMachine]
//! <root>/<node_id>/volumes.json     [StorageVolume]
//! <root>/<node_id>/switches.json    [VirtualSwitch]
//! <root>/<node_id>/perf.json        [PerfSample]
//! <root>/<node_id>/unreachable      marker: liveness check fails
//! ```
//!
//! A missing kind file means the node has no resources of that kind. A
//! missing node directory is [`ProbeError::UnknownNode`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{HostProbe, NodeDescriptor, NodeRegistry};
use crate::domain::{Host, Resource, ResourceKind, StorageVolume, VirtualMachine, VirtualSwitch};
use crate::errors::{ProbeError, RegistryError};
use crate::perf::PerfSample;

const UNREACHABLE_MARKER: &str = "unreachable";

fn kind_file(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Host => "hosts.json",
        ResourceKind::VirtualMachine => "vms.json",
        ResourceKind::StorageVolume => "volumes.json",
        ResourceKind::VirtualSwitch => "switches.json",
    }
}

/// Probe reading snapshots from a fixture directory
#[derive(Debug, Clone)]
pub struct FileHostProbe {
    root: PathBuf,
}

impl FileHostProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn node_dir(&self, node: &NodeDescriptor) -> PathBuf {
        self.root.join(&node.id)
    }

    async fn read_list<T: DeserializeOwned>(
        &self,
        node: &NodeDescriptor,
        file: &str,
    ) -> Result<Vec<T>, ProbeError> {
        let dir = self.node_dir(node);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(ProbeError::UnknownNode(node.id.clone()));
        }

        let path = dir.join(file);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(node_id = %node.id, path = %path.display(), "No fixture file");
                return Ok(Vec::new());
            }
            Err(e) => return Err(ProbeError::Unreachable(format!("{}: {e}", path.display()))),
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| ProbeError::MalformedResponse(format!("{}: {e}", path.display())))
    }
}

#[async_trait]
impl HostProbe for FileHostProbe {
    async fn enumerate(
        &self,
        kind: ResourceKind,
        node: &NodeDescriptor,
    ) -> Result<Vec<Resource>, ProbeError> {
        let file = kind_file(kind);
        let resources = match kind {
            ResourceKind::Host => self
                .read_list::<Host>(node, file)
                .await?
                .into_iter()
                .map(Resource::from)
                .collect(),
            ResourceKind::VirtualMachine => self
                .read_list::<VirtualMachine>(node, file)
                .await?
                .into_iter()
                .map(Resource::from)
                .collect(),
            ResourceKind::StorageVolume => self
                .read_list::<StorageVolume>(node, file)
                .await?
                .into_iter()
                .map(Resource::from)
                .collect(),
            ResourceKind::VirtualSwitch => self
                .read_list::<VirtualSwitch>(node, file)
                .await?
                .into_iter()
                .map(Resource::from)
                .collect(),
        };
        Ok(resources)
    }

    async fn check_liveness(&self, node: &NodeDescriptor) -> bool {
        let dir = self.node_dir(node);
        let present = tokio::fs::try_exists(&dir).await.unwrap_or(false);
        let marked = tokio::fs::try_exists(dir.join(UNREACHABLE_MARKER))
            .await
            .unwrap_or(false);
        present && !marked
    }

    async fn sample_performance(
        &self,
        node: &NodeDescriptor,
    ) -> Result<Vec<PerfSample>, ProbeError> {
        let mut samples: Vec<PerfSample> = self.read_list(node, "perf.json").await?;
        for sample in &mut samples {
            sample.node_id = node.id.clone();
        }
        Ok(samples)
    }
}

/// Registry reading `nodes.json`
#[derive(Debug, Clone)]
pub struct FileNodeRegistry {
    path: PathBuf,
}

impl FileNodeRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Registry at `<root>/nodes.json`
    pub fn in_dir(root: &Path) -> Self {
        Self::new(root.join("nodes.json"))
    }
}

#[async_trait]
impl NodeRegistry for FileNodeRegistry {
    async fn list_nodes(&self) -> Result<Vec<NodeDescriptor>, RegistryError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| RegistryError::Unavailable(format!("{}: {e}", self.path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RegistryError::Malformed(format!("{}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cim-inventory-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    const HOSTS: &str = r#"[{
        "id": "H1",
        "name": "hv01",
        "hypervisor_type": "kvm",
        "connection_state": "connected",
        "cpu_count": 8,
        "memory_mb": 32768
    }]"#;

    #[tokio::test]
    async fn test_enumerate_reads_kind_file() {
        let root = scratch_dir();
        std::fs::create_dir_all(root.join("n1")).unwrap();
        std::fs::write(root.join("n1").join("hosts.json"), HOSTS).unwrap();

        let probe = FileHostProbe::new(&root);
        let node = NodeDescriptor::new("n1", "file");

        let hosts = probe.enumerate(ResourceKind::Host, &node).await.unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].key(), "h1");

        // no vms.json: no VMs
        let vms = probe
            .enumerate(ResourceKind::VirtualMachine, &node)
            .await
            .unwrap();
        assert!(vms.is_empty());

        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn test_unknown_node_and_malformed_file() {
        let root = scratch_dir();
        let probe = FileHostProbe::new(&root);

        let missing = probe
            .enumerate(ResourceKind::Host, &NodeDescriptor::new("ghost", "file"))
            .await;
        assert_eq!(missing, Err(ProbeError::UnknownNode("ghost".to_string())));

        std::fs::create_dir_all(root.join("n1")).unwrap();
        std::fs::write(root.join("n1").join("volumes.json"), "{not json").unwrap();
        let malformed = probe
            .enumerate(ResourceKind::StorageVolume, &NodeDescriptor::new("n1", "file"))
            .await;
        assert!(matches!(malformed, Err(ProbeError::MalformedResponse(_))));

        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn test_liveness_marker() {
        let root = scratch_dir();
        std::fs::create_dir_all(root.join("n1")).unwrap();
        let probe = FileHostProbe::new(&root);
        let node = NodeDescriptor::new("n1", "file");

        assert!(probe.check_liveness(&node).await);
        std::fs::write(root.join("n1").join(UNREACHABLE_MARKER), "").unwrap();
        assert!(!probe.check_liveness(&node).await);
        assert!(!probe.check_liveness(&NodeDescriptor::new("n2", "file")).await);

        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn test_registry_reads_nodes_json() {
        let root = scratch_dir();
        let registry = FileNodeRegistry::in_dir(&root);
        assert!(matches!(
            registry.list_nodes().await,
            Err(RegistryError::Unavailable(_))
        ));

        std::fs::write(
            root.join("nodes.json"),
            r#"[{"id": "n1", "address": "qemu+ssh://n1/system",
                 "liveness": {"service_active": false}}]"#,
        )
        .unwrap();
        let nodes = registry.list_nodes().await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(!nodes[0].liveness.service_active);

        std::fs::remove_dir_all(root).unwrap();
    }
}
