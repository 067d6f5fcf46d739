// Copyright (c) 2025 - Cowboy AI, Inc.
//! Performance Monitoring
//!
//! Utilisation samples for hosts and VMs, a bounded per-entity history, and
//! edge-triggered threshold events. Performance polling runs on its own
//! schedule and worker pool; it never touches the inventory cache.
//!
//! # Alarm Edges
//!
//! ```text
//!            value >= threshold                 value < threshold
//!   clear ─────────────────────► raised ─────────────────────────► clear
//!          Perf.ThresholdExceeded        Perf.ThresholdCleared
//! ```
//!
//! Samples that keep an alarm in its current state emit nothing.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::InventoryConfig;
use crate::diff::normalize_id;
use crate::domain::EntityKind;
use crate::events::{emit_all, DerivedEvent, EntityRef, EventSink, EventType};
use crate::probe::{HostProbe, NodeDescriptor};

/// One utilisation reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfSample {
    /// Filled in by the probe from the node it sampled
    #[serde(default)]
    pub node_id: String,

    /// Host or virtual machine
    pub entity_kind: EntityKind,

    pub entity_id: String,

    #[serde(default)]
    pub name: String,

    pub cpu_percent: f64,

    pub memory_percent: f64,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl PerfSample {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu_percent,
            Metric::Memory => self.memory_percent,
        }
    }
}

/// Monitored metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpu,
    Memory,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Cpu, Metric::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu_percent",
            Self::Memory => "memory_percent",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alarm thresholds, in percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfThresholds {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

impl PerfThresholds {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu_percent,
            Metric::Memory => self.memory_percent,
        }
    }
}

impl From<&InventoryConfig> for PerfThresholds {
    fn from(config: &InventoryConfig) -> Self {
        Self {
            cpu_percent: config.cpu_threshold_percent,
            memory_percent: config.memory_threshold_percent,
        }
    }
}

/// Result of sampling one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PerfOutcome {
    pub node_id: String,
    pub samples: usize,
    pub events: usize,
    pub probe_error: Option<String>,
}

#[derive(Debug, Default)]
struct EntityPerf {
    node_id: String,
    history: VecDeque<PerfSample>,
    raised: BTreeSet<Metric>,
}

type EntityKey = (EntityKind, String);

/// Sample history and alarm state for every monitored entity
#[derive(Debug)]
pub struct PerfMonitor {
    thresholds: PerfThresholds,
    history_len: usize,
    entities: Mutex<HashMap<EntityKey, EntityPerf>>,
}

impl PerfMonitor {
    pub fn new(thresholds: PerfThresholds, history_len: usize) -> Self {
        Self {
            thresholds,
            history_len: history_len.max(1),
            entities: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &InventoryConfig) -> Self {
        Self::new(PerfThresholds::from(config), config.perf_history_len)
    }

    /// Record a sample and return the alarm edges it crossed
    pub fn record(&self, sample: PerfSample) -> Vec<DerivedEvent> {
        let key = (sample.entity_kind, normalize_id(&sample.entity_id));
        let mut entities = self.entities.lock();
        let entry = entities.entry(key.clone()).or_default();
        entry.node_id = sample.node_id.clone();

        let mut events = Vec::new();
        for metric in Metric::ALL {
            let value = sample.value(metric);
            let threshold = self.thresholds.get(metric);
            let raised = entry.raised.contains(&metric);

            let edge = if !raised && value >= threshold {
                entry.raised.insert(metric);
                Some(EventType::PerfThresholdExceeded)
            } else if raised && value < threshold {
                entry.raised.remove(&metric);
                Some(EventType::PerfThresholdCleared)
            } else {
                None
            };

            if let Some(event_type) = edge {
                let subject = EntityRef::new(key.0, &key.1, &sample.name, &sample.node_id);
                events.push(
                    DerivedEvent::new(event_type, subject)
                        .with("metric", metric.as_str())
                        .with("value", value)
                        .with("threshold", threshold),
                );
            }
        }

        entry.history.push_back(sample);
        while entry.history.len() > self.history_len {
            entry.history.pop_front();
        }

        events
    }

    /// Recorded samples for an entity, oldest first
    pub fn history(&self, kind: EntityKind, entity_id: &str) -> Vec<PerfSample> {
        self.entities
            .lock()
            .get(&(kind, normalize_id(entity_id)))
            .map(|entry| entry.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Metrics currently in alarm for an entity
    pub fn raised(&self, kind: EntityKind, entity_id: &str) -> BTreeSet<Metric> {
        self.entities
            .lock()
            .get(&(kind, normalize_id(entity_id)))
            .map(|entry| entry.raised.clone())
            .unwrap_or_default()
    }

    /// Drop all state for entities of a node
    pub fn forget_node(&self, node_id: &str) {
        self.entities
            .lock()
            .retain(|_, entry| entry.node_id != node_id);
    }

    /// Sample one node and deliver its alarm edges
    #[instrument(skip(self, probe, sink, node), fields(node_id = %node.id))]
    pub async fn poll_node(
        &self,
        probe: &dyn HostProbe,
        sink: &dyn EventSink,
        node: &NodeDescriptor,
    ) -> PerfOutcome {
        let mut outcome = PerfOutcome {
            node_id: node.id.clone(),
            ..PerfOutcome::default()
        };

        let mut samples = match probe.sample_performance(node).await {
            Ok(samples) => samples,
            Err(e) => {
                warn!(error = %e, "Performance sampling failed");
                outcome.probe_error = Some(e.to_string());
                return outcome;
            }
        };

        for sample in &mut samples {
            sample.node_id = node.id.clone();
        }
        outcome.samples = samples.len();
        let events: Vec<DerivedEvent> = samples
            .into_iter()
            .flat_map(|sample| self.record(sample))
            .collect();
        outcome.events = events.len();

        if !events.is_empty() {
            emit_all(sink, events, Uuid::now_v7()).await;
        }
        debug!(samples = outcome.samples, events = outcome.events, "Performance sampled");
        outcome
    }
}
