// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event Sinks
//!
//! Delivery is best-effort: a sink reports failure through [`SinkError`],
//! and the caller logs it and moves on. Inventory state never depends on
//! whether an event got through.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{DerivedEvent, EventType, InventoryEvent};
use crate::errors::SinkError;

/// Destination for inventory events
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event
    async fn emit(&self, event: &InventoryEvent) -> Result<(), SinkError>;
}

#[async_trait]
impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    async fn emit(&self, event: &InventoryEvent) -> Result<(), SinkError> {
        (**self).emit(event).await
    }
}

/// Stamp and deliver events in order, logging any delivery failure
///
/// Returns how many events the sink accepted.
pub async fn emit_all(
    sink: &dyn EventSink,
    events: Vec<DerivedEvent>,
    correlation_id: Uuid,
) -> usize {
    let mut delivered = 0;
    for derived in events {
        let event = derived.into_event(correlation_id);
        match sink.emit(&event).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!(
                event_type = %event.event_type,
                subject_id = %event.subject.id,
                node_id = %event.subject.node_id,
                error = %e,
                "Event delivery failed"
            ),
        }
    }
    delivered
}

/// Logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: &InventoryEvent) -> Result<(), SinkError> {
        let attributes = serde_json::to_string(&event.attributes)?;
        info!(
            event_type = %event.event_type,
            subject_kind = %event.subject.kind,
            subject_id = %event.subject.id,
            node_id = %event.subject.node_id,
            correlation_id = %event.correlation_id,
            attributes = %attributes,
            "inventory event"
        );
        Ok(())
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, _event: &InventoryEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps every event in memory
///
/// Clones share the same buffer, so a test can hand one clone to the manager
/// and inspect another.
#[derive(Debug, Clone, Default)]
pub struct CollectingEventSink {
    events: Arc<Mutex<Vec<InventoryEvent>>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything collected so far
    pub fn events(&self) -> Vec<InventoryEvent> {
        self.events.lock().clone()
    }

    pub fn event_types(&self) -> Vec<EventType> {
        self.events.lock().iter().map(|e| e.event_type).collect()
    }

    /// Events about one subject id, in emission order
    pub fn events_for(&self, subject_id: &str) -> Vec<InventoryEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.subject.id == subject_id)
            .cloned()
            .collect()
    }

    /// Drain the buffer
    pub fn take(&self) -> Vec<InventoryEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: &InventoryEvent) -> Result<(), SinkError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
