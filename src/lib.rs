//! Hypervisor inventory collection for the Composable Information Machine
//!
//! Periodically polls a fleet of compute nodes, keeps a normalized cache of
//! what each hypervisor reports, persists the changes and turns every
//! meaningful change into a lifecycle event.
//!
//! # Architecture
//!
//! ```text
//! InventoryManager ──► ComputeNodeSession (per node)
//!                           │
//!                           ├── ResourcePoller(Host)
//!                           ├── ResourcePoller(StorageVolume)
//!                           ├── ResourcePoller(VirtualSwitch)
//!                           └── ResourcePoller(VirtualMachine)
//!                                   │
//!            HostProbe ──► diff ──► Repository ──► InventoryCache ──► rules ──► EventSink
//! ```
//!
//! Collaborators are traits: [`probe::HostProbe`], [`probe::NodeRegistry`],
//! [`repository::Repository`] and [`events::EventSink`]. The crate ships
//! file-backed probes, an in-memory repository and logging, collecting and
//! NATS sinks.

pub mod cache;
pub mod config;
pub mod diff;
pub mod domain;
pub mod errors;
pub mod events;
pub mod manager;
pub mod nats;
pub mod perf;
pub mod poller;
pub mod probe;
pub mod repository;
pub mod rules;
pub mod session;
pub mod state_machine;
pub mod subjects;

// Re-export commonly used types
pub use cache::{InventoryCache, NodeSessionRecord};
pub use config::InventoryConfig;
pub use diff::{diff, Diffable, ResourceDelta};
pub use domain::{EntityKind, Resource, ResourceKind};
pub use errors::{InventoryError, InventoryResult};
pub use events::{EventSink, EventType, InventoryEvent};
pub use manager::{CycleReport, InventoryManager, RefreshReport};
pub use nats::{NatsClient, NatsConfig, NatsEventSink};
pub use perf::{PerfMonitor, PerfSample};
pub use poller::{PollOutcome, ResourcePoller};
pub use probe::{HostProbe, NodeDescriptor, NodeRegistry, TimeoutProbe};
pub use repository::{InMemoryRepository, Repository};
pub use session::{ComputeNodeSession, PollReport, PollStatus, SessionState};
