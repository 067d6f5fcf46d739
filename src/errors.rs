//! Error types for inventory operations
//!
//! Every collaborator boundary has its own error type so the polling loop can
//! decide locally how far a failure is allowed to travel:
//!
//! - [`ProbeError`]: recovered per poller, counted against the node session
//! - [`RepositoryError`]: recovered per resource, cache left stale
//! - [`DiffError`]: recovered per resource, logged with full context
//! - [`SinkError`]: always swallowed after logging
//!
//! [`InventoryError`] aggregates them for call sites that only need to log.

use std::time::Duration;

use thiserror::Error;

use crate::domain::ResourceKind;

/// Errors raised by a [`HostProbe`](crate::probe::HostProbe)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// Hypervisor could not be reached
    #[error("Host unreachable: {0}")]
    Unreachable(String),

    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Response could not be turned into snapshots
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Call exceeded the probe timeout
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),

    /// Node is not known to the probe
    #[error("Unknown node: {0}")]
    UnknownNode(String),
}

/// Errors raised by a [`Repository`](crate::repository::Repository)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// Storage backend is unavailable
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    /// Write was rejected for a single resource
    #[error("Write rejected for {kind} {id}: {reason}")]
    WriteRejected {
        kind: ResourceKind,
        id: String,
        reason: String,
    },

    /// Query could not be evaluated
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Errors raised while computing a structural diff
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiffError {
    /// Old and new snapshots do not describe the same resource
    #[error("Cannot diff {old} against {new}: identities differ")]
    IdentityMismatch { old: String, new: String },

    /// Schema names a field the record cannot produce
    #[error("Field '{field}' declared in schema but missing from record")]
    MissingField { field: String },

    /// Record produced a value whose shape disagrees with the schema
    #[error("Field '{field}' expected {expected} but record produced {actual}")]
    ShapeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Keyed collection holds two entries with the same key
    #[error("Duplicate key '{key}' in collection '{field}'")]
    DuplicateKey { field: String, key: String },

    /// Keyed collection holds an entry without a key
    #[error("Empty key in collection '{field}'")]
    EmptyKey { field: String },
}

/// Errors raised by an [`EventSink`](crate::events::EventSink)
#[derive(Debug, Error)]
pub enum SinkError {
    /// Transport refused the event
    #[error("Event publish error: {0}")]
    Publish(String),

    /// Event could not be encoded
    #[error("Event serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by a [`NodeRegistry`](crate::probe::NodeRegistry)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Registry backend is unavailable
    #[error("Node registry unavailable: {0}")]
    Unavailable(String),

    /// Registry returned data that could not be parsed
    #[error("Malformed node registry entry: {0}")]
    Malformed(String),
}

/// Errors raised while loading configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable holds a value that cannot be parsed
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    /// Configuration is internally inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Aggregate error for inventory operations
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transition(#[from] crate::state_machine::TransitionError),

    /// NATS connection error
    #[error("NATS connection error: {0}")]
    NatsConnection(String),
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Serialization(err.to_string())
    }
}

impl From<async_nats::Error> for InventoryError {
    fn from(err: async_nats::Error) -> Self {
        InventoryError::NatsConnection(err.to_string())
    }
}
