// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory collector configuration
//!
//! All knobs have working defaults. [`InventoryConfig::from_env`] overlays
//! `INVENTORY_*` environment variables on top of them; durations are given in
//! whole seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Configuration for the inventory manager and its pools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Interval between inventory poll cycles
    pub poll_interval: Duration,

    /// Minimum time between node registry refreshes
    pub node_refresh_interval: Duration,

    /// Interval between performance poll cycles
    pub perf_interval: Duration,

    /// Concurrent inventory polls
    pub inventory_workers: usize,

    /// Concurrent performance polls
    pub perf_workers: usize,

    /// Per-call timeout at the probe boundary
    pub probe_timeout: Duration,

    /// Consecutive failed polls tolerated before a session goes inactive
    pub max_failed_attempts: u32,

    /// Heartbeat age after which a node is considered unreachable
    pub heartbeat_staleness: Duration,

    /// Time a node's backing service may stay inactive before its session is dropped
    pub node_removal_threshold: Duration,

    /// First reconnect delay for a disconnected session
    pub retry_backoff_base: Duration,

    /// Upper bound on the reconnect delay
    pub retry_backoff_max: Duration,

    /// CPU utilisation (percent) that raises a threshold alarm
    pub cpu_threshold_percent: f64,

    /// Memory utilisation (percent) that raises a threshold alarm
    pub memory_threshold_percent: f64,

    /// Performance samples kept per entity
    pub perf_history_len: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            node_refresh_interval: Duration::from_secs(300),
            perf_interval: Duration::from_secs(30),
            inventory_workers: 8,
            perf_workers: 4,
            probe_timeout: Duration::from_secs(30),
            max_failed_attempts: 3,
            heartbeat_staleness: Duration::from_secs(120),
            node_removal_threshold: Duration::from_secs(3600),
            retry_backoff_base: Duration::from_secs(10),
            retry_backoff_max: Duration::from_secs(600),
            cpu_threshold_percent: 90.0,
            memory_threshold_percent: 90.0,
            perf_history_len: 60,
        }
    }
}

impl InventoryConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables keep their defaults; set but unparsable variables are
    /// reported instead of being ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            poll_interval: secs(&lookup, "INVENTORY_POLL_INTERVAL_SECS", defaults.poll_interval)?,
            node_refresh_interval: secs(
                &lookup,
                "INVENTORY_NODE_REFRESH_INTERVAL_SECS",
                defaults.node_refresh_interval,
            )?,
            perf_interval: secs(&lookup, "INVENTORY_PERF_INTERVAL_SECS", defaults.perf_interval)?,
            inventory_workers: parsed(
                &lookup,
                "INVENTORY_WORKERS",
                defaults.inventory_workers,
            )?,
            perf_workers: parsed(&lookup, "INVENTORY_PERF_WORKERS", defaults.perf_workers)?,
            probe_timeout: secs(&lookup, "INVENTORY_PROBE_TIMEOUT_SECS", defaults.probe_timeout)?,
            max_failed_attempts: parsed(
                &lookup,
                "INVENTORY_MAX_FAILED_ATTEMPTS",
                defaults.max_failed_attempts,
            )?,
            heartbeat_staleness: secs(
                &lookup,
                "INVENTORY_HEARTBEAT_STALENESS_SECS",
                defaults.heartbeat_staleness,
            )?,
            node_removal_threshold: secs(
                &lookup,
                "INVENTORY_NODE_REMOVAL_THRESHOLD_SECS",
                defaults.node_removal_threshold,
            )?,
            retry_backoff_base: secs(
                &lookup,
                "INVENTORY_RETRY_BACKOFF_BASE_SECS",
                defaults.retry_backoff_base,
            )?,
            retry_backoff_max: secs(
                &lookup,
                "INVENTORY_RETRY_BACKOFF_MAX_SECS",
                defaults.retry_backoff_max,
            )?,
            cpu_threshold_percent: parsed(
                &lookup,
                "INVENTORY_CPU_THRESHOLD_PERCENT",
                defaults.cpu_threshold_percent,
            )?,
            memory_threshold_percent: parsed(
                &lookup,
                "INVENTORY_MEMORY_THRESHOLD_PERCENT",
                defaults.memory_threshold_percent,
            )?,
            perf_history_len: parsed(
                &lookup,
                "INVENTORY_PERF_HISTORY_LEN",
                defaults.perf_history_len,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the scheduler cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inventory_workers == 0 || self.perf_workers == 0 {
            return Err(ConfigError::Invalid(
                "worker pools need at least one worker".to_string(),
            ));
        }
        if self.poll_interval.is_zero() || self.perf_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll intervals must be non-zero".to_string(),
            ));
        }
        if self.retry_backoff_base > self.retry_backoff_max {
            return Err(ConfigError::Invalid(
                "retry backoff base exceeds its maximum".to_string(),
            ));
        }
        Ok(())
    }
}

fn parsed<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parsed(lookup, key, default.as_secs()).map(Duration::from_secs)
}
