// Copyright (c) 2025 - Cowboy AI, Inc.
//! Normalized scalar values
//!
//! Snapshot sources are loosely typed: the same id can arrive as `"ABC"` from
//! one call and `"abc "` from another, a count as `4` or `4.0`. Every scalar is
//! compared through its normalized string form so these never show up as
//! spurious changes. An absent value stays distinct from an empty string or zero.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized scalar field value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Field has no value
    Absent,
    /// Field value in normalized string form
    Value(String),
}

impl Scalar {
    /// Build a scalar from anything with a display form
    pub fn of(value: impl fmt::Display) -> Self {
        Scalar::Value(value.to_string())
    }

    /// Whether the field has no value
    pub fn is_absent(&self) -> bool {
        matches!(self, Scalar::Absent)
    }

    /// Borrow the normalized value, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Absent => None,
            Scalar::Value(v) => Some(v),
        }
    }

    /// Numeric view used for ordering queries
    pub fn as_f64(&self) -> Option<f64> {
        self.as_str().and_then(|v| v.parse().ok())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Absent => write!(f, "<absent>"),
            Scalar::Value(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Value(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Value(value)
    }
}

impl From<&String> for Scalar {
    fn from(value: &String) -> Self {
        Scalar::Value(value.clone())
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::of(value)
    }
}

impl From<u16> for Scalar {
    fn from(value: u16) -> Self {
        Scalar::of(value)
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::of(value)
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Scalar::of(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::of(value)
    }
}

impl From<f64> for Scalar {
    /// Integral floats normalize to their integer form (`4.0` -> `"4"`)
    fn from(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < 1e15 {
            Scalar::of(value as i64)
        } else {
            Scalar::of(value)
        }
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Scalar::Absent,
        }
    }
}

/// Stable string form of a resource or collection key
///
/// Hypervisors report UUIDs with inconsistent case and padding.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
