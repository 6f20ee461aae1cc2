//! Action logs, performance reports and report comparisons.
//!
//! Every type here is a passive value: logs are produced by tasks, reports are
//! derived from a fixed log collection, comparisons are derived from two reports.
//! Field names are the persisted JSON field names.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Identifier of the worker that produced a log, formatted `M{index}@{swarm}`.
pub type WorkerId = String;

/// Partition key of the whole-set aggregate inside a [`FullReport`].
pub const AGGREGATE_KEY: &str = "*";

// ===== Action logs =====

/// Timing and outcome of one completed action attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    pub worker_id: WorkerId,
    pub action_name: String,
    /// Epoch milliseconds.
    pub start: f64,
    /// Epoch milliseconds, never before `start`.
    pub end: f64,
    pub success: bool,
    /// Opaque response returned by the action; `null` for failed attempts.
    #[serde(default)]
    pub response: Value,
}

impl ActionLog {
    /// Elapsed time of the attempt in milliseconds.
    pub fn response_time(&self) -> f64 {
        self.end - self.start
    }
}

// ===== Reports =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestsReport {
    pub total: u64,
    pub avg_per_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimesReport {
    pub total: f64,
    pub mean: f64,
    pub stdev: f64,
    pub min: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesReport {
    pub success_rate: f64,
    pub succeeded: u64,
    pub failed: u64,
    pub response_times: ResponseTimesReport,
}

/// Throughput, success rate and response-time distribution of one log partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Span between the earliest start and the latest end, in milliseconds.
    pub duration: f64,
    pub requests: RequestsReport,
    pub responses: ResponsesReport,
}

/// Aggregate report under [`AGGREGATE_KEY`] plus one report per action name.
pub type FullReport = PartitionMap<PerformanceReport>;

/// Either report shape, for callers that load a report without knowing its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report {
    Single(PerformanceReport),
    Full(FullReport),
}

impl Report {
    /// Short name of the shape, used in mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Single(_) => "performance report",
            Self::Full(_) => "full report",
        }
    }
}

// ===== Comparisons =====

/// Difference of one numeric leaf between a report and its baseline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Delta {
    /// `absolute / baseline`, NaN when the baseline is zero.
    #[serde(with = "nan_as_null")]
    pub relative: f64,
    /// `new - baseline`.
    pub absolute: f64,
}

impl PartialEq for Delta {
    fn eq(&self, other: &Self) -> bool {
        let relative_eq = (self.relative.is_nan() && other.relative.is_nan())
            || self.relative == other.relative;
        relative_eq && self.absolute == other.absolute
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestsComparison {
    pub total: Delta,
    pub avg_per_sec: Delta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimesComparison {
    pub total: Delta,
    pub mean: Delta,
    pub stdev: Delta,
    pub min: Delta,
    pub p50: Delta,
    pub p75: Delta,
    pub p90: Delta,
    pub p95: Delta,
    pub p99: Delta,
    pub max: Delta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesComparison {
    pub success_rate: Delta,
    pub succeeded: Delta,
    pub failed: Delta,
    pub response_times: ResponseTimesComparison,
}

/// Mirror of [`PerformanceReport`] with every leaf replaced by a [`Delta`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceComparison {
    pub duration: Delta,
    pub requests: RequestsComparison,
    pub responses: ResponsesComparison,
}

pub type FullComparison = PartitionMap<PerformanceComparison>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Comparison {
    Single(PerformanceComparison),
    Full(FullComparison),
}

// ===== Ordered partition map =====

/// Insertion-ordered mapping from partition key to a value.
///
/// Serialized as a JSON object whose key order is the insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> PartitionMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts a value, replacing an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The whole-set entry, when present.
    pub fn aggregate(&self) -> Option<&V> {
        self.get(AGGREGATE_KEY)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for PartitionMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(String, V)> for PartitionMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<V> IntoIterator for PartitionMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V: Serialize> Serialize for PartitionMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for PartitionMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PartitionVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for PartitionVisitor<V> {
            type Value = PartitionMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of partition keys to reports")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = PartitionMap::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(PartitionVisitor(PhantomData))
    }
}

/// JSON has no NaN literal: NaN is written as `null` and read back as NaN.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
