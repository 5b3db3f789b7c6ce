//! Metrics snapshots, historical snapshot filenames and the comparison table.

use chrono::{DateTime, Local, TimeZone};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single metric value. Anything that is not a JSON number is kept as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Number(f64),
    Other(serde_json::Value),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Other(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(n) => write!(f, "{:.4}", n),
            MetricValue::Other(serde_json::Value::String(s)) => f.write_str(s),
            MetricValue::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<serde_json::Value> for MetricValue {
    fn from(value: serde_json::Value) -> Self {
        match value.as_f64() {
            Some(n) if value.is_number() => MetricValue::Number(n),
            _ => MetricValue::Other(value),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Number(n) => serializer.serialize_f64(*n),
            MetricValue::Other(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(MetricValue::from)
    }
}

/// Metric name → value, in the order the backend sent them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    entries: Vec<(String, MetricValue)>,
}

impl MetricsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<MetricValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<f64> for MetricValue {
    fn from(n: f64) -> Self {
        MetricValue::Number(n)
    }
}

impl<N: Into<String>, V: Into<MetricValue>> FromIterator<(N, V)> for MetricsSnapshot {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut snapshot = MetricsSnapshot::new();
        for (name, value) in iter {
            snapshot.insert(name, value);
        }
        snapshot
    }
}

impl Serialize for MetricsSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MetricsSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnapshotVisitor;

        impl<'de> Visitor<'de> for SnapshotVisitor {
            type Value = MetricsSnapshot;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of metric values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut snapshot = MetricsSnapshot::new();
                while let Some((name, value)) = access.next_entry::<String, MetricValue>()? {
                    snapshot.insert(name, value);
                }
                Ok(snapshot)
            }
        }

        deserializer.deserialize_map(SnapshotVisitor)
    }
}

/// `accuracy_score` → `ACCURACY SCORE`
pub fn display_name(metric: &str) -> String {
    metric.replace('_', " ").to_uppercase()
}

/// Response of the historical filename listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFiles {
    #[serde(default)]
    pub files: Vec<String>,
}

const SNAPSHOT_PREFIX: &str = "metrics_at_";
const SNAPSHOT_SUFFIX: &str = ".json";

/// A historical snapshot file, identified by the epoch seconds in its name.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotName {
    pub filename: String,
    pub timestamp: f64,
}

impl SnapshotName {
    /// Parse `metrics_at_<epoch-seconds>.json`.
    pub fn parse(filename: &str) -> Option<Self> {
        let number = filename
            .strip_prefix(SNAPSHOT_PREFIX)?
            .strip_suffix(SNAPSHOT_SUFFIX)?;
        let timestamp: f64 = number.parse().ok()?;
        timestamp.is_finite().then(|| Self {
            filename: filename.to_string(),
            timestamp,
        })
    }

    pub fn for_timestamp(timestamp: f64) -> Self {
        Self {
            filename: format!("{}{}{}", SNAPSHOT_PREFIX, timestamp, SNAPSHOT_SUFFIX),
            timestamp,
        }
    }

    pub fn datetime(&self) -> Option<DateTime<Local>> {
        let secs = self.timestamp.floor();
        let nanos = ((self.timestamp - secs) * 1e9) as u32;
        Local.timestamp_opt(secs as i64, nanos).single()
    }

    /// Human-readable local time, or the raw filename if out of range.
    pub fn label(&self) -> String {
        self.datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| self.filename.clone())
    }
}

/// Parse and order snapshot names newest first. Names that do not follow the
/// pattern are dropped.
pub fn sort_snapshot_names<I, S>(filenames: I) -> Vec<SnapshotName>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names: Vec<SnapshotName> = filenames
        .into_iter()
        .filter_map(|f| {
            let parsed = SnapshotName::parse(f.as_ref());
            if parsed.is_none() {
                tracing::debug!("Ignoring snapshot file {}", f.as_ref());
            }
            parsed
        })
        .collect();
    names.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));
    names
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    pub fn of(diff: f64) -> Self {
        if diff > 0.0 {
            Trend::Up
        } else if diff < 0.0 {
            Trend::Down
        } else {
            Trend::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Neutral => "neutral",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Neutral => "–",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delta {
    Numeric { diff: f64, percentage: f64 },
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricComparison {
    pub name: String,
    pub current: MetricValue,
    pub historical: Option<MetricValue>,
    pub delta: Delta,
    pub trend: Trend,
}

impl MetricComparison {
    pub fn compare(name: &str, current: &MetricValue, historical: Option<&MetricValue>) -> Self {
        let numbers = current
            .as_f64()
            .zip(historical.and_then(MetricValue::as_f64));

        let (delta, trend) = match numbers {
            Some((current, historical)) => {
                let diff = current - historical;
                let percentage = if historical != 0.0 {
                    diff / historical * 100.0
                } else {
                    0.0
                };
                (Delta::Numeric { diff, percentage }, Trend::of(diff))
            }
            None => (Delta::NotApplicable, Trend::Neutral),
        };

        Self {
            name: name.to_string(),
            current: current.clone(),
            historical: historical.cloned(),
            delta,
            trend,
        }
    }

    /// Difference with 4 decimals, or `N/A`.
    pub fn diff_text(&self) -> String {
        match self.delta {
            Delta::Numeric { diff, .. } => format!("{:.4}", diff),
            Delta::NotApplicable => "N/A".to_string(),
        }
    }

    /// Percentage change with 2 decimals, or `N/A`.
    pub fn percentage_text(&self) -> String {
        match self.delta {
            Delta::Numeric { percentage, .. } => format!("{:.2}", percentage),
            Delta::NotApplicable => "N/A".to_string(),
        }
    }

    pub fn historical_text(&self) -> String {
        self.historical
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// One row per metric of the current snapshot, in its order.
pub fn compare_snapshots(
    current: &MetricsSnapshot,
    historical: &MetricsSnapshot,
) -> Vec<MetricComparison> {
    current
        .iter()
        .map(|(name, value)| MetricComparison::compare(name, value, historical.get(name)))
        .collect()
}
