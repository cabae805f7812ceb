use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Marker used when a GPU series carries no product label.
pub const GPU_UNKNOWN_TYPE: &str = "GPU_UNKNOWN_TYPE";

/// Series label carrying the GPU product name on node-label series.
pub const LABEL_GPU_PRODUCT: &str = "label_nvidia_com_gpu_product";

/// Series label carrying the node hardware model on node-label series.
pub const LABEL_GPU_MACHINE: &str = "label_nvidia_com_gpu_machine";

/// Series label carrying the course/class assignment on pod-label series.
pub const LABEL_POD_CLASS: &str = "label_nerc_mghpcc_org_class";

/// Composite identity of a workload. Pod names repeat across namespaces,
/// so the namespace qualifier is part of the key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PodKey {
    pub namespace: String,
    pub pod: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, pod: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod)
    }
}

/// Everything known about a pod at a single sample instant. Missing
/// attributes stay `None` and compare as zero where a number is expected.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<Decimal>,
    /// Memory request in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_request: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_model: Option<String>,
}

/// Per-pod sample history plus pod-level labels.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PodRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_label: Option<String>,
    pub metrics: BTreeMap<i64, Snapshot>,
}

/// One timestamped value out of a range-query series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplePoint {
    pub timestamp: i64,
    pub value: Decimal,
}

impl Serialize for SamplePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Query APIs encode values as [epoch, "value"]; keep that shape
        // so saved artifacts stay interchangeable with raw query output.
        (self.timestamp, self.value.to_string()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SamplePoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        let (ts, value): (Raw, Raw) = Deserialize::deserialize(deserializer)?;
        let timestamp = match ts {
            Raw::Int(n) => n,
            Raw::Float(f) => f as i64,
            Raw::Text(s) => s.parse().map_err(DeError::custom)?,
        };
        let value = match value {
            Raw::Int(n) => Decimal::from(n),
            Raw::Float(f) => Decimal::from_f64_retain(f)
                .ok_or_else(|| DeError::custom(format!("value {f} is not representable")))?,
            Raw::Text(s) => s.parse().map_err(DeError::custom)?,
        };
        Ok(SamplePoint { timestamp, value })
    }
}

/// One series of a range-query result: a label set and its sampled values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub metric: BTreeMap<String, String>,
    pub values: Vec<SamplePoint>,
}

impl Series {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.metric.get(name).map(String::as_str)
    }
}

/// The raw-metrics artifact produced by one collection run: request series
/// for one date range plus the metadata needed to bill them later.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsBatch {
    pub cluster_name: String,
    /// Inclusive report start, `YYYY-MM-DD`.
    pub start_date: String,
    /// Inclusive report end, `YYYY-MM-DD`.
    pub end_date: String,
    #[serde(deserialize_with = "interval_from_number_or_string")]
    pub interval_minutes: u32,
    pub cpu_metrics: Vec<Series>,
    pub memory_metrics: Vec<Series>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpu_metrics: Vec<Series>,
}

// Older artifacts store the sampling step as a string.
fn interval_from_number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(DeError::custom),
    }
}
