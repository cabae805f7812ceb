use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::sample::{
    MetricsBatch, PodKey, PodRecord, Series, Snapshot, GPU_UNKNOWN_TYPE, LABEL_GPU_MACHINE,
    LABEL_GPU_PRODUCT, LABEL_POD_CLASS,
};

/// Which request series a batch of samples belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Cpu,
    Memory,
    Gpu,
}

/// Attributes whose change closes a condensed interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchedAttribute {
    CpuRequest,
    MemoryRequest,
    GpuRequest,
    GpuType,
}

/// The attributes watched for billing: resource requests plus the GPU
/// model, since a model change means a different service unit.
pub const BILLING_ATTRIBUTES: [WatchedAttribute; 4] = [
    WatchedAttribute::CpuRequest,
    WatchedAttribute::MemoryRequest,
    WatchedAttribute::GpuRequest,
    WatchedAttribute::GpuType,
];

impl WatchedAttribute {
    fn unchanged(self, a: &Snapshot, b: &Snapshot) -> bool {
        fn num(value: Option<Decimal>) -> Decimal {
            value.unwrap_or(Decimal::ZERO)
        }
        match self {
            WatchedAttribute::CpuRequest => num(a.cpu_request) == num(b.cpu_request),
            WatchedAttribute::MemoryRequest => num(a.memory_request) == num(b.memory_request),
            WatchedAttribute::GpuRequest => num(a.gpu_request) == num(b.gpu_request),
            WatchedAttribute::GpuType => a.gpu_type == b.gpu_type,
        }
    }
}

/// A maximal run of samples with identical watched attributes and no
/// temporal gap wider than the sampling step.
#[derive(Clone, Debug, PartialEq)]
pub struct UsageInterval {
    pub start: i64,
    /// Seconds; covers through the sampling step after the last sample.
    pub duration: i64,
    pub snapshot: Snapshot,
}

impl UsageInterval {
    pub fn end(&self) -> i64 {
        self.start + self.duration
    }
}

/// A pod's condensed usage: its intervals plus pod-level labels carried
/// through from merging.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CondensedPod {
    pub class_label: Option<String>,
    pub intervals: Vec<UsageInterval>,
}

/// Merges raw sample batches into per-pod timelines and condenses them
/// into billable intervals.
#[derive(Clone, Debug, Default)]
pub struct MetricsProcessor {
    interval_minutes: u32,
    pub merged: BTreeMap<PodKey, PodRecord>,
}

impl MetricsProcessor {
    pub fn new(interval_minutes: u32) -> Self {
        Self {
            interval_minutes,
            merged: BTreeMap::new(),
        }
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    /// Seconds between consecutive samples.
    pub fn step_seconds(&self) -> i64 {
        i64::from(self.interval_minutes) * 60
    }

    /// Merges one collection artifact. The batch must have been sampled
    /// with the same step as this processor.
    pub fn merge_batch(&mut self, batch: &MetricsBatch) -> Result<(), CoreError> {
        if batch.interval_minutes != self.interval_minutes {
            return Err(CoreError::IntervalMismatch {
                expected: self.interval_minutes,
                found: batch.interval_minutes,
            });
        }
        self.merge_series(RequestKind::Cpu, &batch.cpu_metrics);
        self.merge_series(RequestKind::Memory, &batch.memory_metrics);
        self.merge_series(RequestKind::Gpu, &batch.gpu_metrics);
        Ok(())
    }

    /// Inserts every (timestamp, value) fact from `series` under its pod.
    /// A later call for the same (pod, timestamp, attribute) wins; batches
    /// are expected to cover disjoint windows, so this is a safety net.
    pub fn merge_series(&mut self, kind: RequestKind, series: &[Series]) {
        for entry in series {
            let (Some(namespace), Some(pod)) = (entry.label("namespace"), entry.label("pod"))
            else {
                log::warn!("dropping series without pod identity: {:?}", entry.metric);
                continue;
            };
            let key = PodKey::new(namespace, pod);
            let node = entry.label("node").map(str::to_owned);

            // GPU label data rides along only on the GPU series; other
            // series must never clear it.
            let (gpu_type, gpu_resource, node_model) = match kind {
                RequestKind::Gpu => (
                    Some(
                        entry
                            .label(LABEL_GPU_PRODUCT)
                            .unwrap_or(GPU_UNKNOWN_TYPE)
                            .to_owned(),
                    ),
                    entry.label("resource").map(str::to_owned),
                    entry.label(LABEL_GPU_MACHINE).map(str::to_owned),
                ),
                _ => (None, None, None),
            };

            let record = self.merged.entry(key).or_default();
            if let Some(class) = entry.label(LABEL_POD_CLASS) {
                record.class_label = Some(class.to_owned());
            }

            for point in &entry.values {
                let snapshot = record.metrics.entry(point.timestamp).or_default();
                match kind {
                    RequestKind::Cpu => snapshot.cpu_request = Some(point.value),
                    RequestKind::Memory => snapshot.memory_request = Some(point.value),
                    RequestKind::Gpu => snapshot.gpu_request = Some(point.value),
                }
                if let Some(gpu_type) = &gpu_type {
                    snapshot.gpu_type = Some(gpu_type.clone());
                }
                if let Some(gpu_resource) = &gpu_resource {
                    snapshot.gpu_resource = Some(gpu_resource.clone());
                }
                if let Some(node_model) = &node_model {
                    snapshot.node_model = Some(node_model.clone());
                }
                if let Some(node) = &node {
                    snapshot.node = Some(node.clone());
                }
            }
        }
    }

    /// Compresses each pod's timeline into maximal runs of unchanged
    /// watched attributes. A run also closes on a gap wider than the
    /// sampling step, which is how a stopped-and-restarted pod shows up.
    pub fn condense(&self, watched: &[WatchedAttribute]) -> BTreeMap<PodKey, CondensedPod> {
        let step = self.step_seconds();
        let mut condensed = BTreeMap::new();

        for (key, record) in &self.merged {
            let mut samples = record.metrics.iter();
            let Some((&first_ts, first_snapshot)) = samples.next() else {
                continue;
            };

            let mut intervals = Vec::new();
            let mut anchor_ts = first_ts;
            let mut anchor = first_snapshot.clone();
            let mut prev_ts = first_ts;

            for (&ts, snapshot) in samples {
                let unchanged = watched.iter().all(|attr| attr.unchanged(&anchor, snapshot));
                let contiguous = ts - prev_ts <= step;
                if !unchanged || !contiguous {
                    intervals.push(UsageInterval {
                        start: anchor_ts,
                        duration: prev_ts - anchor_ts + step,
                        snapshot: std::mem::replace(&mut anchor, snapshot.clone()),
                    });
                    anchor_ts = ts;
                }
                prev_ts = ts;
            }
            intervals.push(UsageInterval {
                start: anchor_ts,
                duration: prev_ts - anchor_ts + step,
                snapshot: anchor,
            });

            condensed.insert(
                key.clone(),
                CondensedPod {
                    class_label: record.class_label.clone(),
                    intervals,
                },
            );
        }

        condensed
    }
}
