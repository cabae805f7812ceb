use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::catalog::{Rates, SuCatalog, SU_UNKNOWN, SU_UNKNOWN_GPU, SU_UNKNOWN_MIG_GPU};
use crate::outage::BillableSegment;
use crate::sample::{PodKey, Snapshot};

const BYTES_PER_GIB: u64 = 1 << 30;

/// The resource whose multiplier drove a service unit determination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resource {
    Cpu,
    Gpu,
    Ram,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Cpu => "CPU",
            Resource::Gpu => "GPU",
            Resource::Ram => "RAM",
        })
    }
}

/// Result of classifying one usage interval.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceUnit {
    pub su_type: String,
    pub su_count: Decimal,
    pub determining_resource: Resource,
}

impl ServiceUnit {
    fn unknown_gpu() -> Self {
        ServiceUnit {
            su_type: SU_UNKNOWN_GPU.to_string(),
            su_count: Decimal::ZERO,
            determining_resource: Resource::Gpu,
        }
    }

    fn unknown() -> Self {
        ServiceUnit {
            su_type: SU_UNKNOWN.to_string(),
            su_count: Decimal::ZERO,
            determining_resource: Resource::Cpu,
        }
    }
}

/// Maps one resource snapshot onto a service unit type and count.
///
/// Total: every input combination yields a result, degrading to the
/// sentinel "unknown" types so billing can proceed conservatively. The
/// branch order is a fixed decision table; reordering it changes
/// historical invoice amounts.
pub fn classify(
    cpu: Decimal,
    memory_gib: Decimal,
    gpu_count: Decimal,
    gpu_type: Option<&str>,
    gpu_resource: Option<&str>,
    catalog: &SuCatalog,
) -> ServiceUnit {
    // A pod that requested a specific GPU but was never scheduled onto one
    // reports a GPU resource with a zero count.
    if gpu_resource.is_some() && gpu_count.is_zero() {
        return ServiceUnit::unknown_gpu();
    }

    // Pods in weird states.
    if cpu.is_zero() || memory_gib.is_zero() {
        return ServiceUnit::unknown();
    }

    let su_type: String = if gpu_resource.is_none() && gpu_count.is_zero() {
        catalog.cpu_su.clone()
    } else if gpu_type.is_some() && gpu_resource == Some(catalog.whole_gpu_resource.as_str()) {
        gpu_type
            .and_then(|model| catalog.whole_gpu_models.get(model))
            .cloned()
            .unwrap_or_else(|| SU_UNKNOWN_GPU.to_string())
    } else if let Some(su) =
        gpu_resource.and_then(|resource| catalog.passthrough_gpu_resources.get(resource))
    {
        // Passthrough resources name the device directly.
        su.clone()
    } else if gpu_type.is_some_and(|model| catalog.mig_capable_models.contains(model)) {
        // Partitioned GPUs are never billed at finer granularity than this,
        // whatever the partition geometry.
        SU_UNKNOWN_MIG_GPU.to_string()
    } else {
        return ServiceUnit::unknown_gpu();
    };

    let profile = catalog.profile(&su_type);
    if profile.vcpus <= Decimal::ZERO || profile.ram_gib <= Decimal::ZERO {
        // An unvalidated catalog must not panic the classifier.
        return ServiceUnit::unknown();
    }

    let cpu_multiplier = cpu / profile.vcpus;
    let gpu_multiplier = if profile.gpus > Decimal::ZERO {
        gpu_count / profile.gpus
    } else {
        // Structurally negative for non-GPU profiles so it never dominates.
        Decimal::NEGATIVE_ONE
    };
    let ram_multiplier = memory_gib / profile.ram_gib;

    let mut su_count = cpu_multiplier.max(gpu_multiplier).max(ram_multiplier);

    // No fractional units for GPU service units.
    if su_type != catalog.cpu_su {
        su_count = su_count.ceil();
    }

    let determining_resource = if gpu_multiplier >= cpu_multiplier && gpu_multiplier >= ram_multiplier {
        Resource::Gpu
    } else if cpu_multiplier >= gpu_multiplier && cpu_multiplier >= ram_multiplier {
        Resource::Cpu
    } else {
        Resource::Ram
    };

    ServiceUnit {
        su_type,
        su_count,
        determining_resource,
    }
}

/// Classifies a condensed snapshot, applying the absent-means-zero rule
/// and the bytes-to-GiB conversion for memory.
pub fn classify_snapshot(snapshot: &Snapshot, catalog: &SuCatalog) -> ServiceUnit {
    classify(
        snapshot.cpu_request.unwrap_or(Decimal::ZERO),
        memory_bytes_to_gib(snapshot.memory_request.unwrap_or(Decimal::ZERO)),
        snapshot.gpu_request.unwrap_or(Decimal::ZERO),
        snapshot.gpu_type.as_deref(),
        snapshot.gpu_resource.as_deref(),
        catalog,
    )
}

pub fn memory_bytes_to_gib(bytes: Decimal) -> Decimal {
    bytes / Decimal::from(BYTES_PER_GIB)
}

/// Seconds to exact decimal hours.
pub fn duration_hours(seconds: i64) -> Decimal {
    Decimal::from(seconds) / Decimal::from(3600)
}

fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Metadata shared by every invoice row of one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub report_month: String,
    pub report_start: DateTime<Utc>,
    pub report_end: DateTime<Utc>,
    pub cluster_name: String,
    pub generated_at: DateTime<Utc>,
}

/// One line of the per-project invoice.
#[derive(Clone, Debug, PartialEq)]
pub struct InvoiceRow {
    pub invoice_month: String,
    pub project: String,
    pub project_id: String,
    pub cluster_name: String,
    pub report_start: DateTime<Utc>,
    pub report_end: DateTime<Utc>,
    /// Whole hours, rounded up from the exact aggregate.
    pub su_hours: Decimal,
    pub su_type: String,
    pub rate: Decimal,
    /// `su_hours * rate`, rounded half-up to cents.
    pub cost: Decimal,
    pub generated_at: DateTime<Utc>,
}

/// Accumulates billable service-unit hours for one billing entity.
#[derive(Clone, Debug, Default)]
pub struct ProjectInvoice {
    pub project: String,
    pub project_id: String,
    su_hours: BTreeMap<String, Decimal>,
}

impl ProjectInvoice {
    pub fn new(project: impl Into<String>) -> Self {
        let project = project.into();
        Self {
            project_id: project.clone(),
            project,
            su_hours: BTreeMap::new(),
        }
    }

    /// Adds one billable segment's worth of usage. Hours stay exact
    /// decimals until row generation.
    pub fn add_usage(&mut self, su_type: &str, su_count: Decimal, hours: Decimal) {
        *self
            .su_hours
            .entry(su_type.to_string())
            .or_insert(Decimal::ZERO) += su_count * hours;
    }

    /// Exact accumulated hours for one service unit type, for tests and
    /// diagnostics.
    pub fn hours_for(&self, su_type: &str) -> Decimal {
        self.su_hours
            .get(su_type)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Emits one row per service unit type with non-zero accumulated
    /// hours. Hours are rounded up to whole hours first; money is rounded
    /// half-up to cents only here, never earlier.
    pub fn invoice_rows(&self, metadata: &ReportMetadata, rates: &Rates) -> Vec<InvoiceRow> {
        let mut rows = Vec::new();
        for (su_type, hours) in &self.su_hours {
            if *hours <= Decimal::ZERO {
                continue;
            }
            let hours = hours.ceil().normalize();
            let rate = rates.rate_for(su_type);
            let cost = round_half_up(rate * hours, 2);
            rows.push(InvoiceRow {
                invoice_month: metadata.report_month.clone(),
                project: self.project.clone(),
                project_id: self.project_id.clone(),
                cluster_name: metadata.cluster_name.clone(),
                report_start: metadata.report_start,
                report_end: metadata.report_end,
                su_hours: hours,
                su_type: su_type.clone(),
                rate,
                cost,
                generated_at: metadata.generated_at,
            });
        }
        rows
    }
}

/// One line of the per-pod usage report. Carries no money; it exists so
/// a project can audit which pod produced which service units.
#[derive(Clone, Debug, PartialEq)]
pub struct PodReportRow {
    pub namespace: String,
    pub pod: String,
    pub start: i64,
    pub end: i64,
    /// Hours, rounded half-up to four decimal places.
    pub duration_hours: Decimal,
    pub cpu_request: Decimal,
    pub gpu_request: Decimal,
    pub gpu_type: Option<String>,
    pub gpu_resource: Option<String>,
    pub node: Option<String>,
    pub node_model: Option<String>,
    /// GiB, rounded half-up to four decimal places.
    pub memory_gib: Decimal,
    pub service_unit: ServiceUnit,
}

impl PodReportRow {
    pub fn new(
        key: &PodKey,
        snapshot: &Snapshot,
        segment: BillableSegment,
        service_unit: ServiceUnit,
    ) -> Self {
        PodReportRow {
            namespace: key.namespace.clone(),
            pod: key.pod.clone(),
            start: segment.start,
            end: segment.start + segment.duration,
            duration_hours: round_half_up(duration_hours(segment.duration), 4),
            cpu_request: snapshot.cpu_request.unwrap_or(Decimal::ZERO),
            gpu_request: snapshot.gpu_request.unwrap_or(Decimal::ZERO),
            gpu_type: snapshot.gpu_type.clone(),
            gpu_resource: snapshot.gpu_resource.clone(),
            node: snapshot.node.clone(),
            node_model: snapshot.node_model.clone(),
            memory_gib: round_half_up(
                memory_bytes_to_gib(snapshot.memory_request.unwrap_or(Decimal::ZERO)),
                4,
            ),
            service_unit,
        }
    }
}
