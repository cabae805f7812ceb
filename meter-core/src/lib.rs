//! Pure billing engine: merges raw resource samples into condensed usage
//! intervals, classifies them into service units, subtracts outage
//! windows, and aggregates decimal-exact invoices. No I/O lives here;
//! artifact loading, report writing, and uploads are the callers' job.

pub mod aggregate;
pub mod catalog;
pub mod errors;
pub mod invoice;
pub mod outage;
pub mod processor;
pub mod sample;

pub use aggregate::{class_invoices, namespace_invoices, pod_report};
pub use catalog::{Rates, SuCatalog, SuProfile};
pub use errors::CoreError;
pub use invoice::{
    classify, classify_snapshot, duration_hours, InvoiceRow, PodReportRow, ProjectInvoice,
    ReportMetadata, Resource, ServiceUnit,
};
pub use outage::{parse_ignore_windows, subtract_ignore_windows, BillableSegment, IgnoreWindow};
pub use processor::{
    CondensedPod, MetricsProcessor, UsageInterval, WatchedAttribute, BILLING_ATTRIBUTES,
};
pub use sample::{MetricsBatch, PodKey, PodRecord, SamplePoint, Series, Snapshot};
