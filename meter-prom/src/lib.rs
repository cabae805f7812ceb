//! Collection side of the metering pipeline: range-queries a
//! Prometheus-compatible endpoint for resource requests, joins node and
//! pod labels onto the series, and saves the result as a dated batch
//! artifact for the invoicer.

pub mod client;
pub mod errors;
pub mod labels;
pub mod queries;
pub mod retry;

pub use client::PrometheusClient;
pub use errors::PromError;
pub use retry::{with_retry, RetryConfig};

/// Filename for one collection run's artifact.
pub fn artifact_name(start: chrono::NaiveDate, end: chrono::NaiveDate) -> String {
    if start == end {
        format!("metrics-{}.json", start.format("%Y-%m-%d"))
    } else {
        format!(
            "metrics-{}-to-{}.json",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        )
    }
}

/// Object-store key for a batch artifact, partitioned by month.
pub fn artifact_key(start: chrono::NaiveDate, file_name: &str) -> String {
    format!("data_{}/{}", start.format("%Y-%m"), file_name)
}
