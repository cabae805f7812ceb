//! Loads batch artifacts and merges them into one processor run.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use meter_core::processor::MetricsProcessor;
use meter_core::sample::MetricsBatch;

use crate::errors::ReportError;

/// Billing-period bounds derived from the loaded batches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunBounds {
    pub cluster_name: String,
    pub report_start: DateTime<Utc>,
    pub report_end: DateTime<Utc>,
    /// `YYYY-MM`, or a `YYYY-MM to YYYY-MM` range when the batches span
    /// months (which normally indicates a mis-assembled input set).
    pub report_month: String,
}

pub fn load_batches(paths: &[String]) -> Result<Vec<MetricsBatch>, ReportError> {
    if paths.is_empty() {
        return Err(ReportError::NoBatches);
    }
    let mut batches = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = std::fs::read(path).map_err(|source| ReportError::ReadFile {
            path: path.clone(),
            source,
        })?;
        let batch: MetricsBatch =
            serde_json::from_slice(&raw).map_err(|source| ReportError::ParseFile {
                path: path.clone(),
                source,
            })?;
        log::info!(
            "loaded {}: {} to {}, {} minute step",
            path,
            batch.start_date,
            batch.end_date,
            batch.interval_minutes
        );
        batches.push(batch);
    }
    Ok(batches)
}

/// Merges every batch into one processor. The first batch fixes the
/// sampling step; a later batch with a different step aborts the run,
/// naming the offending file.
pub fn merge_batches(
    batches: &[MetricsBatch],
    paths: &[String],
) -> Result<MetricsProcessor, ReportError> {
    let first = batches.first().ok_or(ReportError::NoBatches)?;
    let mut processor = MetricsProcessor::new(first.interval_minutes);
    for (batch, path) in batches.iter().zip(paths) {
        processor
            .merge_batch(batch)
            .map_err(|source| ReportError::BadBatch {
                path: path.clone(),
                source,
            })?;
    }
    Ok(processor)
}

/// Derives the billing-period bounds covered by the batches: earliest
/// start day through the end of the latest end day.
pub fn run_bounds(batches: &[MetricsBatch], paths: &[String]) -> Result<RunBounds, ReportError> {
    let first = batches.first().ok_or(ReportError::NoBatches)?;

    let mut start = parse_batch_date(&first.start_date, paths.first())?;
    let mut end = parse_batch_date(&first.end_date, paths.first())?;
    for (batch, path) in batches.iter().zip(paths).skip(1) {
        start = start.min(parse_batch_date(&batch.start_date, Some(path))?);
        end = end.max(parse_batch_date(&batch.end_date, Some(path))?);
    }

    let start_month = start.format("%Y-%m").to_string();
    let end_month = end.format("%Y-%m").to_string();
    let report_month = if start_month == end_month {
        start_month
    } else {
        log::warn!(
            "batches span multiple months: {} to {}",
            start_month,
            end_month
        );
        format!("{} to {}", start_month, end_month)
    };

    Ok(RunBounds {
        cluster_name: first.cluster_name.clone(),
        report_start: day_start(start),
        report_end: day_start(end.succ_opt().unwrap_or(end)),
        report_month,
    })
}

fn parse_batch_date(value: &str, path: Option<&String>) -> Result<NaiveDate, ReportError> {
    value
        .parse::<NaiveDate>()
        .map_err(|_| ReportError::BadBatchDate {
            path: path.cloned().unwrap_or_default(),
            value: value.to_string(),
        })
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
