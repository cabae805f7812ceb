//! Renders the computed rows as the CSV artifacts downstream billing
//! ingests. Column order and header text are a stable interface;
//! changing them breaks the importer on the receiving side.

use std::collections::BTreeMap;
use std::io;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use meter_core::catalog::Rates;
use meter_core::invoice::{InvoiceRow, PodReportRow, ProjectInvoice, ReportMetadata};

use crate::errors::ReportError;

const POD_REPORT_HEADER: [&str; 15] = [
    "Namespace",
    "Pod Start Time",
    "Pod End Time",
    "Duration (Hours)",
    "Pod Name",
    "CPU Request",
    "GPU Request",
    "GPU Type",
    "GPU Resource",
    "Node",
    "Node Model",
    "Memory Request (GiB)",
    "Determining Resource",
    "SU Type",
    "SU Count",
];

const INVOICE_HEADER: [&str; 16] = [
    "Invoice Month",
    "Report Start Time",
    "Report End Time",
    "Project - Allocation",
    "Project - Allocation ID",
    "Manager (PI)",
    "Cluster Name",
    "Invoice Email",
    "Invoice Address",
    "Institution",
    "Institution - Specific Code",
    "SU Hours (GBhr or SUhr)",
    "SU Type",
    "Rate",
    "Cost",
    "Generated At",
];

const UNKNOWN_NODE: &str = "Unknown Node";
const UNKNOWN_MODEL: &str = "Unknown Model";

fn format_epoch(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

fn format_instant(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

fn plain(value: Decimal) -> String {
    value.normalize().to_string()
}

/// One row per billable pod segment.
pub fn write_pod_report<W: io::Write>(
    rows: &[PodReportRow],
    out: W,
) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(POD_REPORT_HEADER)?;
    for row in rows {
        let start = format_epoch(row.start);
        let end = format_epoch(row.end);
        let duration = format!("{:.4}", row.duration_hours);
        let cpu = plain(row.cpu_request);
        let gpu = plain(row.gpu_request);
        let memory = format!("{:.4}", row.memory_gib);
        let determining = row.service_unit.determining_resource.to_string();
        let su_count = plain(row.service_unit.su_count);
        writer.write_record([
            row.namespace.as_str(),
            start.as_str(),
            end.as_str(),
            duration.as_str(),
            row.pod.as_str(),
            cpu.as_str(),
            gpu.as_str(),
            row.gpu_type.as_deref().unwrap_or(""),
            row.gpu_resource.as_deref().unwrap_or(""),
            row.node.as_deref().unwrap_or(UNKNOWN_NODE),
            row.node_model.as_deref().unwrap_or(UNKNOWN_MODEL),
            memory.as_str(),
            determining.as_str(),
            row.service_unit.su_type.as_str(),
            su_count.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// One row per (billing entity, service unit type) with non-zero hours,
/// in entity order.
pub fn write_invoice<W: io::Write>(
    invoices: &BTreeMap<String, ProjectInvoice>,
    metadata: &ReportMetadata,
    rates: &Rates,
    out: W,
) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(INVOICE_HEADER)?;
    for invoice in invoices.values() {
        for row in invoice.invoice_rows(metadata, rates) {
            write_invoice_row(&mut writer, &row)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn write_invoice_row<W: io::Write>(
    writer: &mut csv::Writer<W>,
    row: &InvoiceRow,
) -> Result<(), ReportError> {
    let report_start = format_instant(row.report_start);
    let report_end = format_instant(row.report_end);
    let su_hours = plain(row.su_hours);
    let rate = plain(row.rate);
    let cost = format!("{:.2}", row.cost);
    let generated_at = format_instant(row.generated_at);
    writer.write_record([
        row.invoice_month.as_str(),
        report_start.as_str(),
        report_end.as_str(),
        row.project.as_str(),
        row.project_id.as_str(),
        "",
        row.cluster_name.as_str(),
        "",
        "",
        "",
        "",
        su_hours.as_str(),
        row.su_type.as_str(),
        rate.as_str(),
        cost.as_str(),
        generated_at.as_str(),
    ])?;
    Ok(())
}

pub fn write_pod_report_file(rows: &[PodReportRow], path: &str) -> Result<(), ReportError> {
    let file = std::fs::File::create(path)?;
    write_pod_report(rows, file)?;
    log::info!("wrote {} pod rows to {}", rows.len(), path);
    Ok(())
}

pub fn write_invoice_file(
    invoices: &BTreeMap<String, ProjectInvoice>,
    metadata: &ReportMetadata,
    rates: &Rates,
    path: &str,
) -> Result<(), ReportError> {
    let file = std::fs::File::create(path)?;
    write_invoice(invoices, metadata, rates, file)?;
    log::info!("wrote invoices for {} entities to {}", invoices.len(), path);
    Ok(())
}
