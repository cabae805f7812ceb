use std::collections::HashSet;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;

use meter_core::invoice::ReportMetadata;
use meter_core::processor::BILLING_ATTRIBUTES;
use meter_core::{class_invoices, namespace_invoices, pod_report};
use meter_report::{config, loader, reports};
use meter_store::{Bucket, ObjectStore};

#[derive(Debug, Parser)]
#[command(name = "meter-invoicer", about = "Generate invoices from collected metrics batches")]
struct Cli {
    /// Batch artifact files, in any order
    #[clap(required = true)]
    files: Vec<String>,

    /// Service unit catalog (JSON)
    #[clap(long)]
    su_definitions: String,

    /// Hourly rates per service unit type (JSON)
    #[clap(long)]
    rates: String,

    /// Outage windows to exclude, `start/end` RFC 3339 pairs, comma separated
    #[clap(long, env = "IGNORE_HOURS")]
    ignore_hours: Option<String>,

    /// Namespaces billed per class label instead of per namespace
    #[clap(long, value_delimiter = ',')]
    namespaces_with_classes: Vec<String>,

    /// Where to write the invoice CSV
    #[clap(long)]
    invoice_file: Option<String>,

    /// Where to write the per-pod usage CSV
    #[clap(long)]
    pod_report_file: Option<String>,

    /// Where to write the class-billing invoice CSV
    #[clap(long)]
    class_invoice_file: Option<String>,

    /// Also upload the reports to the invoice bucket
    #[clap(long)]
    upload_to_s3: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;
    let cli = Cli::parse();

    let catalog = config::load_catalog(&cli.su_definitions)?;
    let rates = config::load_rates(&cli.rates, &catalog)?;
    let windows = config::load_ignore_windows(cli.ignore_hours.as_deref())?;

    let batches = loader::load_batches(&cli.files)?;
    let bounds = loader::run_bounds(&batches, &cli.files)?;
    let processor = loader::merge_batches(&batches, &cli.files)?;
    let condensed = processor.condense(&BILLING_ATTRIBUTES);
    log::info!(
        "condensed {} pods for {} ({})",
        condensed.len(),
        bounds.report_month,
        bounds.cluster_name
    );

    let metadata = ReportMetadata {
        report_month: bounds.report_month.clone(),
        report_start: bounds.report_start,
        report_end: bounds.report_end,
        cluster_name: bounds.cluster_name.clone(),
        generated_at: Utc::now(),
    };

    let month = &bounds.report_month;
    let pod_report_file = cli
        .pod_report_file
        .clone()
        .unwrap_or_else(|| format!("pod-report-{month}.csv"));
    let invoice_file = cli
        .invoice_file
        .clone()
        .unwrap_or_else(|| format!("invoice-{month}.csv"));

    let rows = pod_report(&condensed, &catalog, &windows);
    reports::write_pod_report_file(&rows, &pod_report_file)?;

    let invoices = namespace_invoices(&condensed, &catalog, &windows);
    reports::write_invoice_file(&invoices, &metadata, &rates, &invoice_file)?;

    let class_invoice_file = if cli.namespaces_with_classes.is_empty() {
        None
    } else {
        let class_namespaces: HashSet<String> =
            cli.namespaces_with_classes.iter().cloned().collect();
        let by_class = class_invoices(&condensed, &catalog, &windows, &class_namespaces);
        let path = cli
            .class_invoice_file
            .clone()
            .unwrap_or_else(|| format!("class-invoice-{month}.csv"));
        reports::write_invoice_file(&by_class, &metadata, &rates, &path)?;
        Some(path)
    };

    if cli.upload_to_s3 {
        let store = ObjectStore::from_env(Bucket::Invoices)?;
        let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();

        // The primary copy is what billing imports; the timestamped
        // archive copies keep every generation of a month's reports.
        upload(&store, &invoice_file, month, "Service Invoices", None).await?;
        upload(&store, &invoice_file, month, "Archive", Some(timestamp.as_str())).await?;
        upload(&store, &pod_report_file, month, "Archive", Some(timestamp.as_str())).await?;
        if let Some(path) = &class_invoice_file {
            upload(&store, path, month, "Service Invoices", None).await?;
            upload(&store, path, month, "Archive", Some(timestamp.as_str())).await?;
        }
    }

    Ok(())
}

async fn upload(
    store: &ObjectStore,
    path: &str,
    month: &str,
    folder: &str,
    timestamp: Option<&str>,
) -> anyhow::Result<()> {
    let file_name = std::path::Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path);
    let file_name = match timestamp {
        Some(timestamp) => {
            let stem = file_name.strip_suffix(".csv").unwrap_or(file_name);
            format!("{stem} {timestamp}.csv")
        }
        None => file_name.to_string(),
    };
    let key = format!("Invoices/{month}/{folder}/{file_name}");
    store
        .upload_file(path, &key)
        .await
        .with_context(|| format!("uploading {path}"))?;
    Ok(())
}
