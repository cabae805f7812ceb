use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::Parser;

use meter_core::sample::MetricsBatch;
use meter_prom::{artifact_key, artifact_name, labels, queries, PrometheusClient, RetryConfig};
use meter_store::{Bucket, ObjectStore};

#[derive(Debug, Parser)]
#[command(name = "meter-collector", about = "Collect resource-request metrics into a batch artifact")]
struct Cli {
    /// Base URL of the Prometheus-compatible query endpoint
    #[clap(long, env = "PROMETHEUS_URL")]
    prometheus_url: String,

    /// Bearer token for the query endpoint
    #[clap(long, env = "PROMETHEUS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Cluster name recorded in the artifact
    #[clap(long, env = "CLUSTER_NAME")]
    cluster_name: String,

    /// First day to collect, YYYY-MM-DD (defaults to today)
    #[clap(long)]
    start_date: Option<NaiveDate>,

    /// Last day to collect, YYYY-MM-DD (defaults to start date)
    #[clap(long)]
    end_date: Option<NaiveDate>,

    /// Sampling step in minutes
    #[clap(long, default_value_t = 15)]
    interval_minutes: u32,

    /// Where to write the artifact (defaults to a dated name in cwd)
    #[clap(long)]
    output_file: Option<String>,

    /// Also upload the artifact to the metrics bucket
    #[clap(long)]
    upload_to_s3: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;
    let cli = Cli::parse();

    let start = cli.start_date.unwrap_or_else(|| Utc::now().date_naive());
    let end = cli.end_date.unwrap_or(start);
    if end < start {
        bail!("end date {} precedes start date {}", end, start);
    }
    if cli.interval_minutes == 0 {
        bail!("interval must be at least one minute");
    }

    let client = PrometheusClient::new(&cli.prometheus_url, cli.token.clone(), RetryConfig::default())?;

    let mut cpu_metrics = client
        .query_range(queries::CPU_REQUEST, start, end, cli.interval_minutes)
        .await
        .context("collecting CPU requests")?;
    let mut memory_metrics = client
        .query_range(queries::MEMORY_REQUEST, start, end, cli.interval_minutes)
        .await
        .context("collecting memory requests")?;
    let mut gpu_metrics = client
        .query_range_allow_empty(queries::GPU_REQUEST, start, end, cli.interval_minutes)
        .await
        .context("collecting GPU requests")?;

    let node_labels = client
        .query_range_allow_empty(queries::GPU_NODE_LABELS, start, end, cli.interval_minutes)
        .await
        .context("collecting GPU node labels")?;
    labels::merge_node_labels(&mut gpu_metrics, &node_labels);

    let pod_labels = client
        .query_range_allow_empty(queries::CLASS_POD_LABELS, start, end, cli.interval_minutes)
        .await
        .context("collecting pod class labels")?;
    labels::merge_pod_labels(&mut cpu_metrics, &pod_labels);
    labels::merge_pod_labels(&mut memory_metrics, &pod_labels);
    labels::merge_pod_labels(&mut gpu_metrics, &pod_labels);

    let batch = MetricsBatch {
        cluster_name: cli.cluster_name.clone(),
        start_date: start.format("%Y-%m-%d").to_string(),
        end_date: end.format("%Y-%m-%d").to_string(),
        interval_minutes: cli.interval_minutes,
        cpu_metrics,
        memory_metrics,
        gpu_metrics,
    };

    let file_name = artifact_name(start, end);
    let output_file = cli.output_file.clone().unwrap_or_else(|| file_name.clone());
    let encoded = serde_json::to_vec_pretty(&batch)?;
    tokio::fs::write(&output_file, &encoded)
        .await
        .with_context(|| format!("writing {}", output_file))?;
    log::info!("wrote {} series to {}", batch.cpu_metrics.len() + batch.memory_metrics.len() + batch.gpu_metrics.len(), output_file);

    if cli.upload_to_s3 {
        let store = ObjectStore::from_env(Bucket::Metrics)?;
        store.put(&artifact_key(start, &file_name), encoded).await?;
    }

    Ok(())
}
