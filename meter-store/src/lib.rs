//! Object-store client for metering artifacts. Raw metrics batches and
//! finished reports land in S3-compatible buckets; credentials and
//! endpoints come from the environment so the binaries stay drop-in for
//! cron jobs.

use opendal::{services::S3, Operator};
use thiserror::Error;

pub const ENV_ENDPOINT: &str = "S3_OUTPUT_ENDPOINT_URL";
pub const ENV_ACCESS_KEY_ID: &str = "S3_OUTPUT_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "S3_OUTPUT_SECRET_ACCESS_KEY";
pub const ENV_REGION: &str = "S3_OUTPUT_REGION";
pub const ENV_INVOICE_BUCKET: &str = "S3_INVOICE_BUCKET";
pub const ENV_METRICS_BUCKET: &str = "S3_METRICS_BUCKET";

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_INVOICE_BUCKET: &str = "nerc-invoicing";
const DEFAULT_METRICS_BUCKET: &str = "openshift-metrics";

/// Error types for object store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Missing required environment variable: {0}")]
    MissingCredential(&'static str),

    #[error("Failed to read {path}: {source}")]
    ReadArtifact {
        path: String,
        source: std::io::Error,
    },

    #[error("Object store operation failed: {0}")]
    Backend(#[from] opendal::Error),
}

/// Which bucket a given artifact belongs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bucket {
    Invoices,
    Metrics,
}

impl Bucket {
    fn name(self) -> String {
        match self {
            Bucket::Invoices => std::env::var(ENV_INVOICE_BUCKET)
                .unwrap_or_else(|_| DEFAULT_INVOICE_BUCKET.to_string()),
            Bucket::Metrics => std::env::var(ENV_METRICS_BUCKET)
                .unwrap_or_else(|_| DEFAULT_METRICS_BUCKET.to_string()),
        }
    }
}

/// Handle on one bucket of the metering object store.
pub struct ObjectStore {
    operator: Operator,
    bucket: String,
}

impl ObjectStore {
    /// Builds a client for the given bucket from environment credentials.
    pub fn from_env(bucket: Bucket) -> Result<Self, StoreError> {
        let endpoint = require_env(ENV_ENDPOINT)?;
        let access_key_id = require_env(ENV_ACCESS_KEY_ID)?;
        let secret_access_key = require_env(ENV_SECRET_ACCESS_KEY)?;
        let region = std::env::var(ENV_REGION).unwrap_or_else(|_| DEFAULT_REGION.to_string());
        let bucket = bucket.name();

        let mut builder = S3::default();
        builder
            .endpoint(&endpoint)
            .bucket(&bucket)
            .region(&region)
            .access_key_id(&access_key_id)
            .secret_access_key(&secret_access_key);
        let operator = Operator::new(builder)?.finish();
        Ok(ObjectStore { operator, bucket })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Uploads raw bytes under the given key.
    pub async fn put(&self, key: &str, content: Vec<u8>) -> Result<(), StoreError> {
        let size = content.len();
        self.operator.write(key, content).await?;
        log::info!("uploaded {} bytes to s3://{}/{}", size, self.bucket, key);
        Ok(())
    }

    /// Uploads a local file under the given key.
    pub async fn upload_file(&self, path: &str, key: &str) -> Result<(), StoreError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|source| StoreError::ReadArtifact {
                path: path.to_string(),
                source,
            })?;
        self.put(key, content).await
    }
}

fn require_env(name: &'static str) -> Result<String, StoreError> {
    std::env::var(name).map_err(|_| StoreError::MissingCredential(name))
}
