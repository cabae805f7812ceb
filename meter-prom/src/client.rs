use std::time::Duration;

use chrono::NaiveDate;
use meter_core::sample::Series;
use serde::Deserialize;

use crate::errors::PromError;
use crate::retry::{with_retry, RetryConfig};

/// Wire shape of a successful range-query response.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: QueryData,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    result: Vec<Series>,
}

/// Client for a Prometheus-compatible range-query endpoint.
pub struct PrometheusClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retry: RetryConfig,
}

impl PrometheusClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        retry: RetryConfig,
    ) -> Result<Self, PromError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()?;
        Ok(PrometheusClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            retry,
        })
    }

    /// Runs one range query over whole days `[start, end]` at the given
    /// step, retrying transient failures. Step granularity matches the
    /// sampling interval the billing engine condenses at.
    pub async fn query_range(
        &self,
        query: &str,
        start: NaiveDate,
        end: NaiveDate,
        step_minutes: u32,
    ) -> Result<Vec<Series>, PromError> {
        let url = format!("{}/api/v1/query_range", self.base_url);
        let start_param = format!("{}T00:00:00Z", start.format("%Y-%m-%d"));
        let end_param = format!("{}T23:59:59Z", end.format("%Y-%m-%d"));
        let step_param = format!("{}m", step_minutes);

        log::info!("querying {} from {} to {}", query, start_param, end_param);
        let series = with_retry(
            || async {
                let mut request = self.http.get(&url).query(&[
                    ("query", query),
                    ("start", start_param.as_str()),
                    ("end", end_param.as_str()),
                    ("step", step_param.as_str()),
                ]);
                if let Some(token) = &self.token {
                    request = request.bearer_auth(token);
                }
                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(PromError::QueryFailed { status, body });
                }
                let parsed: QueryResponse = response.json().await?;
                Ok(parsed.data.result)
            },
            &self.retry,
        )
        .await?;

        if series.is_empty() {
            return Err(PromError::EmptyResult(query.to_string()));
        }
        log::info!("query matched {} series", series.len());
        Ok(series)
    }

    /// As `query_range`, but an empty result is a normal outcome. GPU
    /// and label queries match nothing on clusters without those nodes.
    pub async fn query_range_allow_empty(
        &self,
        query: &str,
        start: NaiveDate,
        end: NaiveDate,
        step_minutes: u32,
    ) -> Result<Vec<Series>, PromError> {
        match self.query_range(query, start, end, step_minutes).await {
            Ok(series) => Ok(series),
            Err(PromError::EmptyResult(_)) => {
                log::info!("query matched no series: {}", query);
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_decodes_prometheus_matrix_shape() {
        let raw = r#"{
            "status": "success",
            "data": {
                "resultType": "matrix",
                "result": [
                    {
                        "metric": {
                            "namespace": "namespace1",
                            "pod": "pod1",
                            "resource": "cpu",
                            "node": "wrk-1"
                        },
                        "values": [[1672531200, "2"], [1672532100, "2"]]
                    }
                ]
            }
        }"#;
        let parsed: QueryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.result.len(), 1);
        let series = &parsed.data.result[0];
        assert_eq!(series.label("namespace"), Some("namespace1"));
        assert_eq!(series.values.len(), 2);
        assert_eq!(series.values[0].timestamp, 1672531200);
    }
}
