//! Loads the externally supplied billing configuration: the service
//! unit catalog, the rate sheet, and any outage windows to exclude.

use meter_core::catalog::{Rates, SuCatalog};
use meter_core::outage::{parse_ignore_windows, IgnoreWindow};

use crate::errors::ReportError;

pub fn load_catalog(path: &str) -> Result<SuCatalog, ReportError> {
    let catalog: SuCatalog = read_json(path)?;
    catalog.validate()?;
    Ok(catalog)
}

pub fn load_rates(path: &str, catalog: &SuCatalog) -> Result<Rates, ReportError> {
    let rates: Rates = read_json(path)?;
    rates.validate(catalog)?;
    Ok(rates)
}

/// Ignore windows come from the CLI (or its environment fallback) as a
/// comma-separated list of `start/end` RFC 3339 pairs; absent means no
/// outage happened during the billing period.
pub fn load_ignore_windows(raw: Option<&str>) -> Result<Vec<IgnoreWindow>, ReportError> {
    match raw {
        Some(raw) => Ok(parse_ignore_windows(raw)?),
        None => Ok(Vec::new()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, ReportError> {
    let raw = std::fs::read(path).map_err(|source| ReportError::ReadFile {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| ReportError::ParseFile {
        path: path.to_string(),
        source,
    })
}
