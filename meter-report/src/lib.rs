//! Invoicing side of the metering pipeline: loads batch artifacts,
//! condenses and classifies usage through `meter-core`, and renders the
//! CSV reports billing ingests.

pub mod config;
pub mod errors;
pub mod loader;
pub mod reports;

pub use errors::ReportError;
pub use loader::{load_batches, merge_batches, run_bounds, RunBounds};
