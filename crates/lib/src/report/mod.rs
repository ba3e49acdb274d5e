//! Persisted snapshot of the last successful build.

mod storage;
mod types;

pub use storage::BuildReportStore;
pub use types::{BuildReport, BuildReportEntry, ReportError};
