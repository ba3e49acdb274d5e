//! Build report persistence.
//!
//! The report lives at `<project_root>/.asteria/.cache/build_report.json` and
//! is replaced atomically (write to a sibling temp file, then rename).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::types::{BuildReport, ReportError, VersionHeader};
use crate::consts::BUILD_REPORT_VERSION;
use crate::paths::ProjectPaths;

#[derive(Debug, Clone)]
pub struct BuildReportStore {
  path: PathBuf,
}

impl BuildReportStore {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }

  pub fn for_project(paths: &ProjectPaths) -> Self {
    Self::new(paths.build_report())
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.path.is_file()
  }

  /// Load and validate the stored report.
  ///
  /// A report written by another format version is rejected before its body
  /// is interpreted.
  pub fn load(&self) -> Result<BuildReport, ReportError> {
    let content = fs::read_to_string(&self.path).map_err(|e| {
      if e.kind() == io::ErrorKind::NotFound {
        ReportError::NotFound(self.path.clone())
      } else {
        ReportError::Read(e)
      }
    })?;

    let header: VersionHeader = serde_json::from_str(&content).map_err(ReportError::Parse)?;
    if header.file_format_version != BUILD_REPORT_VERSION {
      return Err(ReportError::UnsupportedVersion {
        found: header.file_format_version,
        expected: BUILD_REPORT_VERSION,
      });
    }

    let report: BuildReport = serde_json::from_str(&content).map_err(ReportError::Parse)?;
    if !report.is_aligned() {
      return Err(ReportError::Misaligned {
        units: report.build_order.len(),
        entries: report.dependencies.len(),
      });
    }

    debug!(path = %self.path.display(), units = report.build_order.len(), "loaded build report");
    Ok(report)
  }

  pub fn persist(&self, report: &BuildReport) -> Result<(), ReportError> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent).map_err(ReportError::CreateDir)?;
    }

    let temp_path = self.path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(report).map_err(ReportError::Serialize)?;
    fs::write(&temp_path, &content).map_err(ReportError::Write)?;
    fs::rename(&temp_path, &self.path).map_err(ReportError::Write)?;

    debug!(path = %self.path.display(), "persisted build report");
    Ok(())
  }

  /// Delete the report. A missing report is fine; other failures are logged.
  pub fn remove(&self) {
    match fs::remove_file(&self.path) {
      Ok(()) => debug!(path = %self.path.display(), "removed build report"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove build report"),
    }
  }
}
