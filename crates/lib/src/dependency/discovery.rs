use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{Policy, ResourceDependency};
use crate::paths::normalize;

#[derive(Debug, Error)]
pub enum DependencyError {
  #[error("no dependency report found at {0}")]
  NoReport(PathBuf),

  #[error("failed to read dependency report {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// The path itself, plus every entry below it when it is a directory.
pub fn resource_dependencies_for(path: &Path, policy: Policy) -> BTreeSet<ResourceDependency> {
  let mut dependencies = BTreeSet::new();
  dependencies.insert(ResourceDependency::capture(path, policy));

  if path.is_dir() {
    for entry in WalkDir::new(path).min_depth(1).into_iter().filter_map(Result::ok) {
      dependencies.insert(ResourceDependency::capture(entry.path(), policy));
    }
  }

  dependencies
}

/// Read a dependency report written by an external tool and delete it.
///
/// The report holds one path per line; relative paths are resolved against
/// the directory containing the report.
pub fn extract_dependencies_from_report(
  report_file: &Path,
  policy: Policy,
) -> Result<BTreeSet<ResourceDependency>, DependencyError> {
  let content = match fs::read_to_string(report_file) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      return Err(DependencyError::NoReport(report_file.to_path_buf()));
    }
    Err(source) => {
      return Err(DependencyError::Read {
        path: report_file.to_path_buf(),
        source,
      });
    }
  };

  let base = report_file.parent().unwrap_or_else(|| Path::new("."));
  let dependencies: BTreeSet<_> = content
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(|line| ResourceDependency::capture(normalize(Path::new(line), base), policy))
    .collect();

  if let Err(e) = fs::remove_file(report_file) {
    warn!(path = %report_file.display(), error = %e, "failed to remove dependency report");
  }

  debug!(
    path = %report_file.display(),
    count = dependencies.len(),
    "extracted dependencies from report"
  );
  Ok(dependencies)
}
