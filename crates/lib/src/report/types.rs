use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::BUILD_REPORT_VERSION;
use crate::dependency::{ConfigurationDependency, ResourceDependency};
use crate::descriptor::Descriptor;
use crate::hijack::Hijack;

/// Dependency state of one unit as of the last successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReportEntry {
  pub descriptor: Descriptor,
  #[serde(default)]
  pub configuration_dependencies: Vec<ConfigurationDependency>,
  #[serde(default)]
  pub resource_dependencies: BTreeSet<ResourceDependency>,
  /// Only meaningful for patches.
  #[serde(default)]
  pub hijacks: Vec<Hijack>,
}

impl BuildReportEntry {
  pub fn new(descriptor: Descriptor) -> Self {
    Self {
      descriptor,
      configuration_dependencies: Vec::new(),
      resource_dependencies: BTreeSet::new(),
      hijacks: Vec::new(),
    }
  }
}

/// Snapshot of the last successful build.
///
/// `dependencies` is aligned with `build_order`: entry `i` describes unit `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
  pub file_format_version: u32,
  #[serde(default)]
  pub tool_version: String,
  pub rom_size: Option<u64>,
  pub build_order: Vec<Descriptor>,
  pub dependencies: Vec<BuildReportEntry>,
  /// Level numbers present in the levels folder when the ROM was built.
  #[serde(default)]
  pub inserted_levels: BTreeSet<u16>,
}

impl BuildReport {
  pub fn new(rom_size: Option<u64>, dependencies: Vec<BuildReportEntry>) -> Self {
    Self {
      file_format_version: BUILD_REPORT_VERSION,
      tool_version: env!("CARGO_PKG_VERSION").to_string(),
      rom_size,
      build_order: dependencies.iter().map(|e| e.descriptor.clone()).collect(),
      dependencies,
      inserted_levels: BTreeSet::new(),
    }
  }

  /// Whether every dependency entry sits at the position of its unit.
  pub fn is_aligned(&self) -> bool {
    self.build_order.len() == self.dependencies.len()
      && self
        .build_order
        .iter()
        .zip(&self.dependencies)
        .all(|(descriptor, entry)| *descriptor == entry.descriptor)
  }
}

/// Minimal view used to reject other format versions before a full parse.
#[derive(Debug, Deserialize)]
pub(super) struct VersionHeader {
  pub file_format_version: u32,
}

#[derive(Debug, Error)]
pub enum ReportError {
  #[error("build report not found: {0}")]
  NotFound(PathBuf),

  #[error("failed to read build report: {0}")]
  Read(#[source] io::Error),

  #[error("failed to parse build report: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("build report has format version {found}, expected {expected}")]
  UnsupportedVersion { found: u32, expected: u32 },

  #[error("build report lists {units} units but {entries} dependency entries")]
  Misaligned { units: usize, entries: usize },

  #[error("failed to serialize build report: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to create report directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to write build report: {0}")]
  Write(#[source] io::Error),
}
