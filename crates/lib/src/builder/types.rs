//! Outcomes and errors of full and incremental builds.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::descriptor::Descriptor;
use crate::insertable::InsertError;
use crate::levels::LevelError;
use crate::marker::MarkerError;
use crate::patch::PatchError;
use crate::report::ReportError;

/// Why an incremental build cannot guarantee a correct ROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
  NoReport,
  OutputRomMissing(PathBuf),
  ReportFormatChanged { found: u32, expected: u32 },
  /// The report exists but cannot be used.
  CorruptReport(String),
  BuildOrderChanged,
  RomSizeChanged { recorded: Option<u64>, configured: Option<u64> },
  ConfigurationChanged { key: String },
  ResourceChanged { path: PathBuf, descriptor: String },
  ImprintMissing { globule: String },
  CleanupFailed { globule: String },
  HijacksShrunk { descriptor: String, address: u64 },
  /// Level files present at the last build are gone; the editor cannot
  /// remove their levels from the ROM.
  LevelsRemoved { count: usize },
}

fn size(value: &Option<u64>) -> String {
  value.map(|v| format!("{:#X}", v)).unwrap_or_else(|| "unset".to_string())
}

impl fmt::Display for RebuildReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RebuildReason::NoReport => write!(f, "no build report found"),
      RebuildReason::OutputRomMissing(path) => write!(f, "no ROM found at {}", path.display()),
      RebuildReason::ReportFormatChanged { found, expected } => {
        write!(f, "build report format changed from {} to {}", found, expected)
      }
      RebuildReason::CorruptReport(message) => write!(f, "build report unusable: {}", message),
      RebuildReason::BuildOrderChanged => write!(f, "build order changed"),
      RebuildReason::RomSizeChanged { recorded, configured } => write!(
        f,
        "{} changed from {} to {}",
        crate::config::keys::ROM_SIZE,
        size(recorded),
        size(configured)
      ),
      RebuildReason::ConfigurationChanged { key } => write!(f, "value of {} changed", key),
      RebuildReason::ResourceChanged { path, descriptor } => {
        write!(f, "dependency {} of {} changed", path.display(), descriptor)
      }
      RebuildReason::ImprintMissing { globule } => write!(f, "imprint of globule {} is missing", globule),
      RebuildReason::CleanupFailed { globule } => write!(f, "failed to clean globule {}", globule),
      RebuildReason::HijacksShrunk { descriptor, address } => {
        write!(f, "hijacks of {} changed, ${:06X} is no longer written", descriptor, address)
      }
      RebuildReason::LevelsRemoved { count: 1 } => write!(f, "1 level file was removed"),
      RebuildReason::LevelsRemoved { count } => write!(f, "{} level files were removed", count),
    }
  }
}

#[derive(Debug, Error)]
pub enum BuildError {
  /// Incremental correctness cannot be guaranteed; run a full build.
  #[error("{0}, must rebuild")]
  MustRebuild(RebuildReason),

  #[error("failed to insert {descriptor}: {source}")]
  Insertion {
    descriptor: String,
    #[source]
    source: InsertError,
  },

  #[error("{0}")]
  ToolNotFound(String),

  #[error("no clean ROM found at {0}")]
  CleanRomMissing(PathBuf),

  #[error(transparent)]
  Report(#[from] ReportError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Marker(#[from] MarkerError),

  #[error(transparent)]
  Levels(#[from] LevelError),

  #[error(transparent)]
  Patch(PatchError),

  #[error("failed to access {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl BuildError {
  pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    BuildError::Io {
      path: path.into(),
      source,
    }
  }

  /// Wrap a failure of the unit labelled `descriptor`. Missing tools are
  /// fatal for the whole build and keep their own variant.
  pub fn insertion(descriptor: impl Into<String>, source: InsertError) -> Self {
    match source {
      InsertError::ToolNotFound { tool, path } => {
        BuildError::ToolNotFound(format!("{} not found at {}", tool, path.display()))
      }
      source => BuildError::Insertion {
        descriptor: descriptor.into(),
        source,
      },
    }
  }

  pub fn is_must_rebuild(&self) -> bool {
    matches!(self, BuildError::MustRebuild(_))
  }
}

impl From<RebuildReason> for BuildError {
  fn from(reason: RebuildReason) -> Self {
    BuildError::MustRebuild(reason)
  }
}

impl From<PatchError> for BuildError {
  fn from(e: PatchError) -> Self {
    match e {
      PatchError::EngineUnavailable => BuildError::ToolNotFound(e.to_string()),
      e => BuildError::Patch(e),
    }
  }
}

/// Result of a successful incremental build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickBuildOutcome {
  /// Everything was up to date; nothing was written.
  NoWork,
  Updated {
    reinserted: Vec<Descriptor>,
    /// False when dependency tracking was lost and the report was removed.
    report_retained: bool,
  },
}

/// Two patches writing the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchConflict {
  pub first: String,
  pub second: String,
  /// SNES address of the first shared byte.
  pub address: u64,
  pub length: u64,
}

/// Result of a successful full build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildOutcome {
  pub report_retained: bool,
  pub conflicts: Vec<PatchConflict>,
}
