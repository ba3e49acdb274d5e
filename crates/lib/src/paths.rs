//! Project-relative locations of everything the builders persist.
//!
//! # Layout
//!
//! ```text
//! <project_root>/.asteria/
//! ├── globules/                 # imprints emitted during the current build
//! ├── .cache/
//! │   ├── build_report.json     # BuildReport of the last successful build
//! │   ├── inserted_globules/    # imprints of the last committed build
//! │   └── call.asm              # globule call macro
//! └── tmp/                      # default working ROM location
//! ```

use std::path::{Path, PathBuf};

use crate::consts::APP_NAME;

const CACHE_DIR: &str = ".cache";
const IMPRINT_DIR: &str = "globules";
const INSERTED_GLOBULES_DIR: &str = "inserted_globules";
const BUILD_REPORT_FILENAME: &str = "build_report.json";
const GLOBULE_CALL_FILENAME: &str = "call.asm";
const TEMPORARY_DIR: &str = "tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
  root: PathBuf,
}

impl ProjectPaths {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// `<root>/.asteria`
  pub fn app_dir(&self) -> PathBuf {
    self.root.join(format!(".{}", APP_NAME))
  }

  pub fn cache_dir(&self) -> PathBuf {
    self.app_dir().join(CACHE_DIR)
  }

  pub fn build_report(&self) -> PathBuf {
    self.cache_dir().join(BUILD_REPORT_FILENAME)
  }

  /// Imprints written by globules inserted during the running build.
  pub fn imprint_dir(&self) -> PathBuf {
    self.app_dir().join(IMPRINT_DIR)
  }

  /// Imprints of the globules contained in the last committed ROM.
  pub fn inserted_globules_dir(&self) -> PathBuf {
    self.cache_dir().join(INSERTED_GLOBULES_DIR)
  }

  pub fn globule_call_file(&self) -> PathBuf {
    self.cache_dir().join(GLOBULE_CALL_FILENAME)
  }

  pub fn temporary_dir(&self) -> PathBuf {
    self.app_dir().join(TEMPORARY_DIR)
  }

  /// Imprint file name for a globule source, e.g. `math.asm` for `globules/math.bin`.
  pub fn imprint_file_name(globule: &Path) -> String {
    let stem = globule.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    format!("{}.asm", stem)
  }
}

/// Resolve `path` against `relative_to` unless it is already absolute, and
/// normalize it as far as the filesystem allows.
pub fn normalize(path: &Path, relative_to: &Path) -> PathBuf {
  let joined = if path.is_absolute() {
    path.to_path_buf()
  } else {
    relative_to.join(path)
  };
  dunce::canonicalize(&joined).unwrap_or(joined)
}
