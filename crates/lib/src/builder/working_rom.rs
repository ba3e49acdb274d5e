use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::BuildError;

/// The ROM copy all insertions of one build are written into.
///
/// Nothing is copied until the first unit needs work. Dropping a snapshotted
/// working ROM deletes the copy, so the output is only ever replaced through
/// [`WorkingRom::commit`].
#[derive(Debug)]
pub enum WorkingRom {
  NotStarted { source: PathBuf, path: PathBuf },
  Snapshotted { path: PathBuf },
}

impl WorkingRom {
  /// Working copy of `source` to be created at `path`.
  pub fn new(source: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
    WorkingRom::NotStarted {
      source: source.into(),
      path: path.into(),
    }
  }

  pub fn is_started(&self) -> bool {
    matches!(self, WorkingRom::Snapshotted { .. })
  }

  pub fn path(&self) -> &Path {
    match self {
      WorkingRom::NotStarted { path, .. } | WorkingRom::Snapshotted { path } => path,
    }
  }

  /// Copy the source ROM on the first call. Returns the working ROM path.
  pub fn snapshot(&mut self) -> Result<&Path, BuildError> {
    if let WorkingRom::NotStarted { source, path } = self {
      let path = path.clone();
      if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
      }
      fs::copy(&*source, &path).map_err(|e| BuildError::io(&*source, e))?;
      info!(from = %source.display(), to = %path.display(), "created working ROM");
      *self = WorkingRom::Snapshotted { path };
    }
    Ok(self.path())
  }

  /// Atomically replace `output` with the working ROM and move companion
  /// files along, renamed to the output's stem.
  pub fn commit(self, output: &Path) -> Result<(), BuildError> {
    let WorkingRom::Snapshotted { path } = &self else {
      debug!("working ROM never created, nothing to commit");
      return Ok(());
    };

    let output_dir = parent_dir(output);
    fs::create_dir_all(output_dir).map_err(|e| BuildError::io(output_dir, e))?;

    let mut staged = NamedTempFile::new_in(output_dir).map_err(|e| BuildError::io(output_dir, e))?;
    let mut working = File::open(path).map_err(|e| BuildError::io(path, e))?;
    io::copy(&mut working, staged.as_file_mut()).map_err(|e| BuildError::io(staged.path(), e))?;
    staged
      .as_file()
      .sync_all()
      .map_err(|e| BuildError::io(staged.path(), e))?;
    staged.persist(output).map_err(|e| BuildError::io(output, e.error))?;

    move_companions(path, output)?;

    info!(output = %output.display(), "replaced output ROM");
    Ok(())
  }
}

impl Drop for WorkingRom {
  fn drop(&mut self) {
    if let WorkingRom::Snapshotted { path } = self {
      match fs::remove_file(&*path) {
        Ok(()) => debug!(path = %path.display(), "removed working ROM"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove working ROM"),
      }
    }
  }
}

fn parent_dir(path: &Path) -> &Path {
  path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or(Path::new("."))
}

/// Files next to the working ROM whose stem starts with its stem, such as
/// the editor's sidecar files.
fn move_companions(working: &Path, output: &Path) -> Result<(), BuildError> {
  let dir = parent_dir(working);
  let working_stem = working.file_stem().map(OsStr::to_string_lossy).unwrap_or_default();
  let output_stem = output.file_stem().map(OsStr::to_string_lossy).unwrap_or_default();
  let output_dir = parent_dir(output);

  let entries = fs::read_dir(dir).map_err(|e| BuildError::io(dir, e))?;
  for entry in entries.flatten() {
    let source = entry.path();
    if source == working || !source.is_file() {
      continue;
    }
    let stem = source.file_stem().map(OsStr::to_string_lossy).unwrap_or_default();
    if !stem.starts_with(working_stem.as_ref()) {
      continue;
    }

    let extension = source
      .extension()
      .map(|e| format!(".{}", e.to_string_lossy()))
      .unwrap_or_default();
    let target = output_dir.join(format!("{}{}", output_stem, extension));
    if target == output {
      continue;
    }

    debug!(from = %source.display(), to = %target.display(), "moving companion file");
    if fs::rename(&source, &target).is_err() {
      fs::copy(&source, &target).map_err(|e| BuildError::io(&target, e))?;
      if let Err(e) = fs::remove_file(&source) {
        warn!(path = %source.display(), error = %e, "failed to remove temporary file");
      }
    }
  }
  Ok(())
}
