//! Full and incremental ROM builds.
//!
//! Both builders write into a [`WorkingRom`] and only replace the output ROM
//! once every unit went in. [`QuickBuilder`] reuses the build report of the
//! last build to reinsert only the units whose dependencies changed;
//! [`Rebuilder`] starts over from the clean ROM.

mod quick;
mod rebuild;
mod types;
mod working_rom;

pub use quick::QuickBuilder;
pub use rebuild::Rebuilder;
pub use types::{BuildError, PatchConflict, QuickBuildOutcome, RebuildOutcome, RebuildReason};
pub use working_rom::WorkingRom;

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Configuration;
use crate::dependency::ResourceDependency;
use crate::descriptor::Kind;
use crate::insertable::{InsertContext, InsertError, Insertable};
use crate::levels::level_numbers;
use crate::marker::Marker;
use crate::paths::ProjectPaths;
use crate::report::{BuildReport, BuildReportStore};

/// Macro globules are called through, included by every imprint.
const GLOBULE_CALL_MACRO: &str = "includeonce\n\nmacro call(globule_label)\n\tPHB\n\t\
LDA.b #<globule_label>>>16\n\tPHA\n\tPLB\n\tJSL <globule_label>\n\tPLB\nendmacro\n";

/// Reset the imprint directory and make sure the project's cache structure
/// and the globule call file exist.
pub(crate) fn prepare(paths: &ProjectPaths) -> Result<(), BuildError> {
  debug!(root = %paths.root().display(), "preparing project directory");
  let imprints = paths.imprint_dir();
  match fs::remove_dir_all(&imprints) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(BuildError::io(imprints, e)),
  }
  for dir in [imprints, paths.inserted_globules_dir(), paths.temporary_dir()] {
    fs::create_dir_all(&dir).map_err(|e| BuildError::io(dir, e))?;
  }
  write_if_different(&paths.globule_call_file(), GLOBULE_CALL_MACRO)
}

/// Rewriting an unchanged file would bump its timestamp and trigger
/// reinsertion of everything that includes it.
fn write_if_different(path: &Path, contents: &str) -> Result<(), BuildError> {
  if fs::read_to_string(path).is_ok_and(|current| current == contents) {
    return Ok(());
  }
  fs::write(path, contents).map_err(|e| BuildError::io(path, e))
}

/// Where the working ROM lives: `output.temporary_rom` if configured,
/// otherwise the output's file name inside the project's temporary directory.
pub(crate) fn working_rom_path(config: &Configuration, paths: &ProjectPaths, output: &Path) -> PathBuf {
  let fallback = || paths.temporary_dir().join(output.file_name().unwrap_or_default());
  match config.temporary_rom().into_value() {
    Some(path) if path == output => {
      warn!(path = %path.display(), "temporary ROM is the output ROM, using the project's temporary directory");
      fallback()
    }
    Some(path) => path,
    None => fallback(),
  }
}

/// Levels in the configured levels folder when levels are part of the build.
pub(crate) fn inserted_levels(config: &Configuration) -> Result<BTreeSet<u16>, BuildError> {
  let builds_levels = config.build_order().iter().any(|d| d.kind == Kind::Levels);
  match config.resource(Kind::Levels).and_then(|dir| dir.into_value()) {
    Some(dir) if builds_levels => Ok(level_numbers(&dir)?),
    _ => Ok(BTreeSet::new()),
  }
}

/// Promote the imprints emitted during this build into the cache of
/// inserted globules.
fn cache_globules(paths: &ProjectPaths) -> Result<(), BuildError> {
  let source = paths.imprint_dir();
  let target = paths.inserted_globules_dir();
  if !source.exists() {
    return fs::create_dir_all(&target).map_err(|e| BuildError::io(target, e));
  }

  info!("caching globule imprints");
  match fs::remove_dir_all(&target) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(BuildError::io(target, e)),
  }
  fs::create_dir_all(&target).map_err(|e| BuildError::io(&target, e))?;

  for entry in WalkDir::new(&source).min_depth(1) {
    let entry = entry.map_err(|e| {
      let path = e.path().unwrap_or(&source).to_path_buf();
      BuildError::io(path, e.into())
    })?;
    let relative = entry.path().strip_prefix(&source).unwrap_or(entry.path());
    let destination = target.join(relative);
    if entry.file_type().is_dir() {
      fs::create_dir_all(&destination).map_err(|e| BuildError::io(&destination, e))?;
    } else {
      copy_keeping_mtime(entry.path(), &destination).map_err(|e| BuildError::io(&destination, e))?;
    }
  }

  fs::remove_dir_all(&source).map_err(|e| BuildError::io(source, e))
}

/// Copy a file and give the copy the last write time of `from`.
///
/// Imprints are included by other units and tracked through their
/// timestamps; carrying them between directories must not look like a change.
pub(crate) fn copy_keeping_mtime(from: &Path, to: &Path) -> io::Result<()> {
  fs::copy(from, to)?;
  let modified = fs::metadata(from)?.modified()?;
  fs::OpenOptions::new().write(true).open(to)?.set_modified(modified)
}

/// Stamp the working ROM, persist or drop the report, cache imprints and
/// replace the output ROM.
///
/// `report` is `None` when dependency tracking was lost during the build.
pub(crate) fn commit(
  paths: &ProjectPaths,
  mut working: WorkingRom,
  output: &Path,
  report: Option<&BuildReport>,
) -> Result<(), BuildError> {
  let store = BuildReportStore::for_project(paths);
  let rom = working.snapshot()?;
  Marker::stamp(rom)?;

  match report {
    Some(report) => store.persist(report)?,
    None => {
      store.remove();
      warn!(
        "dependency tracking is unavailable, quick builds are not set up correctly for this project; \
         the build report was removed"
      );
    }
  }

  cache_globules(paths)?;
  working.commit(output)
}

/// How one unit was inserted.
pub(crate) enum Inserted {
  /// Fresh resource dependencies of the insertion.
  Tracked(BTreeSet<ResourceDependency>),
  /// The unit went in without dependency capture.
  Untracked,
}

/// Insert `insertable`, capturing its dependencies unless `track` is false.
///
/// A unit whose dependency report is missing has still been written and
/// comes back as [`Inserted::Untracked`].
pub(crate) fn insert_unit(
  insertable: &mut dyn Insertable,
  ctx: &mut InsertContext<'_>,
  label: &str,
  track: bool,
) -> Result<Inserted, BuildError> {
  if !track {
    insertable.insert(ctx).map_err(|e| BuildError::insertion(label, e))?;
    insertable
      .discard_dependencies()
      .map_err(|e| BuildError::insertion(label, e))?;
    return Ok(Inserted::Untracked);
  }

  match insertable.insert_with_dependencies(ctx) {
    Ok(dependencies) => Ok(Inserted::Tracked(dependencies)),
    Err(InsertError::NoDependencyReportFound(path)) => {
      warn!(descriptor = %label, report = %path.display(), "no dependency report found, dependency tracking lost");
      Ok(Inserted::Untracked)
    }
    Err(e) => Err(BuildError::insertion(label, e)),
  }
}
