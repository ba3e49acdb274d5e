//! Resources stored as BPS deltas against the clean ROM.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{InsertContext, InsertError, Insertable, require_resource};
use crate::config::{Configuration, keys};
use crate::dependency::{ConfigurationDependency, DependencyRecorder, Policy, ResourceDependency};
use crate::descriptor::{Descriptor, Kind};
use crate::editor::{EditorProcess, ExternalTool};

fn transfer_flag(kind: Kind) -> Option<&'static str> {
  let flag = match kind {
    Kind::Overworld => "-TransferOverworld",
    Kind::TitleScreen => "-TransferTitleScreen",
    Kind::Credits => "-TransferCredits",
    Kind::GlobalExAnimation => "-TransferLevelGlobalExAnim",
    _ => return None,
  };
  Some(flag)
}

fn flips(recorder: &mut DependencyRecorder, config: &Configuration) -> Result<ExternalTool, InsertError> {
  let path = recorder.register_path(config, keys::FLIPS, Policy::Rebuild).get()?.clone();
  Ok(ExternalTool::new("flips", path)?)
}

/// Resource transferred by the editor from a ROM materialized out of a BPS
/// patch.
pub struct BpsTransfer {
  descriptor: Descriptor,
  flag: &'static str,
  editor: EditorProcess,
  flips: ExternalTool,
  clean_rom: PathBuf,
  bps: PathBuf,
  recorder: DependencyRecorder,
}

impl BpsTransfer {
  pub fn new(config: &Configuration, kind: Kind) -> Result<Self, InsertError> {
    let flag = transfer_flag(kind)
      .ok_or_else(|| InsertError::Failed(format!("{} is not transferred from a BPS patch", kind)))?;
    let key = keys::resource_key(kind)
      .ok_or_else(|| InsertError::Failed(format!("{} has no configured source", kind)))?;

    let mut recorder = DependencyRecorder::new();
    let editor = recorder.register_path(config, keys::EDITOR, Policy::Reinsert).get()?.clone();
    let editor = EditorProcess::new(editor)?;
    let flips = flips(&mut recorder, config)?;
    let clean_rom = recorder.register_path(config, keys::CLEAN_ROM, Policy::Rebuild).get()?.clone();
    require_resource("clean ROM", &clean_rom)?;
    let bps = recorder.register_path(config, key, Policy::Reinsert).get()?.clone();
    require_resource(format!("{} BPS patch", kind), &bps)?;

    Ok(Self {
      descriptor: Descriptor::new(kind),
      flag,
      editor,
      flips,
      clean_rom,
      bps,
      recorder,
    })
  }

  /// `<rom stem>_<kind><ext>` next to the working ROM.
  fn scratch_rom(&self, rom: &Path) -> PathBuf {
    let stem = rom.file_stem().map(OsStr::to_string_lossy).unwrap_or_default();
    let suffix = self.descriptor.kind.label().to_lowercase().replace(' ', "_");
    let extension = rom.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    rom.with_file_name(format!("{}_{}{}", stem, suffix, extension))
  }
}

impl Insertable for BpsTransfer {
  fn descriptor(&self) -> &Descriptor {
    &self.descriptor
  }

  fn insert(&mut self, ctx: &mut InsertContext<'_>) -> Result<(), InsertError> {
    let kind = self.descriptor.kind;
    info!(descriptor = %kind, "inserting");

    let scratch = self.scratch_rom(ctx.rom);
    debug!(bps = %self.bps.display(), scratch = %scratch.display(), "materializing ROM from BPS patch");
    self.flips.run([
      OsStr::new("--apply"),
      self.bps.as_os_str(),
      self.clean_rom.as_os_str(),
      scratch.as_os_str(),
    ])?;

    let transferred = self.editor.run(self.flag, ctx.rom, &[scratch.as_path()]);

    if let Err(e) = fs::remove_file(&scratch) {
      warn!(path = %scratch.display(), error = %e, "failed to delete temporary ROM");
    }
    transferred?;

    info!(descriptor = %kind, "inserted");
    Ok(())
  }

  fn resource_dependencies(&self, _ctx: &InsertContext<'_>) -> Result<BTreeSet<ResourceDependency>, InsertError> {
    Ok(BTreeSet::from([
      ResourceDependency::capture(self.editor.path(), Policy::Rebuild),
      ResourceDependency::capture(self.flips.path(), Policy::Rebuild),
      ResourceDependency::capture(&self.clean_rom, Policy::Rebuild),
      ResourceDependency::capture(&self.bps, Policy::Reinsert),
    ]))
  }

  fn configuration_dependencies(&self) -> Vec<ConfigurationDependency> {
    self.recorder.dependencies().to_vec()
  }
}

/// BPS patch applied directly onto the working ROM, before anything else.
pub struct InitialPatch {
  descriptor: Descriptor,
  flips: ExternalTool,
  bps: PathBuf,
  recorder: DependencyRecorder,
}

impl InitialPatch {
  pub fn new(config: &Configuration) -> Result<Self, InsertError> {
    let mut recorder = DependencyRecorder::new();
    let flips = flips(&mut recorder, config)?;
    let bps = recorder
      .register_path(config, keys::INITIAL_PATCH, Policy::Rebuild)
      .get()?
      .clone();
    require_resource("initial patch", &bps)?;

    Ok(Self {
      descriptor: Descriptor::new(Kind::InitialPatch),
      flips,
      bps,
      recorder,
    })
  }
}

impl Insertable for InitialPatch {
  fn descriptor(&self) -> &Descriptor {
    &self.descriptor
  }

  fn insert(&mut self, ctx: &mut InsertContext<'_>) -> Result<(), InsertError> {
    info!(bps = %self.bps.display(), "applying initial patch");
    self
      .flips
      .run([OsStr::new("--apply"), self.bps.as_os_str(), ctx.rom.as_os_str()])?;
    Ok(())
  }

  fn resource_dependencies(&self, _ctx: &InsertContext<'_>) -> Result<BTreeSet<ResourceDependency>, InsertError> {
    Ok(BTreeSet::from([
      ResourceDependency::capture(self.flips.path(), Policy::Rebuild),
      ResourceDependency::capture(&self.bps, Policy::Rebuild),
    ]))
  }

  fn configuration_dependencies(&self) -> Vec<ConfigurationDependency> {
    self.recorder.dependencies().to_vec()
  }
}
