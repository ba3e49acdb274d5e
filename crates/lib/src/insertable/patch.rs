use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use super::{InsertContext, InsertError, Insertable, require_resource};
use crate::config::{Configuration, keys};
use crate::dependency::{
  ConfigurationDependency, DependencyRecorder, Policy, ResourceDependency, extract_dependencies_from_report,
};
use crate::descriptor::Descriptor;
use crate::hijack::Hijack;
use crate::patch::{PatchRequest, PatchSource, WrittenBlock, apply_to_rom_file};

/// Name of the dependency report the assembler writes next to the patch.
pub(super) const DEPENDENCY_REPORT: &str = ".dependencies";

/// Remove a dependency report left over from an earlier run.
pub(super) fn remove_stale_report(dir: &Path) -> Result<(), InsertError> {
  let report = dir.join(DEPENDENCY_REPORT);
  match fs::remove_file(&report) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(InsertError::io(report, e)),
  }
}

/// An assembler patch applied from a file.
pub struct PatchFile {
  descriptor: Descriptor,
  path: PathBuf,
  label: String,
  include_paths: Vec<PathBuf>,
  recorder: DependencyRecorder,
  hijacks: Vec<Hijack>,
  written_blocks: Vec<WrittenBlock>,
}

impl PatchFile {
  pub fn new(config: &Configuration, path: &Path) -> Result<Self, InsertError> {
    let mut recorder = DependencyRecorder::new();
    let root = recorder.register_path(config, keys::PROJECT_ROOT, Policy::Rebuild);
    recorder.register(config, keys::INCLUDE_PATHS, Policy::Rebuild);

    let descriptor = Descriptor::patch(path);
    let label = descriptor.label(root.value().map(PathBuf::as_path).unwrap_or(Path::new("")));
    require_resource(label.clone(), path)?;

    Ok(Self {
      descriptor,
      path: path.to_path_buf(),
      label,
      include_paths: config.include_paths().into_value().unwrap_or_default(),
      recorder,
      hijacks: Vec::new(),
      written_blocks: Vec::new(),
    })
  }

  fn dir(&self) -> &Path {
    self.path.parent().unwrap_or(Path::new("."))
  }
}

impl Insertable for PatchFile {
  fn descriptor(&self) -> &Descriptor {
    &self.descriptor
  }

  fn insert(&mut self, ctx: &mut InsertContext<'_>) -> Result<(), InsertError> {
    info!(descriptor = %self.label, "applying patch");
    remove_stale_report(self.dir())?;

    let request = PatchRequest::new(PatchSource::File(self.path.clone()))
      .include_paths(self.include_paths.clone())
      .working_dir(self.dir());
    let output = apply_to_rom_file(ctx.patcher, &request, ctx.rom)?;

    self.hijacks = output.hijacks();
    self.written_blocks = output.written_blocks;
    info!(descriptor = %self.label, hijacks = self.hijacks.len(), "applied patch");
    Ok(())
  }

  fn resource_dependencies(&self, _ctx: &InsertContext<'_>) -> Result<BTreeSet<ResourceDependency>, InsertError> {
    let mut dependencies = extract_dependencies_from_report(&self.dir().join(DEPENDENCY_REPORT), Policy::Reinsert)?;
    dependencies.insert(ResourceDependency::capture(&self.path, Policy::Reinsert));
    Ok(dependencies)
  }

  fn discard_dependencies(&self) -> Result<(), InsertError> {
    remove_stale_report(self.dir())
  }

  fn configuration_dependencies(&self) -> Vec<ConfigurationDependency> {
    self.recorder.dependencies().to_vec()
  }

  fn hijacks(&self) -> &[Hijack] {
    &self.hijacks
  }

  fn written_blocks(&self) -> &[WrittenBlock] {
    &self.written_blocks
  }
}
