use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::patch::{DEPENDENCY_REPORT, remove_stale_report};
use super::{InsertContext, InsertError, Insertable, require_resource};
use crate::config::{Configuration, keys};
use crate::dependency::{
  ConfigurationDependency, DependencyRecorder, Policy, ResourceDependency, extract_dependencies_from_report,
};
use crate::descriptor::{Descriptor, Kind};
use crate::patch::{Label, PatchRequest, PatchSource, WARNING_NO_FREESPACE, apply_to_rom_file};
use crate::paths::ProjectPaths;

const PREAMBLE: &str = "warnings disable W1011\n\
warnings disable W1007\n\
if read1($00FFD5) == $23\n\
sa1rom\n\
else\n\
lorom\n\
endif\n";

/// Symbol prefix of a globule, derived from its file stem.
pub fn globule_name(path: &Path) -> String {
  path
    .file_stem()
    .map(|s| s.to_string_lossy().replace(' ', "_"))
    .unwrap_or_default()
}

/// Patch freeing every address recorded in an imprint.
///
/// Each line assigning an address (`name = $XXXXXX`) contributes one
/// `autoclean`; addresses assigned by several lines are freed once.
pub fn cleanup_patch(imprint: &str) -> String {
  let addresses: BTreeSet<u32> = imprint
    .lines()
    .filter(|line| line.contains('='))
    .filter_map(|line| line.rsplit_once('$'))
    .filter_map(|(_, hex)| u32::from_str_radix(hex.trim(), 16).ok())
    .collect();

  let mut patch = String::new();
  for address in addresses {
    let _ = writeln!(patch, "autoclean ${:06X}", address);
  }
  patch
}

/// Relocatable code block: assembled into free space, with its labels
/// exported to an imprint other code can include.
pub struct Globule {
  descriptor: Descriptor,
  path: PathBuf,
  name: String,
  label: String,
  header: Option<PathBuf>,
  include_paths: Vec<PathBuf>,
  other_globules: HashSet<String>,
  recorder: DependencyRecorder,
}

impl Globule {
  pub fn new(config: &Configuration, path: &Path) -> Result<Self, InsertError> {
    let mut recorder = DependencyRecorder::new();
    let root = recorder.register_path(config, keys::PROJECT_ROOT, Policy::Rebuild);
    let header = recorder
      .register_path(config, keys::GLOBULE_HEADER, Policy::Reinsert)
      .into_value();

    let descriptor = Descriptor::globule(path);
    let label = descriptor.label(root.value().map(PathBuf::as_path).unwrap_or(Path::new("")));
    require_resource(label.clone(), path)?;

    let name = globule_name(path);
    let other_globules = config
      .build_order()
      .into_iter()
      .filter(|d| d.kind == Kind::Globule)
      .filter_map(|d| d.name.as_deref().map(globule_name))
      .filter(|other| *other != name)
      .collect();

    Ok(Self {
      descriptor,
      path: path.to_path_buf(),
      name,
      label,
      header,
      include_paths: config.include_paths().into_value().unwrap_or_default(),
      other_globules,
      recorder,
    })
  }

  fn is_assembly(&self) -> bool {
    self.path.extension().is_some_and(|ext| ext == "asm")
  }

  fn dir(&self) -> &Path {
    self.path.parent().unwrap_or(Path::new("."))
  }

  fn patch_text(&self) -> String {
    let mut patch = String::from(PREAMBLE);
    if self.is_assembly() {
      if let Some(header) = &self.header {
        let _ = writeln!(patch, "incsrc \"{}\"\n", header.display());
      }
      let _ = writeln!(patch, "incsrc \"{}\"", self.path.display());
    } else {
      patch.push_str("freedata\n\n");
      let _ = writeln!(patch, "incbin \"{}\" -> {}", self.path.display(), self.name);
    }
    patch
  }

  /// Whether `label` was pulled in from another globule's imprint.
  fn is_foreign(&self, label: &str) -> bool {
    let prefix = label.split('_').next().unwrap_or(label);
    (self.other_globules.contains(label) || self.other_globules.contains(prefix)) && prefix != self.name
  }

  fn imprint(&self, labels: &[Label], paths: &ProjectPaths) -> Result<String, InsertError> {
    if labels.is_empty() {
      return Err(InsertError::Failed(format!(
        "{} contains no labels, its freespace could never be cleaned",
        self.label
      )));
    }

    let mut imprint = String::from("warnings disable W1007\n\n");
    let call_file = paths.globule_call_file();
    let _ = writeln!(imprint, "incsrc \"{}\"\n", call_file.to_string_lossy().replace('\\', "/"));

    if !self.is_assembly() {
      if labels.len() > 1 {
        return Err(InsertError::Failed(format!(
          "binary {} unexpectedly contains more than one label",
          self.label
        )));
      }
      let location = labels[0].location;
      let _ = writeln!(imprint, "{} = ${:06X}", self.name, location);
      let _ = writeln!(imprint, "!{} = ${:06X}", self.name, location);
      return Ok(imprint);
    }

    for label in labels {
      let name = label.name.as_str();
      if name.starts_with(':') || name.contains('.') || self.is_foreign(name) {
        continue;
      }
      let _ = writeln!(imprint, "{}_{} = ${:06X}", self.name, name, label.location);
      let _ = writeln!(imprint, "!{}_{} = ${:06X}", self.name, name, label.location);
    }
    Ok(imprint)
  }
}

impl Insertable for Globule {
  fn descriptor(&self) -> &Descriptor {
    &self.descriptor
  }

  fn insert(&mut self, ctx: &mut InsertContext<'_>) -> Result<(), InsertError> {
    info!(descriptor = %self.label, "inserting globule");
    remove_stale_report(self.dir())?;

    let request = PatchRequest::new(PatchSource::memory("temp.asm", self.patch_text()))
      .include_paths(self.include_paths.clone())
      .working_dir(self.dir());
    let output = apply_to_rom_file(ctx.patcher, &request, ctx.rom)?;

    if output.has_warning(WARNING_NO_FREESPACE) {
      return Err(InsertError::Failed(format!(
        "{} is missing a freespace command",
        self.label
      )));
    }

    let imprint = self.imprint(&output.labels, ctx.paths)?;
    let imprint_dir = ctx.paths.imprint_dir();
    fs::create_dir_all(&imprint_dir).map_err(|e| InsertError::io(&imprint_dir, e))?;
    let imprint_path = imprint_dir.join(ProjectPaths::imprint_file_name(&self.path));
    fs::write(&imprint_path, imprint).map_err(|e| InsertError::io(&imprint_path, e))?;

    debug!(descriptor = %self.label, imprint = %imprint_path.display(), "emitted imprint");
    info!(descriptor = %self.label, "inserted globule");
    Ok(())
  }

  fn resource_dependencies(&self, _ctx: &InsertContext<'_>) -> Result<BTreeSet<ResourceDependency>, InsertError> {
    if !self.is_assembly() {
      remove_stale_report(self.dir())?;
      return Ok(BTreeSet::from([ResourceDependency::capture(&self.path, Policy::Reinsert)]));
    }

    let mut dependencies = extract_dependencies_from_report(&self.dir().join(DEPENDENCY_REPORT), Policy::Reinsert)?;
    if let Some(header) = &self.header {
      dependencies.insert(ResourceDependency::capture(header, Policy::Reinsert));
    }
    dependencies.insert(ResourceDependency::capture(&self.path, Policy::Reinsert));
    Ok(dependencies)
  }

  fn discard_dependencies(&self) -> Result<(), InsertError> {
    remove_stale_report(self.dir())
  }

  fn configuration_dependencies(&self) -> Vec<ConfigurationDependency> {
    self.recorder.dependencies().to_vec()
  }
}
