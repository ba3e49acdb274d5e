use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::{InsertContext, InsertError, Insertable, require_resource};
use crate::config::{Configuration, keys};
use crate::dependency::{
  ConfigurationDependency, DependencyRecorder, Policy, ResourceDependency, resource_dependencies_for,
};
use crate::descriptor::{Descriptor, Kind};
use crate::editor::EditorProcess;

/// How the editor picks up a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Import {
  /// `<editor> <flag> <rom> <source>`
  File(&'static str),
  /// The editor reads the folder named `dir` next to the ROM:
  /// `<editor> <flag> <rom>`.
  Folder { flag: &'static str, dir: &'static str },
}

fn import_for(kind: Kind) -> Option<Import> {
  let import = match kind {
    Kind::SharedPalettes => Import::File("-ImportSharedPalette"),
    Kind::Map16 => Import::File("-ImportAllMap16"),
    Kind::Levels => Import::File("-ImportMultLevels"),
    Kind::TitleMoves => Import::File("-ImportTitleMoves"),
    Kind::Graphics => Import::Folder {
      flag: "-ImportGFX",
      dir: "Graphics",
    },
    Kind::ExGraphics => Import::Folder {
      flag: "-ImportExGFX",
      dir: "ExGraphics",
    },
    _ => return None,
  };
  Some(import)
}

/// A static resource imported by the editor from a project file or folder.
pub struct EditorResource {
  descriptor: Descriptor,
  import: Import,
  editor: EditorProcess,
  source: PathBuf,
  recorder: DependencyRecorder,
}

impl EditorResource {
  pub fn new(config: &Configuration, kind: Kind) -> Result<Self, InsertError> {
    let import = import_for(kind)
      .ok_or_else(|| InsertError::Failed(format!("{} is not imported through the editor", kind)))?;
    let key = keys::resource_key(kind)
      .ok_or_else(|| InsertError::Failed(format!("{} has no configured source", kind)))?;

    let mut recorder = DependencyRecorder::new();
    let editor = recorder.register_path(config, keys::EDITOR, Policy::Reinsert).get()?.clone();
    let editor = EditorProcess::new(editor)?;
    let source = recorder.register_path(config, key, Policy::Reinsert).get()?.clone();
    require_resource(kind.label(), &source)?;

    Ok(Self {
      descriptor: Descriptor::new(kind),
      import,
      editor,
      source,
      recorder,
    })
  }
}

/// Mirror the contents of `from` into `to`, creating directories as needed.
fn stage_folder(from: &Path, to: &Path) -> Result<(), InsertError> {
  for entry in WalkDir::new(from).min_depth(1) {
    let entry = entry.map_err(|e| {
      let path = e.path().unwrap_or(from).to_path_buf();
      InsertError::io(path, e.into())
    })?;
    let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
    let target = to.join(relative);
    if entry.file_type().is_dir() {
      fs::create_dir_all(&target).map_err(|e| InsertError::io(&target, e))?;
    } else {
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| InsertError::io(parent, e))?;
      }
      fs::copy(entry.path(), &target).map_err(|e| InsertError::io(&target, e))?;
    }
  }
  Ok(())
}

impl Insertable for EditorResource {
  fn descriptor(&self) -> &Descriptor {
    &self.descriptor
  }

  fn insert(&mut self, ctx: &mut InsertContext<'_>) -> Result<(), InsertError> {
    let kind = self.descriptor.kind;
    info!(descriptor = %kind, "inserting");

    match self.import {
      Import::File(flag) => self.editor.run(flag, ctx.rom, &[self.source.as_path()])?,
      Import::Folder { flag, dir } => {
        let rom_dir = ctx.rom.parent().unwrap_or(Path::new("."));
        let staged = rom_dir.join(dir);
        if staged != self.source {
          debug!(from = %self.source.display(), to = %staged.display(), "staging folder next to ROM");
          stage_folder(&self.source, &staged)?;
        }
        self.editor.run(flag, ctx.rom, &[])?;
      }
    }

    info!(descriptor = %kind, "inserted");
    Ok(())
  }

  fn resource_dependencies(&self, _ctx: &InsertContext<'_>) -> Result<BTreeSet<ResourceDependency>, InsertError> {
    let mut dependencies = resource_dependencies_for(&self.source, Policy::Reinsert);
    dependencies.insert(ResourceDependency::capture(self.editor.path(), Policy::Rebuild));
    Ok(dependencies)
  }

  fn configuration_dependencies(&self) -> Vec<ConfigurationDependency> {
    self.recorder.dependencies().to_vec()
  }
}
