//! Buildable units and the factory mapping descriptors to them.
//!
//! An [`Insertable`] knows how to write one unit into the working ROM and
//! which configuration variables and files that insertion depended on.

mod editor_resource;
mod factory;
mod globule;
mod patch;
mod transfer;

pub use editor_resource::EditorResource;
pub use factory::{DefaultInsertableFactory, InsertableFactory};
pub use globule::{Globule, cleanup_patch, globule_name};
pub use patch::PatchFile;
pub use transfer::{BpsTransfer, InitialPatch};

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{ConfigError, Configuration};
use crate::dependency::{ConfigurationDependency, DependencyError, ResourceDependency};
use crate::descriptor::Descriptor;
use crate::editor::EditorError;
use crate::hijack::Hijack;
use crate::patch::{PatchError, PatchService, WrittenBlock};
use crate::paths::ProjectPaths;

/// Everything an insertion may touch.
pub struct InsertContext<'a> {
  pub config: &'a Configuration,
  pub paths: &'a ProjectPaths,
  /// Working ROM the unit is written into.
  pub rom: &'a Path,
  pub patcher: &'a mut dyn PatchService,
}

pub trait Insertable {
  fn descriptor(&self) -> &Descriptor;

  /// Write the unit into `ctx.rom`.
  fn insert(&mut self, ctx: &mut InsertContext<'_>) -> Result<(), InsertError>;

  /// Files the last insertion depended on.
  fn resource_dependencies(&self, ctx: &InsertContext<'_>) -> Result<BTreeSet<ResourceDependency>, InsertError>;

  /// Insert and then collect the resource dependencies of that insertion.
  ///
  /// When dependency discovery fails with
  /// [`InsertError::NoDependencyReportFound`], the unit has already been
  /// written.
  fn insert_with_dependencies(
    &mut self,
    ctx: &mut InsertContext<'_>,
  ) -> Result<BTreeSet<ResourceDependency>, InsertError> {
    self.insert(ctx)?;
    self.resource_dependencies(ctx)
  }

  /// Drop whatever the last insertion left behind for dependency discovery.
  /// Called instead of [`Insertable::resource_dependencies`] once tracking is
  /// lost.
  fn discard_dependencies(&self) -> Result<(), InsertError> {
    Ok(())
  }

  /// Configuration variables read while constructing and inserting the unit.
  fn configuration_dependencies(&self) -> Vec<ConfigurationDependency>;

  /// Hijacks written by the last insertion. Only patches have any.
  fn hijacks(&self) -> &[Hijack] {
    &[]
  }

  /// Every block written by the last insertion.
  fn written_blocks(&self) -> &[WrittenBlock] {
    &[]
  }
}

#[derive(Debug, Error)]
pub enum InsertError {
  #[error("no dependency report found at {0}")]
  NoDependencyReportFound(PathBuf),

  #[error(transparent)]
  DependencyReport(DependencyError),

  #[error("{what} not found at {path}")]
  ResourceNotFound { what: String, path: PathBuf },

  #[error("{tool} not found at {path}")]
  ToolNotFound { tool: String, path: PathBuf },

  #[error("{0}")]
  Failed(String),

  #[error(transparent)]
  Patch(PatchError),

  #[error(transparent)]
  Editor(EditorError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("failed to access {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl InsertError {
  pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    InsertError::Io {
      path: path.into(),
      source,
    }
  }
}

impl From<DependencyError> for InsertError {
  fn from(e: DependencyError) -> Self {
    match e {
      DependencyError::NoReport(path) => InsertError::NoDependencyReportFound(path),
      other => InsertError::DependencyReport(other),
    }
  }
}

impl From<PatchError> for InsertError {
  fn from(e: PatchError) -> Self {
    match e {
      PatchError::EngineUnavailable => InsertError::ToolNotFound {
        tool: "patch engine".to_string(),
        path: PathBuf::new(),
      },
      other => InsertError::Patch(other),
    }
  }
}

impl From<EditorError> for InsertError {
  fn from(e: EditorError) -> Self {
    match e {
      EditorError::ToolNotFound { tool, path } => InsertError::ToolNotFound {
        tool: tool.to_string(),
        path,
      },
      other => InsertError::Editor(other),
    }
  }
}

/// Fails with [`InsertError::ResourceNotFound`] unless `path` exists.
fn require_resource(what: impl Into<String>, path: &Path) -> Result<(), InsertError> {
  if path.exists() {
    Ok(())
  } else {
    Err(InsertError::ResourceNotFound {
      what: what.into(),
      path: path.to_path_buf(),
    })
  }
}
