//! Interface to the assembler that applies textual patches to ROM bytes.
//!
//! The engine itself lives outside this crate; builders only see the
//! [`PatchService`] trait. [`apply_to_rom_file`] is the adapter every caller
//! goes through to patch a ROM on disk.

mod rom;

pub use rom::apply_to_rom_file;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::consts::ORIGINAL_ROM_SIZE;
use crate::hijack::Hijack;

/// Warning id the engine emits when a `freedata` block finds no free space.
pub const WARNING_NO_FREESPACE: u32 = 1008;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSource {
  File(PathBuf),
  /// Patch text that exists only in memory. `name` is used in diagnostics and
  /// as the virtual file name handed to the engine.
  Memory { name: String, contents: String },
}

impl PatchSource {
  pub fn memory(name: impl Into<String>, contents: impl Into<String>) -> Self {
    PatchSource::Memory {
      name: name.into(),
      contents: contents.into(),
    }
  }

  pub fn name(&self) -> String {
    match self {
      PatchSource::File(path) => path.display().to_string(),
      PatchSource::Memory { name, .. } => name.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
  pub source: PatchSource,
  pub include_paths: Vec<PathBuf>,
  /// Directory relative `incsrc`/`incbin` paths are resolved against.
  pub working_dir: Option<PathBuf>,
}

impl PatchRequest {
  pub fn new(source: PatchSource) -> Self {
    Self {
      source,
      include_paths: Vec::new(),
      working_dir: None,
    }
  }

  pub fn include_paths(mut self, include_paths: Vec<PathBuf>) -> Self {
    self.include_paths = include_paths;
    self
  }

  pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.working_dir = Some(dir.into());
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenBlock {
  pub pc_offset: u32,
  pub snes_offset: u32,
  pub length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
  pub name: String,
  pub location: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchWarning {
  pub id: u32,
  pub message: String,
}

/// Everything the engine reports after a successful apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutput {
  pub written_blocks: Vec<WrittenBlock>,
  pub labels: Vec<Label>,
  pub prints: Vec<String>,
  pub warnings: Vec<PatchWarning>,
}

impl PatchOutput {
  /// Blocks written into the original ROM area, as hijacks.
  pub fn hijacks(&self) -> Vec<Hijack> {
    self
      .written_blocks
      .iter()
      .filter(|block| (block.pc_offset as usize) < ORIGINAL_ROM_SIZE)
      .map(|block| Hijack::new(block.pc_offset, block.length))
      .collect()
  }

  pub fn has_warning(&self, id: u32) -> bool {
    self.warnings.iter().any(|w| w.id == id)
  }
}

#[derive(Debug, Error)]
pub enum PatchError {
  #[error("patch engine is not available")]
  EngineUnavailable,

  #[error("failed to apply patch {name}:\n{}", .errors.join("\n"))]
  Failed { name: String, errors: Vec<String> },

  #[error("failed to read ROM {path}: {source}")]
  ReadRom {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write ROM {path}: {source}")]
  WriteRom {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Assembler collaborator.
///
/// `apply_patch` mutates `rom` in place on success and may grow it up to
/// `capacity` bytes. On failure `rom` must be left as it was.
pub trait PatchService {
  /// Load the engine. Returns false if it is not available.
  fn initialize(&mut self) -> bool;

  fn apply_patch(&mut self, request: &PatchRequest, rom: &mut Vec<u8>, capacity: usize) -> Result<PatchOutput, PatchError>;
}
