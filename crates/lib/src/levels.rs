//! Level numbers of the `.mwl` files in a project's levels folder.
//!
//! The editor can import levels but never delete one from a ROM, so the
//! build report remembers which levels went in.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

const LEVEL_EXTENSION: &str = "mwl";
/// Offset of the pointer to the data pointer table in a level file.
const DATA_POINTER_TABLE_POINTER: usize = 0x4;
const LEVEL_COUNT: u16 = 0x200;

#[derive(Debug, Error)]
pub enum LevelError {
  #[error(
    "levels folder {0} does not exist but levels were inserted before; \
     unset the levels path to stop inserting levels"
  )]
  FolderMissing(PathBuf),

  #[error("could not determine the level number of {0}, the file may be malformed")]
  UnknownNumber(PathBuf),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

fn read_le(bytes: &[u8], offset: usize, count: usize) -> Option<usize> {
  let slice = bytes.get(offset..offset.checked_add(count)?)?;
  Some(slice.iter().rev().fold(0, |acc, &b| (acc << 8) | usize::from(b)))
}

/// Level number a level file was exported from, if it can be read.
pub fn level_number(bytes: &[u8]) -> Option<u16> {
  let table = read_le(bytes, DATA_POINTER_TABLE_POINTER, 4)?;
  let information = read_le(bytes, table, 4)?;
  let number = u16::try_from(read_le(bytes, information, 2)?).ok()?;
  (number < LEVEL_COUNT).then_some(number)
}

/// Level numbers of every level file directly inside `dir`.
pub fn level_numbers(dir: &Path) -> Result<BTreeSet<u16>, LevelError> {
  if !dir.is_dir() {
    return Err(LevelError::FolderMissing(dir.to_path_buf()));
  }

  let read_error = |path: &Path| {
    let path = path.to_path_buf();
    move |source: io::Error| LevelError::Read { path, source }
  };

  let mut numbers = BTreeSet::new();
  for entry in fs::read_dir(dir).map_err(read_error(dir))? {
    let path = entry.map_err(read_error(dir))?.path();
    if path.extension().is_none_or(|ext| ext != LEVEL_EXTENSION) {
      continue;
    }
    let bytes = fs::read(&path).map_err(read_error(&path))?;
    let number = level_number(&bytes).ok_or_else(|| LevelError::UnknownNumber(path.clone()))?;
    numbers.insert(number);
  }
  Ok(numbers)
}

#[cfg(test)]
pub(crate) fn level_file(number: u16) -> Vec<u8> {
  let mut bytes = vec![0u8; 4];
  bytes.extend_from_slice(&8u32.to_le_bytes());
  bytes.extend_from_slice(&12u32.to_le_bytes());
  bytes.extend_from_slice(&number.to_le_bytes());
  bytes
}
