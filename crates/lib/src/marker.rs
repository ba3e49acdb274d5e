//! Build marker stamped into every committed ROM.
//!
//! The marker sits at a fixed location in bank `$0F` that the game leaves
//! unused: the application signature followed by a 48-bit little endian
//! timestamp (seconds since the Unix epoch).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::HEADER_MASK;

/// PC offset of the marker in an unheadered ROM (SNES `$0FF0B8`).
pub const MARKER_OFFSET: usize = 0x7F0B8;

const SIGNATURE: &[u8] = b"ASTERIA";
const TIMESTAMP_BYTES: usize = 6;
const MARKER_LEN: usize = SIGNATURE.len() + TIMESTAMP_BYTES;

#[derive(Debug, Error)]
pub enum MarkerError {
  #[error("failed to read ROM {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write ROM {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

pub struct Marker;

impl Marker {
  /// Stamp the ROM at `rom_path` with the current time.
  pub fn stamp(rom_path: &Path) -> Result<(), MarkerError> {
    let now = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_secs())
      .unwrap_or_default();
    Self::stamp_at(rom_path, now)
  }

  /// Stamp the ROM with `timestamp`. ROMs too small to hold the marker are
  /// left unchanged.
  pub fn stamp_at(rom_path: &Path, timestamp: u64) -> Result<(), MarkerError> {
    let mut rom = read_rom(rom_path)?;
    let offset = (rom.len() & HEADER_MASK) + MARKER_OFFSET;

    let Some(slot) = rom.get_mut(offset..offset + MARKER_LEN) else {
      warn!(rom = %rom_path.display(), size = rom.len(), "ROM too small to hold build marker, not marking it");
      return Ok(());
    };

    let (signature, stamp) = slot.split_at_mut(SIGNATURE.len());
    signature.copy_from_slice(SIGNATURE);
    stamp.copy_from_slice(&timestamp.to_le_bytes()[..TIMESTAMP_BYTES]);

    fs::write(rom_path, &rom).map_err(|source| MarkerError::Write {
      path: rom_path.to_path_buf(),
      source,
    })?;
    debug!(rom = %rom_path.display(), timestamp, "stamped build marker");
    Ok(())
  }

  /// Timestamp of the last build, if the ROM carries a marker.
  pub fn read(rom_path: &Path) -> Result<Option<u64>, MarkerError> {
    let rom = read_rom(rom_path)?;
    let offset = (rom.len() & HEADER_MASK) + MARKER_OFFSET;

    let Some(slot) = rom.get(offset..offset + MARKER_LEN) else {
      return Ok(None);
    };
    let (signature, stamp) = slot.split_at(SIGNATURE.len());
    if signature != SIGNATURE {
      return Ok(None);
    }

    let mut bytes = [0u8; 8];
    bytes[..TIMESTAMP_BYTES].copy_from_slice(stamp);
    Ok(Some(u64::from_le_bytes(bytes)))
  }
}

fn read_rom(rom_path: &Path) -> Result<Vec<u8>, MarkerError> {
  fs::read(rom_path).map_err(|source| MarkerError::Read {
    path: rom_path.to_path_buf(),
    source,
  })
}
