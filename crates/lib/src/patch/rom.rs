use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use super::{PatchError, PatchOutput, PatchRequest, PatchService};
use crate::consts::{HEADER_MASK, MAX_ROM_SIZE};

/// Apply `request` to the ROM file at `rom_path`.
///
/// The copier header (`len & 0x7FFF` bytes) is kept out of the buffer handed
/// to the engine and restored when writing back. The file is only rewritten
/// when the patch succeeds.
pub fn apply_to_rom_file(
  service: &mut dyn PatchService,
  request: &PatchRequest,
  rom_path: &Path,
) -> Result<PatchOutput, PatchError> {
  if !service.initialize() {
    return Err(PatchError::EngineUnavailable);
  }

  let mut bytes = fs::read(rom_path).map_err(|source| PatchError::ReadRom {
    path: rom_path.to_path_buf(),
    source,
  })?;
  let header_size = bytes.len() & HEADER_MASK;
  let mut rom = bytes.split_off(header_size);
  let header = bytes;

  debug!(
    patch = %request.source.name(),
    rom = %rom_path.display(),
    rom_size = rom.len() + header_size,
    header_size,
    "applying patch"
  );

  let output = service.apply_patch(request, &mut rom, MAX_ROM_SIZE)?;

  for print in &output.prints {
    info!("{}", print);
  }
  for warning in &output.warnings {
    warn!(id = warning.id, "{}", warning.message);
  }

  let mut patched = header;
  patched.extend_from_slice(&rom);
  fs::write(rom_path, &patched).map_err(|source| PatchError::WriteRom {
    path: rom_path.to_path_buf(),
    source,
  })?;

  Ok(output)
}
