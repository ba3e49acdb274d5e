use std::fs;
use std::path::Path;

use tracing::{info, warn};

use super::{
  BuildError, Inserted, PatchConflict, RebuildOutcome, WorkingRom, commit, insert_unit, inserted_levels, prepare,
  working_rom_path,
};
use crate::config::Configuration;
use crate::consts::ORIGINAL_ROM_SIZE;
use crate::descriptor::Kind;
use crate::hijack::{Hijack, overlaps};
use crate::insertable::{DefaultInsertableFactory, InsertContext, InsertableFactory};
use crate::patch::{PatchService, WrittenBlock};
use crate::report::{BuildReport, BuildReportEntry};

const COPIER_HEADER_SIZE: u64 = 0x200;
const CHECKSUM_COMPLEMENT_OFFSET: usize = 0x7FDC;
const CLEAN_ROM_CHECKSUM: u16 = 0xA0DA;

/// SNES address of the internal checksum the engine rewrites after every patch.
const INTERNAL_CHECKSUM: u32 = 0x80FFDC;
const INTERNAL_CHECKSUM_LENGTH: u32 = 4;

/// Full build from the clean ROM.
#[derive(Debug, Default)]
pub struct Rebuilder<F = DefaultInsertableFactory> {
  factory: F,
}

impl Rebuilder {
  pub fn new() -> Self {
    Self::default()
  }
}

impl<F: InsertableFactory> Rebuilder<F> {
  pub fn with_factory(factory: F) -> Self {
    Self { factory }
  }

  pub fn build(&self, config: &Configuration, patcher: &mut dyn PatchService) -> Result<RebuildOutcome, BuildError> {
    info!("build started");

    let paths = config.project_paths()?;
    let root = paths.root();
    let clean_rom = config.clean_rom().get()?.clone();
    if !clean_rom.exists() {
      return Err(BuildError::CleanRomMissing(clean_rom));
    }
    check_clean_rom(&clean_rom);
    let output = config.output_rom().get()?.clone();

    prepare(&paths)?;
    let mut working = WorkingRom::new(&clean_rom, working_rom_path(config, &paths, &output));
    let rom = working.snapshot()?.to_path_buf();

    let mut tracking = true;
    let mut entries = Vec::new();
    let mut patch_writes = Vec::new();

    for descriptor in config.build_order() {
      let label = descriptor.label(root);
      let mut insertable = self
        .factory
        .create(&descriptor, config)
        .map_err(|e| BuildError::insertion(&label, e))?;
      let mut ctx = InsertContext {
        config,
        paths: &paths,
        rom: &rom,
        patcher: &mut *patcher,
      };

      let mut entry = BuildReportEntry::new(descriptor);
      match insert_unit(insertable.as_mut(), &mut ctx, &label, tracking)? {
        Inserted::Tracked(resources) => {
          entry.resource_dependencies = resources;
          entry.configuration_dependencies = insertable.configuration_dependencies();
        }
        Inserted::Untracked => tracking = false,
      }

      if entry.descriptor.kind == Kind::Patch {
        entry.hijacks = insertable.hijacks().to_vec();
        patch_writes.push((label, snes_ranges(insertable.written_blocks())));
      }
      entries.push(entry);
    }

    let conflicts = patch_conflicts(&patch_writes);
    for conflict in &conflicts {
      warn!(
        first = %conflict.first,
        second = %conflict.second,
        bytes = conflict.length,
        address = %format!("${:06X}", conflict.address),
        "patches write to the same bytes"
      );
    }

    let mut report = BuildReport::new(config.rom_size().into_value(), entries);
    report.inserted_levels = inserted_levels(config)?;
    commit(&paths, working, &output, tracking.then_some(&report))?;

    info!(units = report.build_order.len(), "build finished");
    Ok(RebuildOutcome {
      report_retained: tracking,
      conflicts,
    })
  }
}

/// SNES ranges of `blocks`, minus the internal checksum.
fn snes_ranges(blocks: &[WrittenBlock]) -> Vec<Hijack> {
  blocks
    .iter()
    .filter(|b| !(b.snes_offset == INTERNAL_CHECKSUM && b.length == INTERNAL_CHECKSUM_LENGTH))
    .map(|b| Hijack::new(b.snes_offset, b.length))
    .collect()
}

/// Every overlap between the writes of two different patches.
fn patch_conflicts(writes: &[(String, Vec<Hijack>)]) -> Vec<PatchConflict> {
  let mut conflicts = Vec::new();
  for (i, (first, first_writes)) in writes.iter().enumerate() {
    for (second, second_writes) in &writes[i + 1..] {
      if first == second {
        continue;
      }
      conflicts.extend(overlaps(first_writes, second_writes).into_iter().map(|overlap| PatchConflict {
        first: first.clone(),
        second: second.clone(),
        address: overlap.start,
        length: overlap.length,
      }));
    }
  }
  conflicts
}

/// Warn about a clean ROM that does not look like an unmodified game.
fn check_clean_rom(path: &Path) {
  let Ok(rom) = fs::read(path) else {
    return;
  };

  let size = rom.len() as u64;
  let original = ORIGINAL_ROM_SIZE as u64;
  let header = if size == original + COPIER_HEADER_SIZE {
    COPIER_HEADER_SIZE as usize
  } else if size == original {
    0
  } else {
    warn!(path = %path.display(), size, "clean ROM has an unexpected size");
    return;
  };

  let word = |offset: usize| u16::from_le_bytes([rom[header + offset], rom[header + offset + 1]]);
  let complement = word(CHECKSUM_COMPLEMENT_OFFSET);
  let checksum = word(CHECKSUM_COMPLEMENT_OFFSET + 2);
  if checksum != CLEAN_ROM_CHECKSUM || complement != !CLEAN_ROM_CHECKSUM {
    warn!(path = %path.display(), checksum = %format!("{:04X}", checksum), "clean ROM has an unexpected checksum");
  }
}
