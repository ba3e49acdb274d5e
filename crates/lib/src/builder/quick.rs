use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::{
  BuildError, Inserted, QuickBuildOutcome, RebuildReason, WorkingRom, commit, copy_keeping_mtime, insert_unit,
  inserted_levels, prepare, working_rom_path,
};
use crate::config::Configuration;
use crate::dependency::Policy;
use crate::descriptor::{Descriptor, Kind};
use crate::hijack::{HijackCheck, check_hijacks};
use crate::insertable::{
  DefaultInsertableFactory, InsertContext, InsertableFactory, cleanup_patch,
};
use crate::patch::{PatchError, PatchRequest, PatchService, PatchSource, apply_to_rom_file};
use crate::paths::ProjectPaths;
use crate::report::{BuildReport, BuildReportEntry, BuildReportStore, ReportError};

/// Incremental build driven by the report of the last successful build.
///
/// Any change that cannot be applied in place surfaces as
/// [`BuildError::MustRebuild`]; the output ROM and the build report are then
/// left exactly as they were.
#[derive(Debug, Default)]
pub struct QuickBuilder<F = DefaultInsertableFactory> {
  factory: F,
}

impl QuickBuilder {
  pub fn new() -> Self {
    Self::default()
  }
}

impl<F: InsertableFactory> QuickBuilder<F> {
  pub fn with_factory(factory: F) -> Self {
    Self { factory }
  }

  pub fn build(&self, config: &Configuration, patcher: &mut dyn PatchService) -> Result<QuickBuildOutcome, BuildError> {
    info!("quick build started");

    let paths = config.project_paths()?;
    let root = paths.root();
    let store = BuildReportStore::for_project(&paths);
    if !store.exists() {
      return Err(RebuildReason::NoReport.into());
    }

    let output = config.output_rom().get()?.clone();
    if !output.exists() {
      return Err(RebuildReason::OutputRomMissing(output).into());
    }

    let mut report = load_report(&store)?;
    check_build_order(&report, &config.build_order())?;
    check_removed_levels(&report, config)?;
    check_rom_size(&report, config)?;
    check_rebuild_configuration(&report, config)?;

    prepare(&paths)?;
    let mut working = WorkingRom::new(&output, working_rom_path(config, &paths, &output));
    let mut tracking = true;
    let mut reinserted = Vec::new();

    for i in 0..report.dependencies.len() {
      check_rebuild_resources(&report.dependencies[i..], root)?;

      let entry = &mut report.dependencies[i];
      let descriptor = entry.descriptor.clone();
      let label = descriptor.label(root);

      let Some(reason) = reinsert_reason(entry, config, root) else {
        if let (Kind::Globule, Some(name)) = (descriptor.kind, &descriptor.name) {
          copy_imprint_forward(&paths, name, &label)?;
        }
        info!(descriptor = %label, "already up to date");
        continue;
      };
      info!(descriptor = %label, reason = %reason, "must be reinserted");

      let rom = working.snapshot()?.to_path_buf();
      if let (Kind::Globule, Some(name)) = (descriptor.kind, &descriptor.name) {
        clean_globule(&paths, name, &label, &rom, patcher)?;
      }

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

      match insert_unit(insertable.as_mut(), &mut ctx, &label, tracking)? {
        Inserted::Tracked(resources) => {
          entry.resource_dependencies = resources;
          entry.configuration_dependencies = insertable.configuration_dependencies();
        }
        Inserted::Untracked => tracking = false,
      }

      if descriptor.kind == Kind::Patch {
        if let HijackCheck::Uncovered { address } = check_hijacks(&entry.hijacks, insertable.hijacks()) {
          return Err(
            RebuildReason::HijacksShrunk {
              descriptor: label,
              address,
            }
            .into(),
          );
        }
        entry.hijacks = insertable.hijacks().to_vec();
      }

      reinserted.push(descriptor);
    }

    if reinserted.is_empty() {
      info!("everything already up to date");
      return Ok(QuickBuildOutcome::NoWork);
    }

    let mut report = BuildReport::new(config.rom_size().into_value(), report.dependencies);
    report.inserted_levels = inserted_levels(config)?;
    commit(&paths, working, &output, tracking.then_some(&report))?;

    info!(reinserted = reinserted.len(), "quick build finished");
    Ok(QuickBuildOutcome::Updated {
      reinserted,
      report_retained: tracking,
    })
  }
}

fn load_report(store: &BuildReportStore) -> Result<BuildReport, BuildError> {
  match store.load() {
    Ok(report) => Ok(report),
    Err(ReportError::NotFound(_)) => Err(RebuildReason::NoReport.into()),
    Err(ReportError::UnsupportedVersion { found, expected }) => {
      Err(RebuildReason::ReportFormatChanged { found, expected }.into())
    }
    Err(e @ (ReportError::Parse(_) | ReportError::Misaligned { .. })) => {
      Err(RebuildReason::CorruptReport(e.to_string()).into())
    }
    Err(e) => Err(e.into()),
  }
}

fn check_build_order(report: &BuildReport, build_order: &[Descriptor]) -> Result<(), BuildError> {
  if report.build_order != build_order {
    return Err(RebuildReason::BuildOrderChanged.into());
  }
  Ok(())
}

fn check_rom_size(report: &BuildReport, config: &Configuration) -> Result<(), BuildError> {
  let configured = config.rom_size().into_value();
  if report.rom_size != configured {
    return Err(
      RebuildReason::RomSizeChanged {
        recorded: report.rom_size,
        configured,
      }
      .into(),
    );
  }
  Ok(())
}

/// Reinserting levels adds them to the ROM but cannot take any out.
fn check_removed_levels(report: &BuildReport, config: &Configuration) -> Result<(), BuildError> {
  if report.inserted_levels.is_empty() {
    return Ok(());
  }
  let current = inserted_levels(config)?;
  let count = report.inserted_levels.difference(&current).count();
  if count > 0 {
    return Err(RebuildReason::LevelsRemoved { count }.into());
  }
  Ok(())
}

/// Rebuild-policy configuration dependencies of every entry.
fn check_rebuild_configuration(report: &BuildReport, config: &Configuration) -> Result<(), BuildError> {
  let changed = report
    .dependencies
    .iter()
    .flat_map(|entry| &entry.configuration_dependencies)
    .find(|dependency| dependency.policy == Policy::Rebuild && dependency.has_changed(config));

  match changed {
    Some(dependency) => Err(
      RebuildReason::ConfigurationChanged {
        key: dependency.config_keys.clone(),
      }
      .into(),
    ),
    None => Ok(()),
  }
}

/// Rebuild-policy resource dependencies of `entries`.
///
/// Runs before every unit on the entries not yet processed, so a file
/// touched by an earlier insertion is caught before a later unit relies on it.
fn check_rebuild_resources(entries: &[BuildReportEntry], root: &Path) -> Result<(), BuildError> {
  for entry in entries {
    let changed = entry
      .resource_dependencies
      .iter()
      .find(|dependency| dependency.policy == Policy::Rebuild && dependency.has_changed());
    if let Some(dependency) = changed {
      return Err(
        RebuildReason::ResourceChanged {
          path: dependency.path.clone(),
          descriptor: entry.descriptor.label(root),
        }
        .into(),
      );
    }
  }
  Ok(())
}

/// Why `entry` must be reinserted, if it must. Configuration changes are
/// reported ahead of resource changes.
fn reinsert_reason(entry: &BuildReportEntry, config: &Configuration, root: &Path) -> Option<String> {
  let config_change = entry
    .configuration_dependencies
    .iter()
    .find(|dependency| dependency.policy == Policy::Reinsert && dependency.has_changed(config));
  if let Some(dependency) = config_change {
    return Some(format!("configuration variable {} changed", dependency.config_keys));
  }

  entry
    .resource_dependencies
    .iter()
    .find(|dependency| dependency.policy == Policy::Reinsert && dependency.has_changed())
    .map(|dependency| {
      let path = dependency.path.strip_prefix(root).unwrap_or(&dependency.path);
      format!("resource {} changed", path.display())
    })
}

/// Carry the cached imprint of an unchanged globule into this build.
fn copy_imprint_forward(paths: &ProjectPaths, globule: &Path, label: &str) -> Result<(), BuildError> {
  let name = ProjectPaths::imprint_file_name(globule);
  let cached = paths.inserted_globules_dir().join(&name);
  if !cached.exists() {
    return Err(
      RebuildReason::ImprintMissing {
        globule: label.to_string(),
      }
      .into(),
    );
  }

  let target = paths.imprint_dir().join(&name);
  copy_keeping_mtime(&cached, &target).map_err(|e| BuildError::io(&target, e))?;
  debug!(descriptor = %label, imprint = %target.display(), "carried imprint forward");
  Ok(())
}

/// Free the space a globule occupies in `rom` using its cached imprint.
fn clean_globule(
  paths: &ProjectPaths,
  globule: &Path,
  label: &str,
  rom: &Path,
  patcher: &mut dyn PatchService,
) -> Result<(), BuildError> {
  let imprint_path = paths.inserted_globules_dir().join(ProjectPaths::imprint_file_name(globule));
  let imprint = fs::read_to_string(&imprint_path).map_err(|_| RebuildReason::ImprintMissing {
    globule: label.to_string(),
  })?;

  let request = PatchRequest::new(PatchSource::memory("cleanup.asm", cleanup_patch(&imprint)));
  match apply_to_rom_file(patcher, &request, rom) {
    Ok(_) => {
      debug!(descriptor = %label, "cleaned globule");
      Ok(())
    }
    Err(PatchError::Failed { .. }) => Err(
      RebuildReason::CleanupFailed {
        globule: label.to_string(),
      }
      .into(),
    ),
    Err(e) => Err(e.into()),
  }
}
