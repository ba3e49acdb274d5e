//! Which changes a quick build absorbs and which force a full build.

use std::collections::BTreeSet;
use std::fs;

use asteria_lib::builder::{BuildError, QuickBuildOutcome, RebuildReason};
use asteria_lib::config::{ConfigValue, keys};
use asteria_lib::descriptor::{Descriptor, Kind};
use asteria_lib::levels::LevelError;

use super::common::{
  FakeAssembler, Project, level_file, source_of, take_insertions, tool_of, touch, unit_offset,
};

const UNITS: [(Kind, u8); 3] = [(Kind::Graphics, 0x11), (Kind::Map16, 0x22), (Kind::SharedPalettes, 0x33)];

/// Three scripted units, each with a Rebuild-policy tool, already built.
fn built_project() -> (Project, FakeAssembler) {
  let mut project = Project::new();
  for (kind, byte) in UNITS {
    project.write(&source_of(kind), [byte]);
    project.write(&tool_of(kind), "");
  }
  project.with_build_order(UNITS.iter().map(|(kind, _)| Descriptor::new(*kind)).collect());

  let mut assembler = FakeAssembler::new();
  project.rebuild(&mut assembler);
  take_insertions();
  (project, assembler)
}

fn assert_must_rebuild(result: Result<QuickBuildOutcome, BuildError>) -> RebuildReason {
  match result {
    Err(BuildError::MustRebuild(reason)) => reason,
    other => panic!("expected must rebuild, got {:?}", other),
  }
}

mod preconditions {
  use super::*;

  #[test]
  fn no_report_must_rebuild() {
    let mut project = Project::new();
    project.write(&source_of(Kind::Graphics), [1]);
    project.with_build_order(vec![Descriptor::new(Kind::Graphics)]);

    let reason = assert_must_rebuild(project.quick_build(&mut FakeAssembler::new()));
    assert_eq!(reason, RebuildReason::NoReport);
  }

  #[test]
  fn missing_output_must_rebuild() {
    let (project, mut assembler) = built_project();
    fs::remove_file(project.output()).unwrap();

    let reason = assert_must_rebuild(project.quick_build(&mut assembler));
    assert!(matches!(reason, RebuildReason::OutputRomMissing(_)));
  }

  #[test]
  fn rom_size_change_must_rebuild() {
    let (mut project, mut assembler) = built_project();
    project.set(keys::ROM_SIZE, 0x200000i64);
    project.rebuild(&mut assembler);
    let before = project.output_bytes();

    project.set(keys::ROM_SIZE, 0x180000i64);
    let result = project.quick_build(&mut assembler);

    let message = result.as_ref().unwrap_err().to_string();
    assert!(message.contains(keys::ROM_SIZE), "unexpected message: {}", message);
    let reason = assert_must_rebuild(result);
    assert_eq!(
      reason,
      RebuildReason::RomSizeChanged {
        recorded: Some(0x200000),
        configured: Some(0x180000),
      }
    );
    assert_eq!(project.output_bytes(), before);
  }

  #[test]
  fn other_report_format_must_rebuild() {
    let (project, mut assembler) = built_project();
    let path = project.paths().build_report();
    let mut document: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    document["file_format_version"] = serde_json::json!(99);
    fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();

    let reason = assert_must_rebuild(project.quick_build(&mut assembler));
    assert!(matches!(reason, RebuildReason::ReportFormatChanged { found: 99, .. }));
  }

  #[test]
  fn unreadable_report_must_rebuild() {
    let (project, mut assembler) = built_project();
    fs::write(project.paths().build_report(), "{ not json").unwrap();

    let reason = assert_must_rebuild(project.quick_build(&mut assembler));
    assert!(matches!(reason, RebuildReason::CorruptReport(_)));
  }

  #[test]
  fn reordered_build_order_must_rebuild() {
    let (mut project, mut assembler) = built_project();
    project.with_build_order(vec![
      Descriptor::new(Kind::Map16),
      Descriptor::new(Kind::Graphics),
      Descriptor::new(Kind::SharedPalettes),
    ]);

    assert_eq!(
      assert_must_rebuild(project.quick_build(&mut assembler)),
      RebuildReason::BuildOrderChanged
    );
  }

  fn built_levels_project() -> (Project, FakeAssembler) {
    let mut project = Project::new();
    project.write(&source_of(Kind::Levels), [0x01]);
    project.write("levels/level 105.mwl", level_file(0x105));
    project.write("levels/level 106.mwl", level_file(0x106));
    project.set(keys::LEVELS, "levels");
    project.with_build_order(vec![Descriptor::new(Kind::Levels)]);

    let mut assembler = FakeAssembler::new();
    project.rebuild(&mut assembler);
    (project, assembler)
  }

  #[test]
  fn full_build_records_inserted_levels() {
    let (project, _assembler) = built_levels_project();
    assert_eq!(project.report().inserted_levels, BTreeSet::from([0x105, 0x106]));
  }

  #[test]
  fn added_level_file_does_not_force_a_rebuild() {
    let (project, mut assembler) = built_levels_project();
    project.write("levels/level 107.mwl", level_file(0x107));

    assert_eq!(project.quick_build(&mut assembler).unwrap(), QuickBuildOutcome::NoWork);
  }

  #[test]
  fn removed_level_file_must_rebuild() {
    let (project, mut assembler) = built_levels_project();
    let before = project.output_bytes();
    fs::remove_file(project.path("levels/level 105.mwl")).unwrap();

    let result = project.quick_build(&mut assembler);
    assert_eq!(
      result.as_ref().unwrap_err().to_string(),
      "1 level file was removed, must rebuild"
    );
    assert_eq!(assert_must_rebuild(result), RebuildReason::LevelsRemoved { count: 1 });
    assert_eq!(project.output_bytes(), before);
  }

  #[test]
  fn missing_levels_folder_is_an_error() {
    let (project, mut assembler) = built_levels_project();
    fs::remove_dir_all(project.path("levels")).unwrap();

    assert!(matches!(
      project.quick_build(&mut assembler),
      Err(BuildError::Levels(LevelError::FolderMissing(_)))
    ));
  }

  #[test]
  fn shortened_build_order_must_rebuild() {
    let (mut project, mut assembler) = built_project();
    project.with_build_order(vec![Descriptor::new(Kind::Graphics), Descriptor::new(Kind::Map16)]);

    assert_eq!(
      assert_must_rebuild(project.quick_build(&mut assembler)),
      RebuildReason::BuildOrderChanged
    );
  }
}

mod policies {
  use super::*;

  #[test]
  fn unchanged_project_is_a_no_op() {
    let (project, mut assembler) = built_project();
    let report = project.report_text().unwrap();
    let rom = project.output_bytes();

    for _ in 0..2 {
      assert_eq!(project.quick_build(&mut assembler).unwrap(), QuickBuildOutcome::NoWork);
    }

    assert!(take_insertions().is_empty());
    assert_eq!(project.report_text().unwrap(), report);
    assert_eq!(project.output_bytes(), rom);
    assert!(!project.working_rom().exists());
  }

  #[test]
  fn changed_resource_reinserts_only_its_unit() {
    let (project, mut assembler) = built_project();
    let before = project.report();

    project.modify(&source_of(Kind::Map16), [0x44]);
    let outcome = project.quick_build(&mut assembler).unwrap();

    assert_eq!(
      outcome,
      QuickBuildOutcome::Updated {
        reinserted: vec![Descriptor::new(Kind::Map16)],
        report_retained: true,
      }
    );
    assert_eq!(take_insertions(), vec![Descriptor::new(Kind::Map16)]);

    let rom = project.output_bytes();
    assert_eq!(rom[unit_offset(Kind::Graphics)], 0x11);
    assert_eq!(rom[unit_offset(Kind::Map16)], 0x44);
    assert_eq!(rom[unit_offset(Kind::SharedPalettes)], 0x33);

    let after = project.report();
    assert_eq!(after.dependencies[0], before.dependencies[0]);
    assert_ne!(after.dependencies[1], before.dependencies[1]);
    assert_eq!(after.dependencies[2], before.dependencies[2]);
    assert!(!project.working_rom().exists());
  }

  #[test]
  fn refreshed_dependencies_settle() {
    let (project, mut assembler) = built_project();
    project.modify(&source_of(Kind::Graphics), [0x55]);
    project.quick_build(&mut assembler).unwrap();

    assert_eq!(project.quick_build(&mut assembler).unwrap(), QuickBuildOutcome::NoWork);
  }

  #[test]
  fn changed_reinsert_configuration_reinserts_only_its_unit() {
    let (mut project, mut assembler) = built_project();
    project.set(keys::SHARED_PALETTES, source_of(Kind::SharedPalettes));
    project.rebuild(&mut assembler);
    take_insertions();

    project.set(keys::SHARED_PALETTES, "resources/palettes_v2.bin");
    let outcome = project.quick_build(&mut assembler).unwrap();

    assert!(matches!(
      outcome,
      QuickBuildOutcome::Updated { ref reinserted, .. } if reinserted == &vec![Descriptor::new(Kind::SharedPalettes)]
    ));
    let report = project.report();
    let entry = &report.dependencies[2];
    assert_eq!(entry.configuration_dependencies[0].value, ConfigValue::from("resources/palettes_v2.bin"));
  }

  #[test]
  fn changed_rebuild_tool_of_last_unit_must_rebuild_before_any_insertion() {
    let (project, mut assembler) = built_project();
    let before = project.output_bytes();
    let report = project.report_text();

    project.modify(&source_of(Kind::Graphics), [0x66]);
    touch(&project.path(&tool_of(Kind::SharedPalettes)));
    let reason = assert_must_rebuild(project.quick_build(&mut assembler));

    assert!(matches!(reason, RebuildReason::ResourceChanged { .. }));
    assert!(take_insertions().is_empty());
    assert_eq!(project.output_bytes(), before);
    assert_eq!(project.report_text(), report);
    assert!(!project.working_rom().exists());
  }

  #[test]
  fn deleted_rebuild_tool_must_rebuild() {
    let (project, mut assembler) = built_project();
    fs::remove_file(project.path(&tool_of(Kind::Graphics))).unwrap();

    let reason = assert_must_rebuild(project.quick_build(&mut assembler));
    assert!(matches!(reason, RebuildReason::ResourceChanged { .. }));
  }

  #[test]
  fn changed_rebuild_configuration_must_rebuild() {
    let (mut project, mut assembler) = built_project();
    project.set(keys::EDITOR, "tools/editor");
    project.rebuild(&mut assembler);
    let before = project.output_bytes();

    project.set(keys::EDITOR, "tools/other_editor");
    let reason = assert_must_rebuild(project.quick_build(&mut assembler));

    assert_eq!(
      reason,
      RebuildReason::ConfigurationChanged {
        key: keys::EDITOR.to_string()
      }
    );
    assert_eq!(project.output_bytes(), before);
  }
}
