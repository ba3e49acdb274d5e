use std::fs;

use asteria_lib::builder::{BuildError, QuickBuildOutcome, Rebuilder};
use asteria_lib::descriptor::{Descriptor, Kind};
use asteria_lib::marker::Marker;

use super::common::{FakeAssembler, Project, ROM_SIZE, ScriptedFactory, source_of, unit_offset};

#[test]
fn missing_clean_rom_fails() {
  let project = Project::new();
  fs::remove_file(project.path("clean.smc")).unwrap();

  let result = Rebuilder::with_factory(ScriptedFactory::new(&project)).build(&project.config, &mut FakeAssembler::new());

  assert!(matches!(result, Err(BuildError::CleanRomMissing(_))));
  assert!(!project.output().exists());
}

#[test]
fn full_build_writes_output_report_and_marker() {
  let mut project = Project::new();
  project.write(&source_of(Kind::Graphics), [0x77]);
  let patch = project.write("patches/fix.asm", "org $008000\n");
  project.with_build_order(vec![Descriptor::new(Kind::Graphics), Descriptor::patch(patch.clone())]);

  let mut assembler = FakeAssembler::new();
  assembler.set_blocks("fix.asm", &[(0x8000, 2)]);
  let outcome = project.rebuild(&mut assembler);

  assert!(outcome.report_retained);
  assert!(outcome.conflicts.is_empty());

  let rom = project.output_bytes();
  assert_eq!(rom.len(), ROM_SIZE);
  assert_eq!(rom[unit_offset(Kind::Graphics)], 0x77);
  assert_eq!(&rom[0x8000..0x8002], &[0xEA, 0xEA]);
  assert!(Marker::read(&project.output()).unwrap().is_some());

  let report = project.report();
  assert!(report.is_aligned());
  assert_eq!(report.build_order, vec![Descriptor::new(Kind::Graphics), Descriptor::patch(patch)]);
  assert!(!project.working_rom().exists());
}

#[test]
fn full_build_starts_from_the_clean_rom() {
  let mut project = Project::new();
  project.write(&source_of(Kind::Map16), [0x01]);
  project.with_build_order(vec![Descriptor::new(Kind::Map16)]);
  project.rebuild(&mut FakeAssembler::new());

  project.with_build_order(Vec::new());
  project.rebuild(&mut FakeAssembler::new());

  assert_eq!(project.output_bytes()[unit_offset(Kind::Map16)], 0);
}

#[test]
fn overlapping_patches_are_reported() {
  let mut project = Project::new();
  let a = project.write("patches/a.asm", "");
  let b = project.write("patches/b.asm", "");
  project.with_build_order(vec![Descriptor::patch(a), Descriptor::patch(b)]);

  let mut assembler = FakeAssembler::new();
  assembler.set_blocks("a.asm", &[(0x8000, 0x10)]);
  assembler.set_blocks("b.asm", &[(0x8008, 0x10)]);
  let outcome = project.rebuild(&mut assembler);

  assert_eq!(outcome.conflicts.len(), 1);
  let conflict = &outcome.conflicts[0];
  assert!(conflict.first.contains("a.asm"));
  assert!(conflict.second.contains("b.asm"));
  assert_eq!(conflict.address, 0x018008);
  assert_eq!(conflict.length, 8);
}

#[test]
fn full_build_recovers_from_must_rebuild() {
  let mut project = Project::new();
  let patch = project.write("patches/fix.asm", "org $008000\n");
  project.with_build_order(vec![Descriptor::patch(patch)]);

  let mut assembler = FakeAssembler::new();
  assembler.set_blocks("fix.asm", &[(0x8000, 0x10)]);
  project.rebuild(&mut assembler);

  assembler.set_blocks("fix.asm", &[(0x8000, 0x4)]);
  project.modify("patches/fix.asm", "org $008000\nnop\n");
  assert!(project.quick_build(&mut assembler).unwrap_err().is_must_rebuild());

  project.rebuild(&mut assembler);
  assert_eq!(project.quick_build(&mut assembler).unwrap(), QuickBuildOutcome::NoWork);
  assert_eq!(&project.output_bytes()[0x8004..0x8010], &[0u8; 12]);
}
