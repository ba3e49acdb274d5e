//! Reinserted patches must keep writing everything they wrote before.

use asteria_lib::builder::{BuildError, QuickBuildOutcome, RebuildReason};
use asteria_lib::descriptor::Descriptor;
use asteria_lib::hijack::Hijack;

use super::common::{FakeAssembler, Project};

fn built_patch_project(blocks: &[(u32, u32)]) -> (Project, FakeAssembler) {
  let mut project = Project::new();
  let patch = project.write("patches/fix.asm", "org $008000\n");
  project.with_build_order(vec![Descriptor::patch(patch)]);

  let mut assembler = FakeAssembler::new();
  assembler.set_blocks("fix.asm", blocks);
  project.rebuild(&mut assembler);
  (project, assembler)
}

#[test]
fn full_build_records_hijacks() {
  let (project, _assembler) = built_patch_project(&[(0x8000, 0x10), (0x80000, 0x8000)]);
  assert_eq!(project.report().dependencies[0].hijacks, vec![Hijack::new(0x8000, 0x10)]);
}

#[test]
fn shrunk_hijacks_must_rebuild() {
  let (project, mut assembler) = built_patch_project(&[(0x8000, 0x10)]);
  let rom = project.output_bytes();
  let report = project.report_text();

  assembler.set_blocks("fix.asm", &[(0x8000, 0x8)]);
  project.modify("patches/fix.asm", "org $008000\nnop\n");
  let result = project.quick_build(&mut assembler);

  assert!(matches!(
    result,
    Err(BuildError::MustRebuild(RebuildReason::HijacksShrunk { address: 0x8008, .. }))
  ));
  assert_eq!(project.output_bytes(), rom);
  assert_eq!(project.report_text(), report);
  assert!(!project.working_rom().exists());
}

#[test]
fn moved_hijack_must_rebuild() {
  let (project, mut assembler) = built_patch_project(&[(0x8000, 0x10)]);

  assembler.set_blocks("fix.asm", &[(0x8100, 0x10)]);
  project.modify("patches/fix.asm", "org $008100\n");

  assert!(matches!(
    project.quick_build(&mut assembler),
    Err(BuildError::MustRebuild(RebuildReason::HijacksShrunk { address: 0x8000, .. }))
  ));
}

#[test]
fn grown_hijacks_are_recorded() {
  let (project, mut assembler) = built_patch_project(&[(0x8000, 0x10)]);

  assembler.set_blocks("fix.asm", &[(0x8000, 0x8), (0x8008, 0x18)]);
  project.modify("patches/fix.asm", "org $008000\nnop #$20\n");
  let outcome = project.quick_build(&mut assembler).unwrap();

  assert!(matches!(outcome, QuickBuildOutcome::Updated { report_retained: true, .. }));
  assert_eq!(
    project.report().dependencies[0].hijacks,
    vec![Hijack::new(0x8000, 0x8), Hijack::new(0x8008, 0x18)]
  );
  assert_eq!(project.output_bytes()[0x801F], 0xEA);
}
