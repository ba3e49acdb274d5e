//! Shared helpers for build integration tests.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use asteria_lib::builder::{BuildError, QuickBuildOutcome, QuickBuilder, RebuildOutcome, Rebuilder};
use asteria_lib::config::{Configuration, keys};
use asteria_lib::dependency::{ConfigurationDependency, DependencyRecorder, Policy, ResourceDependency};
use asteria_lib::descriptor::{Descriptor, Kind};
use asteria_lib::insertable::{DefaultInsertableFactory, InsertContext, InsertError, Insertable, InsertableFactory};
use asteria_lib::patch::{Label, PatchError, PatchOutput, PatchRequest, PatchService, PatchSource, WrittenBlock};
use asteria_lib::paths::ProjectPaths;
use asteria_lib::report::{BuildReport, BuildReportStore};
use tempfile::TempDir;

pub const ROM_SIZE: usize = 0x80000;

/// Isolated project directory with a clean ROM and an output location.
pub struct Project {
  pub temp: TempDir,
  pub root: PathBuf,
  pub config: Configuration,
}

impl Project {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    fs::write(root.join("clean.smc"), vec![0u8; ROM_SIZE]).unwrap();

    let config = Configuration::new()
      .with(keys::PROJECT_ROOT, root.clone())
      .with(keys::CLEAN_ROM, "clean.smc")
      .with(keys::OUTPUT_ROM, "build/hack.smc");
    Self { temp, root, config }
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.root.join(relative)
  }

  /// Write a file relative to the project root.
  pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
  }

  /// Rewrite a file and move its modification time forward.
  pub fn modify(&self, relative: &str, contents: impl AsRef<[u8]>) {
    let path = self.write(relative, contents);
    touch(&path);
  }

  pub fn set(&mut self, key: &str, value: impl Into<asteria_lib::config::ConfigValue>) {
    self.config.set(key.to_string(), value);
  }

  pub fn with_build_order(&mut self, build_order: Vec<Descriptor>) {
    self.config.set_build_order(build_order);
  }

  pub fn paths(&self) -> ProjectPaths {
    ProjectPaths::new(&self.root)
  }

  pub fn output(&self) -> PathBuf {
    self.path("build/hack.smc")
  }

  pub fn output_bytes(&self) -> Vec<u8> {
    fs::read(self.output()).unwrap()
  }

  pub fn working_rom(&self) -> PathBuf {
    self.paths().temporary_dir().join("hack.smc")
  }

  pub fn report(&self) -> BuildReport {
    BuildReportStore::for_project(&self.paths()).load().unwrap()
  }

  pub fn report_text(&self) -> Option<String> {
    fs::read_to_string(self.paths().build_report()).ok()
  }

  pub fn rebuild(&self, assembler: &mut FakeAssembler) -> RebuildOutcome {
    Rebuilder::with_factory(ScriptedFactory::new(self))
      .build(&self.config, assembler)
      .unwrap()
  }

  pub fn quick_build(&self, assembler: &mut FakeAssembler) -> Result<QuickBuildOutcome, BuildError> {
    QuickBuilder::with_factory(ScriptedFactory::new(self)).build(&self.config, assembler)
  }
}

/// Move the modification time of `path` one second forward.
pub fn touch(path: &Path) {
  let modified = fs::metadata(path).unwrap().modified().unwrap();
  let file = fs::OpenOptions::new().write(true).open(path).unwrap();
  file.set_modified(modified + Duration::from_secs(1)).unwrap();
}

/// Minimal level file exported from level `number`.
pub fn level_file(number: u16) -> Vec<u8> {
  let mut bytes = vec![0u8; 4];
  bytes.extend_from_slice(&8u32.to_le_bytes());
  bytes.extend_from_slice(&12u32.to_le_bytes());
  bytes.extend_from_slice(&number.to_le_bytes());
  bytes
}

/// Offset each scripted kind copies its source to.
pub fn unit_offset(kind: Kind) -> usize {
  match kind {
    Kind::Graphics => 0x1000,
    Kind::ExGraphics => 0x2000,
    Kind::Map16 => 0x3000,
    Kind::SharedPalettes => 0x4000,
    _ => 0x5000,
  }
}

fn slug(kind: Kind) -> String {
  kind.label().to_lowercase().replace(' ', "_")
}

/// Source file of a scripted kind, relative to the project root.
pub fn source_of(kind: Kind) -> String {
  format!("resources/{}.bin", slug(kind))
}

/// Tool a scripted kind runs, relative to the project root.
pub fn tool_of(kind: Kind) -> String {
  format!("tools/{}.tool", slug(kind))
}

/// Record of insertions performed by scripted units, in order.
pub type InsertionLog = Rc<RefCell<Vec<Descriptor>>>;

thread_local! {
  static LOG: InsertionLog = Rc::new(RefCell::new(Vec::new()));
}

/// Descriptors inserted by scripted units on this thread since the last call.
pub fn take_insertions() -> Vec<Descriptor> {
  LOG.with(|log| log.borrow_mut().drain(..).collect())
}

/// Patches and globules go through the real insertables; every other kind is
/// a scripted unit copying its source file into the ROM. A scripted unit
/// depends on its source (Reinsert) and on its tool (Rebuild) when that file
/// exists.
pub struct ScriptedFactory {
  root: PathBuf,
  log: InsertionLog,
}

impl ScriptedFactory {
  pub fn new(project: &Project) -> Self {
    Self {
      root: project.root.clone(),
      log: LOG.with(Rc::clone),
    }
  }
}

impl InsertableFactory for ScriptedFactory {
  fn create(&self, descriptor: &Descriptor, config: &Configuration) -> Result<Box<dyn Insertable>, InsertError> {
    if matches!(descriptor.kind, Kind::Patch | Kind::Globule) {
      return DefaultInsertableFactory.create(descriptor, config);
    }

    let source = self.root.join(source_of(descriptor.kind));
    if !source.exists() {
      return Err(InsertError::ResourceNotFound {
        what: descriptor.kind.label().to_string(),
        path: source,
      });
    }
    let tool = Some(self.root.join(tool_of(descriptor.kind))).filter(|tool| tool.exists());

    let mut recorder = DependencyRecorder::new();
    recorder.register(config, keys::EDITOR, Policy::Rebuild);
    if let Some(key) = keys::resource_key(descriptor.kind) {
      recorder.register(config, key, Policy::Reinsert);
    }

    Ok(Box::new(ScriptedUnit {
      descriptor: descriptor.clone(),
      offset: unit_offset(descriptor.kind),
      source,
      tool,
      recorder,
      log: Rc::clone(&self.log),
    }))
  }
}

pub struct ScriptedUnit {
  descriptor: Descriptor,
  source: PathBuf,
  tool: Option<PathBuf>,
  offset: usize,
  recorder: DependencyRecorder,
  log: InsertionLog,
}

impl Insertable for ScriptedUnit {
  fn descriptor(&self) -> &Descriptor {
    &self.descriptor
  }

  fn insert(&mut self, ctx: &mut InsertContext<'_>) -> Result<(), InsertError> {
    let bytes = fs::read(&self.source).map_err(|e| InsertError::io(&self.source, e))?;
    let mut rom = fs::read(ctx.rom).map_err(|e| InsertError::io(ctx.rom, e))?;
    rom[self.offset..self.offset + bytes.len()].copy_from_slice(&bytes);
    fs::write(ctx.rom, rom).map_err(|e| InsertError::io(ctx.rom, e))?;
    self.log.borrow_mut().push(self.descriptor.clone());
    Ok(())
  }

  fn resource_dependencies(&self, _ctx: &InsertContext<'_>) -> Result<BTreeSet<ResourceDependency>, InsertError> {
    let mut dependencies = BTreeSet::from([ResourceDependency::capture(&self.source, Policy::Reinsert)]);
    if let Some(tool) = &self.tool {
      dependencies.insert(ResourceDependency::capture(tool, Policy::Rebuild));
    }
    Ok(dependencies)
  }

  fn configuration_dependencies(&self) -> Vec<ConfigurationDependency> {
    self.recorder.dependencies().to_vec()
  }
}

/// Assembler stand-in.
///
/// Patch files write `0xEA` over the blocks configured for their file name.
/// Globules export the labels configured for their stem. Both emit a
/// dependency report naming their source, plus the configured includes of a
/// patch file, unless `without_reports` is set.
#[derive(Debug, Default)]
pub struct FakeAssembler {
  /// `(pc offset, length)` per patch file name.
  pub blocks: HashMap<String, Vec<(u32, u32)>>,
  /// `(label, SNES address)` per globule stem.
  pub labels: HashMap<String, Vec<(String, u32)>>,
  /// Extra files listed in the dependency report of a patch file.
  pub includes: HashMap<String, Vec<PathBuf>>,
  pub without_reports: bool,
  /// Patch files that never emit a dependency report.
  pub unreported: Vec<String>,
  /// Names of everything applied, in order.
  pub applied: Vec<String>,
  /// Contents of every cleanup patch applied.
  pub cleanups: Vec<String>,
}

impl FakeAssembler {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_blocks(&mut self, patch: &str, blocks: &[(u32, u32)]) {
    self.blocks.insert(patch.to_string(), blocks.to_vec());
  }

  pub fn set_labels(&mut self, globule: &str, labels: &[(&str, u32)]) {
    self.labels.insert(
      globule.to_string(),
      labels.iter().map(|(name, address)| (name.to_string(), *address)).collect(),
    );
  }

  pub fn set_includes(&mut self, patch: &str, includes: &[PathBuf]) {
    self.includes.insert(patch.to_string(), includes.to_vec());
  }

  fn report(&self, dir: Option<&PathBuf>, source: &Path, includes: &[PathBuf]) {
    if let (false, Some(dir)) = (self.without_reports, dir) {
      let mut contents = format!("{}\n", source.display());
      for include in includes {
        contents.push_str(&format!("{}\n", include.display()));
      }
      fs::write(dir.join(".dependencies"), contents).unwrap();
    }
  }
}

fn lorom(pc: u32) -> u32 {
  ((pc << 1) & 0x7F0000) | (pc & 0x7FFF) | 0x8000
}

/// Path of the last `incsrc` in an in-memory patch.
fn included(contents: &str) -> Option<PathBuf> {
  contents
    .lines()
    .filter_map(|line| line.strip_prefix("incsrc \""))
    .filter_map(|rest| rest.strip_suffix('"'))
    .last()
    .map(PathBuf::from)
}

impl PatchService for FakeAssembler {
  fn initialize(&mut self) -> bool {
    true
  }

  fn apply_patch(&mut self, request: &PatchRequest, rom: &mut Vec<u8>, _capacity: usize) -> Result<PatchOutput, PatchError> {
    match &request.source {
      PatchSource::File(path) => {
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        let blocks = self.blocks.get(&name).cloned().unwrap_or_default();
        for &(pc, length) in &blocks {
          let end = (pc + length) as usize;
          if rom.len() < end {
            rom.resize(end, 0);
          }
          rom[pc as usize..end].fill(0xEA);
        }
        if !self.unreported.contains(&name) {
          let includes = self.includes.get(&name).cloned().unwrap_or_default();
          self.report(request.working_dir.as_ref(), path, &includes);
        }
        self.applied.push(name);
        Ok(PatchOutput {
          written_blocks: blocks
            .iter()
            .map(|&(pc, length)| WrittenBlock {
              pc_offset: pc,
              snes_offset: lorom(pc),
              length,
            })
            .collect(),
          ..Default::default()
        })
      }
      PatchSource::Memory { name, contents } if name == "cleanup.asm" => {
        self.cleanups.push(contents.clone());
        self.applied.push(name.clone());
        Ok(PatchOutput::default())
      }
      PatchSource::Memory { contents, .. } => {
        let path = included(contents).unwrap();
        let stem = path.file_stem().unwrap().to_string_lossy().to_string();
        self.report(request.working_dir.as_ref(), &path, &[]);
        self.applied.push(stem.clone());
        Ok(PatchOutput {
          labels: self
            .labels
            .get(&stem)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|(name, location)| Label { name, location })
            .collect(),
          ..Default::default()
        })
      }
    }
  }
}
