use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::EditorError;

/// An external executable invoked synchronously by path.
///
/// Exit code `0` is success. Any other code, or termination by a signal, is a
/// failure.
#[derive(Debug, Clone)]
pub struct ExternalTool {
  name: &'static str,
  path: PathBuf,
}

impl ExternalTool {
  /// Fails with [`EditorError::ToolNotFound`] if nothing exists at `path`.
  pub fn new(name: &'static str, path: impl Into<PathBuf>) -> Result<Self, EditorError> {
    let path = path.into();
    if !path.exists() {
      return Err(EditorError::ToolNotFound { tool: name, path });
    }
    Ok(Self { name, path })
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn run<I, S>(&self, args: I) -> Result<(), EditorError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
  {
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    let shown = args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ");

    debug!(tool = self.name, path = %self.path.display(), args = %shown, "running external tool");

    let output = Command::new(&self.path)
      .args(&args)
      .output()
      .map_err(|source| EditorError::Spawn {
        tool: self.name,
        source,
      })?;

    if !output.status.success() {
      let stdout = String::from_utf8_lossy(&output.stdout);
      let stderr = String::from_utf8_lossy(&output.stderr);
      if !stdout.is_empty() {
        debug!(stdout = %stdout, "tool stdout");
      }
      if !stderr.is_empty() {
        debug!(stderr = %stderr, "tool stderr");
      }
      return Err(EditorError::Failed {
        tool: self.name,
        args: shown,
        code: output.status.code(),
      });
    }

    Ok(())
  }
}

/// The level editor, driven through its command line flags.
#[derive(Debug, Clone)]
pub struct EditorProcess {
  tool: ExternalTool,
}

impl EditorProcess {
  pub fn new(path: impl Into<PathBuf>) -> Result<Self, EditorError> {
    Ok(Self {
      tool: ExternalTool::new("editor", path)?,
    })
  }

  pub fn path(&self) -> &Path {
    self.tool.path()
  }

  /// Run `<editor> <flag> <rom> [<extra>...]`.
  pub fn run(&self, flag: &str, rom: &Path, extra: &[&Path]) -> Result<(), EditorError> {
    let mut args: Vec<&OsStr> = vec![OsStr::new(flag), rom.as_os_str()];
    args.extend(extra.iter().map(|p| p.as_os_str()));
    self.tool.run(args)
  }
}
