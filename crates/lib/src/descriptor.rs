//! Identity of a buildable unit.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Closed set of unit kinds a build order may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
  InitialPatch,
  Graphics,
  ExGraphics,
  SharedPalettes,
  Overworld,
  TitleScreen,
  Credits,
  GlobalExAnimation,
  TitleMoves,
  Levels,
  Map16,
  Patch,
  /// Relocatable code block.
  Globule,
}

impl Kind {
  pub fn label(self) -> &'static str {
    match self {
      Kind::InitialPatch => "Initial Patch",
      Kind::Graphics => "Graphics",
      Kind::ExGraphics => "ExGraphics",
      Kind::SharedPalettes => "Shared Palettes",
      Kind::Overworld => "Overworld",
      Kind::TitleScreen => "Title Screen",
      Kind::Credits => "Credits",
      Kind::GlobalExAnimation => "Global ExAnimation",
      Kind::TitleMoves => "Title Screen Movement",
      Kind::Levels => "Levels",
      Kind::Map16 => "Map16",
      Kind::Patch => "Patch",
      Kind::Globule => "Globule",
    }
  }

  /// Whether descriptors of this kind carry a path.
  pub fn is_named(self) -> bool {
    matches!(self, Kind::Patch | Kind::Globule)
  }
}

impl fmt::Display for Kind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor {
  pub kind: Kind,
  #[serde(default)]
  pub name: Option<PathBuf>,
}

impl Descriptor {
  pub fn new(kind: Kind) -> Self {
    Self { kind, name: None }
  }

  pub fn named(kind: Kind, name: impl Into<PathBuf>) -> Self {
    Self {
      kind,
      name: Some(name.into()),
    }
  }

  pub fn patch(path: impl Into<PathBuf>) -> Self {
    Self::named(Kind::Patch, path)
  }

  pub fn globule(path: impl Into<PathBuf>) -> Self {
    Self::named(Kind::Globule, path)
  }

  /// Human readable label with the name shown relative to `project_root`.
  pub fn label(&self, project_root: &Path) -> String {
    match &self.name {
      Some(name) => {
        let shown = name.strip_prefix(project_root).unwrap_or(name);
        format!("{} '{}'", self.kind, shown.display())
      }
      None => self.kind.to_string(),
    }
  }
}

impl fmt::Display for Descriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.name {
      Some(name) => write!(f, "{} '{}'", self.kind, name.display()),
      None => write!(f, "{}", self.kind),
    }
  }
}
