//! Key paths understood by [`super::Configuration`].

use crate::descriptor::Kind;

pub const PROJECT_ROOT: &str = "project_root";

pub const OUTPUT_ROM: &str = "output.rom";
pub const TEMPORARY_ROM: &str = "output.temporary_rom";

pub const CLEAN_ROM: &str = "rom.clean";
pub const ROM_SIZE: &str = "rom.size";

pub const EDITOR: &str = "tools.editor";
pub const FLIPS: &str = "tools.flips";

pub const INCLUDE_PATHS: &str = "patches.include_paths";
pub const GLOBULE_HEADER: &str = "globules.header";

pub const INITIAL_PATCH: &str = "resources.initial_patch";
pub const GRAPHICS: &str = "resources.graphics";
pub const EX_GRAPHICS: &str = "resources.ex_graphics";
pub const SHARED_PALETTES: &str = "resources.shared_palettes";
pub const OVERWORLD: &str = "resources.overworld";
pub const TITLE_SCREEN: &str = "resources.title_screen";
pub const CREDITS: &str = "resources.credits";
pub const GLOBAL_EXANIMATION: &str = "resources.global_exanimation";
pub const TITLE_MOVES: &str = "resources.title_moves";
pub const LEVELS: &str = "resources.levels";
pub const MAP16: &str = "resources.map16";

/// Keys holding filesystem paths. Relative values are resolved against the
/// project root.
pub const PATH_KEYS: &[&str] = &[
  OUTPUT_ROM,
  TEMPORARY_ROM,
  CLEAN_ROM,
  EDITOR,
  FLIPS,
  GLOBULE_HEADER,
  INITIAL_PATCH,
  GRAPHICS,
  EX_GRAPHICS,
  SHARED_PALETTES,
  OVERWORLD,
  TITLE_SCREEN,
  CREDITS,
  GLOBAL_EXANIMATION,
  TITLE_MOVES,
  LEVELS,
  MAP16,
];

/// Configuration key holding the source of a static resource kind.
pub fn resource_key(kind: Kind) -> Option<&'static str> {
  let key = match kind {
    Kind::InitialPatch => INITIAL_PATCH,
    Kind::Graphics => GRAPHICS,
    Kind::ExGraphics => EX_GRAPHICS,
    Kind::SharedPalettes => SHARED_PALETTES,
    Kind::Overworld => OVERWORLD,
    Kind::TitleScreen => TITLE_SCREEN,
    Kind::Credits => CREDITS,
    Kind::GlobalExAnimation => GLOBAL_EXANIMATION,
    Kind::TitleMoves => TITLE_MOVES,
    Kind::Levels => LEVELS,
    Kind::Map16 => MAP16,
    Kind::Patch | Kind::Globule => return None,
  };
  Some(key)
}
