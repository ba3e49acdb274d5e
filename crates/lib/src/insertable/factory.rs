use super::{BpsTransfer, EditorResource, Globule, InitialPatch, InsertError, Insertable, PatchFile};
use crate::config::Configuration;
use crate::descriptor::{Descriptor, Kind};

/// Maps a descriptor to the behaviour that inserts it.
pub trait InsertableFactory {
  fn create(&self, descriptor: &Descriptor, config: &Configuration) -> Result<Box<dyn Insertable>, InsertError>;
}

/// Factory for every built-in unit kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInsertableFactory;

impl InsertableFactory for DefaultInsertableFactory {
  fn create(&self, descriptor: &Descriptor, config: &Configuration) -> Result<Box<dyn Insertable>, InsertError> {
    let unnamed = || InsertError::Failed(format!("{} requires a path", descriptor.kind));

    let insertable: Box<dyn Insertable> = match descriptor.kind {
      Kind::InitialPatch => Box::new(InitialPatch::new(config)?),
      Kind::Graphics | Kind::ExGraphics | Kind::SharedPalettes | Kind::TitleMoves | Kind::Levels | Kind::Map16 => {
        Box::new(EditorResource::new(config, descriptor.kind)?)
      }
      Kind::Overworld | Kind::TitleScreen | Kind::Credits | Kind::GlobalExAnimation => {
        Box::new(BpsTransfer::new(config, descriptor.kind)?)
      }
      Kind::Patch => Box::new(PatchFile::new(config, descriptor.name.as_deref().ok_or_else(unnamed)?)?),
      Kind::Globule => Box::new(Globule::new(config, descriptor.name.as_deref().ok_or_else(unnamed)?)?),
    };
    Ok(insertable)
  }
}
