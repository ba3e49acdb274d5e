//! Typed key store filled by the project configuration loader.
//!
//! Values are addressed by dotted key paths (see [`keys`]). Reading a key that
//! is not present yields [`ConfigValue::Null`]; the typed accessors wrap the
//! value in a [`ConfigVariable`] so callers can either require it or check it.

pub mod keys;
mod types;

pub use types::{ConfigError, ConfigValue, ConfigVariable};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::{Descriptor, Kind};
use crate::paths::{ProjectPaths, normalize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
  #[serde(default)]
  values: BTreeMap<String, ConfigValue>,
  #[serde(default)]
  build_order: Vec<Descriptor>,
}

impl Configuration {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load a configuration document.
  ///
  /// When the document does not name a project root, the directory holding
  /// the document is used.
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let mut config: Configuration = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let root = match config.values.get(keys::PROJECT_ROOT) {
      Some(ConfigValue::String(root)) => normalize(Path::new(root), base),
      _ => normalize(Path::new("."), base),
    };
    config.set(keys::PROJECT_ROOT, root);
    config.validate()?;

    debug!(
      path = %path.display(),
      keys = config.values.len(),
      units = config.build_order.len(),
      "loaded configuration"
    );
    Ok(config)
  }

  /// Check that every known key holds a value of the expected type and that
  /// named unit kinds carry a path.
  pub fn validate(&self) -> Result<(), ConfigError> {
    for (key, value) in &self.values {
      let expected = match key.as_str() {
        keys::ROM_SIZE => match value {
          ConfigValue::Integer(size) if *size >= 0 => continue,
          _ => "non-negative integer",
        },
        keys::INCLUDE_PATHS => match value {
          ConfigValue::List(_) => continue,
          _ => "list",
        },
        k if k == keys::PROJECT_ROOT || keys::PATH_KEYS.contains(&k) => match value {
          ConfigValue::String(_) => continue,
          _ => "string",
        },
        _ => continue,
      };
      if value.is_null() {
        continue;
      }
      return Err(ConfigError::WrongType {
        key: key.clone(),
        expected,
        found: value.type_name(),
      });
    }

    for descriptor in &self.build_order {
      if descriptor.kind.is_named() && descriptor.name.is_none() {
        return Err(ConfigError::UnnamedEntry(descriptor.kind.to_string()));
      }
    }
    Ok(())
  }

  pub fn get_by_key(&self, key: &str) -> ConfigValue {
    self.values.get(key).cloned().unwrap_or_default()
  }

  pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> &mut Self {
    let value = value.into();
    let key = key.into();
    if value.is_null() {
      self.values.remove(&key);
    } else {
      self.values.insert(key, value);
    }
    self
  }

  pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
    self.set(key, value);
    self
  }

  pub fn set_build_order(&mut self, build_order: Vec<Descriptor>) -> &mut Self {
    self.build_order = build_order;
    self
  }

  pub fn with_build_order(mut self, build_order: Vec<Descriptor>) -> Self {
    self.build_order = build_order;
    self
  }

  pub fn project_root(&self) -> ConfigVariable<PathBuf> {
    let value = match self.values.get(keys::PROJECT_ROOT) {
      Some(ConfigValue::String(root)) => Some(PathBuf::from(root)),
      _ => None,
    };
    ConfigVariable::new(keys::PROJECT_ROOT, value)
  }

  pub fn project_paths(&self) -> Result<ProjectPaths, ConfigError> {
    Ok(ProjectPaths::new(self.project_root().get()?.clone()))
  }

  /// Path-valued variable, resolved against the project root when relative.
  pub fn path(&self, key: &'static str) -> ConfigVariable<PathBuf> {
    let value = match self.values.get(key) {
      Some(ConfigValue::String(raw)) => Some(self.resolve(Path::new(raw))),
      _ => None,
    };
    ConfigVariable::new(key, value)
  }

  pub fn output_rom(&self) -> ConfigVariable<PathBuf> {
    self.path(keys::OUTPUT_ROM)
  }

  pub fn temporary_rom(&self) -> ConfigVariable<PathBuf> {
    self.path(keys::TEMPORARY_ROM)
  }

  pub fn clean_rom(&self) -> ConfigVariable<PathBuf> {
    self.path(keys::CLEAN_ROM)
  }

  pub fn editor(&self) -> ConfigVariable<PathBuf> {
    self.path(keys::EDITOR)
  }

  pub fn flips(&self) -> ConfigVariable<PathBuf> {
    self.path(keys::FLIPS)
  }

  pub fn globule_header(&self) -> ConfigVariable<PathBuf> {
    self.path(keys::GLOBULE_HEADER)
  }

  /// Expected size of the built ROM, if the project fixes one.
  pub fn rom_size(&self) -> ConfigVariable<u64> {
    let value = match self.values.get(keys::ROM_SIZE) {
      Some(ConfigValue::Integer(size)) => u64::try_from(*size).ok(),
      _ => None,
    };
    ConfigVariable::new(keys::ROM_SIZE, value)
  }

  pub fn include_paths(&self) -> ConfigVariable<Vec<PathBuf>> {
    let value = match self.values.get(keys::INCLUDE_PATHS) {
      Some(ConfigValue::List(items)) => Some(items.iter().map(|p| self.resolve(Path::new(p))).collect()),
      _ => None,
    };
    ConfigVariable::new(keys::INCLUDE_PATHS, value)
  }

  /// Source path of a static resource kind.
  pub fn resource(&self, kind: Kind) -> Option<ConfigVariable<PathBuf>> {
    keys::resource_key(kind).map(|key| self.path(key))
  }

  /// Build order with descriptor paths resolved against the project root.
  pub fn build_order(&self) -> Vec<Descriptor> {
    self
      .build_order
      .iter()
      .map(|descriptor| Descriptor {
        kind: descriptor.kind,
        name: descriptor.name.as_deref().map(|name| self.resolve(name)),
      })
      .collect()
  }

  fn resolve(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      return path.to_path_buf();
    }
    match self.project_root().into_value() {
      Some(root) => root.join(path),
      None => path.to_path_buf(),
    }
  }
}
