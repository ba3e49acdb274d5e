use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single configuration value as seen through [`super::Configuration::get_by_key`].
///
/// Keys that are not set read as [`ConfigValue::Null`], so an unset variable and a
/// variable explicitly set to `null` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
  #[default]
  Null,
  Bool(bool),
  Integer(i64),
  String(String),
  List(Vec<String>),
}

impl ConfigValue {
  pub fn is_null(&self) -> bool {
    matches!(self, ConfigValue::Null)
  }

  pub fn type_name(&self) -> &'static str {
    match self {
      ConfigValue::Null => "null",
      ConfigValue::Bool(_) => "bool",
      ConfigValue::Integer(_) => "integer",
      ConfigValue::String(_) => "string",
      ConfigValue::List(_) => "list",
    }
  }
}

impl fmt::Display for ConfigValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigValue::Null => f.write_str("<unset>"),
      ConfigValue::Bool(b) => write!(f, "{}", b),
      ConfigValue::Integer(i) => write!(f, "{:#X}", i),
      ConfigValue::String(s) => write!(f, "'{}'", s),
      ConfigValue::List(items) => write!(f, "[{}]", items.join(", ")),
    }
  }
}

impl From<bool> for ConfigValue {
  fn from(value: bool) -> Self {
    ConfigValue::Bool(value)
  }
}

impl From<i64> for ConfigValue {
  fn from(value: i64) -> Self {
    ConfigValue::Integer(value)
  }
}

impl From<&str> for ConfigValue {
  fn from(value: &str) -> Self {
    ConfigValue::String(value.to_string())
  }
}

impl From<String> for ConfigValue {
  fn from(value: String) -> Self {
    ConfigValue::String(value)
  }
}

impl From<PathBuf> for ConfigValue {
  fn from(value: PathBuf) -> Self {
    ConfigValue::String(value.to_string_lossy().into_owned())
  }
}

impl From<Vec<String>> for ConfigValue {
  fn from(value: Vec<String>) -> Self {
    ConfigValue::List(value)
  }
}

/// Typed view of one configuration variable.
///
/// Either read with [`ConfigVariable::get`], which fails when the variable is
/// unset, or checked with [`ConfigVariable::is_set`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigVariable<T> {
  name: &'static str,
  value: Option<T>,
}

impl<T> ConfigVariable<T> {
  pub fn new(name: &'static str, value: Option<T>) -> Self {
    Self { name, value }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn is_set(&self) -> bool {
    self.value.is_some()
  }

  pub fn get(&self) -> Result<&T, ConfigError> {
    self.value.as_ref().ok_or(ConfigError::Unset { name: self.name })
  }

  pub fn value(&self) -> Option<&T> {
    self.value.as_ref()
  }

  pub fn into_value(self) -> Option<T> {
    self.value
  }
}

impl<T: Clone> ConfigVariable<T> {
  pub fn get_or(&self, default: T) -> T {
    self.value.clone().unwrap_or(default)
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("configuration variable '{name}' is not set")]
  Unset { name: &'static str },

  #[error("configuration variable '{key}' must be a {expected}, found {found}")]
  WrongType {
    key: String,
    expected: &'static str,
    found: &'static str,
  },

  #[error("failed to read configuration {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse configuration {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("build order entry {0} requires a path")]
  UnnamedEntry(String),
}
