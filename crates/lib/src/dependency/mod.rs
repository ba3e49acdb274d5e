//! What a unit's correctness depends on.
//!
//! Every dependency carries a [`Policy`] chosen by the unit that recorded it.
//! A changed [`Policy::Rebuild`] dependency invalidates the whole incremental
//! attempt; a changed [`Policy::Reinsert`] dependency only invalidates the
//! unit that declared it.

mod discovery;

pub use discovery::{DependencyError, extract_dependencies_from_report, resource_dependencies_for};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigValue, ConfigVariable, Configuration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
  Rebuild,
  Reinsert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationDependency {
  pub config_keys: String,
  pub value: ConfigValue,
  pub policy: Policy,
}

impl ConfigurationDependency {
  pub fn new(config_keys: impl Into<String>, value: ConfigValue, policy: Policy) -> Self {
    Self {
      config_keys: config_keys.into(),
      value,
      policy,
    }
  }

  /// Snapshot the current value of `key`.
  pub fn capture(config: &Configuration, key: &str, policy: Policy) -> Self {
    Self::new(key, config.get_by_key(key), policy)
  }

  pub fn has_changed(&self, config: &Configuration) -> bool {
    config.get_by_key(&self.config_keys) != self.value
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceDependency {
  pub path: PathBuf,
  /// Last write time in nanoseconds since the Unix epoch, `None` if the file
  /// did not exist when captured.
  pub timestamp: Option<u64>,
  pub policy: Policy,
}

impl ResourceDependency {
  pub fn new(path: impl Into<PathBuf>, timestamp: Option<u64>, policy: Policy) -> Self {
    Self {
      path: path.into(),
      timestamp,
      policy,
    }
  }

  pub fn capture(path: impl Into<PathBuf>, policy: Policy) -> Self {
    let path = path.into();
    let timestamp = last_write_time(&path);
    Self {
      path,
      timestamp,
      policy,
    }
  }

  pub fn has_changed(&self) -> bool {
    last_write_time(&self.path) != self.timestamp
  }
}

/// Last write time of `path` in nanoseconds since the Unix epoch.
pub fn last_write_time(path: &Path) -> Option<u64> {
  let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
  let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
  u64::try_from(since_epoch.as_nanos()).ok()
}

/// Collects the configuration variables a unit reads while it is inserted.
///
/// Only variables that are set are recorded; reading an unset variable leaves
/// no trace.
#[derive(Debug, Clone, Default)]
pub struct DependencyRecorder {
  dependencies: Vec<ConfigurationDependency>,
}

impl DependencyRecorder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, config: &Configuration, key: &str, policy: Policy) -> ConfigValue {
    let value = config.get_by_key(key);
    if !value.is_null() {
      self.record(ConfigurationDependency::new(key, value.clone(), policy));
    }
    value
  }

  pub fn register_path(&mut self, config: &Configuration, key: &'static str, policy: Policy) -> ConfigVariable<PathBuf> {
    self.register(config, key, policy);
    config.path(key)
  }

  pub fn dependencies(&self) -> &[ConfigurationDependency] {
    &self.dependencies
  }

  pub fn clear(&mut self) {
    self.dependencies.clear();
  }

  fn record(&mut self, dependency: ConfigurationDependency) {
    if !self.dependencies.contains(&dependency) {
      self.dependencies.push(dependency);
    }
  }
}
