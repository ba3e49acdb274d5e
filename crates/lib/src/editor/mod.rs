//! External level editor: command line invocation and the shared-memory
//! session used to exchange state with a running instance.

mod process;
mod session;

pub use process::{EditorProcess, ExternalTool};
pub use session::{EditorSession, SharedState, SharedStateWriter};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
  #[error("{tool} not found at {path}")]
  ToolNotFound { tool: &'static str, path: PathBuf },

  #[error("failed to start {tool}: {source}")]
  Spawn {
    tool: &'static str,
    #[source]
    source: io::Error,
  },

  #[error("{tool} {args} failed with exit code {code:?}")]
  Failed {
    tool: &'static str,
    args: String,
    code: Option<i32>,
  },
}

#[derive(Debug, Error)]
pub enum SessionError {
  #[error("failed to create session segment: {0}")]
  Create(#[source] io::Error),

  #[error("session '{0}' does not exist")]
  NotFound(String),

  #[error("failed to open session segment: {0}")]
  Open(#[source] io::Error),

  #[error("failed to map session segment: {0}")]
  Map(#[source] io::Error),

  #[error("session segment is {0} bytes, too small")]
  Corrupt(usize),

  #[error("failed to lock session segment: {0}")]
  Lock(#[source] io::Error),

  #[error("ROM path of {0} bytes does not fit the session segment")]
  PathTooLong(usize),
}
