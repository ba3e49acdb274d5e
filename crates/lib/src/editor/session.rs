//! State shared with a running editor through a memory-mapped segment.
//!
//! The segment is a fixed-size file in the OS temporary directory. An
//! exclusive advisory lock on that file serves as the inter-process mutex:
//! every read or write of the mapped bytes happens while it is held.
//!
//! # Layout
//!
//! ```text
//! 0x000  u8        set
//! 0x001  u8        usertoolbar_needs_cleaning
//! 0x002  u16 LE    verification_code
//! 0x004  u32 LE    hwnd
//! 0x008  [u8; 260] current_rom (UTF-8, NUL terminated)
//! ```

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use memmap2::MmapMut;
use tracing::{debug, warn};

use super::SessionError;

const MAX_PATH: usize = 260;
const SEGMENT_SIZE: usize = 8 + MAX_PATH;
const SEGMENT_PREFIX: &str = "asteria_session_";

/// Snapshot of the editor's side of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedState {
  pub set: bool,
  pub usertoolbar_needs_cleaning: bool,
  pub verification_code: u16,
  pub hwnd: u32,
  pub current_rom: Option<PathBuf>,
}

impl SharedState {
  fn decode(bytes: &[u8]) -> Self {
    let path_bytes = &bytes[8..SEGMENT_SIZE];
    let end = path_bytes.iter().position(|&b| b == 0).unwrap_or(MAX_PATH);
    let current_rom = (end != 0).then(|| PathBuf::from(String::from_utf8_lossy(&path_bytes[..end]).into_owned()));

    Self {
      set: bytes[0] != 0,
      usertoolbar_needs_cleaning: bytes[1] != 0,
      verification_code: u16::from_le_bytes([bytes[2], bytes[3]]),
      hwnd: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
      current_rom,
    }
  }

  fn encode(&self, bytes: &mut [u8]) -> Result<(), SessionError> {
    let path = self
      .current_rom
      .as_ref()
      .map(|p| p.to_string_lossy().into_owned())
      .unwrap_or_default();
    if path.len() >= MAX_PATH {
      return Err(SessionError::PathTooLong(path.len()));
    }

    bytes[0] = u8::from(self.set);
    bytes[1] = u8::from(self.usertoolbar_needs_cleaning);
    bytes[2..4].copy_from_slice(&self.verification_code.to_le_bytes());
    bytes[4..8].copy_from_slice(&self.hwnd.to_le_bytes());
    let path_slot = &mut bytes[8..SEGMENT_SIZE];
    path_slot.fill(0);
    path_slot[..path.len()].copy_from_slice(path.as_bytes());
    Ok(())
  }
}

struct Segment {
  file: File,
  map: MmapMut,
}

impl Segment {
  fn map(file: File) -> Result<Self, SessionError> {
    // SAFETY: the segment file is only modified through mappings while the
    // advisory lock is held, and its length is fixed at creation.
    let map = unsafe { MmapMut::map_mut(&file) }.map_err(SessionError::Map)?;
    if map.len() < SEGMENT_SIZE {
      return Err(SessionError::Corrupt(map.len()));
    }
    Ok(Self { file, map })
  }

  fn locked<T>(&mut self, f: impl FnOnce(&mut [u8]) -> T) -> Result<T, SessionError> {
    lock(&self.file).map_err(SessionError::Lock)?;
    let result = f(&mut self.map[..SEGMENT_SIZE]);
    let flushed = self.map.flush();
    if let Err(e) = unlock(&self.file) {
      warn!(error = %e, "failed to release session lock");
    }
    flushed.map_err(SessionError::Map)?;
    Ok(result)
  }
}

fn segment_path(name: &str) -> PathBuf {
  std::env::temp_dir().join(name)
}

/// Removes the segment file once the mapping has been released.
struct SegmentFile {
  name: String,
  path: PathBuf,
}

impl Drop for SegmentFile {
  fn drop(&mut self) {
    match fs::remove_file(&self.path) {
      Ok(()) => debug!(name = %self.name, "destroyed editor session"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => warn!(name = %self.name, error = %e, "failed to destroy editor session"),
    }
  }
}

/// Consumer side of the session. Owns the segment and destroys it on drop.
pub struct EditorSession {
  // Unmapped before `file` removes the backing file.
  segment: Segment,
  file: SegmentFile,
}

impl EditorSession {
  /// Create a fresh segment named after the current high-resolution time.
  pub fn create() -> Result<Self, SessionError> {
    let nanos = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_nanos())
      .unwrap_or_default();
    let name = format!("{}{}", SEGMENT_PREFIX, nanos);
    let path = segment_path(&name);

    let handle = OpenOptions::new()
      .read(true)
      .write(true)
      .create_new(true)
      .open(&path)
      .map_err(SessionError::Create)?;
    handle.set_len(SEGMENT_SIZE as u64).map_err(SessionError::Create)?;

    let file = SegmentFile { name, path };
    let segment = Segment::map(handle)?;
    debug!(name = %file.name, path = %file.path.display(), "created editor session");
    Ok(Self { segment, file })
  }

  pub fn name(&self) -> &str {
    &self.file.name
  }

  pub fn path(&self) -> &Path {
    &self.file.path
  }

  /// Lock-guarded snapshot of the shared state.
  pub fn read(&mut self) -> Result<SharedState, SessionError> {
    self.segment.locked(|bytes| SharedState::decode(bytes))
  }
}

/// Producer side, attached to an existing session by name.
pub struct SharedStateWriter {
  segment: Segment,
}

impl SharedStateWriter {
  pub fn open(name: &str) -> Result<Self, SessionError> {
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .open(segment_path(name))
      .map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
          SessionError::NotFound(name.to_string())
        } else {
          SessionError::Open(e)
        }
      })?;
    Ok(Self {
      segment: Segment::map(file)?,
    })
  }

  pub fn write(&mut self, state: &SharedState) -> Result<(), SessionError> {
    self.segment.locked(|bytes| state.encode(bytes))?
  }
}

#[cfg(unix)]
fn lock(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::LockExclusive).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(unix)]
fn unlock(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::Unlock).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn lock(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized.
  // LockFileEx is safe to call with a valid file handle and zeroed OVERLAPPED.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, LOCKFILE_EXCLUSIVE_LOCK, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}

#[cfg(windows)]
fn unlock(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::UnlockFileEx;

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: same handle and range as the matching LockFileEx call.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    UnlockFileEx(handle, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}
