//! Crate-wide constants.

/// Application name, used for the project directory and the ROM marker.
pub const APP_NAME: &str = "asteria";

/// Version of the build report document format.
///
/// Bump whenever the shape or meaning of the report changes; a report with a
/// different version is never used for incremental decisions.
pub const BUILD_REPORT_VERSION: u32 = 1;

/// Capacity handed to the patch engine for the unheadered ROM buffer.
pub const MAX_ROM_SIZE: usize = 16 * 1024 * 1024;

/// Size of the unmodified game ROM. Patch writes below this offset are hijacks.
pub const ORIGINAL_ROM_SIZE: usize = 0x80000;

/// Mask applied to the ROM file length to obtain the copier header size.
pub const HEADER_MASK: usize = 0x7FFF;
