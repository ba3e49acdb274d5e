//! asteria-lib: incremental ROM builds
//!
//! This crate provides the pieces a ROM hacking project is built from:
//! - `Configuration`: the project's settings and build order
//! - `Insertable`: one buildable unit (patch, globule, editor resource, ...)
//! - `BuildReport`: dependency snapshot of the last successful build
//! - `QuickBuilder` / `Rebuilder`: incremental and full builds
//! - `EditorSession`: state shared with a running level editor

pub mod builder;
pub mod config;
pub mod consts;
pub mod dependency;
pub mod descriptor;
pub mod editor;
pub mod hijack;
pub mod insertable;
pub mod levels;
pub mod marker;
pub mod patch;
pub mod paths;
pub mod report;

pub use builder::{BuildError, QuickBuildOutcome, QuickBuilder, RebuildOutcome, RebuildReason, Rebuilder};
pub use config::Configuration;
pub use descriptor::{Descriptor, Kind};
