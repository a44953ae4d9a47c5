//! `magicmount` composes the file trees of installed modules onto the system partitions of a
//! running Android device, without modifying the partitions themselves.
//!
//! # Overview
//!
//! Each module ships a `system/` subtree mirroring the layout of `/system`. At boot, magicmount:
//! - enumerates the modules and skips the disabled ones
//! - merges their `system/` subtrees into one virtual tree
//! - bind-mounts each module file over its real counterpart
//! - rebuilds any directory that gains, loses or changes an entry in a private tmpfs staging
//!   area, then moves the rebuilt directory over the real one
//!
//! Entries can be deleted with overlay-style whiteouts (character devices with device number 0),
//! and a module directory carrying `trusted.overlay.opaque = y` replaces the real directory
//! entirely instead of merging with it.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use magicmount::{config::MountConfig, mount};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = MountConfig::builder()
//!         .module_dir("/data/adb/modules")
//!         .build();
//!
//!     mount::compose_and_mount(&config)?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`] - Configuration and device layout defaults
//! - [`modules`] - Module enumeration
//! - [`tree`] - The merged module tree
//! - [`mount`] - Mounting the tree onto the real filesystem
//! - [`label`] - Security label propagation
//! - [`cli`] - Command-line interface and argument parsing
//! - [`utils`] - Common utilities

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod config;
pub mod label;
pub mod modules;
pub mod mount;
pub mod tree;
pub mod utils;

pub use error::*;
