//! gobra-ide - LSP bridge for the Gobra verifier
//!
//! Sits between an editor and a Gobra verification server: the editor talks
//! LSP to the bridge, the bridge talks JSON-RPC notifications to the
//! server, and [`gobra_ide_core::Coordinator`] decides in between what gets
//! verified when.
//!
//! The pieces plugged into the coordinator live here:
//!
//! - [`backend`]: the connection to the Gobra server
//! - [`bridge`]: the LSP server the editor connects to
//! - [`workspace`]: package resolution on the file system
//! - [`toolchain`]: the java / z3 / boogie check

pub mod backend;
pub mod bridge;
pub mod toolchain;
pub mod workspace;

use std::path::PathBuf;

/// Where settings are read from when no `--settings` is given.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gobra-ide").join("settings.json"))
}
