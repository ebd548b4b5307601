//! Editor-facing side of the bridge.
//!
//! The editor speaks LSP to us. Standard document notifications and
//! `workspace/executeCommand` become coordinator events; everything the
//! coordinator wants to show goes back as `gobra/*` notifications.

pub mod lsp;

pub use lsp::run;
