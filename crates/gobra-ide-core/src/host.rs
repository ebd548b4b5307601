//! Collaborators the coordinator talks to.
//!
//! Every trait method returns immediately. Work that has to wait (saving
//! buffers, spawning tool processes) takes a completion handle and reports
//! back by posting an [`Event`] into the event loop.

use std::path::PathBuf;

use gobra_ide_config::GobraDependencies;
use gobra_ide_proto::{HighlightingPosition, Outbound, PreviewKind};
use serde_json::Value;

use crate::event_loop::{Event, EventSender};
use crate::file_set::FileId;
use crate::outcome::{SaveError, ToolchainError};
use crate::status::{MemberDecorations, Status};
use crate::tracker::SaveId;

/// Fire-and-forget channel to the verification backend.
pub trait BackendChannel: Send {
    fn send(&self, message: Outbound);
}

/// The editor the bridge serves.
pub trait EditorHost: Send {
    /// Save every dirty `.gobra` and `.go` buffer, then call `done`.
    fn save_dirty_buffers(&self, done: SaveCompletion);

    fn show_info(&self, message: String);

    fn show_error(&self, message: String);

    fn set_status(&self, status: Status);

    fn decorate_members(&self, decorations: MemberDecorations);

    fn open_document(&self, file: FileId);

    fn show_preview(&self, preview: CodePreview);

    /// Pass `textDocument/publishDiagnostics` params from the backend on.
    fn forward_diagnostics(&self, params: Value);
}

/// Source tree queries.
pub trait Workspace: Send {
    /// Every verifiable file of the package `file` belongs to, `file`
    /// included.
    fn package_files(&self, file: &FileId) -> Vec<FileId>;
}

/// Checks that the external tools the backend needs are usable.
pub trait Toolchain: Send {
    fn check(&self, dependencies: GobraDependencies, done: ToolchainCompletion);
}

/// The four collaborators, owned by the coordinator.
pub struct Collaborators {
    pub backend: Box<dyn BackendChannel>,
    pub host: Box<dyn EditorHost>,
    pub workspace: Box<dyn Workspace>,
    pub toolchain: Box<dyn Toolchain>,
}

/// A rendered intermediate representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodePreview {
    pub kind: PreviewKind,
    pub content: String,
    pub highlighted: Vec<HighlightingPosition>,
}

/// Tool locations confirmed by a toolchain check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTools {
    pub java: PathBuf,
    pub z3: PathBuf,
    pub boogie: PathBuf,
}

/// Reports the end of a buffer save back to the event loop.
#[must_use = "the coordinator waits until the save is completed"]
#[derive(Debug)]
pub struct SaveCompletion {
    id: SaveId,
    events: EventSender,
}

impl SaveCompletion {
    pub fn new(id: SaveId, events: EventSender) -> Self {
        Self { id, events }
    }

    pub fn id(&self) -> SaveId {
        self.id
    }

    pub fn complete(self, result: Result<(), SaveError>) {
        // A closed loop means we are shutting down
        let _ = self.events.send(Event::BuffersSaved {
            id: self.id,
            result,
        });
    }
}

/// Reports the end of a toolchain check back to the event loop.
#[must_use = "dispatch stays blocked until the check is completed"]
#[derive(Debug)]
pub struct ToolchainCompletion {
    generation: u64,
    events: EventSender,
}

impl ToolchainCompletion {
    pub fn new(generation: u64, events: EventSender) -> Self {
        Self { generation, events }
    }

    pub fn complete(self, result: Result<ResolvedTools, ToolchainError>) {
        let _ = self.events.send(Event::ToolchainChecked {
            generation: self.generation,
            result,
        });
    }
}
