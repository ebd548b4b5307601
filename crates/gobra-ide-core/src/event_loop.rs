//! The single task every coordinator state change runs on.
//!
//! Editor events, backend notifications, timer expiries and completions of
//! suspended work all arrive as [`Event`]s on one unbounded channel. The loop
//! hands them to the [`Coordinator`] one at a time, so handlers never
//! interleave.

use std::ops::ControlFlow;

use gobra_ide_config::Settings;
use gobra_ide_proto::{Inbound, PreviewKind, Range};
use tokio::sync::mpsc;
use tracing::info;

use crate::coordinator::Coordinator;
use crate::file_set::FileId;
use crate::host::ResolvedTools;
use crate::outcome::{SaveError, ToolchainError};
use crate::tracker::SaveId;

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug)]
pub enum Event {
    /// Run the initial toolchain check.
    Start,
    DocumentOpened(FileId),
    DocumentSaved(FileId),
    DocumentEdited {
        file: FileId,
        /// `false` for change callbacks that carry no edit.
        has_content_change: bool,
    },
    /// The editor focused another document, or none.
    FocusChanged(Option<FileId>),
    Command {
        command: EditorCommand,
        target: Option<CommandTarget>,
    },
    SettingsChanged(Settings),
    Backend(Inbound),
    BackendClosed,
    BuffersSaved {
        id: SaveId,
        result: Result<(), SaveError>,
    },
    DebounceElapsed {
        generation: u64,
    },
    ToolchainChecked {
        generation: u64,
        result: Result<ResolvedTools, ToolchainError>,
    },
    Shutdown,
}

/// Commands the editor can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorCommand {
    /// File or package, depending on settings.
    Verify,
    VerifyFile,
    VerifyPackage,
    /// Only the member under the cursor.
    VerifyMember,
    FlushCache,
    GoifyFile,
    GobrafyFile,
    UpdateGobraTools,
    ShowViperCodePreview,
    ShowInternalCodePreview,
}

impl EditorCommand {
    pub const ALL: [EditorCommand; 10] = [
        EditorCommand::Verify,
        EditorCommand::VerifyFile,
        EditorCommand::VerifyPackage,
        EditorCommand::VerifyMember,
        EditorCommand::FlushCache,
        EditorCommand::GoifyFile,
        EditorCommand::GobrafyFile,
        EditorCommand::UpdateGobraTools,
        EditorCommand::ShowViperCodePreview,
        EditorCommand::ShowInternalCodePreview,
    ];

    pub fn id(self) -> &'static str {
        match self {
            EditorCommand::Verify => "gobra.verify",
            EditorCommand::VerifyFile => "gobra.verifyFile",
            EditorCommand::VerifyPackage => "gobra.verifyPackage",
            EditorCommand::VerifyMember => "gobra.verifyMember",
            EditorCommand::FlushCache => "gobra.flushCache",
            EditorCommand::GoifyFile => "gobra.goifyFile",
            EditorCommand::GobrafyFile => "gobra.gobrafyFile",
            EditorCommand::UpdateGobraTools => "gobra.updateGobraTools",
            EditorCommand::ShowViperCodePreview => "gobra.showViperCodePreview",
            EditorCommand::ShowInternalCodePreview => "gobra.showInternalCodePreview",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.id() == id)
    }

    pub(crate) fn preview_kind(self) -> Option<PreviewKind> {
        match self {
            EditorCommand::ShowViperCodePreview => Some(PreviewKind::Viper),
            EditorCommand::ShowInternalCodePreview => Some(PreviewKind::Internal),
            _ => None,
        }
    }
}

/// Where a command applies. Without one, commands use the focused file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTarget {
    pub file: FileId,
    /// Zero-based cursor line.
    pub line: Option<u32>,
    pub selections: Vec<Range>,
}

impl CommandTarget {
    pub fn file(file: FileId) -> Self {
        Self {
            file,
            line: None,
            selections: Vec::new(),
        }
    }
}

pub struct EventLoop {
    coordinator: Coordinator,
    events: EventReceiver,
}

impl EventLoop {
    pub fn new(coordinator: Coordinator, events: EventReceiver) -> Self {
        Self {
            coordinator,
            events,
        }
    }

    /// Process events until [`Event::Shutdown`].
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            if let ControlFlow::Break(()) = self.coordinator.handle(event) {
                break;
            }
        }
        info!("Coordinator stopped");
    }
}
