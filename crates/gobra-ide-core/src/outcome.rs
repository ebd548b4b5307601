//! Tagged results of admission decisions and of finished verifications.

use std::path::PathBuf;

use gobra_ide_config::SettingsError;
use gobra_ide_proto::OverallResult;

use crate::file_set::{FileId, FileSetKey};
use crate::trigger::TriggerKind;

/// The editor could not save dirty buffers ahead of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Saving {subject} before verification failed")]
pub struct SaveError {
    pub subject: String,
}

impl SaveError {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

/// Why a request was not sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("{} was resolved to zero package files", .0.display_path())]
    EmptyPackage(FileId),

    #[error("there is no file to verify")]
    NothingToVerify,

    #[error("Gobra can only verify files with '.gobra' and '.go' endings but got '{}'", join_paths(.0))]
    UnsupportedKind(Vec<FileId>),

    #[error("Go files are only verified on manual request")]
    GoRequiresManual,

    #[error("{} is currently being transformed", .0.display_path())]
    UnderTransform(FileId),

    #[error("{}", .direction.already_running_message(.file))]
    AlreadyTransforming {
        direction: crate::transform::TransformDirection,
        file: FileId,
    },

    #[error("the Gobra tools are still being checked")]
    ToolchainNotReady,

    #[error("the Gobra tools are not usable: {0}")]
    ToolchainUnavailable(ToolchainError),

    #[error("the connection to the Gobra server is closed")]
    BackendUnavailable,

    #[error("no Gobra or Go file is focused")]
    NoFocusedFile,

    #[error("verifying a member needs a cursor position")]
    NoCursorPosition,

    #[error(transparent)]
    SaveFailed(#[from] SaveError),
}

/// Why the Gobra tools cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolchainError {
    /// A configured tool path did not resolve.
    #[error("{0}")]
    Unresolved(String),

    #[error("could not start {}: {reason}", .program.display())]
    NotStartable { program: PathBuf, reason: String },

    #[error("{} {flag} failed with {status}", .program.display())]
    Failed {
        program: PathBuf,
        flag: &'static str,
        status: String,
    },
}

impl From<SettingsError> for ToolchainError {
    fn from(err: SettingsError) -> Self {
        ToolchainError::Unresolved(err.to_string())
    }
}

fn join_paths(files: &[FileId]) -> String {
    files
        .iter()
        .map(FileId::display_path)
        .collect::<Vec<_>>()
        .join("', '")
}

/// What happened to a `verify` request that was not rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The file set was free; it is reserved and goes out once buffers are saved.
    Claimed(FileSetKey),
    /// Member-level run; goes out without deduplication.
    Isolated(FileSetKey),
    /// The file set is busy; the trigger is kept for a rerun.
    Queued {
        key: FileSetKey,
        trigger: TriggerKind,
    },
    /// The file set is busy and the request was a save, which never queues.
    Dropped(FileSetKey),
}

/// How a verification attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Verified. `partial` when only some members were verified.
    Success { partial: bool },
    VerificationFailed,
    BackendException,
    /// Never reached the backend.
    DispatchRejected(Rejection),
}

impl VerificationOutcome {
    pub fn from_result(result: &OverallResult) -> Self {
        if !result.success {
            VerificationOutcome::VerificationFailed
        } else {
            VerificationOutcome::Success {
                partial: !result.members.is_empty(),
            }
        }
    }
}
