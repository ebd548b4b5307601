//! gobra-ide-core - Verification request coordination
//!
//! Schedules verification requests for overlapping file sets against a
//! backend that reports results asynchronously: at most one verification per
//! file set is in flight, requests arriving meanwhile are coalesced into one
//! rerun, and edit bursts are debounced into a single request.
//!
//! All state lives in a [`Coordinator`] driven by one [`EventLoop`]. The
//! editor, the backend, the file system and the tool check are reached
//! through the traits in [`host`].

pub mod coordinator;
pub mod debounce;
pub mod event_loop;
pub mod file_set;
pub mod host;
pub mod outcome;
pub mod status;
pub mod tracker;
pub mod transform;
pub mod trigger;

pub use coordinator::Coordinator;
pub use debounce::DebounceTimer;
pub use event_loop::{
    CommandTarget, EditorCommand, Event, EventLoop, EventReceiver, EventSender, channel,
};
pub use file_set::{FileId, FileKind, FileSet, FileSetError, FileSetKey};
pub use host::{
    BackendChannel, CodePreview, Collaborators, EditorHost, ResolvedTools, SaveCompletion,
    Toolchain, ToolchainCompletion, Workspace,
};
pub use outcome::{Admission, Rejection, SaveError, ToolchainError, VerificationOutcome};
pub use status::{MemberDecorations, Status, StatusColor};
pub use tracker::{IsolatedRuns, PendingRequests, RunState, RunningSet, SaveId};
pub use transform::{TransformDirection, TransformTrackers};
pub use trigger::TriggerKind;
