//! Notification contract between the IDE bridge and the Gobra server.
//!
//! The server is reached over JSON-RPC 2.0 with LSP base-protocol framing.
//! Apart from the `initialize` handshake everything is a fire-and-forget
//! notification: requests go out as [`Outbound`] notifications and results
//! come back later as separate [`Inbound`] notifications.
//!
//! Outbound payloads are JSON-encoded strings passed as the single
//! positional parameter. Inbound notifications use positional parameters,
//! some of which are themselves JSON-encoded strings.

mod codec;
mod inbound;
mod outbound;

use serde::{Deserialize, Serialize};

pub use codec::{Message, MessageKind, read_message, write_message};
pub use gobra_ide_config::GobraSettings;
pub use inbound::Inbound;
pub use outbound::Outbound;

/// JSON-RPC method names understood by the Gobra server and the bridge.
pub mod methods {
    // Handled by the server
    pub const VERIFY: &str = "gobraServer/verify";
    pub const CHANGE_FILE: &str = "gobraServer/changeFile";
    pub const FLUSH_CACHE: &str = "gobraServer/flushCache";
    pub const GOIFY_FILE: &str = "gobraServer/goifyFile";
    pub const GOBRAFY_FILE: &str = "gobraServer/gobrafyFile";
    pub const CODE_PREVIEW: &str = "gobraServer/codePreview";

    // Handled by the bridge
    pub const OVERALL_RESULT: &str = "gobraServer/overallResult";
    pub const NO_VERIFICATION_INFORMATION: &str = "gobraServer/noVerificationInformation";
    pub const VERIFICATION_PROGRESS: &str = "gobraServer/verificationProgress";
    pub const VERIFICATION_EXCEPTION: &str = "gobraServer/verificationException";
    pub const FINISHED_GOIFYING: &str = "gobraServer/finishedGoifying";
    pub const FINISHED_GOBRAFYING: &str = "gobraServer/finishedGobrafying";
    pub const FINISHED_VIPER_CODE_PREVIEW: &str = "gobraServer/finishedViperCodePreview";
    pub const FINISHED_INTERNAL_CODE_PREVIEW: &str = "gobraServer/finishedInternalCodePreview";

    // Standard LSP traffic the server emits
    pub const PUBLISH_DIAGNOSTICS: &str = "textDocument/publishDiagnostics";
    pub const LOG_MESSAGE: &str = "window/logMessage";

    // Lifecycle
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "initialized";
    pub const SHUTDOWN: &str = "shutdown";
    pub const EXIT: &str = "exit";
}

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("backend channel I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is missing the Content-Length header")]
    MissingContentLength,

    #[error("invalid header line {0:?}")]
    InvalidHeader(String),

    #[error("stream ended in the middle of a message")]
    UnexpectedEof,

    #[error("{method}: parameter {index} is missing")]
    MissingParam { method: String, index: usize },

    #[error("{method}: parameter {index} is malformed: {source}")]
    MalformedParam {
        method: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// Payloads
// ============================================================================

/// A file as the server sees it: its path and its URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub file_path: String,
    pub file_uri: String,
}

/// Restricts a verification to the members on the given (1-based) lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationData {
    pub file_uri: String,
    pub line_nrs: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// Payload of a `verify` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifierConfig {
    pub file_data: Vec<FileData>,
    pub gobra_settings: GobraSettings,
    pub z3_executable: String,
    pub boogie_executable: String,
    #[serde(default)]
    pub isolate: Vec<IsolationData>,
}

/// Which intermediate representation a code preview renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewKind {
    /// The translated Viper program.
    Viper,
    /// Gobra's internal representation.
    Internal,
}

/// Payload of a `codePreview` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewData {
    pub file_data: Vec<FileData>,
    pub internal_preview: bool,
    pub viper_preview: bool,
    pub selections: Vec<Range>,
}

impl PreviewData {
    pub fn new(file_data: Vec<FileData>, kind: PreviewKind, selections: Vec<Range>) -> Self {
        Self {
            file_data,
            internal_preview: kind == PreviewKind::Internal,
            viper_preview: kind == PreviewKind::Viper,
            selections,
        }
    }
}

/// Result of verifying one file set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallResult {
    pub file_uris: Vec<String>,
    pub success: bool,
    pub message: String,
    /// Per-member results; older servers do not send them.
    #[serde(default)]
    pub members: Vec<MemberResult>,
}

/// Verification result of a single member (function, method, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResult {
    pub file_uri: String,
    pub success: bool,
    #[serde(default)]
    pub is_unknown: bool,
    pub range: Range,
}

/// A highlighted span in a code preview, as a character offset and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightingPosition {
    pub start_index: u32,
    pub length: u32,
}
