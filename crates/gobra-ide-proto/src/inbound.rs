use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{HighlightingPosition, OverallResult, PreviewKind, ProtoError, methods};

/// A notification received from the Gobra server.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Verification of a file set finished.
    OverallResult(OverallResult),
    /// Progress of a running verification, in percent.
    VerificationProgress { file_uri: String, progress: i64 },
    /// The server has nothing to report for the focused file.
    NoVerificationInformation,
    /// Verification of a file set failed with an internal error.
    VerificationException { file_uris: Vec<String> },
    /// A Goify request finished.
    FinishedGoifying { file_uri: String, success: bool },
    /// A Gobrafy request finished. Both values are file system paths.
    FinishedGobrafying {
        old_file_path: String,
        new_file_path: String,
        success: bool,
    },
    /// A code preview is ready.
    FinishedCodePreview {
        kind: PreviewKind,
        content: String,
        highlighted: Vec<HighlightingPosition>,
    },
    /// Diagnostics in standard LSP shape, passed through to the editor.
    PublishDiagnostics(Value),
    /// A log line from the server.
    LogMessage { level: i64, message: String },
}

impl Inbound {
    /// Decode a notification.
    ///
    /// Returns `Ok(None)` for methods the bridge does not handle.
    pub fn from_notification(method: &str, params: Option<Value>) -> Result<Option<Self>, ProtoError> {
        let args = Args::new(method, params);

        let inbound = match method {
            methods::OVERALL_RESULT => Inbound::OverallResult(args.embedded(0)?),
            methods::VERIFICATION_PROGRESS => Inbound::VerificationProgress {
                file_uri: args.plain(0)?,
                progress: args.plain(1)?,
            },
            methods::NO_VERIFICATION_INFORMATION => Inbound::NoVerificationInformation,
            methods::VERIFICATION_EXCEPTION => Inbound::VerificationException {
                file_uris: args.embedded(0)?,
            },
            methods::FINISHED_GOIFYING => Inbound::FinishedGoifying {
                file_uri: args.plain(0)?,
                success: args.plain(1)?,
            },
            methods::FINISHED_GOBRAFYING => Inbound::FinishedGobrafying {
                old_file_path: args.plain(0)?,
                new_file_path: args.plain(1)?,
                success: args.plain(2)?,
            },
            methods::FINISHED_VIPER_CODE_PREVIEW => Inbound::FinishedCodePreview {
                kind: PreviewKind::Viper,
                content: args.plain(0)?,
                highlighted: args.embedded(1)?,
            },
            methods::FINISHED_INTERNAL_CODE_PREVIEW => Inbound::FinishedCodePreview {
                kind: PreviewKind::Internal,
                content: args.plain(0)?,
                highlighted: args.embedded(1)?,
            },
            methods::PUBLISH_DIAGNOSTICS => {
                Inbound::PublishDiagnostics(args.raw.into_iter().next().unwrap_or(Value::Null))
            }
            methods::LOG_MESSAGE => {
                let log: LogParams = args.plain(0)?;
                Inbound::LogMessage {
                    level: log.level,
                    message: log.message,
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(inbound))
    }

    pub fn method(&self) -> &'static str {
        match self {
            Inbound::OverallResult(_) => methods::OVERALL_RESULT,
            Inbound::VerificationProgress { .. } => methods::VERIFICATION_PROGRESS,
            Inbound::NoVerificationInformation => methods::NO_VERIFICATION_INFORMATION,
            Inbound::VerificationException { .. } => methods::VERIFICATION_EXCEPTION,
            Inbound::FinishedGoifying { .. } => methods::FINISHED_GOIFYING,
            Inbound::FinishedGobrafying { .. } => methods::FINISHED_GOBRAFYING,
            Inbound::FinishedCodePreview {
                kind: PreviewKind::Viper,
                ..
            } => methods::FINISHED_VIPER_CODE_PREVIEW,
            Inbound::FinishedCodePreview {
                kind: PreviewKind::Internal,
                ..
            } => methods::FINISHED_INTERNAL_CODE_PREVIEW,
            Inbound::PublishDiagnostics(_) => methods::PUBLISH_DIAGNOSTICS,
            Inbound::LogMessage { .. } => methods::LOG_MESSAGE,
        }
    }
}

#[derive(Deserialize)]
struct LogParams {
    #[serde(rename = "type")]
    level: i64,
    message: String,
}

/// Positional notification parameters.
///
/// A params array is taken as is. A bare object or scalar counts as the
/// single parameter, which is how standard LSP notifications arrive.
struct Args<'a> {
    method: &'a str,
    raw: Vec<Value>,
}

impl<'a> Args<'a> {
    fn new(method: &'a str, params: Option<Value>) -> Self {
        let raw = match params {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values,
            Some(other) => vec![other],
        };
        Self { method, raw }
    }

    fn get(&self, index: usize) -> Result<&Value, ProtoError> {
        self.raw.get(index).ok_or_else(|| ProtoError::MissingParam {
            method: self.method.to_string(),
            index,
        })
    }

    /// A parameter sent as a plain JSON value.
    fn plain<T: DeserializeOwned>(&self, index: usize) -> Result<T, ProtoError> {
        let value = self.get(index)?;
        T::deserialize(value).map_err(|source| self.malformed(index, source))
    }

    /// A parameter sent as a JSON document inside a string. Servers that
    /// skip the inner encoding are accepted too.
    fn embedded<T: DeserializeOwned>(&self, index: usize) -> Result<T, ProtoError> {
        let value = self.get(index)?;
        let decoded = match value {
            Value::String(inner) => serde_json::from_str(inner),
            other => T::deserialize(other),
        };
        decoded.map_err(|source| self.malformed(index, source))
    }

    fn malformed(&self, index: usize, source: serde_json::Error) -> ProtoError {
        ProtoError::MalformedParam {
            method: self.method.to_string(),
            index,
            source,
        }
    }
}
