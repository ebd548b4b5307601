use serde::Serialize;
use serde_json::Value;

use crate::{FileData, Message, PreviewData, ProtoError, VerifierConfig, methods};

/// A notification sent to the Gobra server.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Verify a file set.
    Verify(VerifierConfig),
    /// Tell the server the editor switched to another file.
    ChangeFile(FileData),
    /// Drop all cached verification results.
    FlushCache,
    /// Translate a Gobra file into Go.
    GoifyFile(FileData),
    /// Translate an annotated Go file into Gobra.
    GobrafyFile(FileData),
    /// Render the Viper or internal representation of a file set.
    CodePreview(PreviewData),
}

impl Outbound {
    pub fn method(&self) -> &'static str {
        match self {
            Outbound::Verify(_) => methods::VERIFY,
            Outbound::ChangeFile(_) => methods::CHANGE_FILE,
            Outbound::FlushCache => methods::FLUSH_CACHE,
            Outbound::GoifyFile(_) => methods::GOIFY_FILE,
            Outbound::GobrafyFile(_) => methods::GOBRAFY_FILE,
            Outbound::CodePreview(_) => methods::CODE_PREVIEW,
        }
    }

    /// Positional parameters: the JSON-encoded payload as the only entry.
    pub fn params(&self) -> Result<Option<Value>, ProtoError> {
        let encoded = match self {
            Outbound::Verify(config) => encode(config)?,
            Outbound::ChangeFile(file) | Outbound::GoifyFile(file) | Outbound::GobrafyFile(file) => {
                encode(file)?
            }
            Outbound::FlushCache => return Ok(None),
            Outbound::CodePreview(preview) => encode(preview)?,
        };
        Ok(Some(Value::Array(vec![Value::String(encoded)])))
    }

    pub fn to_message(&self) -> Result<Message, ProtoError> {
        Ok(Message::notification(self.method(), self.params()?))
    }
}

fn encode<T: Serialize>(payload: &T) -> Result<String, ProtoError> {
    Ok(serde_json::to_string(payload)?)
}
