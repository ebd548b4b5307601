//! JSON-RPC messages with LSP base-protocol framing.
//!
//! Each message is a `Content-Length` header block followed by a JSON body:
//!
//! ```text
//! Content-Length: 52\r\n
//! \r\n
//! {"jsonrpc":"2.0","method":"gobraServer/flushCache"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ProtoError;

const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC 2.0 request, notification or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Notification,
    Response,
}

impl Message {
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: Some(method.into()),
            params,
            result: None,
            error: None,
        }
    }

    pub fn request(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::notification(method, params)
        }
    }

    /// A successful response. `result` is always present, `null` included.
    pub fn response(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match (&self.id, &self.method) {
            (Some(_), Some(_)) => MessageKind::Request,
            (None, Some(_)) => MessageKind::Notification,
            (_, None) => MessageKind::Response,
        }
    }
}

/// Read one framed message.
///
/// Returns `Ok(None)` on a clean end of stream between messages.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>, ProtoError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return match content_length {
                None => Ok(None),
                Some(_) => Err(ProtoError::UnexpectedEof),
            };
        }

        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            if content_length.is_some() {
                break;
            }
            // Stray blank line between messages
            continue;
        }

        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| ProtoError::InvalidHeader(header.to_string()))?;
        if name.trim().eq_ignore_ascii_case("Content-Length") {
            let length = value
                .trim()
                .parse()
                .map_err(|_| ProtoError::InvalidHeader(header.to_string()))?;
            content_length = Some(length);
        }
        // Content-Type and anything else is ignored
    }

    let length = content_length.ok_or(ProtoError::MissingContentLength)?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtoError::UnexpectedEof
        } else {
            ProtoError::Io(e)
        }
    })?;

    Ok(Some(serde_json::from_slice(&body)?))
}

/// Write one framed message and flush.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(message)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_back_written_messages_in_order() {
        let mut buf = Vec::new();
        let first = Message::notification("gobraServer/flushCache", None);
        let second = Message::request(1, "initialize", Some(json!({"processId": null})));
        write_message(&mut buf, &first).await.expect("write");
        write_message(&mut buf, &second).await.expect("write");

        let mut reader = BufReader::new(buf.as_slice());
        assert_eq!(read_message(&mut reader).await.expect("read"), Some(first));
        assert_eq!(read_message(&mut reader).await.expect("read"), Some(second));
        assert_eq!(read_message(&mut reader).await.expect("read"), None);
    }

    #[tokio::test]
    async fn tolerates_extra_headers() {
        let body = r#"{"jsonrpc":"2.0","method":"gobraServer/noVerificationInformation"}"#;
        let raw = format!(
            "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\ncontent-length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let mut reader = BufReader::new(raw.as_bytes());
        let message = read_message(&mut reader).await.expect("read").expect("message");
        assert_eq!(message.kind(), MessageKind::Notification);
        assert_eq!(
            message.method.as_deref(),
            Some("gobraServer/noVerificationInformation")
        );
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let raw = "Content-Length: 100\r\n\r\n{\"jsonrpc\":\"2.0\"}";
        let mut reader = BufReader::new(raw.as_bytes());
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtoError::UnexpectedEof));
    }

    #[tokio::test]
    async fn headers_without_length_are_rejected() {
        let raw = "Content-Type: x\r\n\r\n{}";
        let mut reader = BufReader::new(raw.as_bytes());
        // The blank line is skipped while no length is known, then `{}` is not a header.
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtoError::InvalidHeader(_)));
    }

    #[test]
    fn response_keeps_null_result() {
        let response = Message::response(json!(7), Value::Null);
        let encoded = serde_json::to_value(&response).expect("serialize");
        assert_eq!(encoded, json!({"jsonrpc": "2.0", "id": 7, "result": null}));
        assert_eq!(response.kind(), MessageKind::Response);
    }
}
