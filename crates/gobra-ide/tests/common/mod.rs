//! Common test utilities.

#![allow(dead_code)]

use gobra_ide_proto::{Message, methods, read_message, write_message};
use serde_json::json;
use tokio::io::{BufReader, DuplexStream, ReadHalf, WriteHalf};

/// The server end of an in-memory backend connection.
pub struct FakeServer {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

/// Bridge-side halves plus the server end.
pub fn connection_pair() -> (ReadHalf<DuplexStream>, WriteHalf<DuplexStream>, FakeServer) {
    let (bridge, server) = tokio::io::duplex(64 * 1024);
    let (bridge_read, bridge_write) = tokio::io::split(bridge);
    let (server_read, server_write) = tokio::io::split(server);
    let server = FakeServer {
        reader: BufReader::new(server_read),
        writer: server_write,
    };
    (bridge_read, bridge_write, server)
}

impl FakeServer {
    pub async fn recv(&mut self) -> Message {
        read_message(&mut self.reader)
            .await
            .expect("readable message")
            .expect("stream still open")
    }

    /// `None` once the bridge stopped writing.
    pub async fn try_recv(&mut self) -> Option<Message> {
        read_message(&mut self.reader).await.expect("readable message")
    }

    pub async fn send(&mut self, message: &Message) {
        write_message(&mut self.writer, message)
            .await
            .expect("writable stream");
    }

    pub async fn notify(&mut self, method: &str, params: serde_json::Value) {
        self.send(&Message::notification(method, Some(params))).await;
    }

    /// Answer `initialize` and wait for `initialized`.
    pub async fn accept(&mut self) {
        let initialize = self.recv().await;
        assert_eq!(initialize.method.as_deref(), Some(methods::INITIALIZE));
        let id = initialize.id.expect("initialize is a request");
        self.send(&Message::response(id, json!({ "capabilities": {} })))
            .await;

        let initialized = self.recv().await;
        assert_eq!(initialized.method.as_deref(), Some(methods::INITIALIZED));
    }
}
