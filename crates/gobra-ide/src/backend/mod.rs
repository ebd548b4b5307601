//! Client side of the connection to the Gobra server.
//!
//! After the `initialize` handshake two tasks own the stream: a writer that
//! drains the outbound queue and a reader that turns notifications into
//! coordinator events. When the reader hits the end of the stream the
//! coordinator learns about it through [`Event::BackendClosed`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use gobra_ide_core::{BackendChannel, Event, EventSender};
use gobra_ide_proto::{
    Inbound, Message, MessageKind, Outbound, ProtoError, methods, read_message, write_message,
};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Queue into the writer task. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BackendHandle {
    outbound: mpsc::UnboundedSender<Message>,
    next_id: Arc<AtomicU64>,
}

impl BackendHandle {
    fn request(&self, method: &str, params: Option<Value>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.enqueue(Message::request(id, method, params));
    }

    fn enqueue(&self, message: Message) {
        if self.outbound.send(message).is_err() {
            debug!("Backend writer is gone, dropping message");
        }
    }
}

impl BackendChannel for BackendHandle {
    fn send(&self, message: Outbound) {
        match message.to_message() {
            Ok(encoded) => {
                debug!("-> {}", message.method());
                self.enqueue(encoded);
            }
            Err(e) => error!("Failed to encode {}: {}", message.method(), e),
        }
    }
}

/// A live connection to the Gobra server.
pub struct BackendConnection {
    handle: BackendHandle,
    close: oneshot::Sender<()>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl BackendConnection {
    /// Connect to a server listening on `addr` (`host:port`).
    pub async fn connect(addr: &str, events: EventSender) -> Result<Self, ProtoError> {
        info!("Connecting to the Gobra server at {}", addr);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Self::start(reader, writer, events).await
    }

    /// Run the handshake over an arbitrary byte stream and start the reader
    /// and writer tasks.
    pub async fn start<R, W>(reader: R, mut writer: W, events: EventSender) -> Result<Self, ProtoError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut reader = BufReader::new(reader);

        let initialize = Message::request(
            0,
            methods::INITIALIZE,
            Some(json!({
                "processId": std::process::id(),
                "rootUri": null,
                "capabilities": {},
            })),
        );
        write_message(&mut writer, &initialize).await?;

        // Anything the server says before answering is handled as usual.
        loop {
            let message = read_message(&mut reader)
                .await?
                .ok_or(ProtoError::UnexpectedEof)?;
            match message.kind() {
                MessageKind::Response if message.id == Some(json!(0)) => {
                    if let Some(err) = &message.error {
                        warn!("Gobra server rejected initialize: {}", err);
                    }
                    break;
                }
                MessageKind::Request => {
                    write_message(&mut writer, &Message::response(message_id(&message), Value::Null))
                        .await?;
                }
                MessageKind::Notification => forward(message, &events),
                MessageKind::Response => debug!("Ignoring response before initialize"),
            }
        }
        write_message(
            &mut writer,
            &Message::notification(methods::INITIALIZED, Some(json!({}))),
        )
        .await?;
        info!("Connected to the Gobra server");

        let (outbound, queue) = mpsc::unbounded_channel();
        let (close, closed) = oneshot::channel();
        let handle = BackendHandle {
            outbound,
            next_id: Arc::new(AtomicU64::new(1)),
        };

        let writer = tokio::spawn(write_loop(writer, queue, closed));
        let reader = tokio::spawn(read_loop(reader, handle.clone(), events));

        Ok(Self {
            handle,
            close,
            reader,
            writer,
        })
    }

    pub fn handle(&self) -> BackendHandle {
        self.handle.clone()
    }

    /// Send `shutdown` and `exit`, flush the queue and stop both tasks.
    pub async fn shutdown(self) {
        self.handle.request(methods::SHUTDOWN, None);
        self.handle
            .enqueue(Message::notification(methods::EXIT, None));
        let _ = self.close.send(());
        if let Err(e) = self.writer.await {
            warn!("Backend writer task failed: {}", e);
        }
        self.reader.abort();
    }
}

fn message_id(message: &Message) -> Value {
    message.id.clone().unwrap_or(Value::Null)
}

fn forward(message: Message, events: &EventSender) {
    let Some(method) = message.method else {
        return;
    };
    match Inbound::from_notification(&method, message.params) {
        Ok(Some(inbound)) => {
            debug!("<- {}", method);
            let _ = events.send(Event::Backend(inbound));
        }
        Ok(None) => debug!("Ignoring notification {}", method),
        Err(e) => warn!("Malformed {} notification: {}", method, e),
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut queue: mpsc::UnboundedReceiver<Message>,
    mut closed: oneshot::Receiver<()>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let message = tokio::select! {
            biased;
            message = queue.recv() => message,
            _ = &mut closed => None,
        };
        let Some(message) = message else {
            break;
        };
        if let Err(e) = write_message(&mut writer, &message).await {
            error!("Writing to the Gobra server failed: {}", e);
            break;
        }
    }
}

async fn read_loop<R>(mut reader: BufReader<R>, handle: BackendHandle, events: EventSender)
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_message(&mut reader).await {
            Ok(Some(message)) => match message.kind() {
                MessageKind::Notification => forward(message, &events),
                // The bridge offers nothing the server could ask for.
                MessageKind::Request => {
                    debug!("Answering server request {:?} with null", message.method);
                    handle.enqueue(Message::response(message_id(&message), Value::Null));
                }
                MessageKind::Response => debug!("Response to request {:?}", message.id),
            },
            Ok(None) => {
                info!("Gobra server closed the connection");
                break;
            }
            Err(e) => {
                error!("Reading from the Gobra server failed: {}", e);
                break;
            }
        }
    }
    let _ = events.send(Event::BackendClosed);
}
