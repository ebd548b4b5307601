//! LSP bridge between the editor and the coordinator.
//!
//! The coordinator is only started once the editor sent `initialized`, so
//! settings from `initializationOptions` are in place before the first
//! toolchain check. Events posted earlier wait in the queue.

use std::sync::Mutex;

use eyre::Result;
use gobra_ide_config::Settings;
use gobra_ide_core::{
    CodePreview, Collaborators, CommandTarget, Coordinator, EditorCommand, EditorHost, Event,
    EventLoop, EventReceiver, EventSender, FileId, MemberDecorations, SaveCompletion, SaveError,
    Status,
};
use gobra_ide_proto::{HighlightingPosition, PreviewKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tower_lsp::jsonrpc::{Error as RpcError, ErrorCode, Result as LspResult};
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::request::Request;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, info, warn};

use crate::backend::{BackendConnection, BackendHandle};
use crate::toolchain::ProcessToolchain;
use crate::workspace::FsWorkspace;

// ============================================================================
// gobra/* protocol extensions
// ============================================================================

/// Editor to bridge: the focused document changed.
pub enum ActiveFileChanged {}

impl Notification for ActiveFileChanged {
    type Params = ActiveFileParams;
    const METHOD: &'static str = "gobra/activeFileChanged";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveFileParams {
    /// `None` when no text editor is focused.
    pub uri: Option<Url>,
}

/// Bridge to editor: save every dirty `.gobra` and `.go` buffer. The
/// result tells whether all saves succeeded.
pub enum SaveDirtyBuffers {}

impl Request for SaveDirtyBuffers {
    type Params = ();
    type Result = bool;
    const METHOD: &'static str = "gobra/saveDirtyBuffers";
}

pub enum StatusNotification {}

impl Notification for StatusNotification {
    type Params = StatusParams;
    const METHOD: &'static str = "gobra/status";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusParams {
    pub text: String,
    /// CSS color name.
    pub color: String,
}

impl From<Status> for StatusParams {
    fn from(status: Status) -> Self {
        Self {
            text: status.text,
            color: status.color.css().to_string(),
        }
    }
}

pub enum DecorationsNotification {}

impl Notification for DecorationsNotification {
    type Params = DecorationsParams;
    const METHOD: &'static str = "gobra/decorations";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecorationsParams {
    pub uri: Url,
    pub verified: Vec<Range>,
    pub failed: Vec<Range>,
}

pub enum PreviewNotification {}

impl Notification for PreviewNotification {
    type Params = PreviewParams;
    const METHOD: &'static str = "gobra/preview";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewParams {
    /// `viper` or `internal`.
    pub kind: String,
    pub content: String,
    pub highlighted: Vec<HighlightingPosition>,
}

impl From<CodePreview> for PreviewParams {
    fn from(preview: CodePreview) -> Self {
        let kind = match preview.kind {
            PreviewKind::Viper => "viper",
            PreviewKind::Internal => "internal",
        };
        Self {
            kind: kind.to_string(),
            content: preview.content,
            highlighted: preview.highlighted,
        }
    }
}

/// The single argument of every `gobra.*` command. Commands sent without
/// one apply to the focused file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandArguments {
    uri: Url,
    /// Zero-based cursor line.
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    selections: Vec<Range>,
}

fn to_lsp_range(range: gobra_ide_proto::Range) -> Range {
    Range {
        start: Position::new(range.start.line, range.start.character),
        end: Position::new(range.end.line, range.end.character),
    }
}

fn from_lsp_range(range: Range) -> gobra_ide_proto::Range {
    gobra_ide_proto::Range {
        start: gobra_ide_proto::Position {
            line: range.start.line,
            character: range.start.character,
        },
        end: gobra_ide_proto::Position {
            line: range.end.line,
            character: range.end.character,
        },
    }
}

fn command_target(arguments: &[Value]) -> Result<Option<CommandTarget>, serde_json::Error> {
    let Some(first) = arguments.first() else {
        return Ok(None);
    };
    let args: CommandArguments = serde_json::from_value(first.clone())?;
    Ok(Some(CommandTarget {
        file: FileId::from_url(args.uri),
        line: args.line,
        selections: args.selections.into_iter().map(from_lsp_range).collect(),
    }))
}

// ============================================================================
// EditorHost over the LSP client
// ============================================================================

enum UiRequest {
    Info(String),
    Error(String),
    Status(Status),
    Decorations(MemberDecorations),
    Open(FileId),
    Preview(CodePreview),
    Diagnostics(Value),
    Save(SaveCompletion),
}

/// Forwards everything to a task that talks to the client in order.
pub struct LspHost {
    ui: mpsc::UnboundedSender<UiRequest>,
}

impl LspHost {
    pub fn spawn(client: Client) -> Self {
        let (ui, queue) = mpsc::unbounded_channel();
        tokio::spawn(ui_loop(client, queue));
        Self { ui }
    }

    fn post(&self, request: UiRequest) {
        if self.ui.send(request).is_err() {
            debug!("Editor connection is gone");
        }
    }
}

impl EditorHost for LspHost {
    fn save_dirty_buffers(&self, done: SaveCompletion) {
        self.post(UiRequest::Save(done));
    }

    fn show_info(&self, message: String) {
        self.post(UiRequest::Info(message));
    }

    fn show_error(&self, message: String) {
        self.post(UiRequest::Error(message));
    }

    fn set_status(&self, status: Status) {
        self.post(UiRequest::Status(status));
    }

    fn decorate_members(&self, decorations: MemberDecorations) {
        self.post(UiRequest::Decorations(decorations));
    }

    fn open_document(&self, file: FileId) {
        self.post(UiRequest::Open(file));
    }

    fn show_preview(&self, preview: CodePreview) {
        self.post(UiRequest::Preview(preview));
    }

    fn forward_diagnostics(&self, params: Value) {
        self.post(UiRequest::Diagnostics(params));
    }
}

async fn ui_loop(client: Client, mut queue: mpsc::UnboundedReceiver<UiRequest>) {
    while let Some(request) = queue.recv().await {
        match request {
            UiRequest::Info(message) => client.show_message(MessageType::INFO, message).await,
            UiRequest::Error(message) => client.show_message(MessageType::ERROR, message).await,
            UiRequest::Status(status) => {
                client
                    .send_notification::<StatusNotification>(status.into())
                    .await
            }
            UiRequest::Decorations(decorations) => {
                let Ok(uri) = Url::parse(&decorations.uri) else {
                    warn!("Not decorating {}: invalid URI", decorations.uri);
                    continue;
                };
                let params = DecorationsParams {
                    uri,
                    verified: decorations.verified.into_iter().map(to_lsp_range).collect(),
                    failed: decorations.failed.into_iter().map(to_lsp_range).collect(),
                };
                client
                    .send_notification::<DecorationsNotification>(params)
                    .await
            }
            UiRequest::Open(file) => {
                let params = ShowDocumentParams {
                    uri: file.url().clone(),
                    external: Some(false),
                    take_focus: Some(true),
                    selection: None,
                };
                match client.show_document(params).await {
                    Ok(true) => {}
                    Ok(false) => warn!("Editor refused to open {}", file),
                    Err(e) => warn!("Opening {} failed: {}", file, e),
                }
            }
            UiRequest::Preview(preview) => {
                client
                    .send_notification::<PreviewNotification>(preview.into())
                    .await
            }
            UiRequest::Diagnostics(params) => {
                match serde_json::from_value::<PublishDiagnosticsParams>(params) {
                    Ok(p) => {
                        client
                            .publish_diagnostics(p.uri, p.diagnostics, p.version)
                            .await
                    }
                    Err(e) => warn!("Dropping malformed diagnostics: {}", e),
                }
            }
            // Waiting for the editor must not hold up the queue.
            UiRequest::Save(done) => {
                tokio::spawn(save_dirty_buffers(client.clone(), done));
            }
        }
    }
}

async fn save_dirty_buffers(client: Client, done: SaveCompletion) {
    let result = match client.send_request::<SaveDirtyBuffers>(()).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(SaveError::new("open files")),
        // Editors without the extension cannot have unsaved state we know of.
        Err(e) if e.code == ErrorCode::MethodNotFound => {
            debug!("Editor does not support {}", SaveDirtyBuffers::METHOD);
            Ok(())
        }
        Err(e) => {
            warn!("{} failed: {}", SaveDirtyBuffers::METHOD, e);
            Err(SaveError::new("open files"))
        }
    };
    done.complete(result);
}

// ============================================================================
// LanguageServer
// ============================================================================

/// What the coordinator is started with once the editor is ready.
struct Startup {
    settings: Settings,
    backend: BackendHandle,
    queue: EventReceiver,
}

struct LspBridge {
    client: Client,
    events: EventSender,
    startup: Mutex<Option<Startup>>,
}

impl LspBridge {
    fn post(&self, event: Event) {
        if self.events.send(event).is_err() {
            debug!("Coordinator has stopped");
        }
    }

    async fn active_file_changed(&self, params: ActiveFileParams) {
        self.post(Event::FocusChanged(params.uri.map(FileId::from_url)));
    }

    fn start_coordinator(&self) {
        let startup = match self.startup.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(startup) = startup else {
            warn!("Editor sent initialized twice");
            return;
        };

        let collaborators = Collaborators {
            backend: Box::new(startup.backend),
            host: Box::new(LspHost::spawn(self.client.clone())),
            workspace: Box::new(FsWorkspace),
            toolchain: Box::new(ProcessToolchain),
        };
        let coordinator = Coordinator::new(collaborators, startup.settings, self.events.clone());
        tokio::spawn(EventLoop::new(coordinator, startup.queue).run());
        self.post(Event::Start);
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for LspBridge {
    async fn initialize(&self, params: InitializeParams) -> LspResult<InitializeResult> {
        if let Some(options) = params.initialization_options {
            match Settings::from_json(&options) {
                Ok(settings) => {
                    if let Ok(mut guard) = self.startup.lock()
                        && let Some(startup) = guard.as_mut()
                    {
                        startup.settings = settings;
                    }
                }
                Err(e) => warn!("Ignoring initialization options: {}", e),
            }
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::INCREMENTAL),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: EditorCommand::ALL
                        .iter()
                        .map(|command| command.id().to_string())
                        .collect(),
                    work_done_progress_options: Default::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "gobra-ide".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("Editor connected");
        self.start_coordinator();
    }

    async fn shutdown(&self) -> LspResult<()> {
        self.post(Event::Shutdown);
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let file = FileId::from_url(params.text_document.uri);
        self.post(Event::DocumentOpened(file));
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let file = FileId::from_url(params.text_document.uri);
        self.post(Event::DocumentSaved(file));
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        self.post(Event::DocumentEdited {
            file: FileId::from_url(params.text_document.uri),
            has_content_change: !params.content_changes.is_empty(),
        });
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        match Settings::from_json(&params.settings) {
            Ok(settings) => self.post(Event::SettingsChanged(settings)),
            Err(e) => {
                warn!("Ignoring settings update: {}", e);
                self.client
                    .show_message(MessageType::ERROR, format!("Invalid Gobra settings: {e}"))
                    .await;
            }
        }
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> LspResult<Option<Value>> {
        let Some(command) = EditorCommand::from_id(&params.command) else {
            return Err(RpcError::invalid_params(format!(
                "unknown command {}",
                params.command
            )));
        };
        let target = command_target(&params.arguments)
            .map_err(|e| RpcError::invalid_params(format!("{}: {}", command.id(), e)))?;
        debug!("Command {}", command.id());
        self.post(Event::Command { command, target });
        Ok(None)
    }
}

/// Serve LSP on stdio until the editor disconnects, then shut the backend
/// connection down.
pub async fn run(
    backend: BackendConnection,
    settings: Settings,
    events: EventSender,
    queue: EventReceiver,
) -> Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let startup = Startup {
        settings,
        backend: backend.handle(),
        queue,
    };
    let (service, socket) = LspService::build(|client| LspBridge {
        client,
        events,
        startup: Mutex::new(Some(startup)),
    })
    .custom_method(ActiveFileChanged::METHOD, LspBridge::active_file_changed)
    .finish();
    Server::new(stdin, stdout, socket).serve(service).await;

    info!("Editor disconnected");
    backend.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobra_ide_core::StatusColor;
    use serde_json::json;

    #[test]
    fn command_without_arguments_targets_the_focused_file() {
        assert_eq!(command_target(&[]).unwrap(), None);
    }

    #[test]
    fn command_arguments_carry_cursor_and_selections() {
        let target = command_target(&[json!({
            "uri": "file:///pkg/a.gobra",
            "line": 7,
            "selections": [
                { "start": { "line": 1, "character": 0 }, "end": { "line": 3, "character": 2 } }
            ]
        })])
        .unwrap()
        .unwrap();

        assert_eq!(target.file.as_str(), "file:///pkg/a.gobra");
        assert_eq!(target.line, Some(7));
        assert_eq!(target.selections.len(), 1);
        assert_eq!(target.selections[0].end.character, 2);
    }

    #[test]
    fn malformed_command_arguments_are_rejected() {
        assert!(command_target(&[json!({ "line": 3 })]).is_err());
    }

    #[test]
    fn status_is_sent_with_its_css_color() {
        let params = StatusParams::from(Status {
            text: "Verification succeeded".to_string(),
            color: StatusColor::Green,
        });
        assert_eq!(
            serde_json::to_value(params).unwrap(),
            json!({ "text": "Verification succeeded", "color": "lightgreen" })
        );
    }

    #[test]
    fn preview_kind_is_named() {
        let params = PreviewParams::from(CodePreview {
            kind: PreviewKind::Internal,
            content: "pkg main".to_string(),
            highlighted: vec![HighlightingPosition {
                start_index: 4,
                length: 4,
            }],
        });
        assert_eq!(params.kind, "internal");
        assert_eq!(
            serde_json::to_value(&params.highlighted).unwrap(),
            json!([{ "startIndex": 4, "length": 4 }])
        );
    }

    #[test]
    fn ranges_survive_the_lsp_conversion() {
        let range = Range::new(Position::new(2, 4), Position::new(5, 0));
        assert_eq!(to_lsp_range(from_lsp_range(range)), range);
    }
}
