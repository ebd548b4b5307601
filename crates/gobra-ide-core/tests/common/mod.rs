//! Common test utilities: recording fakes for every collaborator and a
//! harness that drives a coordinator synchronously.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use gobra_ide_config::{GobraDependencies, Settings};
use gobra_ide_core::{
    BackendChannel, CodePreview, Collaborators, Coordinator, EditorHost, Event, EventReceiver,
    EventSender, FileId, MemberDecorations, ResolvedTools, SaveCompletion, SaveError, Status,
    Toolchain, ToolchainCompletion, ToolchainError, Workspace, channel,
};
use gobra_ide_proto::{Inbound, OverallResult, Outbound, VerifierConfig};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Immediate,
    Hold,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainMode {
    Ready,
    Hold,
    Fail(ToolchainError),
}

/// Everything the fakes observed.
pub struct Recorder {
    pub sent: Vec<Outbound>,
    pub infos: Vec<String>,
    pub errors: Vec<String>,
    pub statuses: Vec<Status>,
    pub decorations: Vec<MemberDecorations>,
    pub opened: Vec<FileId>,
    pub previews: Vec<CodePreview>,
    pub diagnostics: Vec<Value>,
    pub save_requests: usize,
    pub held_saves: Vec<SaveCompletion>,
    pub save_mode: SaveMode,
    pub tool_checks: usize,
    pub held_checks: Vec<ToolchainCompletion>,
    pub toolchain_mode: ToolchainMode,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            sent: Vec::new(),
            infos: Vec::new(),
            errors: Vec::new(),
            statuses: Vec::new(),
            decorations: Vec::new(),
            opened: Vec::new(),
            previews: Vec::new(),
            diagnostics: Vec::new(),
            save_requests: 0,
            held_saves: Vec::new(),
            save_mode: SaveMode::Immediate,
            tool_checks: 0,
            held_checks: Vec::new(),
            toolchain_mode: ToolchainMode::Ready,
        }
    }
}

pub type Shared = Arc<Mutex<Recorder>>;

struct FakeBackend(Shared);

impl BackendChannel for FakeBackend {
    fn send(&self, message: Outbound) {
        self.0.lock().unwrap().sent.push(message);
    }
}

struct FakeHost(Shared);

impl EditorHost for FakeHost {
    fn save_dirty_buffers(&self, done: SaveCompletion) {
        let mode = {
            let mut recorder = self.0.lock().unwrap();
            recorder.save_requests += 1;
            recorder.save_mode
        };
        match mode {
            SaveMode::Immediate => done.complete(Ok(())),
            SaveMode::Hold => self.0.lock().unwrap().held_saves.push(done),
            SaveMode::Fail => done.complete(Err(SaveError::new("a.gobra"))),
        }
    }

    fn show_info(&self, message: String) {
        self.0.lock().unwrap().infos.push(message);
    }

    fn show_error(&self, message: String) {
        self.0.lock().unwrap().errors.push(message);
    }

    fn set_status(&self, status: Status) {
        self.0.lock().unwrap().statuses.push(status);
    }

    fn decorate_members(&self, decorations: MemberDecorations) {
        self.0.lock().unwrap().decorations.push(decorations);
    }

    fn open_document(&self, file: FileId) {
        self.0.lock().unwrap().opened.push(file);
    }

    fn show_preview(&self, preview: CodePreview) {
        self.0.lock().unwrap().previews.push(preview);
    }

    fn forward_diagnostics(&self, params: Value) {
        self.0.lock().unwrap().diagnostics.push(params);
    }
}

/// A package is every known file in the same directory.
struct FakeWorkspace(Vec<FileId>);

fn directory(file: &FileId) -> &str {
    file.as_str()
        .rsplit_once('/')
        .map_or(file.as_str(), |(dir, _)| dir)
}

impl Workspace for FakeWorkspace {
    fn package_files(&self, file: &FileId) -> Vec<FileId> {
        self.0
            .iter()
            .filter(|known| directory(known) == directory(file))
            .cloned()
            .collect()
    }
}

struct FakeToolchain(Shared);

pub fn ready_tools() -> ResolvedTools {
    ResolvedTools {
        java: PathBuf::from("/usr/bin/java"),
        z3: PathBuf::from("/tools/z3"),
        boogie: PathBuf::from("/tools/boogie"),
    }
}

impl Toolchain for FakeToolchain {
    fn check(&self, _dependencies: GobraDependencies, done: ToolchainCompletion) {
        let mode = {
            let mut recorder = self.0.lock().unwrap();
            recorder.tool_checks += 1;
            recorder.toolchain_mode.clone()
        };
        match mode {
            ToolchainMode::Ready => done.complete(Ok(ready_tools())),
            ToolchainMode::Hold => self.0.lock().unwrap().held_checks.push(done),
            ToolchainMode::Fail(err) => done.complete(Err(err)),
        }
    }
}

pub fn file(uri: &str) -> FileId {
    FileId::parse(uri).expect("valid uri")
}

pub fn settings(auto_verify: bool, verify_package: bool) -> Settings {
    let mut settings = Settings::default();
    settings.gobra_settings.auto_verify = auto_verify;
    settings.gobra_settings.verify_package = verify_package;
    settings
}

pub fn overall_result(uris: &[&str], success: bool) -> Event {
    Event::Backend(Inbound::OverallResult(OverallResult {
        file_uris: uris.iter().map(|u| u.to_string()).collect(),
        success,
        message: if success {
            "Verification succeeded".to_string()
        } else {
            "Verification failed".to_string()
        },
        members: Vec::new(),
    }))
}

pub fn exception(uris: &[&str]) -> Event {
    Event::Backend(Inbound::VerificationException {
        file_uris: uris.iter().map(|u| u.to_string()).collect(),
    })
}

/// Drives a coordinator by hand: every handled event is followed by
/// draining whatever the fakes posted back.
pub struct Harness {
    pub coordinator: Coordinator,
    pub events: EventReceiver,
    pub sender: EventSender,
    pub recorder: Shared,
}

impl Harness {
    pub fn new(files: &[&str]) -> Self {
        Self::with_settings(files, settings(true, true))
    }

    pub fn with_settings(files: &[&str], settings: Settings) -> Self {
        let recorder: Shared = Arc::default();
        let (sender, events) = channel();
        let collaborators = Collaborators {
            backend: Box::new(FakeBackend(recorder.clone())),
            host: Box::new(FakeHost(recorder.clone())),
            workspace: Box::new(FakeWorkspace(files.iter().map(|f| file(f)).collect())),
            toolchain: Box::new(FakeToolchain(recorder.clone())),
        };
        let coordinator = Coordinator::new(collaborators, settings, sender.clone());
        Self {
            coordinator,
            events,
            sender,
            recorder,
        }
    }

    /// A harness whose toolchain check already succeeded.
    pub fn started(files: &[&str]) -> Self {
        let mut harness = Self::new(files);
        harness.handle(Event::Start);
        harness
    }

    pub fn started_with(files: &[&str], settings: Settings) -> Self {
        let mut harness = Self::with_settings(files, settings);
        harness.handle(Event::Start);
        harness
    }

    pub fn recorder(&self) -> MutexGuard<'_, Recorder> {
        self.recorder.lock().unwrap()
    }

    pub fn handle(&mut self, event: Event) {
        let _ = self.coordinator.handle(event);
        self.pump();
    }

    /// Handle every event already queued, including ones queued meanwhile.
    pub fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            let _ = self.coordinator.handle(event);
        }
    }

    pub async fn next_event(&mut self) -> Event {
        self.events.recv().await.expect("event loop channel open")
    }

    pub fn set_save_mode(&self, mode: SaveMode) {
        self.recorder().save_mode = mode;
    }

    pub fn set_toolchain_mode(&self, mode: ToolchainMode) {
        self.recorder().toolchain_mode = mode;
    }

    pub fn release_saves(&mut self) {
        let held = std::mem::take(&mut self.recorder().held_saves);
        for completion in held {
            completion.complete(Ok(()));
        }
        self.pump();
    }

    pub fn fail_saves(&mut self) {
        let held = std::mem::take(&mut self.recorder().held_saves);
        for completion in held {
            completion.complete(Err(SaveError::new("a.gobra")));
        }
        self.pump();
    }

    pub fn finish_checks(&mut self, result: Result<ResolvedTools, ToolchainError>) {
        let held = std::mem::take(&mut self.recorder().held_checks);
        for completion in held {
            completion.complete(result.clone());
        }
        self.pump();
    }

    pub fn sent(&self) -> Vec<Outbound> {
        self.recorder().sent.clone()
    }

    pub fn verify_requests(&self) -> Vec<VerifierConfig> {
        self.recorder()
            .sent
            .iter()
            .filter_map(|message| match message {
                Outbound::Verify(config) => Some(config.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn verified_uris(&self) -> Vec<Vec<String>> {
        self.verify_requests()
            .into_iter()
            .map(|config| config.file_data.into_iter().map(|f| f.file_uri).collect())
            .collect()
    }

    pub fn infos(&self) -> Vec<String> {
        self.recorder().infos.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.recorder().errors.clone()
    }

    pub fn last_status(&self) -> Option<Status> {
        self.recorder().statuses.last().cloned()
    }
}
