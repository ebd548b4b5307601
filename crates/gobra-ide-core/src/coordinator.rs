//! The request coordinator.
//!
//! Decides for every verification request whether to drop it, queue it
//! behind a running verification of the same file set, or dispatch it, and
//! reconciles the backend's asynchronous reports with that bookkeeping.
//!
//! Per file set the lifecycle is `Idle -> Claiming -> Running ->
//! (RunningWithPending) -> Idle | Running`. A file set is claimed before the
//! editor is asked to save dirty buffers and only turns `Running` once the
//! save is done and the request went out, so two requests racing through
//! the save cannot both dispatch.
//!
//! Handlers never fail. Every problem ends as a log line, a message to the
//! user, or a rolled back claim, so no file set stays `Running` without a
//! verification actually being in flight.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::Path;

use gobra_ide_config::Settings;
use gobra_ide_proto::{
    Inbound, IsolationData, OverallResult, Outbound, PreviewData, PreviewKind, Range,
    VerifierConfig,
};
use tracing::{debug, error, info, warn};

use crate::debounce::DebounceTimer;
use crate::event_loop::{CommandTarget, EditorCommand, Event, EventSender};
use crate::file_set::{FileId, FileKind, FileSet, FileSetKey};
use crate::host::{
    CodePreview, Collaborators, ResolvedTools, SaveCompletion, ToolchainCompletion,
};
use crate::outcome::{Admission, Rejection, SaveError, ToolchainError, VerificationOutcome};
use crate::status::{MemberDecorations, Status};
use crate::tracker::{IsolatedRuns, PendingRequests, RunState, RunningSet, SaveId};
use crate::transform::{TransformDirection, TransformTrackers};
use crate::trigger::TriggerKind;

pub const CHANGED_BUILD_VERSION: &str =
    "Changed the build version of Gobra Tools. Please restart the IDE.";
pub const TOOLS_ENSURED: &str = "Successfully ensured Gobra Tools.";
pub const BACKEND_LOST: &str =
    "The connection to the Gobra server was lost. Please restart the IDE.";

#[derive(Debug)]
enum ToolchainState {
    Unchecked,
    Checking { generation: u64, announce: bool },
    Ready(ResolvedTools),
    Unavailable(ToolchainError),
}

/// Work that waits for the editor to save dirty buffers.
#[derive(Debug)]
enum AfterSave {
    Verify {
        key: FileSetKey,
        files: FileSet,
    },
    VerifyIsolated {
        key: FileSetKey,
        files: FileSet,
        isolation: Vec<IsolationData>,
    },
    Transform {
        direction: TransformDirection,
        file: FileId,
    },
    Preview {
        files: FileSet,
        kind: PreviewKind,
        selections: Vec<Range>,
    },
}

pub struct Coordinator {
    collaborators: Collaborators,
    events: EventSender,
    settings: Settings,

    toolchain: ToolchainState,
    toolchain_generation: u64,
    startup_verified: bool,
    backend_open: bool,
    focused: Option<FileId>,

    running: RunningSet,
    pending: PendingRequests,
    isolated: IsolatedRuns,
    transforms: TransformTrackers,
    debounce: DebounceTimer,

    awaiting_save: HashMap<SaveId, AfterSave>,
    next_save: u64,
    last_outcome: Option<(FileSetKey, VerificationOutcome)>,
}

impl Coordinator {
    /// `events` must feed the loop this coordinator runs on: completions and
    /// timer expiries come back through it.
    pub fn new(collaborators: Collaborators, settings: Settings, events: EventSender) -> Self {
        Self {
            collaborators,
            events,
            settings,
            toolchain: ToolchainState::Unchecked,
            toolchain_generation: 0,
            startup_verified: false,
            backend_open: true,
            focused: None,
            running: RunningSet::default(),
            pending: PendingRequests::default(),
            isolated: IsolatedRuns::default(),
            transforms: TransformTrackers::default(),
            debounce: DebounceTimer::default(),
            awaiting_save: HashMap::new(),
            next_save: 0,
            last_outcome: None,
        }
    }

    pub fn handle(&mut self, event: Event) -> ControlFlow<()> {
        match event {
            Event::Start => self.check_toolchain(false),
            Event::DocumentOpened(file) => self.on_document_event(file, TriggerKind::Open),
            Event::DocumentSaved(file) => self.on_document_event(file, TriggerKind::Save),
            Event::DocumentEdited {
                file,
                has_content_change,
            } => self.on_edit_change(file, has_content_change),
            Event::FocusChanged(file) => self.on_focus_changed(file),
            Event::Command { command, target } => self.on_command(command, target),
            Event::SettingsChanged(settings) => self.on_settings_changed(settings),
            Event::Backend(inbound) => self.on_inbound(inbound),
            Event::BackendClosed => self.on_backend_closed(),
            Event::BuffersSaved { id, result } => self.on_buffers_saved(id, result),
            Event::DebounceElapsed { generation } => self.on_debounce_elapsed(generation),
            Event::ToolchainChecked { generation, result } => {
                self.on_toolchain_checked(generation, result)
            }
            Event::Shutdown => {
                self.debounce.cancel();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn focused(&self) -> Option<&FileId> {
        self.focused.as_ref()
    }

    pub fn running(&self) -> &RunningSet {
        &self.running
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn isolated(&self) -> &IsolatedRuns {
        &self.isolated
    }

    pub fn transforms(&self) -> &TransformTrackers {
        &self.transforms
    }

    pub fn is_debounce_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    pub fn last_outcome(&self) -> Option<&(FileSetKey, VerificationOutcome)> {
        self.last_outcome.as_ref()
    }

    pub fn run_state(&self, key: &FileSetKey) -> RunState {
        if !self.running.contains(key) {
            RunState::Idle
        } else if self.running.is_claimed(key) {
            RunState::Claiming
        } else if self.pending.has(key) {
            RunState::RunningWithPending
        } else {
            RunState::Running
        }
    }

    // ========================================================================
    // Verification requests
    // ========================================================================

    /// Verify `file`, or its whole package when package mode is on.
    pub fn verify(
        &mut self,
        file: &FileId,
        trigger: TriggerKind,
        isolation: Vec<IsolationData>,
    ) -> Result<Admission, Rejection> {
        let files = self.resolve_file_set(file)?;
        self.verify_files(files, trigger, isolation)
    }

    /// Verify exactly `files` as one unit.
    pub fn verify_files(
        &mut self,
        files: FileSet,
        trigger: TriggerKind,
        isolation: Vec<IsolationData>,
    ) -> Result<Admission, Rejection> {
        if files.is_empty() {
            return Err(Rejection::NothingToVerify);
        }
        if !self.backend_open {
            return Err(Rejection::BackendUnavailable);
        }
        self.ready_tools()?;

        let unsupported: Vec<FileId> = files
            .iter()
            .filter(|file| !file.is_verifiable())
            .cloned()
            .collect();
        if !unsupported.is_empty() {
            return Err(Rejection::UnsupportedKind(unsupported));
        }
        if trigger != TriggerKind::Manual && files.iter().any(|f| f.kind() == FileKind::Go) {
            return Err(Rejection::GoRequiresManual);
        }
        if let Some(file) = self.first_under_transform(&files) {
            return Err(Rejection::UnderTransform(file));
        }

        let key = files.key();

        if !isolation.is_empty() {
            let id = self.next_save_id();
            self.save_then(
                id,
                AfterSave::VerifyIsolated {
                    key: key.clone(),
                    files,
                    isolation,
                },
            );
            return Ok(Admission::Isolated(key));
        }

        if self.running.contains(&key) {
            if trigger == TriggerKind::Save {
                // a save supersedes whatever rerun was queued
                if let Some(discarded) = self.pending.take(&key) {
                    debug!("Save discarded the queued {} rerun of {}", discarded, key);
                }
                return Ok(Admission::Dropped(key));
            }
            self.pending.record(key.clone(), trigger);
            return Ok(Admission::Queued { key, trigger });
        }

        let id = self.next_save_id();
        self.running.claim(key.clone(), files.clone(), id);
        self.save_then(
            id,
            AfterSave::Verify {
                key: key.clone(),
                files,
            },
        );
        Ok(Admission::Claimed(key))
    }

    fn resolve_file_set(&self, file: &FileId) -> Result<FileSet, Rejection> {
        if !self.settings.verify_package() {
            return Ok(FileSet::single(file.clone()));
        }
        let members = self.collaborators.workspace.package_files(file);
        if members.is_empty() {
            return Err(Rejection::EmptyPackage(file.clone()));
        }
        Ok(FileSet::new(members))
    }

    fn first_under_transform(&self, files: &FileSet) -> Option<FileId> {
        files
            .iter()
            .find(|file| self.transforms.involves(file))
            .cloned()
    }

    fn ready_tools(&self) -> Result<&ResolvedTools, Rejection> {
        match &self.toolchain {
            ToolchainState::Ready(tools) => Ok(tools),
            ToolchainState::Unchecked | ToolchainState::Checking { .. } => {
                Err(Rejection::ToolchainNotReady)
            }
            ToolchainState::Unavailable(err) => {
                Err(Rejection::ToolchainUnavailable(err.clone()))
            }
        }
    }

    fn verifier_config(
        &self,
        files: &FileSet,
        isolation: Vec<IsolationData>,
    ) -> Result<VerifierConfig, Rejection> {
        let tools = self.ready_tools()?;
        Ok(VerifierConfig {
            file_data: files.file_data(),
            gobra_settings: self.settings.gobra_settings.clone(),
            z3_executable: tools.z3.display().to_string(),
            boogie_executable: tools.boogie.display().to_string(),
            isolate: isolation,
        })
    }

    /// Log a decision. Only rejections the user asked to know about reach
    /// the editor.
    fn report(&self, decision: Result<Admission, Rejection>) {
        match decision {
            Ok(Admission::Claimed(key)) => debug!("Claimed {} for verification", key),
            Ok(Admission::Isolated(key)) => debug!("Isolated verification of {}", key),
            Ok(Admission::Queued { key, trigger }) => {
                info!("{} is already being verified, queued a {} rerun", key, trigger)
            }
            Ok(Admission::Dropped(key)) => {
                debug!("{} is already being verified, ignoring save", key)
            }
            Err(rejection @ (Rejection::NoFocusedFile | Rejection::NoCursorPosition)) => {
                info!("{}", rejection)
            }
            Err(rejection @ Rejection::UnsupportedKind(_)) => {
                info!("{}", rejection);
                self.collaborators.host.show_info(rejection.to_string());
            }
            Err(rejection) => debug!("Not verifying: {}", rejection),
        }
    }

    // ========================================================================
    // Buffer saves
    // ========================================================================

    fn next_save_id(&mut self) -> SaveId {
        self.next_save += 1;
        SaveId(self.next_save)
    }

    fn save_then(&mut self, id: SaveId, action: AfterSave) {
        self.awaiting_save.insert(id, action);
        self.collaborators
            .host
            .save_dirty_buffers(SaveCompletion::new(id, self.events.clone()));
    }

    fn on_buffers_saved(&mut self, id: SaveId, result: Result<(), SaveError>) {
        let Some(action) = self.awaiting_save.remove(&id) else {
            debug!("Ignoring completion of forgotten save {:?}", id);
            return;
        };

        if let Err(err) = result {
            self.on_save_failed(id, action, err);
            return;
        }

        match action {
            AfterSave::Verify { key, files } => self.dispatch_claimed(id, key, files),
            AfterSave::VerifyIsolated {
                key,
                files,
                isolation,
            } => self.dispatch_isolated(key, files, isolation),
            AfterSave::Transform { direction, file } => {
                if self.transforms.contains(direction, &file) && self.backend_open {
                    info!("Sending {} request for {}", direction.noun(), file);
                    self.collaborators.backend.send(direction.request(&file));
                }
            }
            AfterSave::Preview {
                files,
                kind,
                selections,
            } => {
                if self.backend_open {
                    let preview = PreviewData::new(files.file_data(), kind, selections);
                    self.collaborators
                        .backend
                        .send(Outbound::CodePreview(preview));
                }
            }
        }
    }

    fn on_save_failed(&mut self, id: SaveId, action: AfterSave, err: SaveError) {
        error!("{}", err);
        self.collaborators.host.show_error(err.to_string());
        match action {
            AfterSave::Verify { key, .. } => {
                self.abort_claim(id, &key, Rejection::SaveFailed(err));
            }
            AfterSave::VerifyIsolated { key, .. } => {
                self.last_outcome = Some((
                    key,
                    VerificationOutcome::DispatchRejected(Rejection::SaveFailed(err)),
                ));
            }
            AfterSave::Transform { direction, file } => {
                self.transforms.remove(direction, &file);
            }
            AfterSave::Preview { .. } => {}
        }
    }

    /// Finish a claim: re-check what may have changed while saving, then
    /// send.
    fn dispatch_claimed(&mut self, id: SaveId, key: FileSetKey, files: FileSet) {
        if !self.running.is_claimed(&key) {
            debug!("Claim on {} was dropped while saving", key);
            return;
        }

        let config = match self.recheck(&files) {
            Ok(config) => config,
            Err(rejection) => {
                self.abort_claim(id, &key, rejection);
                return;
            }
        };

        if !self.running.confirm(&key, id) {
            debug!("Claim on {} belongs to another save", key);
            return;
        }
        for file in &files {
            self.collaborators
                .host
                .set_status(Status::progress(file, 0));
        }
        info!("Sending verification request for {}", key);
        self.collaborators.backend.send(Outbound::Verify(config));
    }

    fn dispatch_isolated(&mut self, key: FileSetKey, files: FileSet, isolation: Vec<IsolationData>) {
        let config = match self.recheck(&files) {
            Ok(config) => VerifierConfig {
                isolate: isolation,
                ..config
            },
            Err(rejection) => {
                info!("Isolated verification of {} aborted: {}", key, rejection);
                self.last_outcome = Some((key, VerificationOutcome::DispatchRejected(rejection)));
                return;
            }
        };

        self.isolated.start(key.clone(), files.clone());
        for file in &files {
            self.collaborators
                .host
                .set_status(Status::progress(file, 0));
        }
        info!("Sending isolated verification request for {}", key);
        self.collaborators.backend.send(Outbound::Verify(config));
    }

    /// Conditions that may have changed during a save.
    fn recheck(&self, files: &FileSet) -> Result<VerifierConfig, Rejection> {
        if !self.backend_open {
            return Err(Rejection::BackendUnavailable);
        }
        if let Some(file) = self.first_under_transform(files) {
            return Err(Rejection::UnderTransform(file));
        }
        self.verifier_config(files, Vec::new())
    }

    /// Roll back a claim; a rerun queued behind it is discarded as well.
    fn abort_claim(&mut self, id: SaveId, key: &FileSetKey, rejection: Rejection) {
        self.running.release_claim(key, id);
        if let Some(trigger) = self.pending.take(key) {
            debug!("Discarding queued {} rerun of {}", trigger, key);
        }
        info!("Verification of {} aborted: {}", key, rejection);
        self.last_outcome = Some((
            key.clone(),
            VerificationOutcome::DispatchRejected(rejection),
        ));
    }

    // ========================================================================
    // Backend reports
    // ========================================================================

    fn on_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::OverallResult(result) => self.on_overall_result(result),
            Inbound::VerificationProgress { file_uri, progress } => {
                match FileId::parse(&file_uri) {
                    Ok(file) => {
                        debug!("progress {}: {}", file, progress);
                        self.collaborators
                            .host
                            .set_status(Status::progress(&file, progress));
                    }
                    Err(e) => warn!("Ignoring progress report: {}", e),
                }
            }
            Inbound::NoVerificationInformation => self.on_no_verification_information(),
            Inbound::VerificationException { file_uris } => {
                self.on_verification_exception(&file_uris)
            }
            Inbound::FinishedGoifying { file_uri, success } => {
                let files = FileId::parse(&file_uri)
                    .and_then(|source| source.with_suffix(".go").map(|target| (source, target)));
                match files {
                    Ok((source, target)) => {
                        self.on_transform_finished(TransformDirection::Goify, source, target, success)
                    }
                    Err(e) => warn!("Ignoring Goification report: {}", e),
                }
            }
            Inbound::FinishedGobrafying {
                old_file_path,
                new_file_path,
                success,
            } => {
                let files = FileId::from_path(Path::new(&old_file_path)).and_then(|source| {
                    FileId::from_path(Path::new(&new_file_path)).map(|target| (source, target))
                });
                match files {
                    Ok((source, target)) => self.on_transform_finished(
                        TransformDirection::Gobrafy,
                        source,
                        target,
                        success,
                    ),
                    Err(e) => warn!("Ignoring Gobrafication report: {}", e),
                }
            }
            Inbound::FinishedCodePreview {
                kind,
                content,
                highlighted,
            } => self.collaborators.host.show_preview(CodePreview {
                kind,
                content,
                highlighted,
            }),
            Inbound::PublishDiagnostics(params) => {
                self.collaborators.host.forward_diagnostics(params)
            }
            Inbound::LogMessage { level, message } => match level {
                1 => error!(target: "backend", "{}", message),
                2 => warn!(target: "backend", "{}", message),
                3 => info!(target: "backend", "{}", message),
                _ => debug!(target: "backend", "{}", message),
            },
        }
    }

    fn on_overall_result(&mut self, result: OverallResult) {
        let files = match FileSet::from_uris(&result.file_uris) {
            Ok(files) => files,
            Err(e) => {
                warn!("Ignoring verification result: {}", e);
                return;
            }
        };
        let key = files.key();
        self.finish_run(&key);

        let outcome = VerificationOutcome::from_result(&result);
        info!("Verification of {} finished: {:?}", key, outcome);

        let host = &self.collaborators.host;
        host.set_status(Status::finished(&result));
        if let Some(focused) = &self.focused {
            host.decorate_members(MemberDecorations::for_file(&result, focused));
        }

        self.last_outcome = Some((key.clone(), outcome));
        self.reverify_if_pending(&key);
    }

    fn on_verification_exception(&mut self, file_uris: &[String]) {
        let files = match FileSet::from_uris(file_uris) {
            Ok(files) => files,
            Err(e) => {
                warn!("Ignoring verification exception: {}", e);
                return;
            }
        };
        let key = files.key();
        warn!("Verification of {} ended with an exception", key);
        self.finish_run(&key);

        self.collaborators.host.set_status(Status::idle());
        self.last_outcome = Some((key.clone(), VerificationOutcome::BackendException));
        self.reverify_if_pending(&key);
    }

    /// Attribute a report to an isolated run first, then to the regular one.
    fn finish_run(&mut self, key: &FileSetKey) {
        if self.isolated.finish(key) {
            debug!("Report for {} closes an isolated run", key);
        } else if !self.running.remove(key) {
            debug!("Report for {} which was not running", key);
        }
    }

    /// Re-dispatch `key` with its queued trigger, if there is one and
    /// automatic verification is still on.
    fn reverify_if_pending(&mut self, key: &FileSetKey) {
        let Some(trigger) = self.pending.take(key) else {
            return;
        };
        if !self.settings.auto_verify() {
            debug!(
                "Automatic verification is off, dropping queued {} rerun of {}",
                trigger, key
            );
            return;
        }
        match key.decode() {
            Ok(files) => {
                info!("Re-verifying {} ({})", key, trigger);
                let decision = self.verify_files(files, trigger, Vec::new());
                self.report(decision);
            }
            Err(e) => warn!("Cannot re-verify: {}", e),
        }
    }

    fn on_no_verification_information(&mut self) {
        self.collaborators.host.set_status(Status::idle());

        let Some(file) = self.focused.clone() else {
            return;
        };
        if !file.is_verifiable() || !self.settings.auto_verify() {
            return;
        }
        if self.running.is_file_involved(&file) || self.isolated.is_file_involved(&file) {
            return;
        }
        let decision = self.verify(&file, TriggerKind::Open, Vec::new());
        self.report(decision);
    }

    fn on_backend_closed(&mut self) {
        if !self.backend_open {
            return;
        }
        self.backend_open = false;
        error!(
            "Connection to the Gobra server closed with {} verifications in flight",
            self.running.len()
        );

        self.running.clear();
        self.pending.clear();
        self.isolated.clear();
        self.transforms.clear();
        self.awaiting_save.clear();
        self.debounce.cancel();

        self.collaborators.host.set_status(Status::idle());
        self.collaborators.host.show_error(BACKEND_LOST.to_string());
    }

    // ========================================================================
    // Editor events
    // ========================================================================

    fn on_document_event(&mut self, file: FileId, trigger: TriggerKind) {
        if !file.is_verifiable() || !self.settings.auto_verify() {
            return;
        }
        let decision = self.verify(&file, trigger, Vec::new());
        self.report(decision);
    }

    fn on_edit_change(&mut self, file: FileId, has_content_change: bool) {
        if !file.is_verifiable() || !self.settings.auto_verify() || !has_content_change {
            return;
        }
        let delay = self.settings.debounce();
        self.debounce
            .schedule(file, TriggerKind::EditChange, delay, &self.events);
    }

    fn on_debounce_elapsed(&mut self, generation: u64) {
        let Some((file, trigger)) = self.debounce.fire(generation) else {
            return;
        };
        if !self.settings.auto_verify() {
            return;
        }
        let decision = self.verify(&file, trigger, Vec::new());
        self.report(decision);
    }

    fn on_focus_changed(&mut self, file: Option<FileId>) {
        self.focused = file;
        let Some(file) = &self.focused else {
            return;
        };
        if file.is_verifiable() && self.backend_open {
            self.collaborators
                .backend
                .send(Outbound::ChangeFile(file.file_data()));
        }
    }

    fn on_settings_changed(&mut self, settings: Settings) {
        if settings.gobra_settings.build_version != self.settings.gobra_settings.build_version {
            self.collaborators
                .host
                .show_info(CHANGED_BUILD_VERSION.to_string());
        }
        let auto_verify_disabled = self.settings.auto_verify() && !settings.auto_verify();
        self.settings = settings;
        if auto_verify_disabled && self.debounce.cancel() {
            debug!("Automatic verification turned off, cancelled debounced verification");
        }
        info!("Settings updated");
    }

    fn on_command(&mut self, command: EditorCommand, target: Option<CommandTarget>) {
        match command {
            EditorCommand::FlushCache => return self.flush_cache(),
            EditorCommand::UpdateGobraTools => return self.check_toolchain(true),
            _ => {}
        }

        let target = match self.command_target(target) {
            Ok(target) => target,
            Err(rejection) => return self.report(Err(rejection)),
        };

        if let Some(kind) = command.preview_kind() {
            return self.preview(target, kind);
        }

        let decision = match command {
            EditorCommand::Verify => self.verify(&target.file, TriggerKind::Manual, Vec::new()),
            EditorCommand::VerifyFile => self.verify_files(
                FileSet::single(target.file),
                TriggerKind::Manual,
                Vec::new(),
            ),
            EditorCommand::VerifyPackage => {
                let members = self.collaborators.workspace.package_files(&target.file);
                if members.is_empty() {
                    Err(Rejection::EmptyPackage(target.file))
                } else {
                    info!("verifying the following files: {:?}", members);
                    self.verify_files(FileSet::new(members), TriggerKind::Manual, Vec::new())
                }
            }
            EditorCommand::VerifyMember => {
                let Some(line) = target.line else {
                    return self.report(Err(Rejection::NoCursorPosition));
                };
                let isolation = vec![IsolationData {
                    file_uri: target.file.as_str().to_string(),
                    line_nrs: vec![line + 1],
                }];
                self.verify(&target.file, TriggerKind::Manual, isolation)
            }
            EditorCommand::GoifyFile | EditorCommand::GobrafyFile => {
                let direction = if command == EditorCommand::GoifyFile {
                    TransformDirection::Goify
                } else {
                    TransformDirection::Gobrafy
                };
                if let Err(rejection) = self.transform(target.file, direction) {
                    debug!("Not transforming: {}", rejection);
                }
                return;
            }
            EditorCommand::FlushCache
            | EditorCommand::UpdateGobraTools
            | EditorCommand::ShowViperCodePreview
            | EditorCommand::ShowInternalCodePreview => return,
        };
        self.report(decision);
    }

    /// The explicit target, or the focused file when the editor sent none.
    pub fn command_target(
        &self,
        target: Option<CommandTarget>,
    ) -> Result<CommandTarget, Rejection> {
        target
            .or_else(|| self.focused.clone().map(CommandTarget::file))
            .ok_or(Rejection::NoFocusedFile)
    }

    fn flush_cache(&mut self) {
        if self.backend_open {
            info!("Flushing the backend cache");
            self.collaborators.backend.send(Outbound::FlushCache);
        }
    }

    fn preview(&mut self, target: CommandTarget, kind: PreviewKind) {
        if !self.backend_open {
            return;
        }
        let files = match self.resolve_file_set(&target.file) {
            Ok(files) => files,
            Err(rejection) => {
                debug!("No preview: {}", rejection);
                return;
            }
        };
        let id = self.next_save_id();
        self.save_then(
            id,
            AfterSave::Preview {
                files,
                kind,
                selections: target.selections,
            },
        );
    }

    // ========================================================================
    // Transformations
    // ========================================================================

    /// Start a transformation of `file` once its buffer is saved.
    pub fn transform(
        &mut self,
        file: FileId,
        direction: TransformDirection,
    ) -> Result<(), Rejection> {
        if !self.backend_open {
            return Err(Rejection::BackendUnavailable);
        }
        if file.kind() != direction.source_kind() {
            self.collaborators
                .host
                .show_error(direction.wrong_kind_message());
            return Err(Rejection::UnsupportedKind(vec![file]));
        }
        if !self.transforms.insert(direction, file.clone()) {
            let rejection = Rejection::AlreadyTransforming { direction, file };
            self.collaborators.host.show_info(rejection.to_string());
            return Err(rejection);
        }
        let id = self.next_save_id();
        self.save_then(id, AfterSave::Transform { direction, file });
        Ok(())
    }

    fn on_transform_finished(
        &mut self,
        direction: TransformDirection,
        source: FileId,
        target: FileId,
        success: bool,
    ) {
        self.transforms.remove(direction, &source);

        if !success {
            let subject = match direction {
                TransformDirection::Goify => &target,
                TransformDirection::Gobrafy => &source,
            };
            self.collaborators
                .host
                .show_error(direction.failure_message(subject));
            return;
        }

        info!("{} of {} produced {}", direction.noun(), source, target);
        self.collaborators.host.open_document(target.clone());
        if self.settings.auto_verify() {
            let decision = self.verify(&target, TriggerKind::Open, Vec::new());
            self.report(decision);
        }
    }

    // ========================================================================
    // Toolchain
    // ========================================================================

    fn check_toolchain(&mut self, announce: bool) {
        self.toolchain_generation += 1;
        let generation = self.toolchain_generation;
        self.toolchain = ToolchainState::Checking {
            generation,
            announce,
        };
        info!("Checking Gobra tools");
        self.collaborators.toolchain.check(
            self.settings.gobra_dependencies.clone(),
            ToolchainCompletion::new(generation, self.events.clone()),
        );
    }

    fn on_toolchain_checked(
        &mut self,
        generation: u64,
        result: Result<ResolvedTools, ToolchainError>,
    ) {
        let announce = match self.toolchain {
            ToolchainState::Checking {
                generation: current,
                announce,
            } if current == generation => announce,
            _ => {
                debug!("Ignoring outdated toolchain check {}", generation);
                return;
            }
        };

        let tools = match result {
            Ok(tools) => tools,
            Err(err) => {
                error!("Gobra tools are not usable: {}", err);
                self.collaborators
                    .host
                    .show_error(format!("Gobra tools are not usable: {err}"));
                self.toolchain = ToolchainState::Unavailable(err);
                return;
            }
        };

        info!(
            "Gobra tools are ready (java: {}, z3: {}, boogie: {})",
            tools.java.display(),
            tools.z3.display(),
            tools.boogie.display()
        );
        self.toolchain = ToolchainState::Ready(tools);
        if announce {
            self.collaborators.host.show_info(TOOLS_ENSURED.to_string());
        }

        if self.startup_verified {
            return;
        }
        self.startup_verified = true;
        if !self.settings.auto_verify() {
            return;
        }
        if let Some(file) = self.focused.clone().filter(FileId::is_verifiable) {
            let decision = self.verify(&file, TriggerKind::Open, Vec::new());
            self.report(decision);
        }
    }
}
