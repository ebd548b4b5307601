//! Scheduling guarantees of the coordinator: one dispatch per file set,
//! coalesced reruns, save exclusion, canonical keys, debouncing, transform
//! exclusion and recovery from backend exceptions.

mod common;

use std::time::Duration;

use common::*;
use gobra_ide_core::{
    Admission, EditorCommand, Event, FileSet, RunState, TransformDirection, TriggerKind,
};
use gobra_ide_proto::{Inbound, Outbound};
use tokio::time::Instant;

const A: &str = "file:///pkg/a.gobra";
const B: &str = "file:///pkg/b.gobra";
const C: &str = "file:///pkg/c.gobra";

#[tokio::test]
async fn second_request_for_running_set_is_not_dispatched() {
    let mut h = Harness::started(&[A, B]);

    let first = h.coordinator.verify(&file(A), TriggerKind::Manual, Vec::new());
    h.pump();
    let key = match first {
        Ok(Admission::Claimed(key)) => key,
        other => panic!("expected a claim, got {other:?}"),
    };
    assert_eq!(h.verify_requests().len(), 1);
    assert_eq!(h.coordinator.run_state(&key), RunState::Running);

    let second = h.coordinator.verify(&file(B), TriggerKind::Manual, Vec::new());
    h.pump();
    assert_eq!(
        second,
        Ok(Admission::Queued {
            key: key.clone(),
            trigger: TriggerKind::Manual
        })
    );
    assert_eq!(h.verify_requests().len(), 1);
    assert_eq!(h.coordinator.running().len(), 1);
    assert_eq!(h.coordinator.run_state(&key), RunState::RunningWithPending);
}

#[tokio::test]
async fn queued_requests_rerun_once_with_the_last_trigger() {
    let mut h = Harness::started_with(&[A], settings(true, false));

    h.handle(Event::Command {
        command: EditorCommand::VerifyFile,
        target: Some(gobra_ide_core::CommandTarget::file(file(A))),
    });
    assert_eq!(h.verify_requests().len(), 1);

    for trigger in [TriggerKind::Open, TriggerKind::Manual, TriggerKind::EditChange] {
        let _ = h.coordinator.verify(&file(A), trigger, Vec::new());
    }
    let key = FileSet::single(file(A)).key();
    assert_eq!(h.coordinator.pending().get(&key), Some(TriggerKind::EditChange));

    h.handle(overall_result(&[A], true));
    assert_eq!(h.verify_requests().len(), 2, "exactly one rerun");
    assert!(!h.coordinator.pending().has(&key));
    assert_eq!(h.coordinator.run_state(&key), RunState::Running);

    h.handle(overall_result(&[A], true));
    assert_eq!(h.verify_requests().len(), 2, "no rerun without a new request");
    assert_eq!(h.coordinator.run_state(&key), RunState::Idle);
}

#[tokio::test]
async fn save_while_running_is_dropped() {
    let mut h = Harness::started_with(&[A], settings(true, false));

    h.handle(Event::DocumentOpened(file(A)));
    assert_eq!(h.verify_requests().len(), 1);
    let key = FileSet::single(file(A)).key();

    let decision = h.coordinator.verify(&file(A), TriggerKind::Save, Vec::new());
    assert_eq!(decision, Ok(Admission::Dropped(key.clone())));
    h.handle(Event::DocumentSaved(file(A)));
    assert!(!h.coordinator.pending().has(&key));

    h.handle(overall_result(&[A], true));
    assert_eq!(h.verify_requests().len(), 1);
    assert_eq!(h.coordinator.run_state(&key), RunState::Idle);
}

#[tokio::test]
async fn save_cancels_an_earlier_queued_request() {
    let mut h = Harness::started_with(&[A], settings(true, false));

    h.handle(Event::DocumentOpened(file(A)));
    h.handle(Event::DocumentOpened(file(A)));
    let key = FileSet::single(file(A)).key();
    assert_eq!(h.coordinator.pending().get(&key), Some(TriggerKind::Open));

    h.handle(Event::DocumentSaved(file(A)));
    assert_eq!(h.coordinator.pending().get(&key), None);

    h.handle(overall_result(&[A], true));
    assert_eq!(h.verify_requests().len(), 1);
    assert_eq!(h.coordinator.run_state(&key), RunState::Idle);
}

#[tokio::test]
async fn every_package_member_maps_to_the_same_key() {
    let mut h = Harness::started(&[B, A, C]);

    let from_c = h.coordinator.verify(&file(C), TriggerKind::Manual, Vec::new());
    h.pump();
    let from_a = h.coordinator.verify(&file(A), TriggerKind::Open, Vec::new());

    let Ok(Admission::Claimed(key)) = from_c else {
        panic!("expected a claim, got {from_c:?}");
    };
    assert_eq!(
        from_a,
        Ok(Admission::Queued {
            key,
            trigger: TriggerKind::Open
        })
    );
    assert_eq!(h.verified_uris(), vec![vec![A.to_string(), B.to_string(), C.to_string()]]);
}

#[tokio::test(start_paused = true)]
async fn edit_bursts_are_coalesced_into_one_dispatch() {
    let mut h = Harness::started_with(&[A, B, C], settings(true, false));
    let window = h.coordinator.settings().debounce();
    assert_eq!(window, Duration::from_millis(1000));
    let start = Instant::now();

    let edit = |uri: &str| Event::DocumentEdited {
        file: file(uri),
        has_content_change: true,
    };
    h.handle(edit(A));
    tokio::time::advance(Duration::from_millis(200)).await;
    h.handle(edit(B));
    tokio::time::advance(Duration::from_millis(300)).await;
    h.handle(edit(C));
    assert!(h.verify_requests().is_empty());

    let expiry = h.next_event().await;
    assert!(start.elapsed() >= Duration::from_millis(500) + window);
    h.handle(expiry);

    assert_eq!(h.verified_uris(), vec![vec![C.to_string()]]);
    assert!(!h.coordinator.is_debounce_pending());

    let silence = tokio::time::timeout(window * 5, h.next_event()).await;
    assert!(silence.is_err(), "only one expiry per burst");
}

#[tokio::test(start_paused = true)]
async fn edits_without_content_change_are_ignored() {
    let mut h = Harness::started_with(&[A], settings(true, false));

    h.handle(Event::DocumentEdited {
        file: file(A),
        has_content_change: false,
    });
    assert!(!h.coordinator.is_debounce_pending());

    let mut h = Harness::started_with(&[A], settings(false, false));
    h.handle(Event::DocumentEdited {
        file: file(A),
        has_content_change: true,
    });
    assert!(!h.coordinator.is_debounce_pending());
}

#[tokio::test]
async fn second_transform_of_the_same_file_is_refused() {
    let mut h = Harness::started(&[A]);
    h.set_save_mode(SaveMode::Hold);

    assert!(h.coordinator.transform(file(A), TransformDirection::Goify).is_ok());
    assert!(h.coordinator.transform(file(A), TransformDirection::Goify).is_err());
    h.release_saves();

    let goify_requests = h
        .sent()
        .into_iter()
        .filter(|m| matches!(m, Outbound::GoifyFile(_)))
        .count();
    assert_eq!(goify_requests, 1);
    assert_eq!(
        h.infos(),
        vec![format!("There is already a Goification running for file {A}")]
    );

    h.handle(Event::Backend(Inbound::FinishedGoifying {
        file_uri: A.to_string(),
        success: true,
    }));
    assert!(h.coordinator.transforms().is_empty());
    assert_eq!(h.recorder().opened, vec![file("file:///pkg/a.gobra.go")]);

    h.set_save_mode(SaveMode::Immediate);
    assert!(h.coordinator.transform(file(A), TransformDirection::Goify).is_ok());
}

#[tokio::test]
async fn file_set_recovers_after_backend_exception() {
    let mut h = Harness::started(&[A, B]);

    h.handle(Event::DocumentOpened(file(A)));
    h.handle(exception(&[A, B]));
    assert!(h.coordinator.running().is_empty());
    assert_eq!(h.last_status().map(|s| s.text), Some("Hello from Gobra".to_string()));

    let decision = h.coordinator.verify(&file(B), TriggerKind::Open, Vec::new());
    h.pump();
    assert!(matches!(decision, Ok(Admission::Claimed(_))));
    assert_eq!(h.verify_requests().len(), 2);
}

#[tokio::test]
async fn open_during_manual_run_reruns_once_after_result() {
    let mut h = Harness::started(&[A, B]);
    let key = FileSet::new([file(A), file(B)]).key();
    assert_eq!(key.as_str(), format!(r#"["{A}","{B}"]"#));

    h.handle(Event::Command {
        command: EditorCommand::Verify,
        target: Some(gobra_ide_core::CommandTarget::file(file(A))),
    });
    assert_eq!(h.verify_requests().len(), 1);
    assert!(h.coordinator.running().contains(&key));

    h.handle(Event::DocumentOpened(file(A)));
    assert_eq!(h.coordinator.pending().get(&key), Some(TriggerKind::Open));

    h.handle(overall_result(&[A, B], true));
    assert_eq!(h.verify_requests().len(), 2);
    assert!(h.coordinator.running().contains(&key));
    assert!(!h.coordinator.pending().has(&key));

    h.pump();
    assert_eq!(h.verify_requests().len(), 2);
}
