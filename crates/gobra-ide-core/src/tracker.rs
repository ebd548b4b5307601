//! Bookkeeping of in-flight verifications.
//!
//! [`RunningSet`] holds every file set the backend is working on, plus file
//! sets that are claimed but whose dispatch still waits for dirty buffers to
//! be saved. [`PendingRequests`] remembers the last trigger that arrived for
//! a busy file set. [`IsolatedRuns`] counts member-level runs, which are not
//! deduplicated against anything.

use std::collections::HashMap;

use crate::file_set::{FileId, FileSet, FileSetKey};
use crate::trigger::TriggerKind;

/// Identifies one buffer-save round trip with the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SaveId(pub u64);

/// Lifecycle of one file set, as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    /// Reserved; dispatch waits for the editor to save buffers.
    Claiming,
    Running,
    RunningWithPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Claimed(SaveId),
    Running,
}

#[derive(Debug, Clone)]
struct Entry {
    phase: Phase,
    files: FileSet,
}

#[derive(Debug, Default)]
pub struct RunningSet {
    entries: HashMap<FileSetKey, Entry>,
}

impl RunningSet {
    /// Reserve `key` ahead of a dispatch that first has to wait for `save`.
    ///
    /// Returns `false` (and changes nothing) if the key is already claimed or
    /// running.
    pub fn claim(&mut self, key: FileSetKey, files: FileSet, save: SaveId) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(
            key,
            Entry {
                phase: Phase::Claimed(save),
                files,
            },
        );
        true
    }

    /// Turn the claim taken for `save` into a running entry.
    ///
    /// Fails if the claim is gone or belongs to another save.
    pub fn confirm(&mut self, key: &FileSetKey, save: SaveId) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.phase == Phase::Claimed(save) => {
                entry.phase = Phase::Running;
                true
            }
            _ => false,
        }
    }

    /// Give up the claim taken for `save`.
    pub fn release_claim(&mut self, key: &FileSetKey, save: SaveId) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.phase == Phase::Claimed(save) => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Record a dispatch that did not go through a claim.
    pub fn add(&mut self, key: FileSetKey, files: FileSet) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(
            key,
            Entry {
                phase: Phase::Running,
                files,
            },
        );
        true
    }

    /// Forget a running entry once the backend reported back.
    ///
    /// Claims are left alone: nothing was sent for them yet, so no report
    /// can be about them.
    pub fn remove(&mut self, key: &FileSetKey) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.phase == Phase::Running => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Claimed or running.
    pub fn contains(&self, key: &FileSetKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_running(&self, key: &FileSetKey) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.phase == Phase::Running)
    }

    pub fn is_claimed(&self, key: &FileSetKey) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| matches!(entry.phase, Phase::Claimed(_)))
    }

    /// Whether `file` is a member of any claimed or running file set.
    pub fn is_file_involved(&self, file: &FileId) -> bool {
        self.entries.values().any(|entry| entry.files.contains(file))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Last deferred trigger per busy file set.
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: HashMap<FileSetKey, TriggerKind>,
}

impl PendingRequests {
    /// Remember `trigger` for `key`, replacing any earlier one.
    pub fn record(&mut self, key: FileSetKey, trigger: TriggerKind) -> Option<TriggerKind> {
        self.entries.insert(key, trigger)
    }

    pub fn has(&self, key: &FileSetKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &FileSetKey) -> Option<TriggerKind> {
        self.entries.get(key).copied()
    }

    /// Read and clear the entry for `key` in one step.
    pub fn take(&mut self, key: &FileSetKey) -> Option<TriggerKind> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Member-level verifications in flight, counted per file set.
#[derive(Debug, Default)]
pub struct IsolatedRuns {
    entries: HashMap<FileSetKey, (FileSet, usize)>,
}

impl IsolatedRuns {
    pub fn start(&mut self, key: FileSetKey, files: FileSet) {
        self.entries.entry(key).or_insert((files, 0)).1 += 1;
    }

    /// Account one report for `key` to an isolated run, if any is in flight.
    pub fn finish(&mut self, key: &FileSetKey) -> bool {
        let Some((_, count)) = self.entries.get_mut(key) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.entries.remove(key);
        }
        true
    }

    pub fn count(&self, key: &FileSetKey) -> usize {
        self.entries.get(key).map_or(0, |(_, count)| *count)
    }

    pub fn is_file_involved(&self, file: &FileId) -> bool {
        self.entries.values().any(|(files, _)| files.contains(file))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
