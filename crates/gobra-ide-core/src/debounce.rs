//! Single-slot debounce for edit-triggered verification.
//!
//! There is one slot for the whole editor, not one per file: scheduling
//! replaces whatever was scheduled before, file and trigger included.

use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::debug;

use crate::event_loop::{Event, EventSender};
use crate::file_set::FileId;
use crate::trigger::TriggerKind;

#[derive(Debug)]
struct Scheduled {
    generation: u64,
    file: FileId,
    trigger: TriggerKind,
    sleeper: AbortHandle,
}

/// Expiry is delivered as [`Event::DebounceElapsed`] and redeemed with
/// [`DebounceTimer::fire`]. Generations make an expiry that was already
/// queued when the slot got rescheduled harmless.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    generation: u64,
    slot: Option<Scheduled>,
}

impl DebounceTimer {
    /// (Re)start the quiescence window for `file`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(
        &mut self,
        file: FileId,
        trigger: TriggerKind,
        delay: Duration,
        events: &EventSender,
    ) {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;

        let events = events.clone();
        let sleeper = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::DebounceElapsed { generation });
        })
        .abort_handle();

        debug!(
            "Debouncing {} for {}ms (generation {})",
            file,
            delay.as_millis(),
            generation
        );
        self.slot = Some(Scheduled {
            generation,
            file,
            trigger,
            sleeper,
        });
    }

    /// Drop the scheduled action, if any.
    pub fn cancel(&mut self) -> bool {
        match self.slot.take() {
            Some(scheduled) => {
                scheduled.sleeper.abort();
                true
            }
            None => false,
        }
    }

    /// Redeem an expiry. The slot is empty again before the caller acts on
    /// the returned request, so it may schedule right away.
    pub fn fire(&mut self, generation: u64) -> Option<(FileId, TriggerKind)> {
        match &self.slot {
            Some(scheduled) if scheduled.generation == generation => {
                let scheduled = self.slot.take()?;
                Some((scheduled.file, scheduled.trigger))
            }
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    pub fn pending_file(&self) -> Option<&FileId> {
        self.slot.as_ref().map(|scheduled| &scheduled.file)
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
