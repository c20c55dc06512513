//! Playback-rating watcher.
//!
//! When the user taps the rating/favorite button while reviewing a photo on
//! the camera body, the body raises its button-function property and (a beat
//! later) bumps the slot's contents-update time. The watcher runs as a short
//! background job: it polls for that bump a bounded number of times,
//! re-reads the content list, and if the displayed item's rating moved,
//! pulls exactly that one file and reports the transition to the hook.
//!
//! Nothing here runs on the property-changed callback thread.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDateTime;
use parking_lot::Mutex;

use crate::hook;
use crate::transfer::tracker::TransferOp;
use crate::transfer::{SyncSession, TransferStep};
use crate::types::{ContentItem, ContentScope, Rating, Slot};

/// The body's contents-update-time property can lag the button press.
const POLL_ATTEMPTS: u32 = 8;
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct RatingWatcher {
    /// Last-known rating per (slot, content id); lives for the process
    /// lifetime. Content ids are few and rarely reused, so unbounded growth
    /// is fine.
    baselines: Mutex<HashMap<(Slot, u64), Rating>>,
    /// Last contents-update-time observed per slot.
    last_update: Mutex<HashMap<Slot, NaiveDateTime>>,
    attempts: u32,
    interval: Duration,
}

impl RatingWatcher {
    pub fn new() -> RatingWatcher {
        RatingWatcher {
            baselines: Mutex::new(HashMap::new()),
            last_update: Mutex::new(HashMap::new()),
            attempts: POLL_ATTEMPTS,
            interval: POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_timing(attempts: u32, interval: Duration) -> RatingWatcher {
        RatingWatcher {
            baselines: Mutex::new(HashMap::new()),
            last_update: Mutex::new(HashMap::new()),
            attempts,
            interval,
        }
    }

    /// One bounded watch job, run on its own thread per button press.
    pub fn run_job(&self, session: &SyncSession) {
        let playback = match session.control().playback_info() {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!("rating: playback info unavailable: {}", e);
                return;
            }
        };
        let slot = playback.slot;
        let prev_update = self.last_update.lock().get(&slot).copied();

        let mut refreshed = false;
        let mut updated_at: Option<NaiveDateTime> = None;
        // Baseline for items never seen before: the rating observed on this
        // job's first successful list read.
        let mut first_observed: Option<Rating> = None;

        for attempt in 0..self.attempts {
            if session.shutdown().is_stopped() {
                return;
            }

            if !refreshed {
                match session.control().contents_update_time(slot) {
                    Ok(Some(t)) if prev_update != Some(t) => {
                        self.last_update.lock().insert(slot, t);
                        updated_at = Some(t);
                        refreshed = true;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!("rating: update-time read failed: {}", e),
                }
            }

            // Read the list once the device reports a change, and in any
            // case on the final attempt.
            if refreshed || attempt + 1 == self.attempts {
                let items = match session.channel().list_contents(slot, ContentScope::All) {
                    Ok(items) => items,
                    Err(e) => {
                        tracing::warn!("rating: failed to list contents (slot={}): {}", slot, e);
                        return;
                    }
                };
                let target =
                    match select_target(&items, playback.file_path.as_deref(), updated_at) {
                        Some(t) => t,
                        None => {
                            tracing::debug!("rating: no candidate item (slot={})", slot);
                            return;
                        }
                    };

                let key = (slot, target.content_id);
                let baseline = self
                    .baselines
                    .lock()
                    .get(&key)
                    .copied()
                    .unwrap_or_else(|| *first_observed.get_or_insert(target.rating));

                if target.rating != baseline {
                    self.baselines.lock().insert(key, target.rating);
                    tracing::info!(
                        "Rating changed {} -> {} on content {} (slot {})",
                        baseline,
                        target.rating,
                        target.content_id,
                        slot
                    );
                    self.pull_and_notify(session, slot, target, baseline);
                    return;
                }
                // Unchanged: record as the new baseline either way, retry.
                self.baselines.lock().insert(key, target.rating);
            }

            std::thread::sleep(self.interval);
        }
    }

    /// A rating change does not imply the file is new: pull with
    /// skip-if-present semantics and hand the hook the local path either way.
    fn pull_and_notify(
        &self,
        session: &SyncSession,
        slot: Slot,
        item: &ContentItem,
        previous: Rating,
    ) {
        let file = match item.files.first() {
            Some(f) => f,
            None => {
                tracing::debug!("rating: content {} has no files", item.content_id);
                return;
            }
        };

        let local = match session.transfer_one(slot, item.content_id, file, TransferOp::Rating) {
            TransferStep::Done(path) => path,
            TransferStep::Skipped(path) => Some(path),
            TransferStep::Halt => None,
        };

        if let (Some(hook_path), Some(local)) = (session.hook_path(), local) {
            let mode = session.camera_mode_string();
            hook::spawn(
                hook_path,
                hook::rating_args(&local, &mode, item.rating, previous),
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn baseline(&self, slot: Slot, content_id: u64) -> Option<Rating> {
        self.baselines.lock().get(&(slot, content_id)).copied()
    }
}

/// Identify the item the user was looking at, in priority order: the body's
/// displayed playback path, the item stamped with the updated time, then the
/// most recently modified item.
fn select_target<'a>(
    items: &'a [ContentItem],
    playback_path: Option<&str>,
    updated_at: Option<NaiveDateTime>,
) -> Option<&'a ContentItem> {
    if let Some(path) = playback_path {
        if let Some(item) = items
            .iter()
            .find(|i| i.files.iter().any(|f| f.remote_path == path))
        {
            return Some(item);
        }
    }
    if let Some(t) = updated_at {
        if let Some(item) = items.iter().find(|i| i.modified == t) {
            return Some(item);
        }
    }
    items.iter().max_by_key(|i| i.modified)
}
