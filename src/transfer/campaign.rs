//! Campaign state — the single-flight coordination flags for one sync
//! campaign, owned by the connection session.
//!
//! All mutations are atomic read-modify-write or compare-and-swap; nothing
//! outside this type touches the raw flags, so correctness does not depend on
//! reset discipline scattered across the codebase.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::types::Slot;

pub struct CampaignState {
    /// A campaign is between begin and finish.
    running: AtomicBool,
    /// Cooperative cancel: stop planning new files.
    abort: AtomicBool,
    /// How many upcoming contents-changed callbacks belong to the campaign.
    tokens: AtomicI32,
    /// Slot workers currently doing campaign work.
    active: AtomicI32,
    /// Current campaign covers all dates rather than latest-N.
    all: AtomicBool,
    /// Device pushes outside a campaign trigger one-shot downloads.
    auto_sync: AtomicBool,
}

impl CampaignState {
    pub fn new(auto_sync: bool) -> CampaignState {
        CampaignState {
            running: AtomicBool::new(false),
            abort: AtomicBool::new(false),
            tokens: AtomicI32::new(0),
            active: AtomicI32::new(0),
            all: AtomicBool::new(false),
            auto_sync: AtomicBool::new(auto_sync),
        }
    }

    /// Claim the single campaign slot. The check-and-set is one CAS so two
    /// triggers racing here cannot both start. On success the campaign is
    /// armed: abort cleared, one token per storage slot, no active workers.
    pub fn try_begin(&self, all: bool) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.abort.store(false, Ordering::Release);
        self.all.store(all, Ordering::Relaxed);
        self.active.store(0, Ordering::Relaxed);
        self.tokens.store(Slot::ALL.len() as i32, Ordering::Release);
        true
    }

    /// Release the campaign slot for the next trigger.
    pub fn finish(&self) {
        self.all.store(false, Ordering::Relaxed);
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request cooperative cancel: planners stop before the next file, and
    /// remaining tokens are disarmed so late callbacks are not mistaken for
    /// campaign work.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Release);
        self.tokens.store(0, Ordering::Release);
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    /// Consume one sync token if any remain. CAS loop so concurrent callback
    /// invocations can never double-consume or drive the count negative.
    pub fn consume_token(&self) -> bool {
        let mut tok = self.tokens.load(Ordering::Relaxed);
        while tok > 0 {
            match self.tokens.compare_exchange_weak(
                tok,
                tok - 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(cur) => tok = cur,
            }
        }
        false
    }

    pub fn sync_all(&self) -> bool {
        self.all.load(Ordering::Relaxed)
    }

    /// Returns the previous setting.
    pub fn set_auto_sync(&self, enabled: bool) -> bool {
        self.auto_sync.swap(enabled, Ordering::AcqRel)
    }

    pub fn auto_sync_enabled(&self) -> bool {
        self.auto_sync.load(Ordering::Acquire)
    }

    /// Count a worker in; the guard counts it out on every exit path.
    pub fn worker_started(&self) -> ActiveWorkerGuard<'_> {
        self.active.fetch_add(1, Ordering::AcqRel);
        ActiveWorkerGuard { state: self }
    }

    pub fn active_workers(&self) -> i32 {
        self.active.load(Ordering::Acquire)
    }

    #[cfg(test)]
    fn tokens_remaining(&self) -> i32 {
        self.tokens.load(Ordering::Acquire)
    }
}

/// Scope-exit guard for the active-worker count: the decrement happens even
/// on early return.
pub struct ActiveWorkerGuard<'a> {
    state: &'a CampaignState,
}

impl Drop for ActiveWorkerGuard<'_> {
    fn drop(&mut self) {
        self.state.active.fetch_sub(1, Ordering::AcqRel);
    }
}
