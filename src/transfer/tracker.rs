//! Transfer slot tracker — bridges the backend's push callbacks to a blocking
//! "wait for this transfer to finish" call.
//!
//! One tracker exists per connection and at most one transfer is in flight at
//! a time, so the tracker holds the bookkeeping for exactly one outstanding
//! request: a waiting flag, the display label, and throttle state for
//! progress logging. Workers block on a condition variable, never poll.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::device::TransferStatus;
use crate::shutdown::Shutdown;

/// Why a transfer was started; selects naming policy and the hook token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOp {
    /// Ad hoc download of a just-captured file (auto-sync push).
    New,
    /// Part of a sync campaign.
    Sync,
    /// Single-file pull triggered by a rating change.
    Rating,
}

impl TransferOp {
    pub fn hook_token(self) -> &'static str {
        match self {
            TransferOp::New => "new",
            TransferOp::Sync => "sync",
            TransferOp::Rating => "rating",
        }
    }

    /// Campaign and rating transfers keep device names and skip files that
    /// already exist locally; ad hoc downloads uniquify instead.
    pub fn skips_existing(self) -> bool {
        !matches!(self, TransferOp::New)
    }
}

/// Terminal record of one transfer, handed to the waiting worker.
#[derive(Debug, Clone)]
pub struct FinishedTransfer {
    pub status: TransferStatus,
    pub path: Option<PathBuf>,
    pub label: String,
    pub op: TransferOp,
    pub elapsed: Duration,
    /// An abort was already requested when the result arrived.
    pub aborted: bool,
}

#[derive(Debug)]
pub enum WaitOutcome {
    Finished(FinishedTransfer),
    /// Woken without a result: process stop, forced idle, or an abandoned
    /// start. The caller must re-check its abort/stop flags.
    Interrupted,
}

struct TrackerState {
    waiting: bool,
    label: String,
    op: TransferOp,
    last_logged_pct: Option<u32>,
    last_log_at: Instant,
    started_at: Instant,
    finished: Option<FinishedTransfer>,
}

pub struct TransferTracker {
    state: Mutex<TrackerState>,
    done: Condvar,
}

/// Progress lines are throttled to every 5 percentage points or every second
/// of wall time; the very first update always logs.
fn progress_due(last_pct: Option<u32>, since_last_log: Duration, percent: u32) -> bool {
    match last_pct {
        None => true,
        Some(last) => percent >= last + 5 || since_last_log >= Duration::from_secs(1),
    }
}

impl TransferTracker {
    pub fn new() -> TransferTracker {
        TransferTracker {
            state: Mutex::new(TrackerState {
                waiting: false,
                label: String::new(),
                op: TransferOp::New,
                last_logged_pct: None,
                last_log_at: Instant::now(),
                started_at: Instant::now(),
                finished: None,
            }),
            done: Condvar::new(),
        }
    }

    /// Mark the tracker as waiting for one transfer and reset throttle state.
    /// Must be called before the channel's `start_transfer`.
    pub fn begin(&self, label: String, op: TransferOp) {
        let mut s = self.state.lock();
        s.waiting = true;
        s.label = label;
        s.op = op;
        s.last_logged_pct = None;
        let now = Instant::now();
        s.last_log_at = now;
        s.started_at = now;
        s.finished = None;
    }

    /// Reset after a `start_transfer` call that failed outright: no callback
    /// will come, and a waiter left in place would block forever.
    pub fn abandon(&self) {
        let mut s = self.state.lock();
        s.waiting = false;
        s.finished = None;
        drop(s);
        self.done.notify_all();
    }

    /// Progress callback. Suppressed entirely once an abort has been
    /// requested — the only interesting event then is the terminal result.
    pub fn on_progress(&self, percent: u32, abort_requested: bool) {
        if abort_requested {
            return;
        }
        let mut s = self.state.lock();
        if !s.waiting {
            return;
        }
        if progress_due(s.last_logged_pct, s.last_log_at.elapsed(), percent) {
            tracing::info!("[DL] {} — {}%", display_label(&s.label), percent);
            s.last_logged_pct = Some(percent);
            s.last_log_at = Instant::now();
        }
    }

    /// Terminal callback, exactly once per transfer. Clears the waiting flag,
    /// wakes the blocked worker, and returns the record so the session can
    /// run success bookkeeping (size log, post-download hook).
    ///
    /// A result arriving after an abort request is not an error; it is logged
    /// distinctly but bookkeeping is unchanged.
    pub fn on_result(
        &self,
        status: TransferStatus,
        path: Option<PathBuf>,
        abort_requested: bool,
    ) -> Option<FinishedTransfer> {
        let mut s = self.state.lock();
        if !s.waiting {
            tracing::debug!("transfer result arrived with no waiter; ignoring");
            return None;
        }

        let label = path
            .as_deref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| s.label.clone());

        let finished = FinishedTransfer {
            status,
            path,
            label: label.clone(),
            op: s.op,
            elapsed: s.started_at.elapsed(),
            aborted: abort_requested,
        };

        if abort_requested {
            if status == TransferStatus::Complete {
                tracing::info!(
                    "[DL] Completed before cancel request took effect: {}",
                    display_label(&label)
                );
            } else {
                tracing::info!("[DL] Canceled: {}", display_label(&label));
            }
        } else {
            match status {
                TransferStatus::Failed { code } => {
                    tracing::error!(
                        "[DL] Failed: {} ({})",
                        display_label(&label),
                        crate::device::status_name(code)
                    );
                }
                TransferStatus::Canceled => {
                    tracing::info!("[DL] Canceled: {}", display_label(&label));
                }
                TransferStatus::Complete => {}
            }
        }

        s.finished = Some(finished.clone());
        s.waiting = false;
        drop(s);
        self.done.notify_all();
        Some(finished)
    }

    /// Block until the outstanding transfer finishes or the process-wide stop
    /// flag is raised. Condition-variable based; no busy wait.
    pub fn wait(&self, shutdown: &Shutdown) -> WaitOutcome {
        let mut s = self.state.lock();
        while s.waiting && !shutdown.is_stopped() {
            self.done.wait(&mut s);
        }
        match s.finished.take() {
            Some(f) => WaitOutcome::Finished(f),
            None => WaitOutcome::Interrupted,
        }
    }

    /// Release any blocked waiter without recording a result. Used when the
    /// campaign is aborted or the connection drops: the worker re-checks its
    /// flags instead of waiting for a result that may never come.
    pub fn force_idle(&self) {
        let mut s = self.state.lock();
        s.waiting = false;
        drop(s);
        self.done.notify_all();
    }

    /// Wake waiters so they re-evaluate stop/abort flags.
    pub fn wake(&self) {
        self.done.notify_all();
    }

    pub fn is_waiting(&self) -> bool {
        self.state.lock().waiting
    }
}

fn display_label(label: &str) -> &str {
    if label.is_empty() {
        "(unknown file)"
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_progress_due_first_update() {
        assert!(progress_due(None, Duration::ZERO, 0));
    }

    #[test]
    fn test_progress_due_percent_step() {
        assert!(!progress_due(Some(10), Duration::from_millis(10), 12));
        assert!(progress_due(Some(10), Duration::from_millis(10), 15));
    }

    #[test]
    fn test_progress_due_time_step() {
        assert!(progress_due(Some(10), Duration::from_secs(1), 11));
        assert!(!progress_due(Some(10), Duration::from_millis(999), 11));
    }

    #[test]
    fn test_wait_returns_when_result_arrives() {
        let tracker = Arc::new(TransferTracker::new());
        let shutdown = Shutdown::new();
        tracker.begin("A.JPG".into(), TransferOp::Sync);

        let t2 = tracker.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            t2.on_result(TransferStatus::Complete, Some("/tmp/A.JPG".into()), false);
        });

        match tracker.wait(&shutdown) {
            WaitOutcome::Finished(f) => {
                assert_eq!(f.status, TransferStatus::Complete);
                assert_eq!(f.op, TransferOp::Sync);
                assert!(!f.aborted);
                assert_eq!(f.label, "A.JPG");
            }
            WaitOutcome::Interrupted => panic!("expected a finished transfer"),
        }
        handle.join().unwrap();
        assert!(!tracker.is_waiting());
    }

    #[test]
    fn test_abandon_unblocks_immediately() {
        let tracker = TransferTracker::new();
        let shutdown = Shutdown::new();
        tracker.begin("B.JPG".into(), TransferOp::New);
        tracker.abandon();
        // Must not block: no callback is coming for a failed start.
        match tracker.wait(&shutdown) {
            WaitOutcome::Interrupted => {}
            WaitOutcome::Finished(_) => panic!("no result was recorded"),
        }
    }

    #[test]
    fn test_stop_flag_interrupts_wait() {
        let tracker = Arc::new(TransferTracker::new());
        let shutdown = Shutdown::new();
        {
            let t = tracker.clone();
            shutdown.notify_on_stop(move || t.wake());
        }
        tracker.begin("C.MP4".into(), TransferOp::Sync);

        let sd = shutdown.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            sd.request_stop();
        });

        match tracker.wait(&shutdown) {
            WaitOutcome::Interrupted => {}
            WaitOutcome::Finished(_) => panic!("no result should exist"),
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_result_after_abort_is_flagged() {
        let tracker = TransferTracker::new();
        tracker.begin("D.JPG".into(), TransferOp::Sync);
        let f = tracker
            .on_result(TransferStatus::Complete, None, true)
            .expect("waiter was present");
        assert!(f.aborted);
        assert_eq!(f.status, TransferStatus::Complete);
    }

    #[test]
    fn test_result_without_waiter_is_dropped() {
        let tracker = TransferTracker::new();
        assert!(tracker
            .on_result(TransferStatus::Complete, None, false)
            .is_none());
    }

    #[test]
    fn test_result_label_prefers_reported_path() {
        let tracker = TransferTracker::new();
        tracker.begin("requested.JPG".into(), TransferOp::Sync);
        let f = tracker
            .on_result(
                TransferStatus::Complete,
                Some("/sync/DCIM/actual.JPG".into()),
                false,
            )
            .unwrap();
        assert_eq!(f.label, "actual.JPG");
    }

    #[test]
    fn test_op_policies() {
        assert!(TransferOp::Sync.skips_existing());
        assert!(TransferOp::Rating.skips_existing());
        assert!(!TransferOp::New.skips_existing());
        assert_eq!(TransferOp::Sync.hook_token(), "sync");
        assert_eq!(TransferOp::New.hook_token(), "new");
        assert_eq!(TransferOp::Rating.hook_token(), "rating");
    }
}
