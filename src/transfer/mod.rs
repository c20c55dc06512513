//! Content-synchronization engine.
//!
//! [`SyncSession`] is the per-connection hub: it implements the device event
//! surface, owns the single transfer tracker and the campaign state, and
//! spawns the slot worker threads that pull files. One session exists per
//! connection and is rebuilt from scratch on reconnect, so no cross-connection
//! state can leak.
//!
//! Flow: device callback (or manual `sync`) → token check → slot worker →
//! planner → tracker/channel (one transfer in flight device-wide) → local
//! filesystem → optional post-download hook.

pub mod campaign;
pub mod paths;
pub mod planner;
pub mod tracker;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::device::{
    prop, CameraControl, DeviceEvents, PropertyCode, TransferChannel, TransferStatus,
};
use crate::hook;
use crate::rating::RatingWatcher;
use crate::shutdown::Shutdown;
use crate::types::{CameraMode, ContentFile, ContentItem, Slot, SyncScope};

use campaign::CampaignState;
use planner::{FilePlan, NamingPolicy};
use tracker::{FinishedTransfer, TransferOp, TransferTracker, WaitOutcome};

/// Transfer chunk size handed to the device, matching the vendor sample apps.
const TRANSFER_CHUNK_SIZE: u32 = 0x0100_0000;

/// How long the campaign coordinator waits for the first worker to start.
const CAMPAIGN_SPINUP: Duration = Duration::from_millis(25);
const CAMPAIGN_SPINUP_ROUNDS: u32 = 40;

/// Poll interval while draining active slot workers. There is no single
/// event to block on across two independently progressing workers.
const CAMPAIGN_DRAIN_POLL: Duration = Duration::from_millis(50);

pub struct SessionConfig {
    pub sync_dir: PathBuf,
    pub hook: Option<PathBuf>,
    pub auto_sync: bool,
}

/// Outcome of one file handed through [`SyncSession::transfer_one`].
pub(crate) enum TransferStep {
    /// Transfer ran to a terminal result; path is the saved file on success.
    Done(Option<PathBuf>),
    /// Skip-existing policy matched; the local file is already there.
    Skipped(PathBuf),
    /// Abort or process stop: the caller must not start further files.
    Halt,
}

pub struct SyncSession {
    /// Self-handle for spawning worker threads that outlive the borrow.
    self_ref: Weak<SyncSession>,
    channel: Arc<dyn TransferChannel>,
    control: Arc<dyn CameraControl>,
    shutdown: Arc<Shutdown>,
    tracker: TransferTracker,
    campaign: CampaignState,
    /// Both slot workers funnel through this permit: the device accepts a
    /// single transfer at a time regardless of slot.
    transfer_permit: Mutex<()>,
    rating: RatingWatcher,
    sync_dir: PathBuf,
    hook: Option<PathBuf>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    reconnect: AtomicBool,
}

/// Adapter implementing the backend event surface for a session.
pub struct SessionEvents(pub Arc<SyncSession>);

impl SyncSession {
    pub fn new(
        channel: Arc<dyn TransferChannel>,
        control: Arc<dyn CameraControl>,
        shutdown: Arc<Shutdown>,
        config: SessionConfig,
    ) -> Arc<SyncSession> {
        let session = Arc::new_cyclic(|weak| SyncSession {
            self_ref: weak.clone(),
            channel,
            control,
            shutdown: shutdown.clone(),
            tracker: TransferTracker::new(),
            campaign: CampaignState::new(config.auto_sync),
            transfer_permit: Mutex::new(()),
            rating: RatingWatcher::new(),
            sync_dir: config.sync_dir,
            hook: config.hook,
            workers: Mutex::new(Vec::new()),
            reconnect: AtomicBool::new(false),
        });
        // Blocked transfer waits re-check the stop flag when shutdown fires.
        let weak = Arc::downgrade(&session);
        shutdown.notify_on_stop(move || {
            if let Some(s) = weak.upgrade() {
                s.tracker.wake();
            }
        });
        session
    }

    pub(crate) fn channel(&self) -> &dyn TransferChannel {
        self.channel.as_ref()
    }

    pub(crate) fn control(&self) -> &dyn CameraControl {
        self.control.as_ref()
    }

    pub(crate) fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub(crate) fn hook_path(&self) -> Option<&PathBuf> {
        self.hook.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn rating_watcher(&self) -> &RatingWatcher {
        &self.rating
    }

    pub fn is_syncing(&self) -> bool {
        self.campaign.is_running()
    }

    /// The connection dropped; the outer loop should rebuild the session.
    pub fn reconnect_requested(&self) -> bool {
        self.reconnect.load(Ordering::Acquire)
    }

    /// Toggle the auto-sync trigger path. Does not affect a campaign already
    /// running.
    pub fn set_auto_sync(&self, enabled: bool) {
        let was = self.campaign.set_auto_sync(enabled);
        match (was, enabled) {
            (true, true) => tracing::info!("Auto-sync already enabled."),
            (false, false) => tracing::info!("Auto-sync already disabled."),
            (_, true) => tracing::info!("Auto-sync enabled."),
            (_, false) => tracing::info!("Auto-sync disabled."),
        }
    }

    /// Start a sync campaign covering both slots. Single-flight: a trigger
    /// while one is running is rejected with a user-visible message.
    pub fn start_campaign(&self, scope: SyncScope) {
        let session = match self.self_ref.upgrade() {
            Some(s) => s,
            None => return,
        };
        let all = matches!(scope, SyncScope::All);
        if !self.campaign.try_begin(all) {
            tracing::warn!("Sync already in progress. Use `sync stop` to cancel.");
            return;
        }

        match scope {
            SyncScope::All => {
                tracing::info!("Sync: ALL items from both slots (skip existing, keep names)...")
            }
            SyncScope::Latest(n) => {
                tracing::info!("Sync: latest {} item(s) per slot (skip existing, keep names)...", n)
            }
        }

        let want = match scope {
            SyncScope::Latest(n) => n,
            SyncScope::All => 0,
        };

        // Fire-and-forget coordinator so the prompt stays responsive.
        let spawned = std::thread::Builder::new()
            .name("sync-campaign".into())
            .spawn(move || {
                struct FinishGuard<'a>(&'a CampaignState);
                impl Drop for FinishGuard<'_> {
                    fn drop(&mut self) {
                        self.0.finish();
                    }
                }
                let _finish = FinishGuard(&session.campaign);

                // Same entry path as a device push; one invocation per slot
                // consumes one of the armed tokens.
                for slot in Slot::ALL {
                    session.contents_changed(slot, want);
                }

                // Wait briefly until at least one worker has started real
                // work (or an abort/stop arrived first).
                for _ in 0..CAMPAIGN_SPINUP_ROUNDS {
                    if session.campaign.active_workers() > 0
                        || session.campaign.abort_requested()
                        || session.shutdown.is_stopped()
                    {
                        break;
                    }
                    std::thread::sleep(CAMPAIGN_SPINUP);
                }

                while !session.shutdown.is_stopped() && session.campaign.active_workers() > 0 {
                    std::thread::sleep(CAMPAIGN_DRAIN_POLL);
                }

                if session.campaign.abort_requested() {
                    tracing::info!("Sync: stopped.");
                } else {
                    tracing::info!("Sync: done.");
                }
            });

        if let Err(e) = spawned {
            // Leave the flag clear so future triggers are not blocked forever.
            self.campaign.finish();
            tracing::error!("Sync: failed to launch coordinator thread: {}", e);
        }
    }

    /// Abort the running campaign: stop planning new files, best-effort ask
    /// the device to cancel the in-flight transfer, and wake blocked waiters.
    pub fn stop_campaign(&self) {
        if !self.campaign.is_running() {
            tracing::info!("Sync: nothing to stop.");
            return;
        }
        self.campaign.request_abort();

        let mut cancel_sent = false;
        match self.channel.cancel_transfer() {
            Ok(()) => cancel_sent = true,
            Err(e) if e.is_not_supported() => {
                tracing::info!(
                    "Sync: camera does not support immediate cancel ({}); finishing current file.",
                    e
                );
            }
            Err(e) => {
                tracing::warn!("Sync: cancel command failed: {}", e);
            }
        }

        // Wake the blocked worker so it re-checks the abort flag promptly
        // rather than waiting on a result the device may never send.
        self.tracker.force_idle();

        if cancel_sent {
            tracing::info!("Sync: stopping (cancel requested; waiting for workers to exit).");
        } else {
            tracing::info!("Sync: stopping (will finish current file and then stop).");
        }
    }

    /// Entry point shared by device pushes and manual campaigns. Consuming a
    /// token marks the invocation as campaign work; otherwise it is an ad hoc
    /// new-capture download, honored only when auto-sync is on and no
    /// campaign is draining the same notification.
    pub(crate) fn contents_changed(&self, slot: Slot, added: u32) {
        if self.shutdown.is_stopped() {
            return;
        }

        let is_sync = self.campaign.consume_token();
        let sync_all = is_sync && self.campaign.sync_all();

        if !is_sync {
            if self.campaign.is_running() {
                tracing::debug!(
                    "Sync in progress; ignoring contents update (slot={})",
                    slot
                );
                return;
            }
            if !self.campaign.auto_sync_enabled() {
                tracing::debug!("Auto-sync disabled; ignoring contents update (slot={})", slot);
                return;
            }
        }

        let session = match self.self_ref.upgrade() {
            Some(s) => s,
            None => return,
        };
        let spawned = std::thread::Builder::new()
            .name(format!("slot{}-worker", slot))
            .spawn(move || session.run_slot_worker(slot, added, is_sync, sync_all));
        match spawned {
            Ok(handle) => self.workers.lock().push(handle),
            Err(e) => tracing::error!("Failed to create download worker thread: {}", e),
        }
    }

    fn run_slot_worker(&self, slot: Slot, added: u32, is_sync: bool, sync_all: bool) {
        let _active = is_sync.then(|| self.campaign.worker_started());

        if sync_all {
            let mut dates = match self.channel.list_captured_dates(slot) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Failed to list captured dates (slot={}): {}", slot, e);
                    return;
                }
            };
            if dates.is_empty() {
                tracing::info!("No contents found (slot={})", slot);
                return;
            }
            dates.sort_unstable_by(|a, b| b.cmp(a));

            for day in dates {
                if is_sync && self.campaign.abort_requested() {
                    tracing::info!("Sync: stopped (slot {}).", slot);
                    break;
                }
                if self.shutdown.is_stopped() {
                    break;
                }
                match self
                    .channel
                    .list_contents(slot, crate::types::ContentScope::Day(day))
                {
                    Ok(items) if !items.is_empty() => {
                        self.process_items(slot, &items, 0, is_sync, true)
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Failed to list contents (slot={} {}): {}", slot, day, e)
                    }
                }
            }
        } else {
            let dates = match self.channel.list_captured_dates(slot) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Failed to list captured dates (slot={}): {}", slot, e);
                    return;
                }
            };
            let latest = match dates.into_iter().max() {
                Some(d) => d,
                None => {
                    tracing::info!("No contents found (slot={})", slot);
                    return;
                }
            };
            let items = match self
                .channel
                .list_contents(slot, crate::types::ContentScope::Day(latest))
            {
                Ok(items) if !items.is_empty() => items,
                Ok(_) => {
                    tracing::info!("No contents found for latest day (slot={})", slot);
                    return;
                }
                Err(e) => {
                    tracing::warn!("Failed to list contents (slot={}): {}", slot, e);
                    return;
                }
            };
            let want = if added > 0 { added } else { 1 };
            self.process_items(slot, &items, want, is_sync, false);
        }
    }

    /// Run the plan for one fetched content list: select, then pull file by
    /// file through the single-flight tracker, re-checking abort/stop before
    /// every file.
    fn process_items(
        &self,
        slot: Slot,
        items: &[ContentItem],
        want: u32,
        is_sync: bool,
        all: bool,
    ) {
        if is_sync && self.campaign.abort_requested() {
            tracing::debug!("Sync: stopped before planning (slot {}).", slot);
            return;
        }

        tracing::debug!(
            "[SYNC] slot {}: planning {} item(s){}",
            slot,
            items.len(),
            if all { " (all days)" } else { "" }
        );

        let selected: Vec<&ContentItem> = if all {
            // Device-reported order; no point sorting a full listing.
            items.iter().collect()
        } else {
            planner::select_latest(items, want)
        };

        let op = if is_sync {
            TransferOp::Sync
        } else {
            TransferOp::New
        };

        'items: for item in selected {
            if (is_sync && self.campaign.abort_requested()) || self.shutdown.is_stopped() {
                break;
            }
            if item.content_id == 0 {
                // Device-side sentinel entry.
                continue;
            }
            for file in &item.files {
                if (is_sync && self.campaign.abort_requested()) || self.shutdown.is_stopped() {
                    break 'items;
                }
                match self.transfer_one(slot, item.content_id, file, op) {
                    TransferStep::Done(_) | TransferStep::Skipped(_) => {}
                    TransferStep::Halt => break 'items,
                }
            }
        }
    }

    /// Pull a single file through the tracker and channel, blocking until its
    /// terminal result. Serialized across all workers by the transfer permit.
    pub(crate) fn transfer_one(
        &self,
        slot: Slot,
        content_id: u64,
        file: &ContentFile,
        op: TransferOp,
    ) -> TransferStep {
        let _permit = self.transfer_permit.lock();

        if self.shutdown.is_stopped()
            || (op == TransferOp::Sync && self.campaign.abort_requested())
        {
            return TransferStep::Halt;
        }

        let policy = if op.skips_existing() {
            NamingPolicy::KeepAndSkip
        } else {
            NamingPolicy::Uniquify
        };

        let planned = match planner::plan_file(&self.sync_dir, content_id, file, policy) {
            Ok(FilePlan::Transfer(p)) => p,
            Ok(FilePlan::AlreadyPresent {
                display: display_name,
                path,
            }) => {
                tracing::info!("[SKIP] already present: {}", display_name);
                return TransferStep::Skipped(path);
            }
            Err(e) => {
                tracing::warn!(
                    "Cannot prepare destination for {}: {}",
                    file.remote_path,
                    e
                );
                return TransferStep::Done(None);
            }
        };

        self.tracker.begin(planned.display.clone(), op);

        if let Err(e) = self.channel.start_transfer(
            slot,
            content_id,
            planned.file_id,
            TRANSFER_CHUNK_SIZE,
            &planned.dest_dir,
            &planned.dest_name,
        ) {
            // No callback will arrive for a failed start; reset immediately
            // or the next transfer on this tracker waits forever.
            self.tracker.abandon();
            tracing::warn!("Transfer failed to start for {}: {}", planned.display, e);
            return TransferStep::Done(None);
        }

        match self.tracker.wait(&self.shutdown) {
            WaitOutcome::Finished(finished) => {
                self.after_transfer(&finished);
                let path = (finished.status == TransferStatus::Complete)
                    .then(|| {
                        finished
                            .path
                            .clone()
                            .unwrap_or_else(|| planned.dest_dir.join(&planned.dest_name))
                    });
                if finished.aborted && op == TransferOp::Sync {
                    // Current file ran to completion; start nothing further.
                    TransferStep::Halt
                } else {
                    TransferStep::Done(path)
                }
            }
            WaitOutcome::Interrupted => TransferStep::Halt,
        }
    }

    /// Success bookkeeping: one compact line per landed file, then the hook.
    fn after_transfer(&self, finished: &FinishedTransfer) {
        if finished.status != TransferStatus::Complete || finished.aborted {
            return;
        }
        let size = finished
            .path
            .as_deref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);
        tracing::info!(
            "[FILE] {} ({} bytes, {} ms)",
            finished.label,
            size,
            finished.elapsed.as_millis()
        );

        // Rating pulls invoke the hook themselves with the rating arguments.
        if finished.op == TransferOp::Rating {
            return;
        }
        if let (Some(hook_path), Some(path)) = (&self.hook, &finished.path) {
            let mode = self.camera_mode_string();
            hook::spawn(
                hook_path,
                hook::download_args(path, &mode, finished.op.hook_token()),
            );
        }
    }

    pub(crate) fn camera_mode_string(&self) -> String {
        self.control
            .camera_mode()
            .unwrap_or(CameraMode::Still)
            .to_string()
    }

    /// Join spawned worker threads — or drop them when a forced shutdown was
    /// requested, so the process is not held hostage by a stuck transfer.
    pub fn join_workers(&self) {
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        if self.shutdown.force_requested() {
            if !handles.is_empty() {
                tracing::warn!("Detaching {} worker thread(s) on forced shutdown", handles.len());
            }
            return;
        }
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl DeviceEvents for SessionEvents {
    fn on_contents_changed(&self, slot: Slot, added: u32) {
        self.0.contents_changed(slot, added);
    }

    fn on_transfer_progress(&self, percent: u32) {
        self.0
            .tracker
            .on_progress(percent, self.0.campaign.abort_requested());
    }

    fn on_transfer_result(&self, status: TransferStatus, path: Option<PathBuf>) {
        let _ = self
            .0
            .tracker
            .on_result(status, path, self.0.campaign.abort_requested());
    }

    fn on_property_changed(&self, code: PropertyCode, value: u64) {
        tracing::trace!(?code, value, "property changed");
        if code == PropertyCode::ButtonFunctionStatus && value == prop::BUTTON_FUNCTION_ANY_KEY_ON {
            // Never block the notification thread; the watcher polls and
            // downloads on its own bounded-lifetime job thread.
            let session = Arc::clone(&self.0);
            let spawned = std::thread::Builder::new()
                .name("rating-watch".into())
                .spawn(move || session.rating.run_job(&session));
            match spawned {
                Ok(handle) => self.0.workers.lock().push(handle),
                Err(e) => tracing::error!("Failed to create rating watcher thread: {}", e),
            }
        }
    }

    fn on_disconnected(&self, code: u32) {
        tracing::warn!(
            "Disconnected: {} (0x{:04X})",
            crate::device::status_name(code),
            code
        );
        self.0.reconnect.store(true, Ordering::Release);
        // Unblock any worker waiting on a result that will never come.
        self.0.tracker.force_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{wait_until, FakeCamera};
    use crate::types::{ContentScope, FileKind, Rating};
    use chrono::NaiveDate;
    use std::fs;

    fn test_tmp_dir(subdir: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("camshell-tests").join(subdir);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn item_with_file(id: u64, modified: chrono::NaiveDateTime, path: &str) -> ContentItem {
        ContentItem {
            content_id: id,
            modified,
            rating: Rating::Unrated,
            files: vec![ContentFile {
                file_id: 1,
                remote_path: path.into(),
                kind: FileKind::from_remote_path(path),
            }],
        }
    }

    fn build_session(dir: &PathBuf, camera: &Arc<FakeCamera>) -> Arc<SyncSession> {
        let shutdown = Shutdown::new();
        let session = SyncSession::new(
            camera.clone(),
            camera.clone(),
            shutdown,
            SessionConfig {
                sync_dir: dir.clone(),
                hook: None,
                auto_sync: true,
            },
        );
        camera.attach(Arc::new(SessionEvents(session.clone())));
        session
    }

    fn wait_campaign_done(session: &SyncSession) {
        assert!(
            wait_until(Duration::from_secs(3), || !session.is_syncing()),
            "campaign did not drain"
        );
    }

    #[test]
    fn sync_one_selects_newest_item() {
        // Two items with T1 < T2; `sync 1` pulls only the T2 item.
        let dir = test_tmp_dir("session_sync_one");
        let camera = FakeCamera::new();
        camera.add_contents(
            Slot::One,
            vec![
                item_with_file(1, ts(2025, 6, 1, 10, 0, 0), "DCIM/100MSDCF/DSC00001.JPG"),
                item_with_file(2, ts(2025, 6, 1, 12, 0, 0), "DCIM/100MSDCF/DSC00002.JPG"),
            ],
        );
        let session = build_session(&dir, &camera);

        session.start_campaign(SyncScope::Latest(1));
        wait_campaign_done(&session);

        let started = camera.started_transfers();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].content_id, 2);
        assert!(dir.join("DCIM/100MSDCF/DSC00002.JPG").is_file());
        assert!(!dir.join("DCIM/100MSDCF/DSC00001.JPG").exists());
    }

    #[test]
    fn second_campaign_trigger_is_rejected() {
        let dir = test_tmp_dir("session_single_flight");
        let camera = FakeCamera::new();
        camera.add_contents(
            Slot::One,
            vec![item_with_file(1, ts(2025, 6, 1, 10, 0, 0), "DCIM/A.JPG")],
        );
        // Slow each transfer down enough for the overlap check to land.
        camera.set_transfer_delay(Duration::from_millis(150));
        let session = build_session(&dir, &camera);

        session.start_campaign(SyncScope::Latest(1));
        assert!(wait_until(Duration::from_secs(1), || session.is_syncing()));
        // A second trigger while running must not arm a second campaign.
        session.start_campaign(SyncScope::Latest(5));
        wait_campaign_done(&session);

        assert_eq!(camera.started_transfers().len(), 1);
    }

    #[test]
    fn auto_push_during_campaign_is_ignored() {
        let dir = test_tmp_dir("session_push_ignored");
        let camera = FakeCamera::new();
        camera.add_contents(
            Slot::One,
            vec![item_with_file(1, ts(2025, 6, 1, 10, 0, 0), "DCIM/A.JPG")],
        );
        camera.set_transfer_delay(Duration::from_millis(150));
        let session = build_session(&dir, &camera);

        session.start_campaign(SyncScope::Latest(1));
        assert!(wait_until(Duration::from_secs(1), || session.is_syncing()));
        // Device push while the campaign drains: must not start extra work.
        camera.push_contents_changed(Slot::One, 1);
        wait_campaign_done(&session);
        // Give a stray ad hoc worker a moment to (incorrectly) appear.
        std::thread::sleep(Duration::from_millis(100));
        session.join_workers();

        assert_eq!(camera.started_transfers().len(), 1);
    }

    #[test]
    fn sync_skips_existing_files() {
        let dir = test_tmp_dir("session_skip");
        fs::create_dir_all(dir.join("DCIM")).unwrap();
        fs::write(dir.join("DCIM/A.JPG"), b"already here").unwrap();

        let camera = FakeCamera::new();
        camera.add_contents(
            Slot::One,
            vec![item_with_file(1, ts(2025, 6, 1, 10, 0, 0), "DCIM/A.JPG")],
        );
        let session = build_session(&dir, &camera);

        session.start_campaign(SyncScope::Latest(1));
        wait_campaign_done(&session);
        session.join_workers();

        assert!(camera.started_transfers().is_empty());
        assert_eq!(fs::read(dir.join("DCIM/A.JPG")).unwrap(), b"already here");
    }

    #[test]
    fn auto_download_uniquifies_instead_of_skipping() {
        let dir = test_tmp_dir("session_uniquify");
        fs::create_dir_all(dir.join("DCIM")).unwrap();
        fs::write(dir.join("DCIM/A.JPG"), b"original").unwrap();

        let camera = FakeCamera::new();
        camera.add_contents(
            Slot::One,
            vec![item_with_file(1, ts(2025, 6, 1, 10, 0, 0), "DCIM/A.JPG")],
        );
        let session = build_session(&dir, &camera);

        // Ad hoc push (no campaign): must transfer and uniquify, not skip.
        camera.push_contents_changed(Slot::One, 1);
        assert!(wait_until(Duration::from_secs(2), || {
            !camera.started_transfers().is_empty()
        }));
        session.join_workers();

        let started = camera.started_transfers();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].dest_name, "A_1.JPG");
        assert!(dir.join("DCIM/A_1.JPG").is_file());
        assert_eq!(fs::read(dir.join("DCIM/A.JPG")).unwrap(), b"original");
    }

    #[test]
    fn failed_start_does_not_hang_worker() {
        let dir = test_tmp_dir("session_failed_start");
        let camera = FakeCamera::new();
        camera.add_contents(
            Slot::One,
            vec![
                item_with_file(1, ts(2025, 6, 1, 10, 0, 0), "DCIM/A.JPG"),
                item_with_file(2, ts(2025, 6, 1, 11, 0, 0), "DCIM/B.JPG"),
            ],
        );
        camera.fail_next_starts(2);
        let session = build_session(&dir, &camera);

        session.start_campaign(SyncScope::Latest(2));
        // Both starts fail; the campaign must still drain promptly.
        wait_campaign_done(&session);
        session.join_workers();
        assert!(camera.started_transfers().is_empty());
    }

    #[test]
    fn abort_mid_campaign_stops_before_next_date() {
        // `sync all` over three dates with abort fired when the second
        // date's first file starts: date 1 completes, date 2 halts, date 3
        // is never fetched.
        let dir = test_tmp_dir("session_abort_dates");
        let camera = FakeCamera::new();
        camera.add_contents(
            Slot::One,
            vec![
                item_with_file(1, ts(2025, 6, 3, 10, 0, 0), "DCIM/D3.JPG"),
                item_with_file(2, ts(2025, 6, 2, 10, 0, 0), "DCIM/D2.JPG"),
                item_with_file(3, ts(2025, 6, 1, 10, 0, 0), "DCIM/D1.JPG"),
            ],
        );
        let session = build_session(&dir, &camera);
        {
            let session = session.clone();
            camera.set_on_transfer_start(move |started| {
                // Dates are walked newest-first, so the second date's file
                // is D2.JPG.
                if started.dest_name == "D2.JPG" {
                    session.stop_campaign();
                }
            });
        }

        session.start_campaign(SyncScope::All);
        wait_campaign_done(&session);
        session.join_workers();

        let names: Vec<String> = camera
            .started_transfers()
            .iter()
            .map(|t| t.dest_name.clone())
            .collect();
        assert_eq!(names, vec!["D3.JPG", "D2.JPG"]);

        // The third (oldest) date was never enumerated after the abort.
        let listed = camera.listed_scopes(Slot::One);
        let oldest = ContentScope::Day(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert!(!listed.contains(&oldest));
    }

    #[test]
    fn sentinel_content_id_never_transferred() {
        let dir = test_tmp_dir("session_sentinel");
        let camera = FakeCamera::new();
        camera.add_contents(
            Slot::One,
            vec![
                item_with_file(0, ts(2025, 6, 1, 12, 0, 0), "DCIM/GHOST.JPG"),
                item_with_file(1, ts(2025, 6, 1, 10, 0, 0), "DCIM/REAL.JPG"),
            ],
        );
        let session = build_session(&dir, &camera);

        session.start_campaign(SyncScope::Latest(2));
        wait_campaign_done(&session);
        session.join_workers();

        let started = camera.started_transfers();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].dest_name, "REAL.JPG");
    }

    #[test]
    fn both_slots_are_synced() {
        let dir = test_tmp_dir("session_two_slots");
        let camera = FakeCamera::new();
        camera.add_contents(
            Slot::One,
            vec![item_with_file(1, ts(2025, 6, 1, 10, 0, 0), "DCIM/S1.JPG")],
        );
        camera.add_contents(
            Slot::Two,
            vec![item_with_file(2, ts(2025, 6, 1, 11, 0, 0), "CLIP/S2.MP4")],
        );
        let session = build_session(&dir, &camera);

        session.start_campaign(SyncScope::Latest(1));
        wait_campaign_done(&session);
        session.join_workers();

        let mut names: Vec<String> = camera
            .started_transfers()
            .iter()
            .map(|t| t.dest_name.clone())
            .collect();
        names.sort();
        assert_eq!(names, vec!["S1.JPG", "S2.MP4"]);
        assert!(dir.join("DCIM/S1.JPG").is_file());
        assert!(dir.join("CLIP/S2.MP4").is_file());
    }

    #[test]
    fn auto_sync_off_ignores_pushes() {
        let dir = test_tmp_dir("session_auto_off");
        let camera = FakeCamera::new();
        camera.add_contents(
            Slot::One,
            vec![item_with_file(1, ts(2025, 6, 1, 10, 0, 0), "DCIM/A.JPG")],
        );
        let shutdown = Shutdown::new();
        let session = SyncSession::new(
            camera.clone(),
            camera.clone(),
            shutdown,
            SessionConfig {
                sync_dir: dir.clone(),
                hook: None,
                auto_sync: false,
            },
        );
        camera.attach(Arc::new(SessionEvents(session.clone())));

        camera.push_contents_changed(Slot::One, 1);
        std::thread::sleep(Duration::from_millis(100));
        session.join_workers();
        assert!(camera.started_transfers().is_empty());
    }

    #[test]
    fn stop_campaign_without_campaign_is_noop() {
        let dir = test_tmp_dir("session_stop_noop");
        let camera = FakeCamera::new();
        let session = build_session(&dir, &camera);
        session.stop_campaign();
        assert_eq!(camera.cancel_calls(), 0);
    }
}
