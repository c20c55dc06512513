//! Scripted fake camera for tests.
//!
//! Implements both device traits against in-memory content lists and drives
//! the event callbacks synchronously from the calling thread, so the whole
//! orchestration stack can be exercised without hardware and without sleeps
//! in the success paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;

use crate::device::{
    CameraControl, DeviceError, DeviceEvents, DeviceResult, PlaybackInfo, PropertyCode,
    TransferChannel, TransferStatus,
};
use crate::types::{CameraMode, ContentItem, ContentScope, Rating, Slot};

/// Spin until `pred` holds or the timeout elapses; returns whether it held.
pub fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    pred()
}

#[derive(Debug, Clone)]
pub struct StartedTransfer {
    pub slot: Slot,
    pub content_id: u64,
    pub file_id: u32,
    pub dest_dir: PathBuf,
    pub dest_name: String,
}

type StartCallback = Box<dyn Fn(&StartedTransfer) + Send + Sync>;

pub struct FakeCamera {
    events: Mutex<Option<Arc<dyn DeviceEvents>>>,
    contents: Mutex<HashMap<Slot, Vec<ContentItem>>>,
    started: Mutex<Vec<StartedTransfer>>,
    listed: Mutex<Vec<(Slot, ContentScope)>>,
    on_start: Mutex<Option<StartCallback>>,
    transfer_delay: Mutex<Duration>,
    fail_starts: AtomicU32,
    cancel_calls: AtomicU32,
    commands: Mutex<Vec<String>>,
    properties: Mutex<HashMap<PropertyCode, u64>>,
    playback: Mutex<Option<PlaybackInfo>>,
    update_times: Mutex<HashMap<Slot, NaiveDateTime>>,
}

impl FakeCamera {
    pub fn new() -> Arc<FakeCamera> {
        Arc::new(FakeCamera {
            events: Mutex::new(None),
            contents: Mutex::new(HashMap::new()),
            started: Mutex::new(Vec::new()),
            listed: Mutex::new(Vec::new()),
            on_start: Mutex::new(None),
            transfer_delay: Mutex::new(Duration::ZERO),
            fail_starts: AtomicU32::new(0),
            cancel_calls: AtomicU32::new(0),
            commands: Mutex::new(Vec::new()),
            properties: Mutex::new(HashMap::new()),
            playback: Mutex::new(None),
            update_times: Mutex::new(HashMap::new()),
        })
    }

    pub fn attach(&self, events: Arc<dyn DeviceEvents>) {
        *self.events.lock() = Some(events);
    }

    fn events(&self) -> Option<Arc<dyn DeviceEvents>> {
        self.events.lock().clone()
    }

    pub fn add_contents(&self, slot: Slot, items: Vec<ContentItem>) {
        self.contents.lock().entry(slot).or_default().extend(items);
    }

    pub fn set_rating(&self, slot: Slot, content_id: u64, rating: Rating) {
        if let Some(items) = self.contents.lock().get_mut(&slot) {
            for item in items.iter_mut() {
                if item.content_id == content_id {
                    item.rating = rating;
                }
            }
        }
    }

    pub fn set_transfer_delay(&self, delay: Duration) {
        *self.transfer_delay.lock() = delay;
    }

    pub fn fail_next_starts(&self, count: u32) {
        self.fail_starts.store(count, Ordering::SeqCst);
    }

    pub fn set_on_transfer_start(&self, cb: impl Fn(&StartedTransfer) + Send + Sync + 'static) {
        *self.on_start.lock() = Some(Box::new(cb));
    }

    pub fn set_playback(&self, info: PlaybackInfo) {
        *self.playback.lock() = Some(info);
    }

    pub fn set_update_time(&self, slot: Slot, at: NaiveDateTime) {
        self.update_times.lock().insert(slot, at);
    }

    pub fn set_property(&self, code: PropertyCode, value: u64) {
        self.properties.lock().insert(code, value);
    }

    pub fn started_transfers(&self) -> Vec<StartedTransfer> {
        self.started.lock().clone()
    }

    pub fn listed_scopes(&self, slot: Slot) -> Vec<ContentScope> {
        self.listed
            .lock()
            .iter()
            .filter(|(s, _)| *s == slot)
            .map(|(_, scope)| *scope)
            .collect()
    }

    pub fn cancel_calls(&self) -> u32 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    /// Deliver a contents-changed push the way the device would.
    pub fn push_contents_changed(&self, slot: Slot, added: u32) {
        if let Some(events) = self.events() {
            events.on_contents_changed(slot, added);
        }
    }

    pub fn push_property_changed(&self, code: PropertyCode, value: u64) {
        if let Some(events) = self.events() {
            events.on_property_changed(code, value);
        }
    }

    fn log_command(&self, cmd: impl Into<String>) {
        self.commands.lock().push(cmd.into());
    }
}

impl TransferChannel for FakeCamera {
    fn list_captured_dates(&self, slot: Slot) -> DeviceResult<Vec<NaiveDate>> {
        let contents = self.contents.lock();
        let mut dates: Vec<NaiveDate> = contents
            .get(&slot)
            .map(|items| items.iter().map(|i| i.modified.date()).collect())
            .unwrap_or_default();
        dates.sort_unstable();
        dates.dedup();
        Ok(dates)
    }

    fn list_contents(&self, slot: Slot, scope: ContentScope) -> DeviceResult<Vec<ContentItem>> {
        self.listed.lock().push((slot, scope));
        let contents = self.contents.lock();
        let items = contents.get(&slot).cloned().unwrap_or_default();
        Ok(match scope {
            ContentScope::All => items,
            ContentScope::Day(day) => items
                .into_iter()
                .filter(|i| i.modified.date() == day)
                .collect(),
        })
    }

    fn start_transfer(
        &self,
        slot: Slot,
        content_id: u64,
        file_id: u32,
        _chunk_size: u32,
        dest_dir: &Path,
        dest_name: &str,
    ) -> DeviceResult<()> {
        let remaining = self.fail_starts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_starts.store(remaining - 1, Ordering::SeqCst);
            return Err(DeviceError::status(0x8301));
        }

        let record = StartedTransfer {
            slot,
            content_id,
            file_id,
            dest_dir: dest_dir.to_path_buf(),
            dest_name: dest_name.to_string(),
        };
        self.started.lock().push(record.clone());

        if let Some(cb) = self.on_start.lock().as_ref() {
            cb(&record);
        }

        let delay = *self.transfer_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let path = dest_dir.join(dest_name);
        std::fs::write(&path, b"fake-bytes").map_err(|_| DeviceError::status(0x8302))?;

        if let Some(events) = self.events() {
            events.on_transfer_progress(0);
            events.on_transfer_progress(100);
            events.on_transfer_result(TransferStatus::Complete, Some(path));
        }
        Ok(())
    }

    fn cancel_transfer(&self) -> DeviceResult<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl CameraControl for FakeCamera {
    fn set_half_press(&self, pressed: bool) -> DeviceResult<()> {
        self.log_command(format!("half_press:{}", pressed));
        Ok(())
    }

    fn press_shutter(&self, down: bool) -> DeviceResult<()> {
        self.log_command(format!("shutter:{}", down));
        Ok(())
    }

    fn press_record_button(&self) -> DeviceResult<()> {
        self.log_command("record_button");
        Ok(())
    }

    fn power_off(&self) -> DeviceResult<()> {
        self.log_command("power_off");
        Ok(())
    }

    fn get_property(&self, code: PropertyCode) -> DeviceResult<u64> {
        Ok(self.properties.lock().get(&code).copied().unwrap_or(0))
    }

    fn set_property(&self, code: PropertyCode, value: u64) -> DeviceResult<()> {
        self.properties.lock().insert(code, value);
        Ok(())
    }

    fn contents_update_time(&self, slot: Slot) -> DeviceResult<Option<NaiveDateTime>> {
        Ok(self.update_times.lock().get(&slot).copied())
    }

    fn playback_info(&self) -> DeviceResult<PlaybackInfo> {
        match self.playback.lock().clone() {
            Some(info) => Ok(info),
            None => Ok(PlaybackInfo {
                slot: Slot::One,
                file_path: None,
            }),
        }
    }

    fn camera_mode(&self) -> DeviceResult<CameraMode> {
        Ok(CameraMode::Still)
    }

    fn live_view_frame(&self) -> DeviceResult<Vec<u8>> {
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }

    fn fingerprint(&self) -> DeviceResult<Vec<u8>> {
        Ok(b"fake-fingerprint".to_vec())
    }
}
