//! Simulated camera backend.
//!
//! Backs the shell during development and demos: slot 1 is a local "card"
//! directory whose files become content items, `shoot` drops a new capture
//! into it, and transfers copy bytes chunk by chunk on a worker thread while
//! delivering the same progress/result callbacks a real body would. A
//! hardware backend would implement the same two traits against the vendor
//! SDK.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;

use crate::device::{
    prop, CameraControl, DeviceError, DeviceEvents, DeviceResult, PlaybackInfo, PropertyCode,
    TransferChannel, TransferStatus,
};
use crate::format;
use crate::types::{CameraMode, ContentFile, ContentItem, ContentScope, FileKind, Rating, Slot};

/// Simulated per-chunk transfer pacing.
const CHUNK_DELAY: Duration = Duration::from_millis(20);
const SIM_CHUNKS: u32 = 5;

/// Minimal JPEG bytes used for generated captures and live-view frames.
const JPEG_STUB: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9];

pub struct SimCamera {
    events: Mutex<Option<Arc<dyn DeviceEvents>>>,
    connected: AtomicBool,
    source_dir: Option<PathBuf>,
    contents: Mutex<HashMap<Slot, Vec<ContentItem>>>,
    next_content_id: AtomicU64,
    next_capture_seq: AtomicU64,
    transfer_busy: Arc<AtomicBool>,
    cancel_requested: Arc<AtomicBool>,
    properties: Mutex<HashMap<PropertyCode, u64>>,
    update_times: Mutex<HashMap<Slot, NaiveDateTime>>,
    playback: Mutex<Option<PlaybackInfo>>,
    frame_counter: AtomicU64,
}

fn mtime_naive(path: &Path) -> NaiveDateTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| DateTime::<Utc>::from(t).naive_utc())
        .unwrap_or_else(|_| Utc::now().naive_utc())
}

impl SimCamera {
    /// Build a camera whose slot 1 mirrors `source_dir` (scanned once at
    /// startup). With no source directory both slots start empty.
    pub fn open(source_dir: Option<PathBuf>) -> DeviceResult<Arc<SimCamera>> {
        let camera = SimCamera {
            events: Mutex::new(None),
            connected: AtomicBool::new(false),
            source_dir,
            contents: Mutex::new(HashMap::new()),
            next_content_id: AtomicU64::new(1),
            next_capture_seq: AtomicU64::new(1),
            transfer_busy: Arc::new(AtomicBool::new(false)),
            cancel_requested: Arc::new(AtomicBool::new(false)),
            properties: Mutex::new(default_properties()),
            update_times: Mutex::new(HashMap::new()),
            playback: Mutex::new(None),
            frame_counter: AtomicU64::new(0),
        };
        if let Some(dir) = camera.source_dir.clone() {
            camera.scan_source(&dir)?;
        }
        Ok(Arc::new(camera))
    }

    pub fn connect(&self, events: Arc<dyn DeviceEvents>) -> DeviceResult<()> {
        *self.events.lock() = Some(events);
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        *self.events.lock() = None;
    }

    fn events(&self) -> Option<Arc<dyn DeviceEvents>> {
        self.events.lock().clone()
    }

    fn ensure_connected(&self) -> DeviceResult<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DeviceError::NotConnected)
        }
    }

    fn scan_source(&self, dir: &Path) -> DeviceResult<()> {
        let mut items = Vec::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            let entries = match std::fs::read_dir(&current) {
                Ok(e) => e,
                Err(_) => continue,
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(dir) {
                    let remote = rel.to_string_lossy().replace('\\', "/");
                    let id = self.next_content_id.fetch_add(1, Ordering::Relaxed);
                    items.push(ContentItem {
                        content_id: id,
                        modified: mtime_naive(&path),
                        rating: Rating::Unrated,
                        files: vec![ContentFile {
                            file_id: 1,
                            kind: FileKind::from_remote_path(&remote),
                            remote_path: remote,
                        }],
                    });
                }
            }
        }
        tracing::debug!("sim: scanned {} item(s) from {}", items.len(), dir.display());
        // New captures number past anything already on the card.
        self.next_capture_seq
            .store(items.len() as u64 + 1, Ordering::Relaxed);
        self.contents.lock().insert(Slot::One, items);
        Ok(())
    }

    fn bump_update_time(&self, slot: Slot) {
        self.update_times
            .lock()
            .insert(slot, Utc::now().naive_utc());
    }

    /// Materialize a new capture on the card and announce it like a body
    /// would after the shutter fires.
    fn capture(&self) {
        let seq = self.next_capture_seq.fetch_add(1, Ordering::Relaxed);
        let remote = format!("DCIM/100MSDCF/DSC{:05}.JPG", seq);

        if let Some(dir) = &self.source_dir {
            let path = dir.join(&remote);
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::write(&path, JPEG_STUB) {
                tracing::warn!("sim: failed to write capture {}: {}", path.display(), e);
                return;
            }
        }

        let id = self.next_content_id.fetch_add(1, Ordering::Relaxed);
        let item = ContentItem {
            content_id: id,
            modified: Utc::now().naive_utc(),
            rating: Rating::Unrated,
            files: vec![ContentFile {
                file_id: 1,
                kind: FileKind::Still,
                remote_path: remote.clone(),
            }],
        };
        self.contents
            .lock()
            .entry(Slot::One)
            .or_default()
            .push(item);
        self.bump_update_time(Slot::One);
        *self.playback.lock() = Some(PlaybackInfo {
            slot: Slot::One,
            file_path: Some(remote),
        });

        if let Some(events) = self.events() {
            events.on_contents_changed(Slot::One, 1);
        }
    }

    fn resolve_source(&self, slot: Slot, content_id: u64, file_id: u32) -> Option<(PathBuf, u64)> {
        let contents = self.contents.lock();
        let item = contents
            .get(&slot)?
            .iter()
            .find(|i| i.content_id == content_id)?;
        let file = item.files.iter().find(|f| f.file_id == file_id)?;
        let path = self.source_dir.as_ref()?.join(&file.remote_path);
        let size = std::fs::metadata(&path).ok()?.len();
        Some((path, size))
    }
}

fn default_properties() -> HashMap<PropertyCode, u64> {
    let mut props = HashMap::new();
    props.insert(PropertyCode::FNumber, 280);
    props.insert(PropertyCode::ShutterSpeed, (1 << 16) | 125);
    props.insert(PropertyCode::IsoSensitivity, u64::from(format::ISO_AUTO));
    props.insert(PropertyCode::IsoCurrent, 0);
    props.insert(PropertyCode::ExposureCompensation, 0);
    props.insert(
        PropertyCode::ExposureProgram,
        format::ExposureProgram::AperturePriority.code(),
    );
    props.insert(
        PropertyCode::MovieRecordingState,
        prop::RECORDING_NOT_RECORDING,
    );
    props.insert(PropertyCode::CameraPowerStatus, prop::POWER_ON);
    props.insert(
        PropertyCode::ButtonFunctionStatus,
        prop::BUTTON_FUNCTION_IDLE,
    );
    props.insert(PropertyCode::ShootingMode, prop::SHOOTING_MODE_STILL);
    props
}

impl TransferChannel for SimCamera {
    fn list_captured_dates(&self, slot: Slot) -> DeviceResult<Vec<chrono::NaiveDate>> {
        self.ensure_connected()?;
        let contents = self.contents.lock();
        let mut dates: Vec<chrono::NaiveDate> = contents
            .get(&slot)
            .map(|items| items.iter().map(|i| i.modified.date()).collect())
            .unwrap_or_default();
        dates.sort_unstable();
        dates.dedup();
        Ok(dates)
    }

    fn list_contents(&self, slot: Slot, scope: ContentScope) -> DeviceResult<Vec<ContentItem>> {
        self.ensure_connected()?;
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
        self.ensure_connected()?;

        // The channel carries one transfer at a time, like the hardware.
        if self
            .transfer_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DeviceError::status(0x8301));
        }
        self.cancel_requested.store(false, Ordering::Release);

        let source = match self.resolve_source(slot, content_id, file_id) {
            Some(s) => s,
            None => {
                self.transfer_busy.store(false, Ordering::Release);
                return Err(DeviceError::status(0x8302));
            }
        };

        let events = match self.events() {
            Some(e) => e,
            None => {
                self.transfer_busy.store(false, Ordering::Release);
                return Err(DeviceError::NotConnected);
            }
        };

        let dest = dest_dir.join(dest_name);
        let busy = self.transfer_busy.clone();
        let cancel = self.cancel_requested.clone();
        let spawned = std::thread::Builder::new()
            .name("sim-transfer".into())
            .spawn(move || {
                run_transfer(events, source.0, dest, cancel);
                busy.store(false, Ordering::Release);
            });
        if spawned.is_err() {
            self.transfer_busy.store(false, Ordering::Release);
            return Err(DeviceError::status(0x8101));
        }
        Ok(())
    }

    fn cancel_transfer(&self) -> DeviceResult<()> {
        self.ensure_connected()?;
        if !self.transfer_busy.load(Ordering::Acquire) {
            return Ok(());
        }
        self.cancel_requested.store(true, Ordering::Release);
        Ok(())
    }
}

fn run_transfer(
    events: Arc<dyn DeviceEvents>,
    source: PathBuf,
    dest: PathBuf,
    cancel: Arc<AtomicBool>,
) {
    let bytes = match std::fs::read(&source) {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!("sim: read {} failed: {}", source.display(), e);
            events.on_transfer_result(TransferStatus::Failed { code: 0x8302 }, None);
            return;
        }
    };

    events.on_transfer_progress(0);
    let chunk_len = (bytes.len() / SIM_CHUNKS as usize).max(1);
    let mut written = 0usize;
    let mut out = Vec::with_capacity(bytes.len());
    while written < bytes.len() {
        if cancel.load(Ordering::Acquire) {
            events.on_transfer_result(TransferStatus::Canceled, None);
            return;
        }
        let end = (written + chunk_len).min(bytes.len());
        out.extend_from_slice(&bytes[written..end]);
        written = end;
        let percent = (written * 100 / bytes.len()) as u32;
        events.on_transfer_progress(percent);
        std::thread::sleep(CHUNK_DELAY);
    }

    if let Err(e) = std::fs::write(&dest, &out) {
        tracing::debug!("sim: write {} failed: {}", dest.display(), e);
        events.on_transfer_result(TransferStatus::Failed { code: 0x8101 }, None);
        return;
    }
    events.on_transfer_result(TransferStatus::Complete, Some(dest));
}

impl CameraControl for SimCamera {
    fn set_half_press(&self, pressed: bool) -> DeviceResult<()> {
        self.ensure_connected()?;
        tracing::debug!("sim: half-press {}", if pressed { "down" } else { "up" });
        Ok(())
    }

    fn press_shutter(&self, down: bool) -> DeviceResult<()> {
        self.ensure_connected()?;
        if !down {
            // Capture completes on release, like the real button.
            self.capture();
        }
        Ok(())
    }

    fn press_record_button(&self) -> DeviceResult<()> {
        self.ensure_connected()?;
        let mut props = self.properties.lock();
        let state = props
            .get(&PropertyCode::MovieRecordingState)
            .copied()
            .unwrap_or(prop::RECORDING_NOT_RECORDING);
        let next = if state == prop::RECORDING_RECORDING {
            prop::RECORDING_NOT_RECORDING
        } else {
            prop::RECORDING_RECORDING
        };
        props.insert(PropertyCode::MovieRecordingState, next);
        drop(props);
        if let Some(events) = self.events() {
            events.on_property_changed(PropertyCode::MovieRecordingState, next);
        }
        Ok(())
    }

    fn power_off(&self) -> DeviceResult<()> {
        self.ensure_connected()?;
        self.properties
            .lock()
            .insert(PropertyCode::CameraPowerStatus, prop::POWER_STANDBY);
        if let Some(events) = self.events() {
            std::thread::Builder::new()
                .name("sim-poweroff".into())
                .spawn(move || {
                    std::thread::sleep(Duration::from_millis(200));
                    events.on_disconnected(0);
                })
                .ok();
        }
        Ok(())
    }

    fn get_property(&self, code: PropertyCode) -> DeviceResult<u64> {
        self.ensure_connected()?;
        Ok(self.properties.lock().get(&code).copied().unwrap_or(0))
    }

    fn set_property(&self, code: PropertyCode, value: u64) -> DeviceResult<()> {
        self.ensure_connected()?;
        self.properties.lock().insert(code, value);
        if let Some(events) = self.events() {
            events.on_property_changed(code, value);
        }
        Ok(())
    }

    fn contents_update_time(&self, slot: Slot) -> DeviceResult<Option<NaiveDateTime>> {
        self.ensure_connected()?;
        Ok(self.update_times.lock().get(&slot).copied())
    }

    fn playback_info(&self) -> DeviceResult<PlaybackInfo> {
        self.ensure_connected()?;
        match self.playback.lock().clone() {
            Some(info) => Ok(info),
            None => Ok(PlaybackInfo {
                slot: Slot::One,
                file_path: None,
            }),
        }
    }

    fn camera_mode(&self) -> DeviceResult<CameraMode> {
        self.ensure_connected()?;
        let mode = self
            .properties
            .lock()
            .get(&PropertyCode::ShootingMode)
            .copied()
            .unwrap_or(prop::SHOOTING_MODE_STILL);
        Ok(if mode == prop::SHOOTING_MODE_MOVIE {
            CameraMode::Movie
        } else {
            CameraMode::Still
        })
    }

    fn live_view_frame(&self) -> DeviceResult<Vec<u8>> {
        self.ensure_connected()?;
        let n = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let mut frame = JPEG_STUB.to_vec();
        frame.extend_from_slice(&n.to_le_bytes());
        Ok(frame)
    }

    fn fingerprint(&self) -> DeviceResult<Vec<u8>> {
        self.ensure_connected()?;
        Ok(b"camshell-sim-fingerprint".to_vec())
    }
}
