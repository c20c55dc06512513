//! Live-view monitor — a start/stop background loop that polls frames from
//! the camera and keeps the latest one on disk for an external viewer.
//!
//! Independent of the transfer engine: its own running/stop flags, one
//! thread, no shared transfer state.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::device::CameraControl;

const FRAME_INTERVAL: Duration = Duration::from_millis(100);

pub struct Monitor {
    running: AtomicBool,
    stop: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    pub fn new() -> Monitor {
        Monitor {
            running: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start polling frames into `out_path`. Returns false if already
    /// running or the polling thread could not be spawned.
    pub fn start(&self, control: Arc<dyn CameraControl>, out_path: PathBuf) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::info!("Monitor already running.");
            return false;
        }
        self.stop.store(false, Ordering::Release);

        let stop = self.stop.clone();
        let spawned = std::thread::Builder::new()
            .name("monitor".into())
            .spawn(move || {
                tracing::info!("Monitor: writing frames to {}", out_path.display());
                let tmp_path = out_path.with_extension("tmp");
                let mut warned = false;
                while !stop.load(Ordering::Acquire) {
                    match control.live_view_frame() {
                        Ok(frame) => {
                            // Write-then-rename so a viewer never sees a
                            // half-written frame.
                            let ok = std::fs::write(&tmp_path, &frame)
                                .and_then(|_| std::fs::rename(&tmp_path, &out_path));
                            if let Err(e) = ok {
                                tracing::debug!("Monitor: frame write failed: {}", e);
                            }
                            warned = false;
                        }
                        Err(e) => {
                            if !warned {
                                tracing::warn!("Monitor: live view unavailable: {}", e);
                                warned = true;
                            }
                        }
                    }
                    std::thread::sleep(FRAME_INTERVAL);
                }
            });

        match spawned {
            Ok(handle) => {
                *self.thread.lock() = Some(handle);
                true
            }
            Err(e) => {
                tracing::error!("Monitor: failed to start: {}", e);
                self.running.store(false, Ordering::Release);
                false
            }
        }
    }

    pub fn stop(&self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
        self.running.store(false, Ordering::Release);
        tracing::info!("Monitor stopped.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{wait_until, FakeCamera};
    use std::fs;

    #[test]
    fn monitor_writes_frames_then_stops() {
        let dir = std::env::temp_dir().join("camshell-tests").join("monitor");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let out = dir.join("live.jpg");

        let camera = FakeCamera::new();
        let monitor = Monitor::new();
        assert!(monitor.start(camera.clone(), out.clone()));
        assert!(monitor.is_running());
        // Second start is refused while running.
        assert!(!monitor.start(camera, out.clone()));

        assert!(wait_until(Duration::from_secs(2), || out.is_file()));
        monitor.stop();
        assert!(!monitor.is_running());
        // Idempotent stop.
        monitor.stop();
    }
}
