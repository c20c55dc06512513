//! Device abstraction — the seam between the shell and a camera backend.
//!
//! The vendor SDK delivers results through virtual-method callbacks into a
//! single object. Here that inversion is modeled as three traits: the backend
//! implements [`TransferChannel`] and [`CameraControl`], the session
//! implements [`DeviceEvents`] and is injected into the backend at connect
//! time. Orchestration code only ever sees the traits, so a scripted fake can
//! drive the whole engine from a test.

pub mod sim;

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::types::{CameraMode, ContentItem, ContentScope, Slot};

/// Known vendor status codes surfaced in logs.
const STATUS_NAMES: &[(u32, &str)] = &[
    (0x8101, "Generic_Unknown"),
    (0x8106, "Generic_NotSupported"),
    (0x8202, "Connect_TransportRefused"),
    (0x8213, "Connect_Rejected"),
    (0x8301, "Transfer_Busy"),
    (0x8302, "Transfer_NotFound"),
    (0x8304, "Transfer_CancelNotSupported"),
];

pub fn status_name(code: u32) -> &'static str {
    STATUS_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, n)| *n)
        .unwrap_or("Unknown")
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device call failed: {} (0x{code:04X})", status_name(*code))]
    Status { code: u32 },

    #[error("device not connected")]
    NotConnected,

    #[error("operation not supported by this body")]
    NotSupported,
}

impl DeviceError {
    pub fn status(code: u32) -> DeviceError {
        DeviceError::Status { code }
    }

    /// Whether the device rejected the call as unsupported rather than failed.
    ///
    /// Matters for cancel-transfer: older firmware finishes the current file
    /// instead of canceling, and that outcome is informational, not an error.
    pub fn is_not_supported(&self) -> bool {
        matches!(
            self,
            DeviceError::NotSupported
                | DeviceError::Status { code: 0x8106 }
                | DeviceError::Status { code: 0x8304 }
        )
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Terminal outcome of one transfer, as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Complete,
    Failed { code: u32 },
    Canceled,
}

/// Device properties the shell reads or watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyCode {
    FNumber,
    ShutterSpeed,
    IsoSensitivity,
    IsoCurrent,
    ExposureCompensation,
    ExposureProgram,
    MovieRecordingState,
    CameraPowerStatus,
    ButtonFunctionStatus,
    ShootingMode,
}

/// Property values shared between backends and presentation code.
pub mod prop {
    pub const BUTTON_FUNCTION_IDLE: u64 = 0;
    pub const BUTTON_FUNCTION_ANY_KEY_ON: u64 = 1;

    pub const RECORDING_NOT_RECORDING: u64 = 0;
    pub const RECORDING_RECORDING: u64 = 1;
    pub const RECORDING_FAILED: u64 = 2;

    pub const POWER_OFF: u64 = 0;
    pub const POWER_STANDBY: u64 = 1;
    pub const POWER_ON: u64 = 2;

    pub const SHOOTING_MODE_STILL: u64 = 0;
    pub const SHOOTING_MODE_MOVIE: u64 = 1;
}

/// Where a playback-mode camera currently points.
#[derive(Debug, Clone)]
pub struct PlaybackInfo {
    pub slot: Slot,
    /// Remote path of the file shown on the body's screen, if any.
    pub file_path: Option<String>,
}

/// Callbacks delivered by the backend from its own threads.
///
/// Implementations must not block: transfer workers are woken through these,
/// and the backend may deliver from a single dispatch thread.
pub trait DeviceEvents: Send + Sync {
    /// The slot's content list changed; `added` is the number of new items.
    fn on_contents_changed(&self, slot: Slot, added: u32);

    /// In-progress percentage for the single outstanding transfer.
    fn on_transfer_progress(&self, percent: u32);

    /// Exactly-once terminal notification for the outstanding transfer.
    /// `path` is the file as actually saved, which may differ from the
    /// requested name.
    fn on_transfer_result(&self, status: TransferStatus, path: Option<PathBuf>);

    fn on_property_changed(&self, code: PropertyCode, value: u64);

    fn on_disconnected(&self, code: u32);
}

/// The device's content-transfer surface.
///
/// The channel supports at most one transfer in flight per connection; callers
/// must serialize `start_transfer` and wait for the result callback before
/// issuing the next one.
pub trait TransferChannel: Send + Sync {
    fn list_captured_dates(&self, slot: Slot) -> DeviceResult<Vec<NaiveDate>>;

    fn list_contents(&self, slot: Slot, scope: ContentScope) -> DeviceResult<Vec<ContentItem>>;

    /// Kick off a single-file transfer. Progress and the terminal result
    /// arrive via [`DeviceEvents`]; an `Err` here means no callback will come.
    fn start_transfer(
        &self,
        slot: Slot,
        content_id: u64,
        file_id: u32,
        chunk_size: u32,
        dest_dir: &Path,
        dest_name: &str,
    ) -> DeviceResult<()>;

    /// Ask the device to cancel the in-flight transfer. Bodies that do not
    /// support immediate cancel return a not-supported status and finish the
    /// current file.
    fn cancel_transfer(&self) -> DeviceResult<()>;
}

/// Camera command/property surface used by the REPL and the rating watcher.
pub trait CameraControl: Send + Sync {
    fn set_half_press(&self, pressed: bool) -> DeviceResult<()>;

    /// Press or release the shutter release button.
    fn press_shutter(&self, down: bool) -> DeviceResult<()>;

    /// Tap the movie record button (toggles recording).
    fn press_record_button(&self) -> DeviceResult<()>;

    fn power_off(&self) -> DeviceResult<()>;

    fn get_property(&self, code: PropertyCode) -> DeviceResult<u64>;

    fn set_property(&self, code: PropertyCode, value: u64) -> DeviceResult<()>;

    /// Last time the slot's content list changed on the body, if known.
    /// Lags the rating/favorite button by up to a couple hundred ms.
    fn contents_update_time(&self, slot: Slot) -> DeviceResult<Option<NaiveDateTime>>;

    fn playback_info(&self) -> DeviceResult<PlaybackInfo>;

    fn camera_mode(&self) -> DeviceResult<CameraMode>;

    /// One live-view frame, JPEG-encoded.
    fn live_view_frame(&self) -> DeviceResult<Vec<u8>>;

    /// Pairing fingerprint to persist for faster reconnects.
    fn fingerprint(&self) -> DeviceResult<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_resolve() {
        assert_eq!(status_name(0x8106), "Generic_NotSupported");
        assert_eq!(status_name(0xDEAD), "Unknown");
    }

    #[test]
    fn not_supported_classification() {
        assert!(DeviceError::NotSupported.is_not_supported());
        assert!(DeviceError::status(0x8304).is_not_supported());
        assert!(!DeviceError::status(0x8301).is_not_supported());
        assert!(!DeviceError::NotConnected.is_not_supported());
    }

    #[test]
    fn status_error_displays_name_and_code() {
        let e = DeviceError::status(0x8202);
        let msg = e.to_string();
        assert!(msg.contains("Connect_TransportRefused"));
        assert!(msg.contains("0x8202"));
    }
}
