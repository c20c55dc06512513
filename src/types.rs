use chrono::{NaiveDate, NaiveDateTime};

/// One of the camera's independent storage card bays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::One, Slot::Two];

    pub fn index(self) -> usize {
        match self {
            Slot::One => 0,
            Slot::Two => 1,
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::One => write!(f, "1"),
            Slot::Two => write!(f, "2"),
        }
    }
}

/// In-camera rating of a capture.
///
/// `NotRequired` is reported for bodies/media that do not carry ratings;
/// `Unrated` is a present-but-zero rating and renders as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    NotRequired,
    Unrated,
    Stars(u8),
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rating::NotRequired => write!(f, "-"),
            Rating::Unrated => write!(f, "0"),
            Rating::Stars(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Still,
    Movie,
    Other,
}

impl FileKind {
    /// Best-effort classification from a remote path's extension.
    pub fn from_remote_path(path: &str) -> FileKind {
        let ext = path
            .rsplit('.')
            .next()
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" | "heif" | "hif" | "arw" | "raw" | "dng" => FileKind::Still,
            "mp4" | "mov" | "xavc" | "mxf" => FileKind::Movie,
            _ => FileKind::Other,
        }
    }
}

/// One file belonging to a capture (e.g. the RAW half of a RAW+JPEG pair).
#[derive(Debug, Clone)]
pub struct ContentFile {
    pub file_id: u32,
    /// Slash-separated path on the camera medium, e.g. `DCIM/100MSDCF/DSC00042.ARW`.
    pub remote_path: String,
    pub kind: FileKind,
}

/// One logical capture on a slot, possibly spanning multiple files.
///
/// A content id of 0 is a device-side sentinel and must never be transferred.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub content_id: u64,
    /// Modification timestamp in UTC, millisecond precision.
    pub modified: NaiveDateTime,
    pub rating: Rating,
    pub files: Vec<ContentFile>,
}

/// What to enumerate from a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentScope {
    /// Contents captured on one day.
    Day(NaiveDate),
    /// The full list for the slot.
    All,
}

/// Scope of a sync campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncScope {
    /// The newest N items per slot, from the most recent captured date.
    Latest(u32),
    /// Every item from every captured date, per slot.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    Still,
    Movie,
}

impl std::fmt::Display for CameraMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraMode::Still => write!(f, "still"),
            CameraMode::Movie => write!(f, "movie"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_indices_are_stable() {
        assert_eq!(Slot::One.index(), 0);
        assert_eq!(Slot::Two.index(), 1);
        assert_eq!(Slot::ALL.len(), 2);
    }

    #[test]
    fn rating_renders_numeric() {
        assert_eq!(Rating::Unrated.to_string(), "0");
        assert_eq!(Rating::Stars(3).to_string(), "3");
        assert_eq!(Rating::NotRequired.to_string(), "-");
    }

    #[test]
    fn file_kind_from_extension() {
        assert_eq!(
            FileKind::from_remote_path("DCIM/100MSDCF/DSC00001.JPG"),
            FileKind::Still
        );
        assert_eq!(
            FileKind::from_remote_path("PRIVATE/M4ROOT/CLIP/C0001.MP4"),
            FileKind::Movie
        );
        assert_eq!(FileKind::from_remote_path("foo.bin"), FileKind::Other);
        assert_eq!(FileKind::from_remote_path("noext"), FileKind::Other);
    }
}
