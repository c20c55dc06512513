//! Sync planner — decides which content items to pull and where each file
//! lands, including the skip/uniquify naming policy.

use std::io;
use std::path::{Path, PathBuf};

use crate::transfer::paths;
use crate::types::{ContentFile, ContentItem};

/// How to resolve a destination-name collision.
///
/// Kept explicit rather than inferred at the call site: campaign and
/// rating-driven transfers keep device names and skip files already present
/// (repeated syncs are idempotent), while an ad hoc new-capture download is a
/// discrete one-shot event and must always land, uniquified if needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingPolicy {
    KeepAndSkip,
    Uniquify,
}

/// One file ready to hand to the transfer channel.
#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub content_id: u64,
    pub file_id: u32,
    pub dest_dir: PathBuf,
    pub dest_name: String,
    /// Relative path used in log lines, e.g. `DCIM/100MSDCF/DSC00042.JPG`.
    pub display: String,
}

#[derive(Debug)]
pub enum FilePlan {
    Transfer(PlannedFile),
    /// Skip-existing policy matched a file already on disk.
    AlreadyPresent { display: String, path: PathBuf },
}

/// Select the newest `want` items, newest first.
///
/// Ordering is the full chronological compare of the modification timestamp
/// (down to milliseconds). `want` is clamped to the available count with a
/// minimum of one.
pub fn select_latest(items: &[ContentItem], want: u32) -> Vec<&ContentItem> {
    let mut refs: Vec<&ContentItem> = items.iter().collect();
    refs.sort_by(|a, b| b.modified.cmp(&a.modified));
    let want = (want.max(1) as usize).min(refs.len());
    refs.truncate(want);
    refs
}

/// Resolve one file's local destination, creating the directory if needed.
///
/// The remote directory component is mirrored under `root`. An unreadable
/// (empty) remote path gets a synthetic `content_<id>_file_<id>` name rather
/// than failing the plan.
pub fn plan_file(
    root: &Path,
    content_id: u64,
    file: &ContentFile,
    policy: NamingPolicy,
) -> io::Result<FilePlan> {
    let base = paths::remote_basename(&file.remote_path);
    let base = if base.is_empty() {
        paths::fallback_name(content_id, file.file_id)
    } else {
        base.to_string()
    };

    let dest_dir = paths::local_dest_dir(root, &file.remote_path);
    std::fs::create_dir_all(&dest_dir)?;

    let rel_dir = paths::remote_parent(&file.remote_path);
    let display_of = |name: &str| match rel_dir {
        Some(d) => format!("{}/{}", d, name),
        None => name.to_string(),
    };

    let dest_name = match policy {
        NamingPolicy::KeepAndSkip => {
            let candidate = dest_dir.join(&base);
            if candidate.exists() {
                return Ok(FilePlan::AlreadyPresent {
                    display: display_of(&base),
                    path: candidate,
                });
            }
            base
        }
        NamingPolicy::Uniquify => paths::unique_name(&dest_dir, &base),
    };

    let display = display_of(&dest_name);
    Ok(FilePlan::Transfer(PlannedFile {
        content_id,
        file_id: file.file_id,
        dest_dir,
        dest_name,
        display,
    }))
}
