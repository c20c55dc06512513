//! Remote-path → local-path derivation.
//!
//! The camera reports slash-separated medium paths such as
//! `DCIM/100MSDCF/DSC00042.ARW`; the directory component is mirrored under
//! the configured sync root so repeated syncs land files where the card
//! keeps them.

use std::path::{Path, PathBuf};

/// Final component of a remote path (handles both separators).
pub fn remote_basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Directory component of a remote path, with trailing separators and any
/// leading slash stripped so it stays relative under the sync root.
/// Returns `None` for bare filenames and root-level paths.
pub fn remote_parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches(['/', '\\']);
    let cut = trimmed.rfind(['/', '\\'])?;
    let dir = trimmed[..cut].trim_start_matches(['/', '\\']);
    if dir.is_empty() {
        None
    } else {
        Some(dir)
    }
}

/// Local destination directory for a remote path: sync root joined with the
/// remote directory component, if any.
pub fn local_dest_dir(root: &Path, remote_path: &str) -> PathBuf {
    match remote_parent(remote_path) {
        Some(rel) => {
            let mut out = root.to_path_buf();
            for component in rel.split(['/', '\\']) {
                if !component.is_empty() {
                    out.push(component);
                }
            }
            out
        }
        None => root.to_path_buf(),
    }
}

/// Fallback filename when the device reports an empty or unreadable path.
pub fn fallback_name(content_id: u64, file_id: u32) -> String {
    format!("content_{}_file_{}", content_id, file_id)
}

/// Pick a name that does not collide in `dir`, appending `_1`, `_2`, … before
/// the extension. Returns `base` unchanged when it is free. Best effort only:
/// a racing writer can still take the name between the check and the write.
pub fn unique_name(dir: &Path, base: &str) -> String {
    if !dir.join(base).exists() {
        return base.to_string();
    }
    let (stem, ext) = match base.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < base.len() => base.split_at(dot),
        _ => (base, ""),
    };
    for i in 1..1_000_000u32 {
        let candidate = format!("{}_{}{}", stem, i, ext);
        if !dir.join(&candidate).exists() {
            return candidate;
        }
    }
    base.to_string()
}
