//! Post-download hook — an optional external executable invoked
//! fire-and-forget after a file lands or a rating changes.
//!
//! The child's exit status is never waited on by the caller; a detached
//! thread reaps it so no zombies accumulate.

use std::path::Path;
use std::process::Command;

use crate::types::Rating;

/// Positional arguments for a file-download event: `path mode op`.
pub fn download_args(path: &Path, mode: &str, op: &str) -> Vec<String> {
    vec![
        path.to_string_lossy().into_owned(),
        mode.to_string(),
        op.to_string(),
    ]
}

/// Positional arguments for a rating-change event:
/// `path mode "rating" <new> <previous>`.
pub fn rating_args(path: &Path, mode: &str, new: Rating, previous: Rating) -> Vec<String> {
    vec![
        path.to_string_lossy().into_owned(),
        mode.to_string(),
        "rating".to_string(),
        new.to_string(),
        previous.to_string(),
    ]
}

/// Spawn the hook with the given arguments. Non-blocking: spawn failures are
/// logged and ignored, and the child is reaped in the background.
pub fn spawn(program: &Path, args: Vec<String>) {
    match Command::new(program).args(&args).spawn() {
        Ok(mut child) => {
            std::thread::spawn(move || {
                let _ = child.wait();
            });
        }
        Err(e) => {
            tracing::warn!("Failed to run hook {}: {}", program.display(), e);
        }
    }
}
