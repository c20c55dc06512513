//! camshell — interactive remote-control shell and media sync for tethered
//! cameras.
//!
//! Commands (shoot, focus, record, exposure, sync, monitor) run against a
//! camera backend behind trait seams; newly captured media is mirrored into a
//! local directory by a background sync engine that reacts to device pushes
//! and manual `sync` campaigns. The REPL stays responsive while transfers
//! drain on worker threads.

#![warn(clippy::all)]

mod cli;
mod config;
mod device;
mod format;
mod hook;
mod monitor;
mod rating;
mod repl;
mod retry;
mod shutdown;
#[cfg(test)]
mod testutil;
mod transfer;
mod types;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use device::sim::SimCamera;
use device::CameraControl;
use device::DeviceEvents;
use monitor::Monitor;
use repl::{ReplContext, ShellState};
use retry::{RetryAction, RetryConfig};
use transfer::{SessionConfig, SessionEvents, SyncSession};

const FINGERPRINT_FILE: &str = "fingerprint.bin";

fn load_fingerprint(path: &Path) -> Option<Vec<u8>> {
    std::fs::read(path).ok().filter(|b| !b.is_empty())
}

fn save_fingerprint(path: &Path, data: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, data)
}

/// Poll interval for the per-connection supervision loop in `main`.
const SUPERVISE_POLL: Duration = Duration::from_millis(100);

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else {
        match cli.log_level {
            types::LogLevel::Debug => "debug",
            types::LogLevel::Info => "info",
            types::LogLevel::Warn => "warn",
            types::LogLevel::Error => "error",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = config::Config::from_cli(cli)?;
    std::fs::create_dir_all(&config.sync_dir)?;

    let cache_dir = config::cache_dir();
    if let Err(e) = std::fs::create_dir_all(&cache_dir) {
        tracing::warn!("Failed to create cache dir {}: {}", cache_dir.display(), e);
    }
    let fingerprint_path = cache_dir.join(FINGERPRINT_FILE);

    let shutdown = shutdown::Shutdown::new();
    shutdown::install_signal_handler(shutdown.clone())?;

    let monitor = Arc::new(Monitor::new());
    let shell_state = ShellState::new();

    // The prompt lives for the whole process; connections come and go
    // underneath it through the shared shell state.
    let repl_done = Arc::new(AtomicBool::new(false));
    let repl_handle = {
        let ctx = ReplContext {
            state: shell_state.clone(),
            shutdown: shutdown.clone(),
            monitor: monitor.clone(),
            monitor_out: config.sync_dir.join("live-view.jpg"),
        };
        let done = repl_done.clone();
        std::thread::Builder::new().name("repl".into()).spawn(move || {
            repl::run(ctx);
            done.store(true, Ordering::Release);
        })?
    };

    while !shutdown.is_stopped() {
        let camera = SimCamera::open(config.source_dir.clone())?;
        let session = SyncSession::new(
            camera.clone(),
            camera.clone(),
            shutdown.clone(),
            SessionConfig {
                sync_dir: config.sync_dir.clone(),
                hook: config.post_cmd.clone(),
                auto_sync: config.auto_sync,
            },
        );
        let events: Arc<dyn DeviceEvents> = Arc::new(SessionEvents(session.clone()));

        if let Some(fp) = load_fingerprint(&fingerprint_path) {
            tracing::debug!("[FP] using cached fingerprint ({} bytes)", fp.len());
        } else {
            tracing::debug!("[FP] no fingerprint available for initial connect");
        }

        tracing::info!("Connecting to camera...");
        let connect = retry::retry_with_backoff(
            &RetryConfig::default(),
            &shutdown,
            |_| RetryAction::Retry,
            || camera.connect(events.clone()),
        );
        if let Err(e) = connect {
            tracing::error!("Camera not available: {}", e);
            match config.keepalive {
                None => {
                    tracing::error!("Exiting (no keepalive)");
                    shutdown.request_stop();
                    break;
                }
                Some(interval) => {
                    tracing::debug!("Retrying in {} ms...", interval.as_millis());
                    shutdown.interruptible_sleep(interval);
                    continue;
                }
            }
        }
        tracing::info!("Connected. Ctrl+C to stop.");

        // Persist the (possibly updated) pairing fingerprint for next run.
        match camera.fingerprint() {
            Ok(fp) if !fp.is_empty() => {
                if let Err(e) = save_fingerprint(&fingerprint_path, &fp) {
                    tracing::warn!(
                        "[FP] failed to save fingerprint to {}: {}",
                        fingerprint_path.display(),
                        e
                    );
                }
            }
            Ok(_) => tracing::debug!("[FP] no fingerprint to save"),
            Err(e) => tracing::debug!("[FP] fingerprint unavailable: {}", e),
        }

        shell_state.set_connection(session.clone(), camera.clone());

        // Supervise this connection until stop or disconnect.
        while !shutdown.is_stopped() && !session.reconnect_requested() {
            std::thread::sleep(SUPERVISE_POLL);
        }

        monitor.stop();
        shell_state.clear_connection();
        camera.disconnect();
        session.join_workers();

        if shutdown.is_stopped() {
            break;
        }
        match config.keepalive {
            None => {
                tracing::error!("Disconnected and keepalive disabled; exiting.");
                shutdown.request_stop();
                break;
            }
            Some(interval) => {
                tracing::info!("Disconnected; will retry in {} ms...", interval.as_millis());
                shutdown.interruptible_sleep(interval);
            }
        }
    }

    tracing::info!("Shutting down...");
    monitor.stop();
    // The prompt thread may be blocked reading stdin; join it only if it
    // already finished, otherwise let process exit reclaim it.
    if repl_done.load(Ordering::Acquire) {
        let _ = repl_handle.join();
    }
    Ok(())
}
