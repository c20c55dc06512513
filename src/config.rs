use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;

/// Application configuration derived from the CLI.
#[derive(Debug)]
pub struct Config {
    pub sync_dir: PathBuf,
    pub source_dir: Option<PathBuf>,
    pub post_cmd: Option<PathBuf>,
    /// `None` disables reconnecting after a disconnect.
    pub keepalive: Option<Duration>,
    pub auto_sync: bool,
}

/// Expand ~ to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Cache directory for the pairing fingerprint and similar small state.
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("camshell"))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    pub fn from_cli(cli: Cli) -> anyhow::Result<Config> {
        let keepalive = if cli.keepalive == 0 {
            None
        } else {
            Some(Duration::from_millis(cli.keepalive))
        };
        Ok(Config {
            sync_dir: expand_tilde(&cli.dir),
            source_dir: cli.source.as_deref().map(expand_tilde),
            post_cmd: cli.post_cmd.as_deref().map(expand_tilde),
            keepalive,
            auto_sync: !cli.no_auto_sync,
        })
    }
}
