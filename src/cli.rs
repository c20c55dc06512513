use clap::Parser;

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "camshell",
    about = "Interactive remote-control shell and media sync for tethered cameras"
)]
pub struct Cli {
    /// Local directory that mirrors the camera's storage
    #[arg(short = 'd', long, default_value = ".")]
    pub dir: String,

    /// Directory backing the simulated camera's card (slot 1)
    #[arg(long)]
    pub source: Option<String>,

    /// Executable invoked after each downloaded file and rating change
    #[arg(long = "cmd")]
    pub post_cmd: Option<String>,

    /// Reconnect interval in milliseconds after a disconnect (0 disables)
    #[arg(long, default_value_t = 0)]
    pub keepalive: u64,

    /// Start with automatic download of new captures disabled
    #[arg(long)]
    pub no_auto_sync: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Shorthand for --log-level debug
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["camshell"]);
        assert_eq!(cli.dir, ".");
        assert_eq!(cli.keepalive, 0);
        assert!(!cli.no_auto_sync);
        assert!(!cli.verbose);
        assert_eq!(cli.log_level, LogLevel::Info);
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from([
            "camshell",
            "--dir",
            "/photos",
            "--source",
            "/card",
            "--cmd",
            "/usr/local/bin/ingest",
            "--keepalive",
            "2000",
            "--no-auto-sync",
            "-v",
        ]);
        assert_eq!(cli.dir, "/photos");
        assert_eq!(cli.source.as_deref(), Some("/card"));
        assert_eq!(cli.post_cmd.as_deref(), Some("/usr/local/bin/ingest"));
        assert_eq!(cli.keepalive, 2000);
        assert!(cli.no_auto_sync);
        assert!(cli.verbose);
    }
}
