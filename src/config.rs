//! Command line and session configuration.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Default mutator period in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 2;

/// Environment variable naming the graph dump directory.
pub const DUMP_DIR_ENV: &str = "TEESWAP_DEBUG_DUMP_DOT_DIR";

/// Command line of the `teeswap` binary.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "teeswap",
    version,
    about = "Play a source and keep hot-plugging video sinks onto a tee"
)]
pub struct Cli {
    /// Source to play: file:///path, a plain path or test://
    pub uri: String,

    /// Seconds between add/remove steps
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Write graph snapshots (.dot) to this directory
    #[arg(long, env = DUMP_DIR_ENV)]
    pub dump_dir: Option<PathBuf>,
}

/// Everything a session needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Source locator handed to the decoder.
    pub uri: String,
    /// Mutator period.
    pub interval: Duration,
    /// Where graph snapshots go, if anywhere.
    pub dump_dir: Option<PathBuf>,
}

impl SessionConfig {
    /// Configuration for `uri` with default settings.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Set the mutator period.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the dump directory.
    pub fn dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            uri: "test://".to_string(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            dump_dir: None,
        }
    }
}

impl From<Cli> for SessionConfig {
    fn from(cli: Cli) -> Self {
        Self {
            uri: cli.uri,
            interval: Duration::from_secs(cli.interval),
            dump_dir: cli.dump_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["teeswap", "test://"]).unwrap();
        let config = SessionConfig::from(cli);
        assert_eq!(config.uri, "test://");
        assert_eq!(config.interval, Duration::from_secs(2));
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "teeswap",
            "--interval",
            "5",
            "--dump-dir",
            "/tmp/dots",
            "file:///media/clip.ogv",
        ])
        .unwrap();
        let config = SessionConfig::from(cli);
        assert_eq!(config.uri, "file:///media/clip.ogv");
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.dump_dir, Some(PathBuf::from("/tmp/dots")));
    }

    #[test]
    fn test_usage_errors() {
        let err = Cli::try_parse_from(["teeswap"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = Cli::try_parse_from(["teeswap", "a", "b"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);

        let err = Cli::try_parse_from(["teeswap", "--interval", "0", "test://"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new("test://?duration=1")
            .interval(Duration::from_millis(100))
            .dump_dir("/tmp");
        assert_eq!(config.interval, Duration::from_millis(100));
        assert_eq!(config.dump_dir, Some(PathBuf::from("/tmp")));
    }
}
