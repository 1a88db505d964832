//! Command line options and their validated form.

use crate::audio::DEFAULT_TRACK;
use crate::canvas::Rgb;
use crate::overlay::OverlayText;
use crate::prediction::DEFAULT_MODEL;
use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone};
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Parser, Debug)]
#[command(name = "finale", version, about = "Count down to a moment, then set off fireworks")]
#[command(after_help = "Keys: ENTER start, r reset, p prophecy, m music, q / ESC / Ctrl+C quit")]
pub struct Args {
    /// Target moment, local `YYYY-MM-DD HH:MM:SS` or RFC 3339 [default: now + lead]
    #[arg(long, value_name = "DATETIME")]
    pub at: Option<String>,

    /// Seconds from start (and from every reset) to the target
    #[arg(long, value_name = "SECS", default_value_t = 11)]
    pub lead: u32,

    /// Phase sampling period in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_ms: u64,

    /// Line shown under the celebration title
    #[arg(long)]
    pub name: Option<String>,

    /// Music source, tried in the order given [default: luck.mp3]
    #[arg(long = "track", value_name = "PATH")]
    pub tracks: Vec<PathBuf>,

    /// Never start background music
    #[arg(long)]
    pub no_music: bool,

    /// API key for the prophecy
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model used for the prophecy
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Background color as hex (e.g., --bg-color 1a1b26)
    #[arg(long, value_name = "RRGGBB")]
    pub bg_color: Option<String>,

    /// Log file [default: <temp dir>/finale.log]
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// off, error, warn, info, debug or trace; RUST_LOG overrides it
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid target {0:?}: expected YYYY-MM-DD HH:MM:SS or RFC 3339")]
    InvalidTarget(String),
    #[error("target {0:?} does not exist in the local time zone")]
    NonexistentLocalTime(String),
    #[error("invalid hex color {0:?}: expected RRGGBB (e.g., 1a1b26)")]
    InvalidColor(String),
    #[error("invalid log level {0:?}")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Fixed target in ms since the epoch; `None` counts `lead` from start.
    pub target: Option<i64>,
    pub lead: Duration,
    pub poll: Duration,
    pub overlay: OverlayText,
    pub tracks: Vec<PathBuf>,
    pub music: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub background: Rgb,
    pub log_file: PathBuf,
    pub log_level: LevelFilter,
}

impl Config {
    /// Validates `args`. `now` (ms since the epoch) only decides the title
    /// year when no fixed target is given.
    pub fn from_args(args: Args, now: i64) -> Result<Self, ConfigError> {
        let lead = Duration::from_secs(u64::from(args.lead));
        let target = args.at.as_deref().map(parse_target).transpose()?;

        let year_of = target.unwrap_or(now + lead.as_millis() as i64);
        let year = Local
            .timestamp_millis_opt(year_of)
            .single()
            .map(|dt| dt.year())
            .unwrap_or(2026);

        let background = match args.bg_color.as_deref() {
            Some(hex) => parse_hex_color(hex)?,
            None => (0, 0, 0),
        };

        let log_level = args
            .log_level
            .parse::<LevelFilter>()
            .map_err(|_| ConfigError::InvalidLogLevel(args.log_level.clone()))?;

        let tracks = if args.tracks.is_empty() {
            vec![PathBuf::from(DEFAULT_TRACK)]
        } else {
            args.tracks
        };

        Ok(Self {
            target,
            lead,
            poll: Duration::from_millis(args.poll_ms),
            overlay: OverlayText {
                title: year.to_string(),
                name: args.name.filter(|n| !n.trim().is_empty()),
                ..OverlayText::default()
            },
            tracks,
            music: !args.no_music,
            api_key: args.api_key,
            model: args.model,
            background,
            log_file: args.log_file.unwrap_or_else(|| std::env::temp_dir().join("finale.log")),
            log_level,
        })
    }
}

/// Parses an RFC 3339 timestamp or a local `YYYY-MM-DD HH:MM:SS` into ms
/// since the epoch.
pub fn parse_target(text: &str) -> Result<i64, ConfigError> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp_millis());
    }
    let naive =
        NaiveDateTime::parse_from_str(text, LOCAL_FORMAT).map_err(|_| ConfigError::InvalidTarget(text.to_string()))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| ConfigError::NonexistentLocalTime(text.to_string()))
}

pub fn parse_hex_color(hex: &str) -> Result<Rgb, ConfigError> {
    let invalid = || ConfigError::InvalidColor(hex.to_string());
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(invalid());
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).map_err(|_| invalid());
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const NOW: i64 = 1_780_000_000_000;

    fn config(argv: &[&str]) -> Result<Config, ConfigError> {
        let args = Args::try_parse_from(std::iter::once("finale").chain(argv.iter().copied())).unwrap();
        Config::from_args(args, NOW)
    }

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.target, None);
        assert_eq!(config.lead, Duration::from_secs(11));
        assert_eq!(config.poll, Duration::from_millis(50));
        assert_eq!(config.tracks, vec![PathBuf::from("luck.mp3")]);
        assert!(config.music);
        assert_eq!(config.model, "gemini-3-flash-preview");
        assert_eq!(config.background, (0, 0, 0));
        assert_eq!(config.log_level, LevelFilter::Info);
        assert_eq!(config.overlay.name, None);
        assert!(config.log_file.ends_with("finale.log"));
    }

    #[test]
    fn explicit_options() {
        let config = config(&[
            "--at",
            "2027-06-01T00:00:00+00:00",
            "--lead",
            "30",
            "--poll-ms",
            "10",
            "--name",
            "Ada",
            "--track",
            "a.ogg",
            "--track",
            "b.mp3",
            "--no-music",
            "--bg-color",
            "#1a1b26",
            "--log-level",
            "DEBUG",
        ])
        .unwrap();
        assert_eq!(config.target, Some(1_811_808_000_000));
        assert_eq!(config.overlay.title, "2027");
        assert_eq!(config.overlay.name.as_deref(), Some("Ada"));
        assert_eq!(config.lead, Duration::from_secs(30));
        assert_eq!(config.poll, Duration::from_millis(10));
        assert_eq!(config.tracks, vec![PathBuf::from("a.ogg"), PathBuf::from("b.mp3")]);
        assert!(!config.music);
        assert_eq!(config.background, (0x1a, 0x1b, 0x26));
        assert_eq!(config.log_level, LevelFilter::Debug);
    }

    #[test]
    fn zero_poll_period_is_rejected() {
        assert!(Args::try_parse_from(["finale", "--poll-ms", "0"]).is_err());
    }

    #[test]
    fn local_targets_parse() {
        let local = parse_target("2027-01-01 00:00:00").unwrap();
        let expected = Local.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).earliest().unwrap();
        assert_eq!(local, expected.timestamp_millis());
    }

    #[test]
    fn bad_values_are_reported() {
        assert_eq!(
            config(&["--at", "next tuesday"]).unwrap_err(),
            ConfigError::InvalidTarget("next tuesday".into())
        );
        assert_eq!(
            config(&["--bg-color", "12345"]).unwrap_err(),
            ConfigError::InvalidColor("12345".into())
        );
        assert_eq!(
            config(&["--log-level", "loud"]).unwrap_err(),
            ConfigError::InvalidLogLevel("loud".into())
        );
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("ff8000"), Ok((255, 128, 0)));
        assert_eq!(parse_hex_color("#000000"), Ok((0, 0, 0)));
        assert!(parse_hex_color("gg0000").is_err());
        assert!(parse_hex_color("ééé").is_err());
    }
}
