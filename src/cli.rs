//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::model::Quality;
use crate::media::time::parse_hms;

/// Split a video into fixed-length, independently playable segments.
#[derive(Parser, Debug)]
#[command(name = "video-split", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file. Built-in defaults are used when omitted.
    #[arg(short, long, env = "VIDEO_SPLIT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Diagnostic log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level based on verbosity flags.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split a video into segments.
    Split(SplitArgs),

    /// Print the duration of a video.
    Probe {
        /// Video file to inspect.
        input: PathBuf,
    },

    /// Print the segment plan without encoding anything.
    Plan(PlanArgs),

    /// Check that ffmpeg and ffprobe are installed and usable.
    Check,

    /// Validate the configuration file.
    #[command(name = "config-validate")]
    ConfigValidate,

    /// Display the effective configuration.
    #[command(name = "config-show")]
    ConfigShow,
}

/// Segment length, either as minutes plus seconds or as a single value.
#[derive(Args, Debug, Default, Clone)]
pub struct LengthArgs {
    /// Minutes part of the segment length.
    #[arg(short, long, conflicts_with = "length")]
    pub minutes: Option<u64>,

    /// Seconds part of the segment length.
    #[arg(short, long, conflicts_with = "length")]
    pub seconds: Option<u64>,

    /// Segment length in seconds or as HH:MM:SS.
    #[arg(short, long, value_parser = parse_length)]
    pub length: Option<u64>,
}

impl LengthArgs {
    /// Total length in seconds, if any length flag was given.
    pub fn resolve(&self) -> Option<u64> {
        if let Some(length) = self.length {
            return Some(length);
        }
        match (self.minutes, self.seconds) {
            (None, None) => None,
            (minutes, seconds) => Some(
                minutes
                    .unwrap_or(0)
                    .saturating_mul(60)
                    .saturating_add(seconds.unwrap_or(0)),
            ),
        }
    }
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Video file to split.
    pub input: PathBuf,

    /// Output directory. Defaults to a folder next to the input.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub length: LengthArgs,

    /// Strip audio from the segments.
    #[arg(long)]
    pub no_audio: bool,

    /// Quality tier.
    #[arg(short, long, value_enum)]
    pub quality: Option<Quality>,

    /// Print the final report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Video file to plan for.
    #[arg(required_unless_present = "duration", conflicts_with = "duration")]
    pub input: Option<PathBuf>,

    /// Plan for a duration instead of probing a file (seconds or HH:MM:SS).
    #[arg(short, long, value_parser = parse_duration)]
    pub duration: Option<f64>,

    #[command(flatten)]
    pub length: LengthArgs,
}

/// Parses whole seconds or `HH:MM:SS`.
fn parse_length(value: &str) -> Result<u64, String> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Ok(seconds);
    }
    match parse_hms(value) {
        Some(seconds) if seconds.fract() == 0.0 => Ok(seconds as u64),
        Some(_) => Err("segment length must be a whole number of seconds".to_string()),
        None => Err(format!("'{}' is not a number of seconds or HH:MM:SS", value)),
    }
}

/// Parses seconds (fractional allowed) or `HH:MM:SS[.fff]`.
fn parse_duration(value: &str) -> Result<f64, String> {
    let seconds = match value.trim().parse::<f64>() {
        Ok(seconds) => seconds,
        Err(_) => parse_hms(value)
            .ok_or_else(|| format!("'{}' is not a number of seconds or HH:MM:SS", value))?,
    };

    if !seconds.is_finite() || seconds <= 0.0 {
        return Err("duration must be positive".to_string());
    }
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_and_seconds_combine() {
        let cli = Cli::try_parse_from(["video-split", "split", "in.mp4", "-m", "2", "-s", "30"]).unwrap();

        let Commands::Split(args) = cli.command else {
            panic!("expected split");
        };
        assert_eq!(args.length.resolve(), Some(150));
        assert!(!args.no_audio);
        assert_eq!(args.quality, None);
    }

    #[test]
    fn length_accepts_clock_time() {
        let cli = Cli::try_parse_from(["video-split", "split", "in.mp4", "--length", "00:01:30"]).unwrap();

        let Commands::Split(args) = cli.command else {
            panic!("expected split");
        };
        assert_eq!(args.length.resolve(), Some(90));
    }

    #[test]
    fn length_conflicts_with_minutes() {
        let result = Cli::try_parse_from(["video-split", "split", "in.mp4", "-l", "60", "-m", "1"]);

        assert!(result.is_err());
    }

    #[test]
    fn no_length_flags_resolves_to_none() {
        assert_eq!(LengthArgs::default().resolve(), None);
    }

    #[test]
    fn plan_needs_input_or_duration() {
        assert!(Cli::try_parse_from(["video-split", "plan"]).is_err());

        let cli = Cli::try_parse_from(["video-split", "plan", "--duration", "00:02:05", "-l", "60"]).unwrap();
        let Commands::Plan(args) = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(args.duration, Some(125.0));
        assert_eq!(args.input, None);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["video-split", "check", "-vv", "--log-format", "json"]).unwrap();

        assert_eq!(cli.log_level(), "trace");
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn length_parser() {
        assert_eq!(parse_length("150"), Ok(150));
        assert_eq!(parse_length("00:02:30"), Ok(150));
        assert!(parse_length("00:00:01.5").is_err());
        assert!(parse_length("two minutes").is_err());
    }

    #[test]
    fn duration_parser() {
        assert_eq!(parse_duration("12.5"), Ok(12.5));
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("-3").is_err());
    }
}
