//! Source duration probing.
//!
//! The structured query (`ffprobe -show_format`) is tried first. When it fails
//! for any reason the ffmpeg diagnostic stream is scanned for its
//! `Duration: HH:MM:SS.ff` banner line instead.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::time::parse_hms;
use crate::config::AppConfig;
use crate::error::ProbeError;
use crate::process::{self, RunError};

/// Which probe tier produced a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    /// Structured format metadata.
    Metadata,
    /// Free-text diagnostic output.
    Diagnostic,
}

/// A resolved source duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probed {
    /// Total duration in seconds, always finite and positive.
    pub seconds: f64,
    /// Tier that produced the value.
    pub method: ProbeMethod,
}

/// Obtains the total duration of a media source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Probes `path`, failing only with [`ProbeError::DurationUnavailable`].
    async fn probe(&self, path: &Path) -> Result<Probed, ProbeError>;
}

/// Probe backed by the ffprobe and ffmpeg binaries.
#[derive(Debug, Clone)]
pub struct FfmpegDurationProbe {
    ffprobe: String,
    ffmpeg: String,
    metadata_timeout: Duration,
    diagnostic_timeout: Duration,
}

impl FfmpegDurationProbe {
    /// Creates a probe using the given binaries and time budgets.
    pub fn new(
        ffprobe: impl Into<String>,
        ffmpeg: impl Into<String>,
        metadata_timeout: Duration,
        diagnostic_timeout: Duration,
    ) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            ffmpeg: ffmpeg.into(),
            metadata_timeout,
            diagnostic_timeout,
        }
    }

    /// Creates a probe from the application config.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.tools.ffprobe,
            &config.tools.ffmpeg,
            config.timeouts.probe(),
            config.timeouts.fallback_probe(),
        )
    }

    /// Queries structured format metadata.
    async fn probe_metadata(&self, path: &Path) -> Result<f64, ProbeError> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path);

        let output = process::run(cmd, self.metadata_timeout, None)
            .await
            .map_err(|e| run_error(&self.ffprobe, e))?;

        if !output.status.success() {
            return Err(ProbeError::CommandFailed {
                command: self.ffprobe.clone(),
                message: format!("exit code {}", output.status.code().unwrap_or(-1)),
            });
        }

        parse_format_duration(&output.stdout)
    }

    /// Scans the ffmpeg diagnostic stream for the input duration.
    async fn probe_diagnostic(&self, path: &Path) -> Result<f64, ProbeError> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-nostdin", "-hide_banner", "-i"]).arg(path);

        // Without an output file ffmpeg exits non-zero after printing the
        // input summary, so the exit status carries no information here.
        let output = process::run(cmd, self.diagnostic_timeout, None)
            .await
            .map_err(|e| run_error(&self.ffmpeg, e))?;

        parse_diagnostic_duration(&String::from_utf8_lossy(&output.stderr))
    }
}

#[async_trait]
impl DurationProbe for FfmpegDurationProbe {
    async fn probe(&self, path: &Path) -> Result<Probed, ProbeError> {
        match self.probe_metadata(path).await {
            Ok(seconds) => {
                debug!(path = ?path, seconds, "Duration from format metadata");
                return Ok(Probed {
                    seconds,
                    method: ProbeMethod::Metadata,
                });
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Format metadata probe failed, falling back to diagnostic pass");
            }
        }

        match self.probe_diagnostic(path).await {
            Ok(seconds) => {
                info!(path = ?path, seconds, "Duration from diagnostic output");
                Ok(Probed {
                    seconds,
                    method: ProbeMethod::Diagnostic,
                })
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Diagnostic probe failed");
                Err(ProbeError::DurationUnavailable {
                    path: path.to_path_buf(),
                })
            }
        }
    }
}

fn run_error(command: &str, error: RunError) -> ProbeError {
    match error {
        RunError::TimedOut(limit) => ProbeError::Timeout {
            command: command.to_string(),
            seconds: limit.as_secs(),
        },
        other => ProbeError::CommandFailed {
            command: command.to_string(),
            message: other.to_string(),
        },
    }
}

/// Reads `format.duration` from `ffprobe -print_format json -show_format` output.
pub fn parse_format_duration(stdout: &[u8]) -> Result<f64, ProbeError> {
    let json: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|e| ProbeError::Unparseable {
            value: e.to_string(),
        })?;

    let duration = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .ok_or(ProbeError::MissingDuration)?;

    // ffprobe writes numbers as strings; accept both.
    let seconds = match duration {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    };

    seconds
        .filter(|s| s.is_finite() && *s > 0.0)
        .ok_or_else(|| ProbeError::Unparseable {
            value: duration.to_string(),
        })
}

fn duration_line() -> &'static Regex {
    static DURATION_LINE: OnceLock<Regex> = OnceLock::new();
    DURATION_LINE.get_or_init(|| Regex::new(r"Duration:\s*([^,]*)").expect("valid regex"))
}

/// Finds the first `Duration:` line of an ffmpeg diagnostic stream and parses it.
pub fn parse_diagnostic_duration(stderr: &str) -> Result<f64, ProbeError> {
    let captures = stderr
        .lines()
        .find_map(|line| duration_line().captures(line))
        .ok_or(ProbeError::MissingDuration)?;

    let token = captures.get(1).map(|m| m.as_str().trim()).unwrap_or_default();

    parse_hms(token)
        .filter(|s| *s > 0.0)
        .ok_or_else(|| ProbeError::Unparseable {
            value: token.to_string(),
        })
}
