//! Error types for the video splitter.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Configuration loading and parsing errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {message}")]
    ParseFailed { path: PathBuf, message: String },

    #[error("Config validation failed with {error_count} error(s)")]
    ValidationFailed { error_count: usize },
}

/// Segment planning errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("Duration needs {count} segments, more than the limit of {limit}")]
    TooManyWindows { count: f64, limit: u64 },
}

/// Duration probing errors.
///
/// Everything except [`ProbeError::DurationUnavailable`] describes a single
/// tier; only the combined failure of both tiers leaves the probe.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to run '{command}': {message}")]
    CommandFailed { command: String, message: String },

    #[error("'{command}' timed out after {seconds} seconds")]
    Timeout { command: String, seconds: u64 },

    #[error("No duration field in probe output")]
    MissingDuration,

    #[error("Could not parse duration '{value}'")]
    Unparseable { value: String },

    #[error("Could not determine duration of '{path}'")]
    DurationUnavailable { path: PathBuf },
}

/// Segment encoding errors.
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("FFmpeg failed with exit code {code}: {stderr}")]
    FfmpegFailed { code: i32, stderr: String },

    #[error("Process spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Encoding timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Encoder exited successfully but did not write '{path}'")]
    MissingOutput { path: PathBuf },

    #[error("Encoding aborted by cancellation")]
    Aborted,
}

/// Fatal job-level errors, reported through the event sink and the job report.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    #[error("Invalid job request: {message}")]
    InvalidRequest { message: String },

    #[error("Cannot create output directory '{path}': {message}")]
    OutputDir { path: PathBuf, message: String },

    #[error("Could not determine video duration")]
    DurationUnavailable,

    #[error("No segments were created successfully")]
    NoSegmentsCreated,

    #[error("Operation cancelled by user")]
    Cancelled,
}

/// Capability detection errors.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Failed to run '{command}': {message}")]
    CommandFailed { command: String, message: String },

    #[error("Required tool '{tool}' not found or not working")]
    ToolNotFound { tool: String },
}
