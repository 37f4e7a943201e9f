//! Job request, configuration and result types.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::model::{JobDefaults, Quality};
use crate::error::JobError;
use crate::planner::SegmentWindow;

/// A split request as produced by a front end.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Media file to split.
    pub source_path: PathBuf,
    /// Directory for the segments; defaults to a folder next to the source.
    pub output_directory: Option<PathBuf>,
    /// Target segment length in seconds.
    pub segment_length_seconds: u64,
    /// Keep (re-encoded) audio, or strip it.
    pub keep_audio: bool,
    /// Quality tier.
    pub quality: Quality,
}

impl JobRequest {
    /// Creates a request that takes every optional setting from `defaults`.
    pub fn with_defaults(source_path: impl Into<PathBuf>, defaults: &JobDefaults) -> Self {
        Self {
            source_path: source_path.into(),
            output_directory: None,
            segment_length_seconds: defaults.segment_length_seconds,
            keep_audio: defaults.keep_audio,
            quality: defaults.quality,
        }
    }
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobConfig {
    pub source_path: PathBuf,
    /// Always at least 1.
    pub segment_length_seconds: u64,
    pub output_directory: PathBuf,
    pub keep_audio: bool,
    pub quality: Quality,
}

impl JobConfig {
    /// Validates a request.
    ///
    /// `default_dir_name` names the directory created beside the source when
    /// the request has no output directory.
    pub fn from_request(request: JobRequest, default_dir_name: &str) -> Result<Self, JobError> {
        if request.segment_length_seconds == 0 {
            return Err(JobError::InvalidRequest {
                message: "Segment duration must be greater than 0".to_string(),
            });
        }

        if !request.source_path.is_file() {
            return Err(JobError::InvalidRequest {
                message: format!(
                    "Video file does not exist: '{}'",
                    request.source_path.display()
                ),
            });
        }

        let output_directory = match request.output_directory {
            Some(dir) => dir,
            None => request
                .source_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(default_dir_name),
        };

        Ok(Self {
            source_path: request.source_path,
            segment_length_seconds: request.segment_length_seconds,
            output_directory,
            keep_audio: request.keep_audio,
            quality: request.quality,
        })
    }
}

/// A source whose duration has been resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaSource {
    pub path: PathBuf,
    pub total_duration_seconds: f64,
}

impl MediaSource {
    /// A source whose duration has not been probed yet.
    pub fn unresolved(path: PathBuf) -> Self {
        Self {
            path,
            total_duration_seconds: 0.0,
        }
    }

    /// True once a positive duration is known.
    pub fn is_resolved(&self) -> bool {
        self.total_duration_seconds.is_finite() && self.total_duration_seconds > 0.0
    }

    /// Base name without extension, used for output file names.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "segment".to_string())
    }

    /// File name for log lines.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Result of attempting one window. Never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentOutcome {
    pub window: SegmentWindow,
    pub output_path: PathBuf,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

impl SegmentOutcome {
    pub fn success(window: SegmentWindow, output_path: PathBuf) -> Self {
        Self {
            window,
            output_path,
            succeeded: true,
            error_detail: None,
        }
    }

    pub fn failure(window: SegmentWindow, output_path: PathBuf, detail: impl Into<String>) -> Self {
        Self {
            window,
            output_path,
            succeeded: false,
            error_detail: Some(detail.into()),
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Final summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// Unique identifier for this run.
    pub job_id: Uuid,

    /// Path of the source file.
    pub source_path: PathBuf,

    /// Where segments were written.
    pub output_directory: PathBuf,

    /// Resolved duration, if probing got that far.
    pub duration_seconds: Option<f64>,

    /// Number of windows in the plan.
    pub planned: usize,

    /// Number of windows handed to the encoder.
    pub attempted: usize,

    /// Number of segments written.
    pub succeeded: usize,

    /// Per-window results in chronological order.
    pub outcomes: Vec<SegmentOutcome>,

    /// Terminal state.
    pub status: JobStatus,

    /// Cause of a failed or cancelled run.
    pub error: Option<JobError>,

    /// Human-readable summary, as sent with the finished event.
    pub message: String,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    /// True only for a completed run.
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }

    /// Paths of the segments that were written.
    pub fn written_segments(&self) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .filter(|o| o.succeeded)
            .map(|o| o.output_path.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(source: PathBuf, length: u64) -> JobRequest {
        JobRequest {
            source_path: source,
            output_directory: None,
            segment_length_seconds: length,
            keep_audio: true,
            quality: Quality::Medium,
        }
    }

    #[test]
    fn zero_length_is_rejected() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("clip.mp4");
        std::fs::write(&source, b"x").unwrap();

        let err = JobConfig::from_request(request(source, 0), "video_segments").unwrap_err();

        assert!(matches!(err, JobError::InvalidRequest { .. }));
    }

    #[test]
    fn missing_source_is_rejected() {
        let dir = TempDir::new().unwrap();

        let err = JobConfig::from_request(request(dir.path().join("nope.mp4"), 60), "video_segments")
            .unwrap_err();

        assert!(matches!(err, JobError::InvalidRequest { .. }));
    }

    #[test]
    fn output_directory_defaults_next_to_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("clip.mp4");
        std::fs::write(&source, b"x").unwrap();

        let config = JobConfig::from_request(request(source, 60), "video_segments").unwrap();

        assert_eq!(config.output_directory, dir.path().join("video_segments"));
    }

    #[test]
    fn stem_strips_extension() {
        let source = MediaSource {
            path: PathBuf::from("/videos/holiday.final.mkv"),
            total_duration_seconds: 10.0,
        };

        assert_eq!(source.stem(), "holiday.final");
        assert_eq!(source.file_name(), "holiday.final.mkv");
    }

    #[test]
    fn unresolved_source_has_no_duration() {
        let source = MediaSource::unresolved(PathBuf::from("/videos/talk.mp4"));

        assert!(!source.is_resolved());
        assert_eq!(source.file_name(), "talk.mp4");
    }
}
