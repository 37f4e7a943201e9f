//! The run loop: probe, plan, encode each window, report.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::events::EventSink;
use super::model::{JobConfig, JobReport, JobStatus, MediaSource, SegmentOutcome};
use crate::config::AppConfig;
use crate::encoder::{FfmpegSegmentEncoder, SegmentEncoder};
use crate::error::JobError;
use crate::media::probe::{DurationProbe, FfmpegDurationProbe, ProbeMethod};
use crate::media::time::format_hms;
use crate::planner::{self, SegmentWindow};

/// Lifecycle of a job. Terminal phases are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    Probing,
    Planning,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobPhase {
    /// Returns true for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn status_text(&self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Probing => "Reading video duration...",
            Self::Planning => "Planning segments...",
            Self::Running => "Processing video...",
            Self::Completed => "Completed!",
            Self::Failed => "Failed!",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Per-run counters and results. Lives only inside [`JobController::run`].
#[derive(Debug, Default)]
struct JobState {
    segments_attempted: usize,
    segments_succeeded: usize,
    outcomes: Vec<SegmentOutcome>,
}

/// Drives one split job from probing to a final [`JobReport`].
///
/// `run` consumes the controller, so a finished job cannot be restarted.
pub struct JobController {
    id: Uuid,
    config: JobConfig,
    probe: Arc<dyn DurationProbe>,
    encoder: Arc<dyn SegmentEncoder>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    phase: JobPhase,
}

impl JobController {
    /// Creates a controller in the `Idle` phase.
    pub fn new(
        config: JobConfig,
        probe: Arc<dyn DurationProbe>,
        encoder: Arc<dyn SegmentEncoder>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            probe,
            encoder,
            sink,
            cancel: CancellationToken::new(),
            phase: JobPhase::Idle,
        }
    }

    /// Creates a controller that probes and encodes with ffprobe/ffmpeg.
    pub fn with_ffmpeg(app: &AppConfig, config: JobConfig, sink: Arc<dyn EventSink>) -> Self {
        Self::new(
            config,
            Arc::new(FfmpegDurationProbe::from_config(app)),
            Arc::new(FfmpegSegmentEncoder::from_config(app)),
            sink,
        )
    }

    /// Unique identifier of this run.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token whose cancellation stops the run at the next window boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the job to a terminal phase. Never panics on job failures; every
    /// outcome is reported through the sink and the returned report.
    pub async fn run(mut self) -> JobReport {
        let started_at = Utc::now();
        let mut state = JobState::default();

        info!(job_id = %self.id, source = ?self.config.source_path, "Starting split job");

        self.enter(JobPhase::Probing);
        let pending = MediaSource::unresolved(self.config.source_path.clone());
        self.log(&format!("Starting video split: {}", pending.file_name()));

        if let Err(e) = std::fs::create_dir_all(&self.config.output_directory) {
            let err = JobError::OutputDir {
                path: self.config.output_directory.clone(),
                message: e.to_string(),
            };
            return self.fail(err, None, 0, state, started_at);
        }

        let source = match self.resolve_source(pending).await {
            Ok(source) => source,
            Err(err) => return self.fail(err, None, 0, state, started_at),
        };

        self.enter(JobPhase::Planning);
        let windows = match planner::plan(
            source.total_duration_seconds,
            self.config.segment_length_seconds,
        ) {
            Ok(windows) => windows,
            Err(e) => {
                warn!(error = %e, seconds = source.total_duration_seconds, "Implausible duration");
                let duration = Some(source.total_duration_seconds);
                return self.fail(JobError::DurationUnavailable, duration, 0, state, started_at);
            }
        };
        let planned = windows.len();
        self.log(&format!("Total segments to create: {}", planned));

        self.enter(JobPhase::Running);
        let cancelled = self.run_windows(&source, &windows, &mut state).await;
        let duration = Some(source.total_duration_seconds);

        if cancelled {
            self.phase = JobPhase::Cancelled;
            return self.finish(Some(JobError::Cancelled), duration, planned, state, started_at);
        }

        if state.segments_succeeded == 0 {
            return self.fail(JobError::NoSegmentsCreated, duration, planned, state, started_at);
        }

        self.phase = JobPhase::Completed;
        self.finish(None, duration, planned, state, started_at)
    }

    /// Probes the source; both tiers failing is fatal.
    async fn resolve_source(&self, pending: MediaSource) -> Result<MediaSource, JobError> {
        let probed = self.probe.probe(&pending.path).await.map_err(|e| {
            warn!(error = %e, "Duration probe failed");
            JobError::DurationUnavailable
        })?;

        let source = MediaSource {
            total_duration_seconds: probed.seconds,
            ..pending
        };
        if !source.is_resolved() {
            return Err(JobError::DurationUnavailable);
        }

        if probed.method == ProbeMethod::Diagnostic {
            self.log("Warning: Could not get precise duration, using diagnostic output");
        }

        self.log(&format!("Video duration: {}", format_hms(probed.seconds)));

        Ok(source)
    }

    /// Encodes windows in order. Returns true when cancellation stopped the loop.
    async fn run_windows(
        &self,
        source: &MediaSource,
        windows: &[SegmentWindow],
        state: &mut JobState,
    ) -> bool {
        let planned = windows.len();

        for window in windows {
            if self.cancel.is_cancelled() {
                info!(
                    job_id = %self.id,
                    attempted = state.segments_attempted,
                    remaining = planned - state.segments_attempted,
                    "Cancellation observed, skipping remaining segments"
                );
                return true;
            }

            self.log(&format!(
                "Processing segment {}: {} - {}",
                window.index,
                format_hms(window.start_seconds),
                format_hms(window.end_seconds)
            ));

            let outcome = self
                .encoder
                .encode(source, window, &self.config, &self.cancel)
                .await;

            state.segments_attempted += 1;
            if outcome.succeeded {
                state.segments_succeeded += 1;
            }

            let percent = (state.segments_attempted * 100 / planned) as u8;
            self.sink.on_progress(percent);

            if outcome.succeeded {
                let file_name = outcome
                    .output_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.log(&format!("Segment {} completed: {}", window.index, file_name));
                self.sink
                    .on_segment_completed(&outcome.output_path, window.index);
            } else {
                self.log(&format!(
                    "Failed to create segment {}: {}",
                    window.index,
                    outcome.error_detail.as_deref().unwrap_or("unknown error")
                ));
            }

            state.outcomes.push(outcome);
        }

        // A request that arrived during the final encode is still honoured.
        self.cancel.is_cancelled()
    }

    fn enter(&mut self, phase: JobPhase) {
        debug!(job_id = %self.id, from = ?self.phase, to = ?phase, "Job phase change");
        self.phase = phase;
        self.sink.on_status(phase.status_text());
    }

    fn log(&self, line: &str) {
        self.sink.on_log(line);
    }

    fn fail(
        mut self,
        err: JobError,
        duration: Option<f64>,
        planned: usize,
        state: JobState,
        started_at: chrono::DateTime<Utc>,
    ) -> JobReport {
        error!(job_id = %self.id, error = %err, "Split job failed");
        self.log(&format!("Error: {}", err));
        self.phase = JobPhase::Failed;
        self.finish(Some(err), duration, planned, state, started_at)
    }

    fn finish(
        self,
        err: Option<JobError>,
        duration: Option<f64>,
        planned: usize,
        state: JobState,
        started_at: chrono::DateTime<Utc>,
    ) -> JobReport {
        debug_assert!(self.phase.is_terminal(), "finish called in {:?}", self.phase);

        let status = match self.phase {
            JobPhase::Completed => JobStatus::Completed,
            JobPhase::Cancelled => JobStatus::Cancelled,
            _ => JobStatus::Failed,
        };

        let message = match &err {
            None if state.segments_succeeded == state.segments_attempted => format!(
                "Successfully split video into {} segments",
                state.segments_succeeded
            ),
            None => format!(
                "Successfully split video into {} of {} segments ({} failed)",
                state.segments_succeeded,
                state.segments_attempted,
                state.segments_attempted - state.segments_succeeded
            ),
            Some(e) => e.to_string(),
        };

        self.sink.on_status(self.phase.status_text());
        self.sink.on_finished(status == JobStatus::Completed, &message);

        info!(
            job_id = %self.id,
            status = ?status,
            planned,
            attempted = state.segments_attempted,
            succeeded = state.segments_succeeded,
            "Split job finished"
        );

        JobReport {
            job_id: self.id,
            source_path: self.config.source_path,
            output_directory: self.config.output_directory,
            duration_seconds: duration,
            planned,
            attempted: state.segments_attempted,
            succeeded: state.segments_succeeded,
            outcomes: state.outcomes,
            status,
            error: err,
            message,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
