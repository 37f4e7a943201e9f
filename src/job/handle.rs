//! Background execution of a job.

use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::controller::JobController;
use super::model::JobReport;

/// A job running on its own tokio task.
///
/// The only inbound signal is cancellation; everything else flows out
/// through the controller's event sink.
pub struct JobHandle {
    id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<JobReport>,
}

impl JobHandle {
    /// Spawns `controller` onto the current runtime.
    pub fn spawn(controller: JobController) -> Self {
        let id = controller.id();
        let cancel = controller.cancellation_token();
        let task = tokio::spawn(controller.run());

        info!(job_id = %id, "Split job spawned");

        Self { id, cancel, task }
    }

    /// Identifier of the running job.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Requests a stop at the next segment boundary.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!(job_id = %self.id, "Cancellation requested");
        }
        self.cancel.cancel();
    }

    /// Waits for the job to reach a terminal phase.
    pub async fn wait(self) -> Result<JobReport, JoinError> {
        self.task.await
    }

    /// Waits for the job without consuming the handle, so it can still be
    /// cancelled or shut down if this future is dropped.
    pub async fn join(&mut self) -> Result<JobReport, JoinError> {
        (&mut self.task).await
    }

    /// Cancels the job and waits up to `grace` for it to stop.
    ///
    /// Returns `None` if the worker is still busy after the grace period; it
    /// is left to finish its in-flight segment on its own.
    pub async fn shutdown(mut self, grace: Duration) -> Option<JobReport> {
        self.cancel();

        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                error!(job_id = %self.id, error = %e, "Split job task failed");
                None
            }
            Err(_) => {
                warn!(
                    job_id = %self.id,
                    grace_secs = grace.as_secs(),
                    "Split job did not stop within the grace period"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::config::model::Quality;
    use crate::encoder::SegmentEncoder;
    use crate::job::events::ChannelSink;
    use crate::job::model::{JobConfig, JobStatus, MediaSource, SegmentOutcome};
    use crate::media::probe::{MockDurationProbe, ProbeMethod, Probed};
    use crate::planner::SegmentWindow;

    /// Encoder that takes a fixed time per window.
    struct SlowEncoder(Duration);

    #[async_trait]
    impl SegmentEncoder for SlowEncoder {
        async fn encode(
            &self,
            _source: &MediaSource,
            window: &SegmentWindow,
            config: &JobConfig,
            _cancel: &CancellationToken,
        ) -> SegmentOutcome {
            tokio::time::sleep(self.0).await;
            SegmentOutcome::success(*window, config.output_directory.join("seg.mp4"))
        }
    }

    fn controller(dir: &TempDir, per_segment: Duration) -> JobController {
        let mut probe = MockDurationProbe::new();
        probe.expect_probe().returning(|_| {
            Ok(Probed {
                seconds: 600.0,
                method: ProbeMethod::Metadata,
            })
        });
        let (sink, _rx) = ChannelSink::new();
        let config = JobConfig {
            source_path: dir.path().join("clip.mp4"),
            segment_length_seconds: 60,
            output_directory: dir.path().join("out"),
            keep_audio: false,
            quality: Quality::Low,
        };
        JobController::new(
            config,
            Arc::new(probe),
            Arc::new(SlowEncoder(per_segment)),
            Arc::new(sink),
        )
    }

    #[tokio::test]
    async fn runs_to_completion_in_background() {
        let dir = TempDir::new().unwrap();
        let handle = JobHandle::spawn(controller(&dir, Duration::ZERO));

        let report = tokio_test::assert_ok!(handle.wait().await);

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.attempted, 10);
    }

    #[tokio::test]
    async fn shutdown_returns_cancelled_report_within_grace() {
        let dir = TempDir::new().unwrap();
        let handle = JobHandle::spawn(controller(&dir, Duration::from_millis(20)));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let report = handle.shutdown(Duration::from_secs(5)).await.unwrap();

        assert_eq!(report.status, JobStatus::Cancelled);
        assert!(report.attempted < 10);
    }

    #[tokio::test]
    async fn shutdown_gives_up_after_grace() {
        let dir = TempDir::new().unwrap();
        let handle = JobHandle::spawn(controller(&dir, Duration::from_secs(5)));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let report = handle.shutdown(Duration::from_millis(100)).await;

        assert!(report.is_none());
    }
}
