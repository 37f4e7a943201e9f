//! Per-window segment encoding.

pub mod ffmpeg;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::job::model::{JobConfig, MediaSource, SegmentOutcome};
use crate::planner::SegmentWindow;

pub use ffmpeg::FfmpegSegmentEncoder;

/// Extracts one window of a source into its own file.
#[async_trait]
pub trait SegmentEncoder: Send + Sync {
    /// Encodes `window`. Failures are reported in the outcome, never returned.
    ///
    /// `cancel` is the job's cancellation token; implementations may use it to
    /// stop an in-flight encode early.
    async fn encode(
        &self,
        source: &MediaSource,
        window: &SegmentWindow,
        config: &JobConfig,
        cancel: &CancellationToken,
    ) -> SegmentOutcome;
}

/// Deterministic output path: `<dir>/<stem>_part_<NNN>.<ext>`.
pub fn segment_output_path(
    output_directory: &Path,
    source: &MediaSource,
    index: u32,
    extension: &str,
) -> PathBuf {
    output_directory.join(format!(
        "{}_part_{:03}.{}",
        source.stem(),
        index,
        extension.trim_start_matches('.')
    ))
}
