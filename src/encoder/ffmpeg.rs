//! FFmpeg subprocess wrapper for segment extraction.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{segment_output_path, SegmentEncoder};
use crate::config::model::{AppConfig, EncodingConfig};
use crate::error::EncoderError;
use crate::job::model::{JobConfig, MediaSource, SegmentOutcome};
use crate::planner::SegmentWindow;
use crate::process::{self, RunError};

/// Lines of ffmpeg stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 5;

/// Encodes segments by running one ffmpeg process per window.
#[derive(Debug, Clone)]
pub struct FfmpegSegmentEncoder {
    ffmpeg: String,
    settings: EncodingConfig,
    timeout: Duration,
}

impl FfmpegSegmentEncoder {
    /// Creates an encoder with the given binary, settings and per-segment budget.
    pub fn new(ffmpeg: impl Into<String>, settings: EncodingConfig, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            settings,
            timeout,
        }
    }

    /// Creates an encoder from the application config.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.tools.ffmpeg,
            config.encoding.clone(),
            config.timeouts.encode(),
        )
    }

    /// Output path for a window.
    pub fn output_path(&self, source: &MediaSource, window: &SegmentWindow, config: &JobConfig) -> PathBuf {
        segment_output_path(
            &config.output_directory,
            source,
            window.index,
            &self.settings.container,
        )
    }

    /// Builds the ffmpeg argument list for one window.
    pub fn build_args(
        &self,
        source: &MediaSource,
        window: &SegmentWindow,
        config: &JobConfig,
        output: &Path,
    ) -> Vec<OsString> {
        let crf = self.settings.quality.crf(config.quality).to_string();

        let mut args: Vec<OsString> = vec![
            "-y".into(), // Overwrite output
            "-nostdin".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            // Seek before the input for a fast, keyframe-based start.
            "-ss".into(),
            format!("{:.3}", window.start_seconds).into(),
            "-i".into(),
            source.path.as_os_str().to_owned(),
            "-t".into(),
            format!("{:.3}", window.duration()).into(),
            "-c:v".into(),
            self.settings.video_codec.as_str().into(),
            "-crf".into(),
            crf.into(),
        ];

        if config.keep_audio {
            args.push("-c:a".into());
            args.push(self.settings.audio_codec.as_str().into());
            args.push("-b:a".into());
            args.push(self.settings.audio_bitrate.as_str().into());
        } else {
            args.push("-an".into());
        }

        args.push("-avoid_negative_ts".into());
        args.push("make_zero".into());
        args.push("-movflags".into());
        args.push("+faststart".into());

        args.push(output.as_os_str().to_owned());
        args
    }

    async fn encode_window(
        &self,
        source: &MediaSource,
        window: &SegmentWindow,
        config: &JobConfig,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), EncoderError> {
        // A stale file from an earlier run must not count as this run's output.
        if output.exists() {
            if let Err(e) = std::fs::remove_file(output) {
                debug!(path = ?output, error = %e, "Could not remove existing segment, ffmpeg will overwrite it");
            }
        }

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(self.build_args(source, window, config, output));

        let abort = self.settings.abort_in_flight_on_cancel.then_some(cancel);

        let result = process::run(cmd, self.timeout, abort).await.map_err(|e| match e {
            RunError::TimedOut(limit) => EncoderError::Timeout {
                seconds: limit.as_secs(),
            },
            RunError::Aborted => EncoderError::Aborted,
            other => EncoderError::SpawnFailed(other.to_string()),
        })?;

        if !result.status.success() {
            return Err(EncoderError::FfmpegFailed {
                code: result.status.code().unwrap_or(-1),
                stderr: stderr_tail(&result.stderr),
            });
        }

        if !output.exists() {
            return Err(EncoderError::MissingOutput {
                path: output.to_path_buf(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl SegmentEncoder for FfmpegSegmentEncoder {
    async fn encode(
        &self,
        source: &MediaSource,
        window: &SegmentWindow,
        config: &JobConfig,
        cancel: &CancellationToken,
    ) -> SegmentOutcome {
        let output = self.output_path(source, window, config);

        match self.encode_window(source, window, config, &output, cancel).await {
            Ok(()) => {
                info!(segment = window.index, path = ?output, "Segment encoded");
                SegmentOutcome::success(*window, output)
            }
            Err(e) => {
                warn!(segment = window.index, error = %e, "Segment encode failed");
                discard_partial(&output);
                SegmentOutcome::failure(*window, output, e.to_string())
            }
        }
    }
}

/// Removes whatever a failed encode left at `output`, so only finished
/// segments carry the segment name.
fn discard_partial(output: &Path) {
    match std::fs::remove_file(output) {
        Ok(()) => debug!(path = ?output, "Removed partial segment"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = ?output, error = %e, "Could not remove partial segment"),
    }
}

/// Keeps the last few non-empty lines of an ffmpeg error stream.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::Quality;

    fn fixture(keep_audio: bool, quality: Quality) -> (FfmpegSegmentEncoder, MediaSource, JobConfig) {
        let encoder = FfmpegSegmentEncoder::new("ffmpeg", EncodingConfig::default(), Duration::from_secs(300));
        let source = MediaSource {
            path: PathBuf::from("/in/talk.mp4"),
            total_duration_seconds: 125.0,
        };
        let config = JobConfig {
            source_path: source.path.clone(),
            segment_length_seconds: 60,
            output_directory: PathBuf::from("/out"),
            keep_audio,
            quality,
        };
        (encoder, source, config)
    }

    fn as_strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn builds_window_offsets_and_output() {
        let (encoder, source, config) = fixture(true, Quality::Medium);
        let window = SegmentWindow {
            index: 3,
            start_seconds: 120.0,
            end_seconds: 125.0,
        };
        let output = encoder.output_path(&source, &window, &config);
        let args = as_strings(encoder.build_args(&source, &window, &config, &output));

        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert_eq!(value_after(&args, "-ss"), Some("120.000"));
        assert_eq!(value_after(&args, "-i"), Some("/in/talk.mp4"));
        assert_eq!(value_after(&args, "-t"), Some("5.000"));
        assert_eq!(value_after(&args, "-avoid_negative_ts"), Some("make_zero"));
        assert_eq!(value_after(&args, "-movflags"), Some("+faststart"));
        assert_eq!(args.last().map(String::as_str), Some("/out/talk_part_003.mp4"));
    }

    #[test]
    fn keeps_or_strips_audio() {
        let window = SegmentWindow {
            index: 1,
            start_seconds: 0.0,
            end_seconds: 60.0,
        };

        let (encoder, source, config) = fixture(true, Quality::Medium);
        let args = as_strings(encoder.build_args(&source, &window, &config, Path::new("o.mp4")));
        assert_eq!(value_after(&args, "-c:a"), Some("aac"));
        assert_eq!(value_after(&args, "-b:a"), Some("128k"));
        assert!(!args.contains(&"-an".to_string()));

        let (encoder, source, config) = fixture(false, Quality::Medium);
        let args = as_strings(encoder.build_args(&source, &window, &config, Path::new("o.mp4")));
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
    }

    #[test]
    fn quality_tier_selects_crf() {
        let window = SegmentWindow {
            index: 1,
            start_seconds: 0.0,
            end_seconds: 60.0,
        };

        for (quality, crf) in [(Quality::High, "18"), (Quality::Medium, "23"), (Quality::Low, "28")] {
            let (encoder, source, config) = fixture(true, quality);
            let args = as_strings(encoder.build_args(&source, &window, &config, Path::new("o.mp4")));
            assert_eq!(value_after(&args, "-crf"), Some(crf));
        }
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let stderr = b"a\n\nb\nc\nd\ne\nf\n";

        assert_eq!(stderr_tail(stderr), "b\nc\nd\ne\nf");
    }

    #[cfg(unix)]
    mod with_fake_ffmpeg {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Writes an executable stand-in for ffmpeg into `dir`.
        fn fake_ffmpeg(dir: &TempDir, body: &str) -> String {
            let path = dir.path().join("ffmpeg");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        // The output path is the last argument.
        const WRITE_LAST_ARG: &str = r#"for last; do :; done; echo data > "$last""#;

        fn run_setup(dir: &TempDir, body: &str, timeout: Duration) -> (FfmpegSegmentEncoder, MediaSource, JobConfig, SegmentWindow) {
            let encoder = FfmpegSegmentEncoder::new(fake_ffmpeg(dir, body), EncodingConfig::default(), timeout);
            let source = MediaSource {
                path: dir.path().join("talk.mp4"),
                total_duration_seconds: 125.0,
            };
            let config = JobConfig {
                source_path: source.path.clone(),
                segment_length_seconds: 60,
                output_directory: dir.path().to_path_buf(),
                keep_audio: true,
                quality: Quality::Medium,
            };
            let window = SegmentWindow {
                index: 2,
                start_seconds: 60.0,
                end_seconds: 120.0,
            };
            (encoder, source, config, window)
        }

        #[tokio::test]
        async fn success_requires_zero_exit_and_output_file() {
            let dir = TempDir::new().unwrap();
            let (encoder, source, config, window) = run_setup(&dir, WRITE_LAST_ARG, Duration::from_secs(5));

            let outcome = encoder.encode(&source, &window, &config, &CancellationToken::new()).await;

            assert!(outcome.succeeded, "{:?}", outcome.error_detail);
            assert_eq!(outcome.output_path, dir.path().join("talk_part_002.mp4"));
            assert!(outcome.output_path.exists());
        }

        #[tokio::test]
        async fn zero_exit_without_output_is_failure() {
            let dir = TempDir::new().unwrap();
            let (encoder, source, config, window) = run_setup(&dir, "exit 0", Duration::from_secs(5));

            let outcome = encoder.encode(&source, &window, &config, &CancellationToken::new()).await;

            assert!(!outcome.succeeded);
            assert!(outcome.error_detail.unwrap().contains("did not write"));
        }

        #[tokio::test]
        async fn stale_output_from_earlier_run_does_not_count() {
            let dir = TempDir::new().unwrap();
            let (encoder, source, config, window) = run_setup(&dir, "exit 0", Duration::from_secs(5));
            std::fs::write(dir.path().join("talk_part_002.mp4"), b"old").unwrap();

            let outcome = encoder.encode(&source, &window, &config, &CancellationToken::new()).await;

            assert!(!outcome.succeeded);
        }

        #[tokio::test]
        async fn output_with_nonzero_exit_is_failure() {
            let dir = TempDir::new().unwrap();
            let body = format!("{}\necho 'Conversion failed!' 1>&2\nexit 1", WRITE_LAST_ARG);
            let (encoder, source, config, window) = run_setup(&dir, &body, Duration::from_secs(5));

            let outcome = encoder.encode(&source, &window, &config, &CancellationToken::new()).await;

            assert!(!outcome.succeeded);
            assert!(!outcome.output_path.exists());
            assert!(outcome.error_detail.unwrap().contains("Conversion failed!"));
        }

        #[tokio::test]
        async fn timed_out_partial_output_is_removed() {
            let dir = TempDir::new().unwrap();
            let body = format!("{}
sleep 10", WRITE_LAST_ARG);
            let (encoder, source, config, window) = run_setup(&dir, &body, Duration::from_millis(500));

            let outcome = encoder.encode(&source, &window, &config, &CancellationToken::new()).await;

            assert!(!outcome.succeeded);
            assert!(outcome.error_detail.unwrap().contains("timed out"));
            assert!(!dir.path().join("talk_part_002.mp4").exists());
        }

        #[tokio::test]
        async fn timeout_is_failure() {
            let dir = TempDir::new().unwrap();
            let (encoder, source, config, window) = run_setup(&dir, "sleep 10", Duration::from_millis(200));

            let outcome = encoder.encode(&source, &window, &config, &CancellationToken::new()).await;

            assert!(!outcome.succeeded);
            assert!(outcome.error_detail.unwrap().contains("timed out"));
        }

        #[tokio::test]
        async fn cancellation_does_not_interrupt_by_default() {
            let dir = TempDir::new().unwrap();
            let body = format!("sleep 0.3\n{}", WRITE_LAST_ARG);
            let (encoder, source, config, window) = run_setup(&dir, &body, Duration::from_secs(5));
            let token = CancellationToken::new();
            token.cancel();

            let outcome = encoder.encode(&source, &window, &config, &token).await;

            assert!(outcome.succeeded);
        }

        #[tokio::test]
        async fn cancellation_aborts_when_enabled() {
            let dir = TempDir::new().unwrap();
            let settings = EncodingConfig {
                abort_in_flight_on_cancel: true,
                ..EncodingConfig::default()
            };
            let (_, source, config, window) = run_setup(&dir, "sleep 10", Duration::from_secs(5));
            let encoder = FfmpegSegmentEncoder::new(
                dir.path().join("ffmpeg").to_string_lossy(),
                settings,
                Duration::from_secs(5),
            );
            let token = CancellationToken::new();
            token.cancel();

            let outcome = encoder.encode(&source, &window, &config, &token).await;

            assert!(!outcome.succeeded);
            assert!(outcome.error_detail.unwrap().contains("aborted"));
        }
    }
}
