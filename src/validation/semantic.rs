//! Semantic validation for configuration values.

use crate::config::model::{AppConfig, EncodingConfig, QualityTable, TimeoutConfig};

use super::{ValidationIssue, ValidationResult};

/// Highest CRF accepted by x264/x265.
const MAX_CRF: u8 = 51;

/// Validates semantic correctness of configuration values.
pub fn validate(config: &AppConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.tools.ffmpeg.trim().is_empty() {
        result.add(ValidationIssue::error("tools.ffmpeg", "ffmpeg path cannot be empty"));
    }
    if config.tools.ffprobe.trim().is_empty() {
        result.add(ValidationIssue::error("tools.ffprobe", "ffprobe path cannot be empty"));
    }

    validate_timeouts(&config.timeouts, &mut result);
    validate_encoding(&config.encoding, &mut result);

    if config.defaults.segment_length_seconds == 0 {
        result.add(
            ValidationIssue::error(
                "defaults.segment_length_seconds",
                "Segment length must be at least 1 second",
            )
            .with_suggestion("Use 150 for two and a half minutes"),
        );
    }

    let dir_name = config.defaults.output_dir_name.trim();
    if dir_name.is_empty() {
        result.add(ValidationIssue::error(
            "defaults.output_dir_name",
            "Output directory name cannot be empty",
        ));
    } else if dir_name.contains(&['/', '\\'][..]) {
        result.add(
            ValidationIssue::warning(
                "defaults.output_dir_name",
                format!("'{}' contains a path separator", dir_name),
            )
            .with_suggestion("Use a plain directory name; it is created next to the source"),
        );
    }

    result
}

fn validate_timeouts(timeouts: &TimeoutConfig, result: &mut ValidationResult) {
    let fields = [
        ("timeouts.probe_seconds", timeouts.probe_seconds),
        ("timeouts.fallback_probe_seconds", timeouts.fallback_probe_seconds),
        ("timeouts.encode_seconds", timeouts.encode_seconds),
        ("timeouts.shutdown_grace_seconds", timeouts.shutdown_grace_seconds),
    ];

    for (path, value) in fields {
        if value == 0 {
            result.add(ValidationIssue::error(path, "Timeout must be at least 1 second"));
        }
    }
}

fn validate_encoding(encoding: &EncodingConfig, result: &mut ValidationResult) {
    if encoding.video_codec.trim().is_empty() {
        result.add(
            ValidationIssue::error("encoding.video_codec", "Video codec cannot be empty")
                .with_suggestion("Use 'libx264'"),
        );
    }

    if encoding.audio_codec.trim().is_empty() {
        result.add(
            ValidationIssue::error("encoding.audio_codec", "Audio codec cannot be empty")
                .with_suggestion("Use 'aac'"),
        );
    }

    let container = encoding.container.trim().trim_start_matches('.');
    if container.is_empty() {
        result.add(
            ValidationIssue::error("encoding.container", "Container cannot be empty")
                .with_suggestion("Use 'mp4' or 'mkv'"),
        );
    }

    validate_bitrate(&encoding.audio_bitrate, "encoding.audio_bitrate", result);
    validate_quality(&encoding.quality, result);
}

fn validate_quality(quality: &QualityTable, result: &mut ValidationResult) {
    for (tier, crf) in [("high", quality.high), ("medium", quality.medium), ("low", quality.low)] {
        if crf > MAX_CRF {
            result.add(
                ValidationIssue::error(
                    format!("encoding.quality.{}", tier),
                    format!("CRF {} is out of range", crf),
                )
                .with_suggestion(format!("CRF must be between 0 and {}", MAX_CRF)),
            );
        }
    }

    if !(quality.high <= quality.medium && quality.medium <= quality.low) {
        result.add(
            ValidationIssue::warning(
                "encoding.quality",
                format!(
                    "CRF values are not ordered (high={}, medium={}, low={})",
                    quality.high, quality.medium, quality.low
                ),
            )
            .with_suggestion("Lower CRF means higher quality; expected high <= medium <= low"),
        );
    }
}

/// Validates a bitrate string format (e.g., "128k", "1.5m").
fn validate_bitrate(bitrate: &str, path: &str, result: &mut ValidationResult) {
    let valid = bitrate
        .strip_suffix('k')
        .or_else(|| bitrate.strip_suffix('K'))
        .or_else(|| bitrate.strip_suffix('m'))
        .or_else(|| bitrate.strip_suffix('M'))
        .map(|num| num.parse::<f32>().map(|n| n > 0.0).unwrap_or(false))
        .unwrap_or(false);

    if !valid {
        result.add(
            ValidationIssue::error(path, format!("Invalid bitrate format: '{}'", bitrate))
                .with_suggestion("Expected format: '96k', '128k', '192k', or '1.5m'"),
        );
    }
}
