//! Encoder availability validation.

use std::collections::HashSet;

use crate::config::model::AppConfig;

use super::{SystemCapabilities, ValidationIssue, ValidationResult};

/// Validates that the configured encoders exist in this ffmpeg build.
pub fn validate(config: &AppConfig, capabilities: &SystemCapabilities) -> ValidationResult {
    let mut result = ValidationResult::new();

    check(
        "encoding.video_codec",
        "Video",
        &config.encoding.video_codec,
        &capabilities.available_encoders,
        &mut result,
    );

    // Audio is stripped entirely when disabled, so only check it when kept by default.
    if config.defaults.keep_audio {
        check(
            "encoding.audio_codec",
            "Audio",
            &config.encoding.audio_codec,
            &capabilities.available_encoders,
            &mut result,
        );
    } else if !capabilities
        .available_encoders
        .contains(&config.encoding.audio_codec)
    {
        result.add(ValidationIssue::warning(
            "encoding.audio_codec",
            format!(
                "Audio encoder '{}' is not available; jobs that keep audio will fail",
                config.encoding.audio_codec
            ),
        ));
    }

    result
}

fn check(
    path: &str,
    kind: &str,
    codec: &str,
    available: &HashSet<String>,
    result: &mut ValidationResult,
) {
    if available.contains(codec) {
        return;
    }

    let issue = ValidationIssue::error(path, format!("{} encoder '{}' is not available", kind, codec));
    let issue = match closest(codec, available) {
        Some(name) => issue.with_suggestion(format!("Did you mean '{}'?", name)),
        None => issue.with_suggestion("ffmpeg reported no encoders"),
    };
    result.add(issue);
}

/// Finds the available encoder name closest to `requested`.
fn closest<'a>(requested: &str, available: &'a HashSet<String>) -> Option<&'a str> {
    let requested = requested.to_lowercase();

    available
        .iter()
        .min_by(|a, b| {
            strsim::levenshtein(&requested, a)
                .cmp(&strsim::levenshtein(&requested, b))
                .then_with(|| a.cmp(b))
        })
        .map(String::as_str)
}
