//! Configuration data structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure containing all settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// External tool locations.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Time budgets for external invocations.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Encoder parameters shared by every segment.
    #[serde(default)]
    pub encoding: EncodingConfig,

    /// Defaults for job requests that leave a field unset.
    #[serde(default)]
    pub defaults: JobDefaults,
}

/// External tool locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path or name of the ffmpeg binary.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    /// Path or name of the ffprobe binary.
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

/// Timeouts, in seconds, for each kind of external invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Structured metadata query.
    #[serde(default = "default_probe_seconds")]
    pub probe_seconds: u64,

    /// Diagnostic pass used when the structured query fails.
    #[serde(default = "default_fallback_probe_seconds")]
    pub fallback_probe_seconds: u64,

    /// A single segment encode.
    #[serde(default = "default_encode_seconds")]
    pub encode_seconds: u64,

    /// How long shutdown waits for the worker to reach a segment boundary.
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
}

impl TimeoutConfig {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_seconds)
    }

    pub fn fallback_probe(&self) -> Duration {
        Duration::from_secs(self.fallback_probe_seconds)
    }

    pub fn encode(&self) -> Duration {
        Duration::from_secs(self.encode_seconds)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

/// Encoder settings applied to every segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// FFmpeg video encoder name.
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// FFmpeg audio encoder name, used when audio is kept.
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate (e.g., "128k").
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Output container extension, without the dot.
    #[serde(default = "default_container")]
    pub container: String,

    /// CRF value for each quality tier.
    #[serde(default)]
    pub quality: QualityTable,

    /// Kill the in-flight encode when cancellation is requested instead of
    /// letting it run to completion.
    #[serde(default)]
    pub abort_in_flight_on_cancel: bool,
}

/// CRF value per quality tier. Lower is higher fidelity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityTable {
    #[serde(default = "default_crf_high")]
    pub high: u8,

    #[serde(default = "default_crf_medium")]
    pub medium: u8,

    #[serde(default = "default_crf_low")]
    pub low: u8,
}

impl QualityTable {
    /// Returns the CRF value for the given tier.
    pub fn crf(&self, quality: Quality) -> u8 {
        match quality {
            Quality::High => self.high,
            Quality::Medium => self.medium,
            Quality::Low => self.low,
        }
    }
}

/// Coarse output quality tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Larger files, higher fidelity.
    High,
    #[default]
    Medium,
    /// Smaller files, more compression.
    Low,
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Defaults applied to job requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefaults {
    /// Segment length in seconds.
    #[serde(default = "default_segment_length")]
    pub segment_length_seconds: u64,

    /// Whether segments keep the source audio.
    #[serde(default = "default_true")]
    pub keep_audio: bool,

    /// Quality tier.
    #[serde(default)]
    pub quality: Quality,

    /// Directory name created next to the source when no output directory is given.
    #[serde(default = "default_output_dir_name")]
    pub output_dir_name: String,
}

// Default value functions

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_probe_seconds() -> u64 {
    30
}

fn default_fallback_probe_seconds() -> u64 {
    60
}

fn default_encode_seconds() -> u64 {
    300
}

fn default_shutdown_grace_seconds() -> u64 {
    3
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "128k".to_string()
}

fn default_container() -> String {
    "mp4".to_string()
}

fn default_crf_high() -> u8 {
    18
}

fn default_crf_medium() -> u8 {
    23
}

fn default_crf_low() -> u8 {
    28
}

fn default_segment_length() -> u64 {
    150
}

fn default_true() -> bool {
    true
}

fn default_output_dir_name() -> String {
    "video_segments".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_seconds: default_probe_seconds(),
            fallback_probe_seconds: default_fallback_probe_seconds(),
            encode_seconds: default_encode_seconds(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            container: default_container(),
            quality: QualityTable::default(),
            abort_in_flight_on_cancel: false,
        }
    }
}

impl Default for QualityTable {
    fn default() -> Self {
        Self {
            high: default_crf_high(),
            medium: default_crf_medium(),
            low: default_crf_low(),
        }
    }
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            segment_length_seconds: default_segment_length(),
            keep_audio: true,
            quality: Quality::default(),
            output_dir_name: default_output_dir_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();

        assert_eq!(config.tools.ffmpeg, "ffmpeg");
        assert_eq!(config.timeouts.probe_seconds, 30);
        assert_eq!(config.timeouts.fallback_probe_seconds, 60);
        assert_eq!(config.timeouts.encode_seconds, 300);
        assert_eq!(config.encoding.container, "mp4");
        assert_eq!(config.defaults.segment_length_seconds, 150);
        assert!(config.defaults.keep_audio);
        assert_eq!(config.defaults.quality, Quality::Medium);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let yaml = r#"
encoding:
  quality:
    low: 32
defaults:
  quality: high
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.encoding.quality.low, 32);
        assert_eq!(config.encoding.quality.medium, 23);
        assert_eq!(config.encoding.video_codec, "libx264");
        assert_eq!(config.defaults.quality, Quality::High);
    }

    #[test]
    fn quality_tiers_map_to_fixed_crf() {
        let table = QualityTable::default();

        assert_eq!(table.crf(Quality::High), 18);
        assert_eq!(table.crf(Quality::Medium), 23);
        assert_eq!(table.crf(Quality::Low), 28);
        // Same tier, same parameter.
        assert_eq!(table.crf(Quality::Low), table.crf(Quality::Low));
    }
}
