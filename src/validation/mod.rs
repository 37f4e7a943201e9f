//! Configuration validation system.

pub mod codec;
pub mod report;
pub mod semantic;

use std::collections::HashSet;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::config::model::{AppConfig, ToolsConfig};
use crate::error::CapabilityError;
use crate::process::{self, RunError};

/// Time budget for each tool query made while detecting capabilities.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Blocks configuration loading.
    Error,
    /// Logged but allows loading.
    Warning,
}

/// A validation issue found during configuration checking.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: ValidationSeverity,
    /// Path to the problematic config field (e.g., "encoding.quality.high").
    pub path: String,
    /// Description of the issue.
    pub message: String,
    /// Optional suggestion for fixing the issue.
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Creates a new error-level validation issue.
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Error,
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Creates a new warning-level validation issue.
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Warning,
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Adds a suggestion to this validation issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Result of validating a configuration.
#[derive(Debug, Default)]
pub struct ValidationResult {
    issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, other: ValidationResult) {
        self.issues.extend(other.issues);
    }

    /// Returns true if there are no errors (warnings are allowed).
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == ValidationSeverity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }
}

/// What the configured external tools can do on this machine.
#[derive(Debug, Clone)]
pub struct SystemCapabilities {
    /// First line of `ffmpeg -version`.
    pub ffmpeg_version: String,
    /// Whether `ffprobe -version` ran successfully.
    pub ffprobe_available: bool,
    /// Encoders listed by `ffmpeg -encoders`.
    pub available_encoders: HashSet<String>,
}

impl SystemCapabilities {
    /// Queries the configured tools.
    ///
    /// A missing or broken ffmpeg is an error. A missing ffprobe is not, since
    /// duration probing can fall back to ffmpeg alone.
    pub async fn detect(tools: &ToolsConfig) -> Result<Self, CapabilityError> {
        let ffmpeg_version = ffmpeg_version(&tools.ffmpeg).await?;

        let ffprobe_available = match query(&tools.ffprobe, &["-version"]).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "ffprobe not usable");
                false
            }
        };

        let encoders = query(&tools.ffmpeg, &["-encoders", "-hide_banner"]).await?;
        let available_encoders = parse_ffmpeg_codec_list(&encoders);

        Ok(Self {
            ffmpeg_version,
            ffprobe_available,
            available_encoders,
        })
    }
}

/// Confirms ffmpeg runs and returns its version line.
pub async fn ffmpeg_version(ffmpeg: &str) -> Result<String, CapabilityError> {
    let stdout = query(ffmpeg, &["-version"]).await.map_err(|e| match e {
        CapabilityError::CommandFailed { .. } => CapabilityError::ToolNotFound {
            tool: ffmpeg.to_string(),
        },
        other => other,
    })?;

    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}

/// Runs `tool args` and returns stdout, failing on a non-zero exit.
async fn query(tool: &str, args: &[&str]) -> Result<String, CapabilityError> {
    let command = format!("{} {}", tool, args.join(" "));

    let mut cmd = Command::new(tool);
    cmd.args(args);

    let output = process::run(cmd, CHECK_TIMEOUT, None)
        .await
        .map_err(|e| match e {
            RunError::Spawn(_) => CapabilityError::ToolNotFound {
                tool: tool.to_string(),
            },
            other => CapabilityError::CommandFailed {
                command: command.clone(),
                message: other.to_string(),
            },
        })?;

    if !output.status.success() {
        return Err(CapabilityError::CommandFailed {
            command,
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses `ffmpeg -encoders` output into a set of encoder names.
pub fn parse_ffmpeg_codec_list(output: &str) -> HashSet<String> {
    let mut codecs = HashSet::new();
    let mut in_list = false;

    for line in output.lines() {
        let trimmed = line.trim();

        // Everything above the " ------" separator is the legend.
        if trimmed.starts_with("------") {
            in_list = true;
            continue;
        }
        if !in_list || trimmed.is_empty() {
            continue;
        }

        // Lines look like: " A....D aac                  AAC (Advanced Audio Coding)"
        let mut parts = trimmed.split_whitespace();
        if let (Some(flags), Some(name)) = (parts.next(), parts.next()) {
            if flags.starts_with(&['V', 'A', 'S'][..]) {
                codecs.insert(name.to_string());
            }
        }
    }

    codecs
}

/// Validates the configuration, including encoder availability when
/// capabilities are known.
pub fn validate_config(
    config: &AppConfig,
    capabilities: Option<&SystemCapabilities>,
) -> ValidationResult {
    let mut result = semantic::validate(config);

    if let Some(capabilities) = capabilities {
        result.extend(codec::validate(config, capabilities));
    }

    result
}
