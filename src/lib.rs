//! Video Splitter - cut a video into fixed-length, independently playable
//! segments with ffmpeg.
//!
//! The library exposes the job engine (probe, planner, encoder and the job
//! controller) so front ends other than the bundled CLI can drive it.

pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod job;
pub mod media;
pub mod planner;
pub mod process;
pub mod validation;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{Cli, Commands, LogFormat, PlanArgs, SplitArgs};
use crate::config::AppConfig;
use crate::job::{ChannelSink, JobConfig, JobController, JobEvent, JobHandle, JobReport, JobRequest};
use crate::media::time::format_hms;
use crate::media::{DurationProbe, FfmpegDurationProbe};
use crate::validation::{report, validate_config, SystemCapabilities};

/// Runs the command selected on the command line.
pub async fn run(cli: Cli) -> Result<()> {
    setup_logging(cli.log_level(), cli.log_format)?;

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Split(args) => split(args, config_path).await,
        Commands::Probe { input } => probe(&input, config_path).await,
        Commands::Plan(args) => plan(args, config_path).await,
        Commands::Check => check(config_path).await,
        Commands::ConfigValidate => validate(config_path).await,
        Commands::ConfigShow => show_config(config_path),
    }
}

/// Initializes the tracing subscriber. Diagnostics go to stderr so stdout
/// carries only command output.
fn setup_logging(level: &str, format: LogFormat) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .init(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init(),
    }

    Ok(())
}

/// Splits a video, rendering job events as they arrive.
async fn split(args: SplitArgs, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_and_validate(config_path, None)?;

    let version = validation::ffmpeg_version(&config.tools.ffmpeg)
        .await
        .context("FFmpeg not found. Please install FFmpeg and ensure it's in your PATH.")?;
    info!(version = %version, "FFmpeg available");

    let job_config = build_job_config(&args, &config)?;
    info!(
        source = ?job_config.source_path,
        output = ?job_config.output_directory,
        segment_length = job_config.segment_length_seconds,
        keep_audio = job_config.keep_audio,
        quality = %job_config.quality,
        "Split requested"
    );

    let (sink, mut events) = ChannelSink::new();
    let controller = JobController::with_ffmpeg(&config, job_config, Arc::new(sink));
    let mut handle = JobHandle::spawn(controller);
    info!(job_id = %handle.id(), "Press Ctrl+C to cancel");

    let quiet = args.json;
    let mut listen_for_signals = true;
    let mut interrupts = 0u8;

    let joined = loop {
        tokio::select! {
            Some(event) = events.recv() => render_event(&event, quiet),
            result = handle.join() => break Some(result),
            signal = tokio::signal::ctrl_c(), if listen_for_signals => {
                if let Err(e) = signal {
                    warn!(error = %e, "Cannot listen for Ctrl+C");
                    listen_for_signals = false;
                    continue;
                }
                interrupts += 1;
                if interrupts == 1 {
                    eprintln!("Cancelling after the current segment. Press Ctrl+C again to quit.");
                    handle.cancel();
                } else {
                    break None;
                }
            }
        }
    };

    let report = match joined {
        Some(result) => result.context("Split job task failed")?,
        None => {
            let grace = config.timeouts.shutdown_grace();
            match handle.shutdown(grace).await {
                Some(report) => report,
                None => anyhow::bail!(
                    "Split job did not stop within {} seconds",
                    grace.as_secs()
                ),
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        render_event(&event, quiet);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    finish(report)
}

/// Builds and validates the job settings from CLI flags over config defaults.
fn build_job_config(args: &SplitArgs, config: &AppConfig) -> Result<JobConfig> {
    let mut request = JobRequest::with_defaults(&args.input, &config.defaults);
    request.output_directory = args.output.clone();
    if let Some(length) = args.length.resolve() {
        request.segment_length_seconds = length;
    }
    if args.no_audio {
        request.keep_audio = false;
    }
    if let Some(quality) = args.quality {
        request.quality = quality;
    }

    Ok(JobConfig::from_request(
        request,
        &config.defaults.output_dir_name,
    )?)
}

/// Where a rendered event line goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Text shown to the user for an event, if any. With `quiet` (JSON report
/// mode) stdout is reserved for the report, so lines move to stderr and
/// progress is dropped.
fn event_line(event: &JobEvent, quiet: bool) -> Option<(Stream, String)> {
    let stream = if quiet { Stream::Stderr } else { Stream::Stdout };

    match event {
        JobEvent::Log(text) => Some((stream, text.clone())),
        JobEvent::Progress(percent) if !quiet => Some((stream, format!("Progress: {}%", percent))),
        // A failed run surfaces its message as the command error instead.
        JobEvent::Finished {
            success: true,
            message,
        } => Some((stream, message.clone())),
        _ => None,
    }
}

fn render_event(event: &JobEvent, quiet: bool) {
    match event {
        JobEvent::Status(text) => tracing::debug!(status = %text, "Job status"),
        JobEvent::SegmentCompleted { path, index } => {
            tracing::debug!(segment = *index, path = ?path, "Segment written")
        }
        _ => {}
    }

    match event_line(event, quiet) {
        Some((Stream::Stdout, line)) => println!("{}", line),
        Some((Stream::Stderr, line)) => eprintln!("{}", line),
        None => {}
    }
}

/// Turns a report into the process result.
fn finish(report: JobReport) -> Result<()> {
    if report.is_success() {
        info!(
            job_id = %report.job_id,
            segments = report.succeeded,
            output = ?report.output_directory,
            "Split finished"
        );
        return Ok(());
    }

    warn!(job_id = %report.job_id, status = ?report.status, error = ?report.error, "Split did not complete");
    anyhow::bail!(report.message)
}

/// Prints the resolved duration of a video.
async fn probe(input: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_and_validate(config_path, None)?;
    let probe = FfmpegDurationProbe::from_config(&config);

    let probed = probe
        .probe(input)
        .await
        .with_context(|| format!("Could not determine duration of '{}'", input.display()))?;

    println!(
        "{}  {:.3} s  ({:?})",
        format_hms(probed.seconds),
        probed.seconds,
        probed.method
    );
    Ok(())
}

/// Prints the segment plan for a video or a given duration.
async fn plan(args: PlanArgs, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_and_validate(config_path, None)?;

    let length = args
        .length
        .resolve()
        .unwrap_or(config.defaults.segment_length_seconds);
    if length == 0 {
        anyhow::bail!("Segment duration must be greater than 0");
    }

    let duration = match (args.duration, &args.input) {
        (Some(duration), _) => duration,
        (None, Some(input)) => {
            FfmpegDurationProbe::from_config(&config)
                .probe(input)
                .await
                .with_context(|| format!("Could not determine duration of '{}'", input.display()))?
                .seconds
        }
        (None, None) => anyhow::bail!("Either an input file or --duration is required"),
    };

    let windows = planner::plan(duration, length)?;

    println!("Duration: {}", format_hms(duration));
    println!("Segment length: {}", format_hms(length as f64));
    for window in &windows {
        println!(
            "  {:03}  {} - {}  ({:.3} s)",
            window.index,
            format_hms(window.start_seconds),
            format_hms(window.end_seconds),
            window.duration()
        );
    }
    println!("Total segments: {}", windows.len());

    Ok(())
}

/// Reports whether the configured tools are usable.
async fn check(config_path: Option<&Path>) -> Result<()> {
    let config = config::load(config_path)?;

    let capabilities = SystemCapabilities::detect(&config.tools)
        .await
        .context("FFmpeg not found. Please install FFmpeg and ensure it's in your PATH.")?;

    println!("ffmpeg:  {}", capabilities.ffmpeg_version);
    if capabilities.ffprobe_available {
        println!("ffprobe: available");
    } else {
        println!("ffprobe: not available (durations will come from ffmpeg diagnostics)");
    }
    println!("encoders: {} detected", capabilities.available_encoders.len());

    let result = validate_config(&config, Some(&capabilities));
    println!("{}", report::format_report(&result));

    if !result.is_valid() {
        anyhow::bail!(error::ConfigError::ValidationFailed {
            error_count: result.error_count()
        });
    }
    Ok(())
}

/// Validates the configuration file and reports any issues.
async fn validate(config_path: Option<&Path>) -> Result<()> {
    let capabilities = match config::load(config_path) {
        Ok(config) => match SystemCapabilities::detect(&config.tools).await {
            Ok(capabilities) => Some(capabilities),
            Err(e) => {
                warn!(error = %e, "Skipping encoder availability checks");
                None
            }
        },
        Err(_) => None,
    };

    let config = config::load_and_validate(config_path, capabilities.as_ref())?;

    println!("Configuration is valid.");
    println!(
        "  segments: {} s, audio: {}, quality: {} (crf {})",
        config.defaults.segment_length_seconds,
        if config.defaults.keep_audio { "kept" } else { "stripped" },
        config.defaults.quality,
        config.encoding.quality.crf(config.defaults.quality)
    );
    println!(
        "  encoders: {} / {} -> .{}",
        config.encoding.video_codec, config.encoding.audio_codec, config.encoding.container
    );

    Ok(())
}

/// Displays the effective configuration.
fn show_config(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_and_validate(config_path, None)?;
    let yaml = serde_yaml::to_string(&config)?;
    println!("{}", yaml);
    Ok(())
}
