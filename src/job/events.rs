//! Job events and the sinks that receive them.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::debug;

/// Receives one-way notifications from a running job.
///
/// Calls arrive from the worker task in run order: for every attempted
/// window, a progress and log call, then a segment-completed call on success.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    /// Overall progress, 0-100.
    fn on_progress(&self, percent: u8);

    /// Short description of the current phase.
    fn on_status(&self, text: &str);

    /// User-facing log line.
    fn on_log(&self, text: &str);

    /// A segment file was written.
    fn on_segment_completed(&self, path: &Path, index: u32);

    /// Terminal notification, sent exactly once per run.
    fn on_finished(&self, success: bool, message: &str);
}

/// Owned form of an [`EventSink`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Progress(u8),
    Status(String),
    Log(String),
    SegmentCompleted { path: PathBuf, index: u32 },
    Finished { success: bool, message: String },
}

/// Forwards events over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that observes it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: JobEvent) {
        // The receiver going away must not disturb the job.
        if self.tx.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

impl EventSink for ChannelSink {
    fn on_progress(&self, percent: u8) {
        self.send(JobEvent::Progress(percent));
    }

    fn on_status(&self, text: &str) {
        self.send(JobEvent::Status(text.to_string()));
    }

    fn on_log(&self, text: &str) {
        self.send(JobEvent::Log(text.to_string()));
    }

    fn on_segment_completed(&self, path: &Path, index: u32) {
        self.send(JobEvent::SegmentCompleted {
            path: path.to_path_buf(),
            index,
        });
    }

    fn on_finished(&self, success: bool, message: &str) {
        self.send(JobEvent::Finished {
            success,
            message: message.to_string(),
        });
    }
}
