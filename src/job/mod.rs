//! Split jobs: request validation, the run loop and its events.

pub mod controller;
pub mod events;
pub mod handle;
pub mod model;

pub use controller::{JobController, JobPhase};
pub use events::{ChannelSink, EventSink, JobEvent};
pub use handle::JobHandle;
pub use model::{JobConfig, JobReport, JobRequest, JobStatus, MediaSource, SegmentOutcome};
