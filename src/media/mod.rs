//! Media inspection: duration probing and clock-time helpers.

pub mod probe;
pub mod time;

pub use probe::{DurationProbe, FfmpegDurationProbe, ProbeMethod, Probed};
