//! Partitioning of a source timeline into segment windows.

use serde::Serialize;

use crate::error::PlanError;

/// Windows of this length or shorter are dropped from a plan.
pub const MIN_WINDOW_SECONDS: f64 = 1.0;

/// Upper bound on windows in one plan. A duration needing more is not a real
/// video (over eleven days at one-second segments).
pub const MAX_WINDOWS: u64 = 1_000_000;

/// A half-open interval `[start_seconds, end_seconds)` of the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentWindow {
    /// 1-based chronological position in the undropped partition.
    pub index: u32,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl SegmentWindow {
    /// Length of the window in seconds.
    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Splits `[0, total_duration)` into consecutive windows of `segment_length` seconds.
///
/// The last window is clamped to `total_duration` and dropped when it is
/// [`MIN_WINDOW_SECONDS`] or shorter. A non-positive duration or a zero
/// length yields an empty plan; more than [`MAX_WINDOWS`] windows is an error.
pub fn plan(total_duration: f64, segment_length: u64) -> Result<Vec<SegmentWindow>, PlanError> {
    if !total_duration.is_finite() || total_duration <= 0.0 || segment_length == 0 {
        return Ok(Vec::new());
    }

    let length = segment_length as f64;
    let count = (total_duration / length).ceil();
    if count > MAX_WINDOWS as f64 {
        return Err(PlanError::TooManyWindows {
            count,
            limit: MAX_WINDOWS,
        });
    }
    let count = count as u32;

    let windows = (1..=count)
        .filter_map(|index| {
            let start = f64::from(index - 1) * length;
            let end = (start + length).min(total_duration);

            (end - start > MIN_WINDOW_SECONDS).then_some(SegmentWindow {
                index,
                start_seconds: start,
                end_seconds: end,
            })
        })
        .collect();

    Ok(windows)
}
