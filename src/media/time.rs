//! Clock-time formatting and parsing.

/// Formats seconds as `HH:MM:SS`, truncating any fraction.
///
/// Negative and non-finite inputs format as `00:00:00`.
pub fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Parses `HH:MM:SS` or `HH:MM:SS.fraction` into seconds.
///
/// Minutes and whole seconds must be below 60.
pub fn parse_hms(value: &str) -> Option<f64> {
    let mut parts = value.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds_str = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    // Rejects signs, exponents and "inf" that f64::from_str would accept.
    if seconds_str.is_empty() || !seconds_str.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let seconds: f64 = seconds_str.parse().ok()?;

    if minutes >= 60 || seconds >= 60.0 {
        return None;
    }

    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}
