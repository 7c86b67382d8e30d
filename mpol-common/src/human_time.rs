//! Human-readable time and size formatting
//!
//! Provides the display strings used by the playback progress readout and
//! the upload queue rows.

const SECONDS_PER_HOUR: u64 = 3600;

/// Format a playback position as `M:SS`, or `H:MM:SS` from one hour up.
///
/// Negative, NaN and infinite inputs render as `0:00`; fractional seconds are
/// truncated so the readout never runs ahead of the audio.
///
/// # Examples
///
/// ```
/// use mpol_common::human_time::format_clock;
///
/// assert_eq!(format_clock(0.0), "0:00");
/// assert_eq!(format_clock(42.9), "0:42");
/// assert_eq!(format_clock(190.0), "3:10");
/// assert_eq!(format_clock(3725.0), "1:02:05");
/// ```
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };

    let hours = total / SECONDS_PER_HOUR;
    let minutes = (total % SECONDS_PER_HOUR) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Format an optional duration; unknown durations render as `0:00`
pub fn format_clock_opt(seconds: Option<f64>) -> String {
    seconds.map(format_clock).unwrap_or_else(|| format_clock(0.0))
}

/// Format a byte count with a binary unit (`B`, `KB`, `MB`, `GB`)
///
/// # Examples
///
/// ```
/// use mpol_common::human_time::format_file_size;
///
/// assert_eq!(format_file_size(0), "0 B");
/// assert_eq!(format_file_size(1536), "1.50 KB");
/// assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_minutes() {
        assert_eq!(format_clock(5.0), "0:05");
        assert_eq!(format_clock(59.999), "0:59");
        assert_eq!(format_clock(60.0), "1:00");
        assert_eq!(format_clock(599.0), "9:59");
        assert_eq!(format_clock(3599.0), "59:59");
    }

    #[test]
    fn test_clock_hours() {
        assert_eq!(format_clock(3600.0), "1:00:00");
        assert_eq!(format_clock(36000.0 + 61.0), "10:01:01");
    }

    #[test]
    fn test_clock_invalid_inputs() {
        assert_eq!(format_clock(-3.0), "0:00");
        assert_eq!(format_clock(f64::NAN), "0:00");
        assert_eq!(format_clock(f64::INFINITY), "0:00");
        assert_eq!(format_clock_opt(None), "0:00");
        assert_eq!(format_clock_opt(Some(61.0)), "1:01");
    }

    #[test]
    fn test_file_size_units() {
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(1024), "1.00 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(
            format_file_size(u64::MAX),
            format!("{:.2} GB", u64::MAX as f64 / 1024f64.powi(3))
        );
    }
}
