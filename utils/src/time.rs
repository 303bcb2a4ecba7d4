//! Time formatting helpers.

use qvote_types::Timestamp;

/// Format a duration in seconds to a human-readable string.
pub fn format_duration(secs: u64) -> String {
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3_599 => format!("{}m {}s", secs / 60, secs % 60),
        3_600..=86_399 => format!("{}h {}m", secs / 3_600, (secs % 3_600) / 60),
        _ => format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3_600),
    }
}

/// "Ended" once `end_time` has passed, otherwise the time left.
pub fn time_remaining(end_time: Timestamp, now: Timestamp) -> String {
    match end_time.remaining_from(now) {
        0 => "Ended".to_string(),
        secs => format!("{} left", format_duration(secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_unit() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(7_260), "2h 1m");
        assert_eq!(format_duration(90_000), "1d 1h");
    }

    #[test]
    fn remaining_reports_ended() {
        let end = Timestamp::new(1_000);
        assert_eq!(time_remaining(end, Timestamp::new(1_000)), "Ended");
        assert_eq!(time_remaining(end, Timestamp::new(2_000)), "Ended");
        assert_eq!(time_remaining(end, Timestamp::new(940)), "1m 0s left");
    }
}
