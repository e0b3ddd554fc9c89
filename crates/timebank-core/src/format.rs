/// Render a balance as `H:MM:SS` when at least an hour remains, else `M:SS`.
pub fn format_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_balances_omit_hours() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(59), "0:59");
        assert_eq!(format_time(61), "1:01");
        assert_eq!(format_time(3599), "59:59");
    }

    #[test]
    fn long_balances_include_hours() {
        assert_eq!(format_time(3600), "1:00:00");
        assert_eq!(format_time(7505), "2:05:05");
        assert_eq!(format_time(36_000), "10:00:00");
    }
}
