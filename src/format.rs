//! Human-readable byte counts.

const UNITS: [(u64, &str); 4] = [
    (1_000_000_000_000, "TB"),
    (1_000_000_000, "GB"),
    (1_000_000, "MB"),
    (1_000, "KB"),
];

/// Renders a byte count using decimal (power of 1000) units.
///
/// ```
/// assert_eq!(hdfsync::format_size(999), "999 bytes");
/// assert_eq!(hdfsync::format_size(1_500), "1.50 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    let mut larger: Option<(u64, &str)> = None;
    for (threshold, unit) in UNITS {
        if bytes >= threshold {
            let value = bytes as f64 / threshold as f64;
            // 999.995 and above would print as 1000.00 in this unit
            if value >= 999.995 {
                if let Some((next, next_unit)) = larger {
                    return format!("{:.2} {}", bytes as f64 / next as f64, next_unit);
                }
            }
            return format!("{:.2} {}", value, unit);
        }
        larger = Some((threshold, unit));
    }
    format!("{} bytes", bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_boundaries() {
        assert_eq!(format_size(0), "0 bytes");
        assert_eq!(format_size(999), "999 bytes");
        assert_eq!(format_size(1_000), "1.00 KB");
        assert_eq!(format_size(1_000_000), "1.00 MB");
        assert_eq!(format_size(1_000_000_000), "1.00 GB");
        assert_eq!(format_size(1_000_000_000_000), "1.00 TB");
    }

    #[test]
    fn test_rounding_moves_up_a_unit() {
        assert_eq!(format_size(999_994), "999.99 KB");
        assert_eq!(format_size(999_999), "1.00 MB");
        assert_eq!(format_size(999_999_999), "1.00 GB");
        assert_eq!(format_size(999_999_999_999), "1.00 TB");
    }

    #[test]
    fn test_large_values_stay_in_terabytes() {
        assert_eq!(format_size(27_000_000_000_000_000), "27000.00 TB");
    }
}
