use std::time::Duration;

pub(crate) fn format_bytes(b: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * 1024 * 1024;

    if b >= GIB {
        return format!("{:.2}GiB", (b as f64) / (GIB as f64));
    }
    if b >= MIB {
        return format!("{:.2}MiB", (b as f64) / (MIB as f64));
    }
    if b >= KIB {
        return format!("{:.2}KiB", (b as f64) / (KIB as f64));
    }

    format!("{b}B")
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

/// Milliseconds with two decimals, as in the report.
pub(crate) fn format_ms(v: f64) -> String {
    format!("{v:.2} ms")
}

pub(crate) fn format_pct(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// Whole seconds, rendered by humantime (`1m 30s`).
pub(crate) fn format_duration(d: Duration) -> String {
    humantime::format_duration(Duration::from_secs(d.as_secs())).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_use_binary_units() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.00KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00MiB");
    }

    #[test]
    fn report_numbers_have_two_decimals() {
        assert_eq!(format_ms(12.345), "12.35 ms");
        assert_eq!(format_pct(0.0125), "1.25%");
        assert_eq!(format_rate(f64::NAN), "0");
    }

    #[test]
    fn durations_drop_subsecond_noise() {
        assert_eq!(format_duration(Duration::from_millis(90_400)), "1m 30s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
