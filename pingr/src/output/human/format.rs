use std::time::Duration;

pub(crate) fn format_bytes(b: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;

    if b >= MIB {
        return format!("{:.2}MiB", (b as f64) / (MIB as f64));
    }
    if b >= KIB {
        return format!("{:.2}KiB", (b as f64) / (KIB as f64));
    }

    format!("{b}B")
}

pub(crate) fn format_latency_ms(ms: Option<f64>) -> String {
    match ms {
        Some(v) if v.is_finite() && v >= 1000.0 => format!("{:.2}s", v / 1000.0),
        Some(v) if v.is_finite() => format!("{v:.2}ms"),
        _ => "n/a".to_string(),
    }
}

pub(crate) fn format_qps(qps: u64) -> String {
    if qps == 0 {
        "unlimited".to_string()
    } else {
        qps.to_string()
    }
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

/// Single rounded component in ms or s.
pub(crate) fn format_elapsed(d: Duration) -> String {
    let ms = d.as_millis();
    if ms >= 1000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        format!("{ms}ms")
    }
}

/// Local wall-clock time of a unix second, falling back to the raw number.
pub(crate) fn format_local_second(unix_second: i64) -> String {
    use chrono::TimeZone as _;

    chrono::Local
        .timestamp_opt(unix_second, 0)
        .single()
        .map_or_else(
            || unix_second.to_string(),
            |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_latency_and_sizes() {
        assert_eq!(format_latency_ms(None), "n/a");
        assert_eq!(format_latency_ms(Some(12.345)), "12.35ms");
        assert_eq!(format_latency_ms(Some(1500.0)), "1.50s");
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.00KiB");
        assert_eq!(format_qps(0), "unlimited");
        assert_eq!(format_elapsed(Duration::from_millis(250)), "250ms");
        assert_eq!(format_elapsed(Duration::from_millis(1250)), "1.25s");
    }
}
