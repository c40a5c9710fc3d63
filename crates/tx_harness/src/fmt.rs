//! Human-readable sizes, rates and durations for the demo dashboards.

use std::time::Duration;

const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while unit < UNITS.len() - 1 && value >= 1024.0 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

pub fn format_throughput(bytes: u64, elapsed: Duration) -> String {
    if elapsed.is_zero() {
        return "n/a".to_string();
    }
    let mut rate = bytes as f64 / elapsed.as_secs_f64();
    let mut unit = 0;
    while unit < UNITS.len() - 1 && rate >= 1024.0 {
        rate /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}/s", rate, UNITS[unit])
}

pub fn format_duration(elapsed: Duration) -> String {
    let total_ns = elapsed.as_nanos();
    if total_ns == 0 {
        return "0 ns".to_string();
    }

    let parts: [(u128, &str); 7] = [
        (total_ns / 86_400_000_000_000, "d"),
        (total_ns / 3_600_000_000_000 % 24, "h"),
        (total_ns / 60_000_000_000 % 60, "min"),
        (total_ns / 1_000_000_000 % 60, "s"),
        (total_ns / 1_000_000 % 1_000, "ms"),
        (total_ns / 1_000 % 1_000, "us"),
        (total_ns % 1_000, "ns"),
    ];

    let mut out = String::new();
    for (value, suffix) in parts {
        if value > 0 {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&format!("{} {}", value, suffix));
        }
    }
    out
}
