//! Wall-clock timestamps used by action logs.

use chrono::Utc;

/// Current wall-clock time in epoch milliseconds, with sub-millisecond precision.
pub fn now_ms() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_monotonic_enough() {
        let first = now_ms();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = now_ms();
        assert!(second > first);
        // 2020-01-01 in epoch ms
        assert!(first > 1_577_836_800_000.0);
    }
}
