pub mod error;
pub mod timeunit;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch, the unit report formats use for timestamps.
pub fn epoch_millis(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::default())
        .as_millis()
}

/// Multiplies a duration by a (non negative) factor, saturating instead of panicking.
pub fn scale(duration: Duration, factor: f64) -> Duration {
    if !(factor.is_finite() && factor > 0.0) {
        return duration;
    }
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}
