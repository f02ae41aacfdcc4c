use std::time::{Duration, Instant};

/// Bottom of the metered range; anything quieter reads as 0%.
pub const FLOOR_DBFS: f64 = -60.0;

const FULL_SCALE: f64 = 32768.0;

/// RMS of the frame in dBFS, clamped to `[FLOOR_DBFS, 0]`.
pub fn rms_dbfs(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return FLOOR_DBFS;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    let normalized = (rms / FULL_SCALE).max(1e-9);
    (20.0 * normalized.log10()).clamp(FLOOR_DBFS, 0.0)
}

/// Input level as a percentage: -60 dBFS maps to 0, 0 dBFS to 100.
pub fn level_percent(samples: &[i16]) -> u8 {
    let dbfs = rms_dbfs(samples);
    let level = ((dbfs - FLOOR_DBFS) / -FLOOR_DBFS * 100.0).round();
    level.clamp(0.0, 100.0) as u8
}

/// Lets an event through at most once per interval.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns true (and arms the limiter) if an event may fire at `now`.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// The next call to `ready` fires immediately.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: i16, len: usize) -> Vec<i16> {
        vec![value; len]
    }

    #[test]
    fn silence_is_zero() {
        assert_eq!(level_percent(&constant(0, 480)), 0);
        assert_eq!(level_percent(&[]), 0);
    }

    #[test]
    fn full_scale_square_wave_is_hundred() {
        let square: Vec<i16> = (0..480)
            .map(|i| if (i / 24) % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        assert_eq!(level_percent(&square), 100);
    }

    #[test]
    fn level_is_monotonic_in_amplitude() {
        let mut previous = 0;
        for amplitude in [1i16, 10, 33, 100, 330, 1000, 3300, 10000, 20000, 32767] {
            let level = level_percent(&constant(amplitude, 256));
            assert!(level >= previous, "amplitude {amplitude}: {level} < {previous}");
            previous = level;
        }
        assert_eq!(previous, 100);
    }

    #[test]
    fn minus_thirty_dbfs_is_half() {
        // 32768 * 10^(-30/20) ≈ 1036
        assert_eq!(level_percent(&constant(1036, 100)), 50);
    }

    #[test]
    fn dbfs_is_clamped() {
        approx::assert_abs_diff_eq!(rms_dbfs(&constant(0, 10)), FLOOR_DBFS);
        approx::assert_abs_diff_eq!(rms_dbfs(&constant(i16::MIN, 10)), 0.0);
    }

    #[test]
    fn rate_limiter_spaces_events() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Duration::from_millis(100));

        assert!(limiter.ready(start));
        assert!(!limiter.ready(start + Duration::from_millis(50)));
        assert!(limiter.ready(start + Duration::from_millis(100)));
        assert!(!limiter.ready(start + Duration::from_millis(150)));

        limiter.reset();
        assert!(limiter.ready(start + Duration::from_millis(160)));
    }
}
