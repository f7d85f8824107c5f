// SPDX-License-Identifier: GPL-3.0-only

//! Repeated-result suppression
//!
//! Decode backends re-emit the same physical code many times per second
//! while it sits in front of the camera. The debouncer gates those repeats
//! before they reach the normalizer.

use std::time::{Duration, Instant};

/// Suppresses delivery of an identical raw result within an interval
///
/// The interval is backend-dependent (see [`crate::constants::debounce`]).
/// State resets on session stop/start.
#[derive(Debug)]
pub struct ScanDebouncer {
    interval: Duration,
    last_text: Option<String>,
    last_at: Option<Instant>,
}

impl ScanDebouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_text: None,
            last_at: None,
        }
    }

    /// Whether a raw result should be forwarded to the normalizer
    ///
    /// Accepted results become the new reference point; a different text
    /// always passes, an identical text passes only once the interval has
    /// elapsed since the last acceptance.
    pub fn admit(&mut self, raw: &str) -> bool {
        self.admit_at(raw, Instant::now())
    }

    /// Clock-injected variant for tests
    pub fn admit_at(&mut self, raw: &str, now: Instant) -> bool {
        let repeat_within_interval = match (&self.last_text, self.last_at) {
            (Some(text), Some(at)) => {
                text == raw && now.saturating_duration_since(at) < self.interval
            }
            _ => false,
        };

        if repeat_within_interval {
            return false;
        }

        self.last_text = Some(raw.to_owned());
        self.last_at = Some(now);
        true
    }

    /// Forget the last accepted result; called on session stop/start
    pub fn reset(&mut self) {
        self.last_text = None;
        self.last_at = None;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(400);

    #[test]
    fn identical_repeat_within_interval_is_suppressed() {
        let mut debouncer = ScanDebouncer::new(INTERVAL);
        let start = Instant::now();
        assert!(debouncer.admit_at("WH967843EU2ZMM", start));
        assert!(!debouncer.admit_at("WH967843EU2ZMM", start + Duration::from_millis(100)));
    }

    #[test]
    fn identical_repeat_after_interval_passes() {
        let mut debouncer = ScanDebouncer::new(INTERVAL);
        let start = Instant::now();
        assert!(debouncer.admit_at("12345678", start));
        assert!(debouncer.admit_at("12345678", start + Duration::from_millis(401)));
    }

    #[test]
    fn different_text_always_passes() {
        let mut debouncer = ScanDebouncer::new(INTERVAL);
        let start = Instant::now();
        assert!(debouncer.admit_at("12345678", start));
        assert!(debouncer.admit_at("87654321", start + Duration::from_millis(10)));
        // The new text is now the reference point
        assert!(!debouncer.admit_at("87654321", start + Duration::from_millis(20)));
    }

    #[test]
    fn reset_clears_suppression() {
        let mut debouncer = ScanDebouncer::new(INTERVAL);
        let start = Instant::now();
        assert!(debouncer.admit_at("12345678", start));
        debouncer.reset();
        assert!(debouncer.admit_at("12345678", start + Duration::from_millis(1)));
    }
}
