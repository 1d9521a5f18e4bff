//! Rolling per-detector accuracy tracking
//!
//! Each detector kind gets a bounded counter pair. When the sample count
//! exceeds the window, both counters are rescaled back to the window size,
//! which keeps recency weighting without discarding history entirely.

use crate::types::DetectorKind;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Sample ceiling per detector
const SAMPLE_WINDOW: u32 = 50;

#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceEntry {
    pub total: u32,
    pub correct: u32,
}

impl PerformanceEntry {
    fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
        if self.total > SAMPLE_WINDOW {
            let ratio = SAMPLE_WINDOW as f64 / self.total as f64;
            self.correct = (self.correct as f64 * ratio).round() as u32;
            self.total = SAMPLE_WINDOW;
        }
    }

    fn rate(&self) -> f64 {
        if self.total == 0 {
            0.5
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Default)]
pub struct PerformanceTracker {
    entries: RwLock<HashMap<DetectorKind, PerformanceEntry>>,
}

/// Shared handle: written by the verifier, read by the arbiter and detectors
pub type SharedTracker = Arc<PerformanceTracker>;

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedTracker {
        Arc::new(Self::new())
    }

    pub fn record(&self, kind: DetectorKind, correct: bool) {
        self.entries.write().entry(kind).or_default().record(correct);
    }

    /// Success rate in [0, 1]; 0.5 with no data.
    pub fn success_rate(&self, kind: DetectorKind) -> f64 {
        self.entries
            .read()
            .get(&kind)
            .map(PerformanceEntry::rate)
            .unwrap_or(0.5)
    }

    pub fn entry(&self, kind: DetectorKind) -> PerformanceEntry {
        self.entries.read().get(&kind).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rate_is_half() {
        let tracker = PerformanceTracker::new();
        assert_eq!(tracker.success_rate(DetectorKind::SwitchRate), 0.5);
    }

    #[test]
    fn test_rate_reflects_results() {
        let tracker = PerformanceTracker::new();
        tracker.record(DetectorKind::CycleStride, true);
        tracker.record(DetectorKind::CycleStride, true);
        tracker.record(DetectorKind::CycleStride, false);
        tracker.record(DetectorKind::CycleStride, true);
        assert_eq!(tracker.success_rate(DetectorKind::CycleStride), 0.75);
    }

    #[test]
    fn test_kinds_are_independent() {
        let tracker = PerformanceTracker::new();
        tracker.record(DetectorKind::Sandwich, false);
        assert_eq!(tracker.success_rate(DetectorKind::Sandwich), 0.0);
        assert_eq!(tracker.success_rate(DetectorKind::CycleStride), 0.5);
    }

    #[test]
    fn test_renormalization_caps_total() {
        let tracker = PerformanceTracker::new();
        for i in 0..80 {
            tracker.record(DetectorKind::LongStreak, i % 2 == 0);
        }
        let entry = tracker.entry(DetectorKind::LongStreak);
        assert_eq!(entry.total, SAMPLE_WINDOW);
        assert!(entry.correct <= SAMPLE_WINDOW);
        let rate = tracker.success_rate(DetectorKind::LongStreak);
        assert!((rate - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_renormalization_preserves_skew() {
        let tracker = PerformanceTracker::new();
        for _ in 0..100 {
            tracker.record(DetectorKind::SpecialPattern, true);
        }
        assert_eq!(tracker.success_rate(DetectorKind::SpecialPattern), 1.0);
    }
}
