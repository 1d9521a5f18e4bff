//! Time-of-day detectors backed by per-segment tallies
//!
//! The tallies live in [`SegmentStats`], owned by the engine. They are
//! process-lifetime state rebuilt from the verification log on startup, so a
//! restart loses nothing.

use super::DetectorContext;
use crate::config::SegmentsConfig;
use crate::types::{DetectorKind, Outcome, Signal, TimeSegment};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
struct ObservedTally {
    high: u32,
    low: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct PredictionTally {
    total: u32,
    correct: u32,
    high_total: u32,
    high_correct: u32,
    low_total: u32,
    low_correct: u32,
}

/// Rolling per-segment tallies of observed outcomes and resolved predictions
#[derive(Debug, Default)]
pub struct SegmentStats {
    observed: HashMap<TimeSegment, ObservedTally>,
    predictions: HashMap<TimeSegment, PredictionTally>,
}

impl SegmentStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&mut self, segment: TimeSegment, outcome: Outcome) {
        let tally = self.observed.entry(segment).or_default();
        match outcome {
            Outcome::High => tally.high += 1,
            Outcome::Low => tally.low += 1,
        }
    }

    pub fn record_resolution(&mut self, segment: TimeSegment, predicted: Outcome, correct: bool) {
        let tally = self.predictions.entry(segment).or_default();
        tally.total += 1;
        if correct {
            tally.correct += 1;
        }
        match predicted {
            Outcome::High => {
                tally.high_total += 1;
                if correct {
                    tally.high_correct += 1;
                }
            }
            Outcome::Low => {
                tally.low_total += 1;
                if correct {
                    tally.low_correct += 1;
                }
            }
        }
    }

    pub fn observed_samples(&self, segment: TimeSegment) -> u32 {
        let tally = self.observed.get(&segment).copied().unwrap_or_default();
        tally.high + tally.low
    }

    /// Fraction of observed High outcomes in the segment, 0.5 with no data
    pub fn high_rate(&self, segment: TimeSegment) -> f64 {
        let tally = self.observed.get(&segment).copied().unwrap_or_default();
        let total = tally.high + tally.low;
        if total == 0 {
            0.5
        } else {
            tally.high as f64 / total as f64
        }
    }

    pub fn prediction_samples(&self, segment: TimeSegment) -> u32 {
        self.predictions
            .get(&segment)
            .map(|t| t.total)
            .unwrap_or(0)
    }

    /// Overall prediction accuracy in the segment, 0.5 with no data
    pub fn accuracy(&self, segment: TimeSegment) -> f64 {
        match self.predictions.get(&segment) {
            Some(t) if t.total > 0 => t.correct as f64 / t.total as f64,
            _ => 0.5,
        }
    }

    /// The direction that has verified better in this segment
    pub fn better_direction(&self, segment: TimeSegment) -> Outcome {
        let tally = self.predictions.get(&segment).copied().unwrap_or_default();
        let high_acc = if tally.high_total > 0 {
            tally.high_correct as f64 / tally.high_total as f64
        } else {
            0.0
        };
        let low_acc = if tally.low_total > 0 {
            tally.low_correct as f64 / tally.low_total as f64
        } else {
            0.0
        };
        if high_acc > low_acc {
            Outcome::High
        } else {
            Outcome::Low
        }
    }
}

/// Skewed outcome distribution in the current day segment
pub fn segment_skew(
    ctx: &DetectorContext,
    config: &SegmentsConfig,
    stats: &SegmentStats,
) -> Option<Signal> {
    let segment = TimeSegment::from_hour(ctx.hour);
    let samples = stats.observed_samples(segment);
    if (samples as usize) < config.min_skew_samples {
        return None;
    }

    let rate = stats.high_rate(segment);
    let deviation = (rate - 0.5).abs();
    if deviation <= 0.05 {
        return None;
    }

    let outcome = if rate > 0.5 {
        Outcome::High
    } else {
        Outcome::Low
    };
    let sample_factor = (samples as f64 / 20.0).min(1.0);
    let mut confidence = deviation * 2.0 * sample_factor;
    if deviation > 0.2 {
        confidence = (confidence + 0.1).min(0.85);
    }
    confidence = confidence.min(0.85);

    Some(Signal::new(
        DetectorKind::SegmentSkew,
        outcome,
        confidence,
        format!(
            "{} segment skews {:.0}% {} over {} samples",
            segment,
            rate.max(1.0 - rate) * 100.0,
            outcome,
            samples
        ),
    ))
}

/// Segment-level prediction accuracy, falling back to the configured lean
/// while the sample is still thin
pub fn segment_performance(
    ctx: &DetectorContext,
    config: &SegmentsConfig,
    stats: &SegmentStats,
) -> Option<Signal> {
    let segment = TimeSegment::from_hour(ctx.hour);
    let lean = config.leans.get(&segment)?;
    if !lean.enabled {
        return None;
    }

    let samples = stats.prediction_samples(segment);
    if (samples as usize) < config.min_performance_samples {
        if lean.confidence_boost <= 0.0 {
            return None;
        }
        return Some(Signal::new(
            DetectorKind::SegmentPerformance,
            lean.lean,
            lean.confidence_boost,
            format!("{} segment default lean {}", segment, lean.lean),
        ));
    }

    let outcome = stats.better_direction(segment);
    let confidence = (stats.accuracy(segment).max(0.5) + lean.confidence_boost).min(0.95);

    Some(Signal::new(
        DetectorKind::SegmentPerformance,
        outcome,
        confidence,
        format!(
            "{} segment favors {} over {} resolved predictions",
            segment, outcome, samples
        ),
    ))
}
