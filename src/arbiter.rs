//! Arbitration: combining detector signals into one decision
//!
//! Selection runs in three stages whose order matters: a dynamic confidence
//! threshold filters the field, weighted scoring picks a winner, and only
//! then is the loss-streak override (reversal or maintain-direction) applied
//! to the already-selected winner.

use crate::config::{AnalysisConfig, DifficultPeriodConfig, FollowerConfig, StreakBreakConfig, WeightTable};
use crate::performance::PerformanceTracker;
use crate::types::{DetectorKind, Outcome, Signal};

/// Detectors with a historically strong track record get a flat bonus
const PRIORITY_KINDS: [DetectorKind; 5] = [
    DetectorKind::CombinationStreak,
    DetectorKind::CycleStride,
    DetectorKind::SpecialPattern,
    DetectorKind::StreakFollow,
    DetectorKind::AdaptiveLearning,
];

const PRIORITY_BONUS: f64 = 0.10;
const DIFFICULT_TIME_BONUS: f64 = 0.15;
const BLACKLIST_PENALTY: f64 = 0.20;

/// Per-cycle facts the arbiter needs beyond the signals themselves
#[derive(Debug, Clone)]
pub struct ArbitrationInputs<'a> {
    pub signals: &'a [Signal],
    pub hour: u32,
    pub recent_losses: u32,
    pub difficult_period: bool,
    /// Detector behind the most recent loss, set only once the loss streak
    /// has reached the streak-break threshold
    pub last_failed_kind: Option<DetectorKind>,
    /// Direction of the most recent logged prediction
    pub last_logged_direction: Option<Outcome>,
    /// Whether the streak follower currently holds an active follow
    pub follower_active: bool,
}

/// Direction override applied after selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakOverride {
    /// Winner inverted after a loss streak
    Reversed { original: Outcome },
    /// Winner forced to the last logged direction after a long loss streak
    Maintained { original: Outcome },
}

/// The cycle's final decision
#[derive(Debug, Clone)]
pub struct Arbitration {
    pub outcome: Outcome,
    pub kind: DetectorKind,
    pub combined_score: f64,
    pub rationale: String,
    pub threshold: f64,
    pub override_applied: Option<StreakOverride>,
}

pub struct Arbiter<'a> {
    analysis: &'a AnalysisConfig,
    weights: &'a WeightTable,
    streak_break: &'a StreakBreakConfig,
    follower: &'a FollowerConfig,
    difficult: &'a DifficultPeriodConfig,
    tracker: &'a PerformanceTracker,
}

impl<'a> Arbiter<'a> {
    pub fn new(
        analysis: &'a AnalysisConfig,
        weights: &'a WeightTable,
        streak_break: &'a StreakBreakConfig,
        follower: &'a FollowerConfig,
        difficult: &'a DifficultPeriodConfig,
        tracker: &'a PerformanceTracker,
    ) -> Self {
        Self {
            analysis,
            weights,
            streak_break,
            follower,
            difficult,
            tracker,
        }
    }

    /// The confidence bar a signal must clear this cycle. Only ever rises.
    pub fn dynamic_threshold(&self, hour: u32, recent_losses: u32, difficult: bool) -> f64 {
        let mut threshold = self.analysis.confidence_threshold;

        if self.analysis.dynamic_threshold
            && hour >= self.analysis.peak_hours_start
            && hour < self.analysis.peak_hours_end
        {
            threshold = threshold.max(self.analysis.peak_hours_threshold);
        }
        if recent_losses >= 2 {
            threshold = threshold.max(self.analysis.min_confidence_after_loss);
        }
        if difficult && self.difficult.enabled {
            threshold = threshold.max(self.difficult.confidence_threshold);
        }
        threshold
    }

    fn base_weight(&self, kind: DetectorKind, inputs: &ArbitrationInputs) -> f64 {
        if kind == DetectorKind::StreakFollow && inputs.follower_active {
            return self.follower.priority_weight;
        }
        self.weights.get(kind)
    }

    fn score(&self, signal: &Signal, inputs: &ArbitrationInputs) -> f64 {
        let weight = self.base_weight(signal.kind, inputs);

        let mut priority = if PRIORITY_KINDS.contains(&signal.kind) {
            PRIORITY_BONUS
        } else {
            0.0
        };
        if inputs.difficult_period
            && matches!(
                signal.kind,
                DetectorKind::SegmentSkew | DetectorKind::SegmentPerformance
            )
        {
            priority += DIFFICULT_TIME_BONUS;
        }

        let rate = self.tracker.success_rate(signal.kind);
        let performance = if rate > 0.6 { (rate - 0.5) * 0.5 } else { 0.0 };

        let penalty = if inputs.last_failed_kind == Some(signal.kind) && inputs.recent_losses > 1 {
            BLACKLIST_PENALTY
        } else {
            0.0
        };

        signal.confidence * (weight + priority + performance - penalty)
    }

    /// Select the cycle's prediction. `None` when no signals exist.
    pub fn arbitrate(&self, inputs: &ArbitrationInputs) -> Option<Arbitration> {
        if inputs.signals.is_empty() {
            return None;
        }

        let threshold =
            self.dynamic_threshold(inputs.hour, inputs.recent_losses, inputs.difficult_period);

        let qualifying: Vec<&Signal> = inputs
            .signals
            .iter()
            .filter(|s| s.confidence >= threshold)
            .collect();

        let (winner, combined_score) = if !qualifying.is_empty() {
            // strictly-greater comparison keeps the first-seen signal on ties
            let mut best: Option<(&Signal, f64)> = None;
            for &signal in &qualifying {
                let score = self.score(signal, inputs);
                if best.map(|(_, s)| score > s).unwrap_or(true) {
                    best = Some((signal, score));
                }
            }
            best?
        } else {
            tracing::debug!(
                "no signal cleared threshold {:.2}, falling back to best weighted score",
                threshold
            );
            let mut best: Option<(&Signal, f64)> = None;
            for signal in inputs.signals {
                let score = signal.confidence * self.base_weight(signal.kind, inputs);
                if best.map(|(_, s)| score > s).unwrap_or(true) {
                    best = Some((signal, score));
                }
            }
            best?
        };

        let mut arbitration = Arbitration {
            outcome: winner.outcome,
            kind: winner.kind,
            combined_score,
            rationale: winner.rationale.clone(),
            threshold,
            override_applied: None,
        };
        self.apply_streak_override(&mut arbitration, inputs);

        Some(arbitration)
    }

    /// Loss-streak override, applied to the selected winner only.
    ///
    /// Maintain-direction (long streaks) takes precedence over inversion.
    fn apply_streak_override(&self, arbitration: &mut Arbitration, inputs: &ArbitrationInputs) {
        if !self.streak_break.enabled {
            return;
        }
        let losses = inputs.recent_losses;

        if losses >= self.streak_break.long_loss_threshold
            && self.streak_break.maintain_direction_after_losses
        {
            if let Some(direction) = inputs.last_logged_direction {
                if direction != arbitration.outcome {
                    tracing::info!(
                        "maintaining {} after {} consecutive losses (was {})",
                        direction,
                        losses,
                        arbitration.outcome
                    );
                    arbitration.override_applied = Some(StreakOverride::Maintained {
                        original: arbitration.outcome,
                    });
                    arbitration.outcome = direction;
                    arbitration.rationale =
                        format!("{} (direction maintained after {} losses)", arbitration.rationale, losses);
                }
            }
        } else if losses >= self.streak_break.max_consecutive_failures
            && self.streak_break.reverse_after_streak
        {
            let original = arbitration.outcome;
            arbitration.outcome = original.invert();
            arbitration.override_applied = Some(StreakOverride::Reversed { original });
            arbitration.rationale =
                format!("{} (reversed after {} losses)", arbitration.rationale, losses);
            tracing::info!(
                "reversing {} to {} after {} consecutive losses",
                original,
                arbitration.outcome,
                losses
            );
        }
    }
}
