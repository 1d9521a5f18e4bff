//! Signal detectors
//!
//! Fifteen independent heuristics over a trailing outcome window. Each one
//! is a synchronous function returning at most one [`Signal`]; errors and
//! insufficient data yield `None` and never abort the cycle. Three detectors
//! keep small named caches (follower state, adaptive pattern book, time
//! segment tallies) owned by the engine and passed in mutably.

pub mod adaptive;
pub mod alternation;
pub mod cycle;
pub mod follower;
pub mod patterns;
pub mod streak;
pub mod time_of_day;

pub use adaptive::PatternBook;
pub use follower::FollowerState;
pub use time_of_day::SegmentStats;

use crate::config::Config;
use crate::performance::PerformanceTracker;
use crate::types::{Draw, Outcome, Signal};
use rand::rngs::StdRng;

/// Read-only inputs shared by every detector for one cycle
pub struct DetectorContext<'a> {
    /// Recent draws, newest first
    pub draws: &'a [Draw],
    /// Outcomes of `draws`, newest first
    pub outcomes: &'a [Outcome],
    /// Local wall-clock hour
    pub hour: u32,
    /// Overall consecutive prediction losses
    pub recent_losses: u32,
    pub tracker: &'a PerformanceTracker,
}

/// Mutable per-cycle detector state owned by the engine
pub struct DetectorCaches {
    pub follower: FollowerState,
    pub book: PatternBook,
    pub segments: SegmentStats,
}

/// Run every detector in its fixed arbitration order.
///
/// The order is load-bearing: arbitration breaks score ties in favor of the
/// first-seen signal.
pub fn run_all(
    ctx: &DetectorContext,
    config: &Config,
    rng: &mut StdRng,
    caches: &mut DetectorCaches,
) -> Vec<Signal> {
    let mut signals = Vec::new();

    let push = |signal: Option<Signal>, signals: &mut Vec<Signal>| {
        if let Some(signal) = signal {
            tracing::debug!(
                "signal {} -> {} ({:.2}): {}",
                signal.kind,
                signal.outcome,
                signal.confidence,
                signal.rationale
            );
            signals.push(signal);
        }
    };

    push(
        streak::combination_streak(ctx, &config.detectors),
        &mut signals,
    );
    push(streak::long_streak(ctx, rng), &mut signals);
    push(streak::double_streak(ctx), &mut signals);
    push(alternation::switch_rate(ctx), &mut signals);
    push(alternation::perfect_alternation(ctx), &mut signals);
    push(alternation::sandwich(ctx), &mut signals);
    push(cycle::cycle_stride(ctx), &mut signals);
    push(cycle::pattern_replication(ctx), &mut signals);
    push(
        patterns::special_pattern(ctx, &config.detectors.special_patterns),
        &mut signals,
    );
    push(
        patterns::majority_trend(ctx, config.analysis.history_limit),
        &mut signals,
    );
    push(
        patterns::mean_reversion(ctx, &config.analysis.mean_reversion),
        &mut signals,
    );
    push(
        time_of_day::segment_skew(ctx, &config.detectors.segments, &caches.segments),
        &mut signals,
    );
    push(
        time_of_day::segment_performance(ctx, &config.detectors.segments, &caches.segments),
        &mut signals,
    );
    push(
        follower::streak_follow(ctx, &config.follower, &mut caches.follower),
        &mut signals,
    );
    push(
        adaptive::adaptive_learning(ctx, &config.detectors.adaptive, &mut caches.book),
        &mut signals,
    );

    signals
}

/// Length of the run of identical outcomes at the head of the window
pub(crate) fn leading_run(outcomes: &[Outcome]) -> usize {
    match outcomes.first() {
        Some(first) => outcomes.iter().take_while(|o| *o == first).count(),
        None => 0,
    }
}

/// Fraction of adjacent pairs that differ, in [0, 1]
pub(crate) fn switch_fraction(outcomes: &[Outcome]) -> f64 {
    if outcomes.len() < 2 {
        return 0.0;
    }
    let switches = outcomes.windows(2).filter(|w| w[0] != w[1]).count();
    switches as f64 / (outcomes.len() - 1) as f64
}

/// Outcomes rendered as an H/L string, newest first
pub(crate) fn outcome_string(outcomes: &[Outcome], limit: usize) -> String {
    outcomes.iter().take(limit).map(|o| o.as_char()).collect()
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::types::DrawId;
    use chrono::Utc;

    /// Build draws from an H/L string, newest first
    pub fn draws_from(pattern: &str) -> Vec<Draw> {
        let base = DrawId::parse("202505091000").unwrap();
        pattern
            .chars()
            .enumerate()
            .map(|(i, c)| Draw {
                id: base.with_seq(base.seq() + (pattern.len() - i) as u32),
                digit: if c == 'H' { 7 } else { 2 },
                timestamp: Utc::now(),
            })
            .collect()
    }

    pub fn outcomes_from(pattern: &str) -> Vec<Outcome> {
        pattern
            .chars()
            .map(|c| {
                if c == 'H' {
                    Outcome::High
                } else {
                    Outcome::Low
                }
            })
            .collect()
    }

    pub fn context<'a>(
        draws: &'a [Draw],
        outcomes: &'a [Outcome],
        tracker: &'a PerformanceTracker,
    ) -> DetectorContext<'a> {
        DetectorContext {
            draws,
            outcomes,
            hour: 14,
            recent_losses: 0,
            tracker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn test_leading_run() {
        assert_eq!(leading_run(&outcomes_from("HHHLH")), 3);
        assert_eq!(leading_run(&outcomes_from("LHHH")), 1);
        assert_eq!(leading_run(&[]), 0);
    }

    #[test]
    fn test_switch_fraction() {
        assert_eq!(switch_fraction(&outcomes_from("HLHLH")), 1.0);
        assert_eq!(switch_fraction(&outcomes_from("HHHH")), 0.0);
        assert_eq!(switch_fraction(&outcomes_from("HHLL")), 1.0 / 3.0);
    }

    #[test]
    fn test_outcome_string() {
        assert_eq!(outcome_string(&outcomes_from("HHLLH"), 3), "HHL");
    }

    #[test]
    fn test_run_all_collects_in_fixed_order() {
        use rand::SeedableRng;

        let config = Config::default();
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HHHLHLLHHL");
        let outcomes = outcomes_from("HHHLHLLHHL");
        let ctx = context(&draws, &outcomes, &tracker);
        let mut rng = StdRng::seed_from_u64(7);
        let mut caches = DetectorCaches {
            follower: FollowerState::default(),
            book: PatternBook::new(config.detectors.adaptive.clone()),
            segments: SegmentStats::default(),
        };

        let signals = run_all(&ctx, &config, &mut rng, &mut caches);
        // a leading HHH run must at least trigger the streak and special
        // pattern detectors
        assert!(signals
            .iter()
            .any(|s| s.kind == crate::types::DetectorKind::CombinationStreak));
        assert!(signals
            .iter()
            .any(|s| s.kind == crate::types::DetectorKind::SpecialPattern));
        // order within the vec follows detector order
        let pos_streak = signals
            .iter()
            .position(|s| s.kind == crate::types::DetectorKind::CombinationStreak)
            .unwrap();
        let pos_special = signals
            .iter()
            .position(|s| s.kind == crate::types::DetectorKind::SpecialPattern)
            .unwrap();
        assert!(pos_streak < pos_special);
    }
}
