//! Run-based detectors: reversal after identical-outcome runs

use super::{leading_run, DetectorContext};
use crate::config::DetectorsConfig;
use crate::types::{DetectorKind, Outcome, Signal};
use rand::rngs::StdRng;
use rand::Rng;

/// Reversal after a run of three or more identical outcomes.
///
/// Confidence grows with the run length, capped by configuration.
pub fn combination_streak(ctx: &DetectorContext, config: &DetectorsConfig) -> Option<Signal> {
    if ctx.outcomes.len() < 3 {
        return None;
    }
    let run = leading_run(ctx.outcomes);
    if run < 3 {
        return None;
    }

    let side = ctx.outcomes[0];
    let bonus = (config.streak_bonus_per_extra * (run - 3) as f64).min(config.streak_bonus_cap);
    let confidence = config.streak_confidence + bonus;

    Some(Signal::new(
        DetectorKind::CombinationStreak,
        side.invert(),
        confidence,
        format!("run of {} {} outcomes, predicting reversal", run, side),
    ))
}

/// Reversal after exactly two identical outcomes
pub fn double_streak(ctx: &DetectorContext) -> Option<Signal> {
    if leading_run(ctx.outcomes) != 2 {
        return None;
    }
    let side = ctx.outcomes[0];
    Some(Signal::new(
        DetectorKind::DoubleStreak,
        side.invert(),
        0.73,
        format!("two consecutive {} outcomes, predicting reversal", side),
    ))
}

#[derive(Debug, Clone, Copy)]
struct Run {
    high: bool,
    len: usize,
    start: usize,
}

/// Long-run analysis over up to 15 outcomes.
///
/// Estimates a reversal probability for the longest recent run, blending a
/// length-based prior with the empirical reversal rate of similar past runs,
/// then lets the injected RNG decide between reversing and continuing. The
/// signal's confidence is how far the estimate sits from a coin flip.
pub fn long_streak(ctx: &DetectorContext, rng: &mut StdRng) -> Option<Signal> {
    if ctx.outcomes.len() < 4 {
        return None;
    }
    let window = &ctx.outcomes[..ctx.outcomes.len().min(15)];

    let mut runs: Vec<Run> = Vec::new();
    let mut current = Run {
        high: window[0] == Outcome::High,
        len: 1,
        start: 0,
    };
    for (i, outcome) in window.iter().enumerate().skip(1) {
        let high = *outcome == Outcome::High;
        if high == current.high {
            current.len += 1;
        } else {
            runs.push(current);
            current = Run {
                high,
                len: 1,
                start: i,
            };
        }
    }
    runs.push(current);

    let longest = runs
        .iter()
        .filter(|r| r.start < 7)
        .max_by_key(|r| r.len)
        .copied()?;
    if longest.len < 2 {
        return None;
    }

    // Length-based prior, then blend with what similar past runs actually did.
    let mut reverse_prob = (0.3 + longest.len as f64 * 0.1).min(0.8);
    let similar: Vec<&Run> = runs
        .iter()
        .filter(|r| {
            r.high == longest.high
                && r.start > longest.start
                && r.len.abs_diff(longest.len) <= 1
        })
        .collect();
    if !similar.is_empty() {
        let reversals = similar
            .iter()
            .filter(|r| {
                let after = r.start + r.len;
                after < window.len() && (window[after] == Outcome::High) != r.high
            })
            .count();
        let empirical = reversals as f64 / similar.len() as f64;
        reverse_prob = 0.3 * reverse_prob + 0.7 * empirical;
    }

    // Track record feedback: flip when this detector has been losing, push
    // away from a coin flip when it has been winning.
    let rate = ctx.tracker.success_rate(DetectorKind::LongStreak);
    if rate < 0.45 {
        reverse_prob = 1.0 - reverse_prob;
    } else if rate >= 0.6 {
        if reverse_prob > 0.5 {
            reverse_prob = (reverse_prob + 0.1).min(0.9);
        } else if reverse_prob < 0.5 {
            reverse_prob = (reverse_prob - 0.1).max(0.1);
        }
    }

    // A window dominated by the run's own side argues for continuation.
    let highs = window
        .iter()
        .filter(|o| **o == Outcome::High)
        .count();
    let dominance = highs as f64 / window.len() as f64;
    if (longest.high && dominance >= 0.65) || (!longest.high && dominance <= 0.35) {
        reverse_prob = (reverse_prob - 0.15).max(0.2);
    }

    let run_side = if longest.high { Outcome::High } else { Outcome::Low };
    let reverse = rng.random::<f64>() < reverse_prob;
    let outcome = if reverse { run_side.invert() } else { run_side };
    let confidence = (reverse_prob - 0.5).abs() * 2.0;

    Some(Signal::new(
        DetectorKind::LongStreak,
        outcome,
        confidence,
        format!(
            "{} run of {} ({}% reversal estimate)",
            run_side,
            longest.len,
            (reverse_prob * 100.0).round()
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_util::*;
    use crate::performance::PerformanceTracker;
    use crate::types::Outcome;
    use rand::SeedableRng;

    fn ctx_for<'a>(
        draws: &'a [crate::types::Draw],
        outcomes: &'a [Outcome],
        tracker: &'a PerformanceTracker,
    ) -> DetectorContext<'a> {
        context(draws, outcomes, tracker)
    }

    #[test]
    fn test_combination_streak_reverses_triple_high() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HHHLH");
        let outcomes = outcomes_from("HHHLH");
        let ctx = ctx_for(&draws, &outcomes, &tracker);

        let signal = combination_streak(&ctx, &DetectorsConfig::default()).unwrap();
        assert_eq!(signal.outcome, Outcome::Low);
        assert_eq!(signal.confidence, 0.80);
    }

    #[test]
    fn test_combination_streak_confidence_grows_with_run() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HHHHHL");
        let outcomes = outcomes_from("HHHHHL");
        let ctx = ctx_for(&draws, &outcomes, &tracker);

        let signal = combination_streak(&ctx, &DetectorsConfig::default()).unwrap();
        assert_eq!(signal.outcome, Outcome::Low);
        assert!((signal.confidence - 0.86).abs() < 1e-9);
    }

    #[test]
    fn test_combination_streak_bonus_is_capped() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("LLLLLLLLLL");
        let outcomes = outcomes_from("LLLLLLLLLL");
        let ctx = ctx_for(&draws, &outcomes, &tracker);

        let signal = combination_streak(&ctx, &DetectorsConfig::default()).unwrap();
        assert_eq!(signal.outcome, Outcome::High);
        assert!((signal.confidence - 0.89).abs() < 1e-9);
    }

    #[test]
    fn test_combination_streak_needs_three() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HHLHL");
        let outcomes = outcomes_from("HHLHL");
        let ctx = ctx_for(&draws, &outcomes, &tracker);
        assert!(combination_streak(&ctx, &DetectorsConfig::default()).is_none());
    }

    #[test]
    fn test_double_streak_fires_only_on_exact_pair() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HHLHL");
        let outcomes = outcomes_from("HHLHL");
        let ctx = ctx_for(&draws, &outcomes, &tracker);
        let signal = double_streak(&ctx).unwrap();
        assert_eq!(signal.outcome, Outcome::Low);
        assert_eq!(signal.confidence, 0.73);

        let draws = draws_from("HHHLL");
        let outcomes = outcomes_from("HHHLL");
        let ctx = ctx_for(&draws, &outcomes, &tracker);
        assert!(double_streak(&ctx).is_none());
    }

    #[test]
    fn test_long_streak_is_deterministic_with_seed() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HHHHLLHLHLHLLHH");
        let outcomes = outcomes_from("HHHHLLHLHLHLLHH");
        let ctx = ctx_for(&draws, &outcomes, &tracker);

        let a = long_streak(&ctx, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = long_streak(&ctx, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn test_long_streak_needs_a_run() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HLHL");
        let outcomes = outcomes_from("HLHL");
        let ctx = ctx_for(&draws, &outcomes, &tracker);
        assert!(long_streak(&ctx, &mut StdRng::seed_from_u64(1)).is_none());
    }
}
