//! Alternation detectors: switch-rate bands and short flip patterns

use super::{outcome_string, switch_fraction, DetectorContext};
use crate::types::{DetectorKind, Signal};

/// Switch-rate bands over the last ten outcomes.
///
/// A high switch rate keeps flipping: predict the opposite of the latest
/// outcome. A low switch rate keeps trending: predict the same.
pub fn switch_rate(ctx: &DetectorContext) -> Option<Signal> {
    if ctx.outcomes.len() < 5 {
        return None;
    }
    let window = &ctx.outcomes[..ctx.outcomes.len().min(10)];
    let rate = switch_fraction(window);
    let latest = window[0];

    if rate >= 0.7 {
        let confidence = (0.65 + (rate - 0.7) * 2.0).min(0.85);
        Some(Signal::new(
            DetectorKind::SwitchRate,
            latest.invert(),
            confidence,
            format!("switch rate {:.0}%, predicting another flip", rate * 100.0),
        ))
    } else if rate <= 0.3 {
        let confidence = (0.65 + (0.3 - rate) * 2.0).min(0.85);
        Some(Signal::new(
            DetectorKind::SwitchRate,
            latest,
            confidence,
            format!("switch rate {:.0}%, predicting continuation", rate * 100.0),
        ))
    } else {
        None
    }
}

/// Five strictly alternating outcomes: predict the alternation continues
pub fn perfect_alternation(ctx: &DetectorContext) -> Option<Signal> {
    if ctx.outcomes.len() < 5 {
        return None;
    }
    let window = &ctx.outcomes[..5];
    if window.windows(2).any(|w| w[0] == w[1]) {
        return None;
    }
    Some(Signal::new(
        DetectorKind::PerfectAlternation,
        window[0].invert(),
        0.85,
        format!(
            "perfect alternation {}, continuing the pattern",
            outcome_string(window, 5)
        ),
    ))
}

/// A-B-A in the last three outcomes: predict A again
pub fn sandwich(ctx: &DetectorContext) -> Option<Signal> {
    if ctx.outcomes.len() < 3 {
        return None;
    }
    let (a, b, c) = (ctx.outcomes[0], ctx.outcomes[1], ctx.outcomes[2]);
    if a == c && a != b {
        Some(Signal::new(
            DetectorKind::Sandwich,
            a,
            0.82,
            format!("{}-{}-{} sandwich, predicting {}", a, b, a, a),
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_util::*;
    use crate::performance::PerformanceTracker;
    use crate::types::Outcome;

    #[test]
    fn test_switch_rate_high_predicts_flip() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HLHLHLHLHL");
        let outcomes = outcomes_from("HLHLHLHLHL");
        let ctx = context(&draws, &outcomes, &tracker);

        let signal = switch_rate(&ctx).unwrap();
        assert_eq!(signal.outcome, Outcome::Low);
        assert_eq!(signal.confidence, 0.85);
    }

    #[test]
    fn test_switch_rate_low_predicts_continuation() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HHHHHHHHHL");
        let outcomes = outcomes_from("HHHHHHHHHL");
        let ctx = context(&draws, &outcomes, &tracker);

        let signal = switch_rate(&ctx).unwrap();
        assert_eq!(signal.outcome, Outcome::High);
        assert!(signal.confidence > 0.65);
    }

    #[test]
    fn test_switch_rate_silent_in_middle_band() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HHLHHLHLLH");
        let outcomes = outcomes_from("HHLHHLHLLH");
        let ctx = context(&draws, &outcomes, &tracker);
        assert!(switch_rate(&ctx).is_none());
    }

    #[test]
    fn test_perfect_alternation_continues() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("LHLHL");
        let outcomes = outcomes_from("LHLHL");
        let ctx = context(&draws, &outcomes, &tracker);

        let signal = perfect_alternation(&ctx).unwrap();
        assert_eq!(signal.outcome, Outcome::High);
        assert_eq!(signal.confidence, 0.85);
    }

    #[test]
    fn test_perfect_alternation_rejects_broken_pattern() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("LHLHH");
        let outcomes = outcomes_from("LHLHH");
        let ctx = context(&draws, &outcomes, &tracker);
        assert!(perfect_alternation(&ctx).is_none());
    }

    #[test]
    fn test_sandwich_predicts_outer_value() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HLHHH");
        let outcomes = outcomes_from("HLHHH");
        let ctx = context(&draws, &outcomes, &tracker);

        let signal = sandwich(&ctx).unwrap();
        assert_eq!(signal.outcome, Outcome::High);
        assert_eq!(signal.confidence, 0.82);
    }

    #[test]
    fn test_sandwich_needs_distinct_middle() {
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HHHLL");
        let outcomes = outcomes_from("HHHLL");
        let ctx = context(&draws, &outcomes, &tracker);
        assert!(sandwich(&ctx).is_none());
    }
}
