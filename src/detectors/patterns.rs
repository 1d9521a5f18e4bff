//! Fixed-pattern and distribution detectors

use super::{outcome_string, DetectorContext};
use crate::config::{MeanReversionConfig, SpecialPatternRule};
use crate::types::{DetectorKind, Outcome, Signal};

/// Exact-prefix lookup against the configured pattern table.
///
/// Rules are checked in table order, so longer patterns should be listed
/// before their prefixes.
pub fn special_pattern(ctx: &DetectorContext, rules: &[SpecialPatternRule]) -> Option<Signal> {
    if ctx.outcomes.len() < 3 {
        return None;
    }
    let recent = outcome_string(ctx.outcomes, 6);

    for rule in rules {
        if !rule.pattern.is_empty() && recent.starts_with(&rule.pattern) {
            return Some(Signal::new(
                DetectorKind::SpecialPattern,
                rule.outcome,
                rule.confidence,
                format!("pattern {} matched, predicting {}", rule.pattern, rule.outcome),
            ));
        }
    }
    None
}

/// Follow a dominant side when one outcome holds 70% or more of the window
pub fn majority_trend(ctx: &DetectorContext, history_limit: usize) -> Option<Signal> {
    if ctx.outcomes.len() < 5 {
        return None;
    }
    let window = &ctx.outcomes[..ctx.outcomes.len().min(history_limit)];
    let highs = window.iter().filter(|o| **o == Outcome::High).count();
    let rate = highs as f64 / window.len() as f64;

    let (outcome, share) = if rate >= 0.7 {
        (Outcome::High, rate)
    } else if rate <= 0.3 {
        (Outcome::Low, 1.0 - rate)
    } else {
        return None;
    };

    Some(Signal::new(
        DetectorKind::MajorityTrend,
        outcome,
        0.75,
        format!(
            "{} holds {:.0}% of the window, following the trend",
            outcome,
            share * 100.0
        ),
    ))
}

/// Regression toward balance after a skewed long window.
///
/// Predicts the minority side when the High/Low imbalance over the
/// configured window exceeds the threshold.
pub fn mean_reversion(ctx: &DetectorContext, config: &MeanReversionConfig) -> Option<Signal> {
    if !config.enabled || ctx.outcomes.len() < config.window {
        return None;
    }
    let window = &ctx.outcomes[..config.window];
    let highs = window.iter().filter(|o| **o == Outcome::High).count();
    let lows = window.len() - highs;
    let imbalance = (highs as f64 - lows as f64).abs() / window.len() as f64;

    if imbalance <= config.threshold {
        return None;
    }

    let outcome = if lows > highs {
        Outcome::High
    } else {
        Outcome::Low
    };
    let confidence = (config.min_confidence
        + imbalance * (config.max_confidence - config.min_confidence))
        .min(config.max_confidence);

    Some(Signal::new(
        DetectorKind::MeanReversion,
        outcome,
        confidence,
        format!(
            "imbalance {:.0}% over {} draws, expecting reversion to {}",
            imbalance * 100.0,
            window.len(),
            outcome
        ),
    ))
}
