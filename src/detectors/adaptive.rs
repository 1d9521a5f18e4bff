//! Adaptive pattern learning over the resolved-draw history
//!
//! The [`PatternBook`] mines 3-outcome subsequences from the actual outcomes
//! recorded in the verification log and remembers how often each one was
//! followed by High or Low. Only well-sampled, skewed patterns are trusted.
//! Per-pattern confidence drifts up on hits and down on misses within fixed
//! bounds. The book is process-lifetime state, rebuilt from the log on
//! startup without semantic loss.

use super::DetectorContext;
use crate::config::AdaptiveConfig;
use crate::types::{DetectorKind, Outcome, Signal};
use std::collections::{HashMap, VecDeque};

/// Patterns only fire above this confidence
const FIRE_THRESHOLD: f64 = 0.65;

/// Bound on the retained actual-outcome tail
const HISTORY_CAP: usize = 512;

const KEY_LEN: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
struct PatternStat {
    high: u32,
    low: u32,
    /// Learned confidence adjustment from live feedback
    delta: f64,
}

impl PatternStat {
    fn total(&self) -> u32 {
        self.high + self.low
    }

    fn high_share(&self) -> f64 {
        if self.total() == 0 {
            0.5
        } else {
            self.high as f64 / self.total() as f64
        }
    }
}

#[derive(Debug)]
pub struct PatternBook {
    config: AdaptiveConfig,
    counts: HashMap<String, PatternStat>,
    /// Actual outcomes in chronological order, newest at the back
    recent: VecDeque<Outcome>,
    /// Pattern behind the most recent fired signal, for feedback routing
    last_fired: Option<String>,
}

impl PatternBook {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self {
            config,
            counts: HashMap::new(),
            recent: VecDeque::new(),
            last_fired: None,
        }
    }

    /// Feed one resolved actual outcome, in chronological order
    pub fn push_actual(&mut self, outcome: Outcome) {
        self.recent.push_back(outcome);
        if self.recent.len() > HISTORY_CAP {
            self.recent.pop_front();
        }
        if self.recent.len() >= KEY_LEN + 1 {
            let tail: Vec<Outcome> = self
                .recent
                .iter()
                .skip(self.recent.len() - (KEY_LEN + 1))
                .copied()
                .collect();
            let key: String = tail[..KEY_LEN].iter().map(|o| o.as_char()).collect();
            let stat = self.counts.entry(key).or_default();
            match tail[KEY_LEN] {
                Outcome::High => stat.high += 1,
                Outcome::Low => stat.low += 1,
            }
        }
    }

    /// Rebuild from the chronological actual outcomes of the log
    pub fn rebuild<I: IntoIterator<Item = Outcome>>(&mut self, outcomes: I) {
        self.counts.clear();
        self.recent.clear();
        self.last_fired = None;
        for outcome in outcomes {
            self.push_actual(outcome);
        }
    }

    /// Adjust the confidence of the pattern behind the last fired signal
    pub fn apply_feedback(&mut self, correct: bool) {
        let Some(key) = self.last_fired.take() else {
            return;
        };
        let (inc, dec, min, max) = (
            self.config.confidence_increment,
            self.config.confidence_decrement,
            self.config.min_confidence,
            self.config.max_confidence,
        );
        if let Some(stat) = self.counts.get_mut(&key) {
            let base = stat.high_share().max(1.0 - stat.high_share());
            let current = (base + stat.delta).clamp(min, max);
            let adjusted = if correct {
                (current + inc).min(max)
            } else {
                (current - dec).max(min)
            };
            stat.delta = adjusted - base;
        }
    }

    fn lookup(&self, newest_first: &[Outcome]) -> Option<(String, Outcome, f64)> {
        if newest_first.len() < KEY_LEN {
            return None;
        }
        // keys are chronological, the context window is newest first
        let key: String = newest_first[..KEY_LEN]
            .iter()
            .rev()
            .map(|o| o.as_char())
            .collect();
        let stat = self.counts.get(&key)?;
        if stat.total() < self.config.min_occurrences {
            return None;
        }
        let share = stat.high_share();
        let skew = share.max(1.0 - share);
        if skew < self.config.min_skew {
            return None;
        }
        let confidence =
            (skew + stat.delta).clamp(self.config.min_confidence, self.config.max_confidence);
        if confidence <= FIRE_THRESHOLD {
            return None;
        }
        let outcome = if share >= 0.5 {
            Outcome::High
        } else {
            Outcome::Low
        };
        Some((key, outcome, confidence))
    }
}

/// Predict from a mined 3-outcome subsequence when the newest outcomes match
/// a trusted pattern
pub fn adaptive_learning(
    ctx: &DetectorContext,
    config: &AdaptiveConfig,
    book: &mut PatternBook,
) -> Option<Signal> {
    if !config.enabled || ctx.outcomes.len() < KEY_LEN {
        return None;
    }

    let (key, outcome, confidence) = book.lookup(ctx.outcomes)?;
    let rationale = format!(
        "learned pattern \"{}\" predicts {} ({:.0}%)",
        key,
        outcome,
        confidence * 100.0
    );
    book.last_fired = Some(key);

    Some(Signal::new(
        DetectorKind::AdaptiveLearning,
        outcome,
        confidence,
        rationale,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_util::*;
    use crate::performance::PerformanceTracker;

    fn book_with_pattern(followups: &[Outcome]) -> PatternBook {
        // seed "HHL" -> followup, repeated
        let mut book = PatternBook::new(AdaptiveConfig::default());
        for follow in followups {
            book.push_actual(Outcome::High);
            book.push_actual(Outcome::High);
            book.push_actual(Outcome::Low);
            book.push_actual(*follow);
            // break the stream so no other pattern accumulates
            book.recent.clear();
        }
        book
    }

    #[test]
    fn test_learns_skewed_pattern() {
        let mut book = book_with_pattern(&[Outcome::High; 6]);
        let tracker = PerformanceTracker::new();
        // newest-first window L H H corresponds to chronological H H L
        let draws = draws_from("LHHHH");
        let outcomes = outcomes_from("LHHHH");
        let ctx = context(&draws, &outcomes, &tracker);

        let signal = adaptive_learning(&ctx, &AdaptiveConfig::default(), &mut book).unwrap();
        assert_eq!(signal.outcome, Outcome::High);
        assert!(signal.confidence > 0.65);
    }

    #[test]
    fn test_ignores_undersampled_pattern() {
        let mut book = book_with_pattern(&[Outcome::High; 3]);
        let tracker = PerformanceTracker::new();
        let draws = draws_from("LHHHH");
        let outcomes = outcomes_from("LHHHH");
        let ctx = context(&draws, &outcomes, &tracker);
        assert!(adaptive_learning(&ctx, &AdaptiveConfig::default(), &mut book).is_none());
    }

    #[test]
    fn test_ignores_balanced_pattern() {
        let mut book = book_with_pattern(&[
            Outcome::High,
            Outcome::Low,
            Outcome::High,
            Outcome::Low,
            Outcome::High,
            Outcome::Low,
        ]);
        let tracker = PerformanceTracker::new();
        let draws = draws_from("LHHHH");
        let outcomes = outcomes_from("LHHHH");
        let ctx = context(&draws, &outcomes, &tracker);
        assert!(adaptive_learning(&ctx, &AdaptiveConfig::default(), &mut book).is_none());
    }

    #[test]
    fn test_feedback_moves_confidence_within_bounds() {
        let mut book = book_with_pattern(&[Outcome::High; 8]);
        let tracker = PerformanceTracker::new();
        let draws = draws_from("LHHHH");
        let outcomes = outcomes_from("LHHHH");
        let ctx = context(&draws, &outcomes, &tracker);
        let config = AdaptiveConfig::default();

        let before = adaptive_learning(&ctx, &config, &mut book)
            .unwrap()
            .confidence;
        book.apply_feedback(false);
        let after = adaptive_learning(&ctx, &config, &mut book)
            .unwrap()
            .confidence;
        assert!((before - after - config.confidence_decrement).abs() < 1e-9);

        // repeated misses never sink below the floor
        for _ in 0..20 {
            if adaptive_learning(&ctx, &config, &mut book).is_none() {
                break;
            }
            book.apply_feedback(false);
        }
        // the stored confidence is clamped at min even after many misses
        let stat = book.counts.get("HHL").unwrap();
        let base = stat.high_share().max(1.0 - stat.high_share());
        assert!(base + stat.delta >= config.min_confidence - 1e-9);
    }

    #[test]
    fn test_rebuild_replays_history() {
        let mut book = PatternBook::new(AdaptiveConfig::default());
        let mut stream = Vec::new();
        for _ in 0..6 {
            stream.extend_from_slice(&[
                Outcome::Low,
                Outcome::Low,
                Outcome::High,
                Outcome::High,
            ]);
        }
        book.rebuild(stream);

        // chronological L L H appears repeatedly, followed by High
        let tracker = PerformanceTracker::new();
        let draws = draws_from("HLLLL");
        let outcomes = outcomes_from("HLLLL");
        let ctx = context(&draws, &outcomes, &tracker);
        let signal =
            adaptive_learning(&ctx, &AdaptiveConfig::default(), &mut book).unwrap();
        assert_eq!(signal.outcome, Outcome::High);
    }
}
