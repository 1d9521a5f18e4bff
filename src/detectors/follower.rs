//! Streak following after repeated overall losses
//!
//! When reversal-biased detectors keep losing, the history is usually in a
//! sticky run. This detector switches stance and rides the run instead,
//! with its own failure counter independent of the overall loss streak.

use super::{leading_run, DetectorContext};
use crate::config::FollowerConfig;
use crate::types::{DetectorKind, Outcome, Signal};

/// Process-lifetime follow state, owned by the engine
#[derive(Debug, Default)]
pub struct FollowerState {
    following: Option<Outcome>,
    failures: u32,
}

impl FollowerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_following(&self) -> bool {
        self.following.is_some()
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Feed back the resolution of a follow prediction
    pub fn observe_resolution(&mut self, correct: bool) {
        if self.following.is_none() {
            return;
        }
        if correct {
            self.failures = 0;
        } else {
            self.failures += 1;
        }
    }

    fn abandon(&mut self) {
        self.following = None;
        self.failures = 0;
    }
}

/// Follow an active run of identical outcomes instead of reversing it.
///
/// Armed only after the configured number of overall consecutive losses.
/// Once a follow starts, the remembered side is kept across cycles until the
/// detector itself misses too often.
pub fn streak_follow(
    ctx: &DetectorContext,
    config: &FollowerConfig,
    state: &mut FollowerState,
) -> Option<Signal> {
    if !config.enabled || ctx.outcomes.len() < 3 {
        return None;
    }
    if ctx.recent_losses < config.activate_after_losses {
        return None;
    }

    if let Some(side) = state.following {
        if state.failures >= config.max_consecutive_failures {
            tracing::info!(
                "abandoning {} follow after {} misses",
                side,
                state.failures
            );
            state.abandon();
            return None;
        }
        let confidence = if state.failures == 0 {
            (config.confidence + 0.05).min(0.95)
        } else {
            (config.confidence - 0.03 * state.failures as f64).max(0.65)
        };
        return Some(Signal::new(
            DetectorKind::StreakFollow,
            side,
            confidence,
            format!(
                "continuing to follow the {} run after {} overall losses",
                side, ctx.recent_losses
            ),
        ));
    }

    let run = leading_run(ctx.outcomes);
    if run < config.min_streak_length {
        return None;
    }
    let side = ctx.outcomes[0];
    state.following = Some(side);
    state.failures = 0;

    Some(Signal::new(
        DetectorKind::StreakFollow,
        side,
        config.confidence,
        format!(
            "following the {} run of {} after {} overall losses",
            side, run, ctx.recent_losses
        ),
    ))
}
