//! Cyclical detectors: fixed-stride repetition and half-window replication

use super::DetectorContext;
use crate::types::{DetectorKind, Signal};

/// Recency weight for position `i` (newest first)
fn recency_weight(i: usize) -> f64 {
    0.8f64.powi(i as i32)
}

struct StrideScan {
    stride: usize,
    matches: usize,
    weighted_confidence: f64,
    accuracy: f64,
}

fn scan_stride(window: &[crate::types::Outcome], stride: usize) -> StrideScan {
    let mut matches = 0;
    let mut weighted_confidence = 0.0;
    let mut confirmed = 0;

    let mut i = 0;
    while i + stride < window.len() {
        if window[i] == window[i + stride] {
            matches += 1;
            weighted_confidence += (recency_weight(i) + recency_weight(i + stride)) / 2.0;
            // A match also seen one stride earlier counts as a confirmation.
            if i >= stride && window[i - stride] == window[i] {
                confirmed += 1;
            }
        }
        i += stride;
    }

    let accuracy = if matches > 0 {
        confirmed as f64 / matches as f64
    } else {
        0.0
    };

    StrideScan {
        stride,
        matches,
        weighted_confidence,
        accuracy,
    }
}

/// Stride-2 / stride-3 repetition over the last seven outcomes.
///
/// Picks the better-supported stride and predicts the value at the symmetric
/// offset within the cycle.
pub fn cycle_stride(ctx: &DetectorContext) -> Option<Signal> {
    if ctx.outcomes.len() < 5 {
        return None;
    }
    let window = &ctx.outcomes[..ctx.outcomes.len().min(7)];

    let mut scans = [scan_stride(window, 2), scan_stride(window, 3)];
    scans.sort_by(|a, b| {
        let score_a = a.accuracy * 0.7 + a.weighted_confidence * 0.3;
        let score_b = b.accuracy * 0.7 + b.weighted_confidence * 0.3;
        score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
    });

    let best = scans
        .iter()
        .find(|s| s.matches > 0 && s.weighted_confidence > 0.25)?;

    let offset = window.len() % best.stride;
    let predicted = window[offset];
    let confidence = (best.weighted_confidence * (0.8 + best.accuracy * 0.2)).min(0.85);

    Some(Signal::new(
        DetectorKind::CycleStride,
        predicted,
        confidence,
        format!(
            "stride-{} cycle with {} matches, predicting {}",
            best.stride, best.matches, predicted
        ),
    ))
}

/// Half-window replication over the raw digits.
///
/// When the newest five digits largely repeat the five before them, the
/// sequence is treated as cycling and the draw that followed the earlier
/// half predicts the next outcome.
pub fn pattern_replication(ctx: &DetectorContext) -> Option<Signal> {
    const WINDOW: usize = 10;
    const HALF: usize = WINDOW / 2;
    const MIN_MATCHES: usize = 3;

    if ctx.draws.len() < WINDOW {
        return None;
    }

    let matches = (0..HALF)
        .filter(|&i| ctx.draws[i].digit == ctx.draws[i + HALF].digit)
        .count();
    if matches < MIN_MATCHES {
        return None;
    }

    let predicted = ctx.draws[HALF].outcome();
    let confidence = (0.75 + (matches - MIN_MATCHES) as f64 * 0.05).min(0.95);

    Some(Signal::new(
        DetectorKind::PatternReplication,
        predicted,
        confidence,
        format!(
            "{}/{} digits replicated across half-windows",
            matches, HALF
        ),
    ))
}
