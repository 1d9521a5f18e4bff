//! Outcome verification
//!
//! Resolves the outstanding prediction against newly observed draws. The
//! keyed verification log makes resolution idempotent: a draw id that is
//! already logged returns its recorded verdict without touching the tracker
//! or any downstream state.

use crate::error::Result;
use crate::performance::PerformanceTracker;
use crate::store::{VerificationLog, VerificationRecord};
use crate::types::{Draw, DrawId, PredictionRecord};
use chrono::Utc;

/// What resolving a prediction against history produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// First resolution: logged and fed back
    Resolved { correct: bool },
    /// Benign duplicate: the recorded verdict, nothing updated
    AlreadyResolved { correct: bool },
    /// The actual draw has not been observed yet
    Pending,
}

impl Resolution {
    pub fn correct(&self) -> Option<bool> {
        match self {
            Resolution::Resolved { correct } | Resolution::AlreadyResolved { correct } => {
                Some(*correct)
            }
            Resolution::Pending => None,
        }
    }

    pub fn is_first_resolution(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// Find the draw matching a prediction's target id.
///
/// Ids are normalized (disambiguation suffixes stripped) before comparison,
/// with a digits-only comparison as a fallback for formatting drift between
/// collectors.
fn find_actual<'a>(target: &DrawId, history: &'a [Draw]) -> Option<&'a Draw> {
    if let Some(draw) = history.iter().find(|d| &d.id == target) {
        return Some(draw);
    }
    let target_digits: String = target
        .to_string()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    history.iter().find(|d| {
        let digits: String = d
            .id
            .to_string()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        digits == target_digits
    })
}

/// Resolve `record` against `history`.
///
/// On first resolution the verdict is appended to the log and recorded in
/// the performance tracker. Repeat calls for the same draw are no-ops that
/// return the original verdict.
pub async fn resolve(
    record: &PredictionRecord,
    history: &[Draw],
    log: &mut VerificationLog,
    tracker: &PerformanceTracker,
) -> Result<Resolution> {
    if let Some(existing) = log.verdict(&record.draw_id) {
        tracing::debug!(
            "{} already resolved ({})",
            record.draw_id,
            if existing.correct { "correct" } else { "wrong" }
        );
        return Ok(Resolution::AlreadyResolved {
            correct: existing.correct,
        });
    }

    let Some(actual) = find_actual(&record.draw_id, history) else {
        return Ok(Resolution::Pending);
    };

    let correct = record.outcome == actual.outcome();
    log.append(VerificationRecord {
        draw_id: record.draw_id.clone(),
        predicted: record.outcome,
        actual: actual.outcome(),
        correct,
        kind: record.kind,
        combined_score: record.combined_score,
        stake: record.stake,
        timestamp: Utc::now(),
    })
    .await?;
    tracker.record(record.kind, correct);

    tracing::info!(
        "resolved {}: predicted {} actual {} ({}) via {}",
        record.draw_id,
        record.outcome,
        actual.outcome(),
        if correct { "correct" } else { "wrong" },
        record.kind
    );

    Ok(Resolution::Resolved { correct })
}
