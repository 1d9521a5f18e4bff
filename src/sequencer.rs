//! Draw id sequencing
//!
//! Computes the id the next prediction targets. The result always moves
//! forward, even when upstream data is replayed or a prediction for a later
//! draw already exists, so two predictions can never target the same draw.

use crate::types::DrawId;

/// Next safe draw id after `current`.
///
/// Starts at `current + 1`, then bumps past `pending` (the outstanding
/// prediction's target) and `last_logged` (the newest id in the verification
/// log) when either is already at or beyond the computed value. Ids with a
/// different prefix are ignored for bumping; the sequence restarts each day.
///
/// Returns `None` when `current` is malformed. Pure and idempotent.
pub fn next_id(
    current: &str,
    pending: Option<&DrawId>,
    last_logged: Option<&DrawId>,
) -> Option<DrawId> {
    let current = DrawId::parse(current)?;
    let mut next = current.succ();

    for claimed in [pending, last_logged].into_iter().flatten() {
        if claimed.prefix() == next.prefix() && claimed.seq() >= next.seq() {
            next = next.with_seq(claimed.seq() + 1);
        }
    }

    Some(next)
}
