//! Assignment commit
//!
//! Algorithm for [`commit`]:
//! 1. Begin a transaction and load the slot with its day
//! 2. Refuse locked slots
//! 3. Validate every entry, accumulating slot cost
//! 4. Refuse the batch when the total exceeds capacity
//! 5. Replace the assignment set, guarded by the slot version read in step 1
//! 6. Commit, or roll back on any failure
//!
//! Each accepted call replaces the previous assignment set; it never merges.

use std::collections::HashSet;

use poc_common::{AssignmentEntry, ShiftSlot};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use super::validator::{validate, AssignmentRequest};
use super::{with_timeout, RosterSettings};
use crate::db::shifts;
use crate::error::{Rejection, Result, RosterError};

/// Result of an accepted commit
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub shift: ShiftSlot,
    pub slots_used: u32,
    pub slots_free: u32,
}

impl CommitOutcome {
    fn new(shift: ShiftSlot) -> Self {
        let slots_used = shift.slots_used();
        let slots_free = shift.capacity.saturating_sub(slots_used);
        Self {
            shift,
            slots_used,
            slots_free,
        }
    }
}

/// Partial update of a slot's label, capacity or lock flag
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotUpdate {
    #[serde(default, alias = "turno")]
    pub label: Option<String>,
    #[serde(default, alias = "capacidad")]
    pub capacity: Option<u32>,
    #[serde(default, alias = "bloqueado")]
    pub locked: Option<bool>,
}

/// Validate `requests` and atomically replace the slot's assignment set
pub async fn commit(
    pool: &SqlitePool,
    settings: &RosterSettings,
    shift_id: Uuid,
    requests: &[AssignmentRequest],
) -> Result<CommitOutcome> {
    if requests.is_empty() {
        let msg = "At least one assignment is required".to_string();
        return Err(RosterError::Validation(msg));
    }

    let result = with_timeout(settings.db_timeout, async {
        let mut tx = pool.begin().await?;
        let outcome = commit_in_tx(&mut tx, shift_id, requests).await;
        finish(tx, outcome).await
    })
    .await;

    match &result {
        Ok(outcome) => info!(
            shift_id = %shift_id,
            entries = outcome.shift.assignments.len(),
            slots_used = outcome.slots_used,
            slots_free = outcome.slots_free,
            "Committed shift assignments"
        ),
        Err(e) => log_refusal(shift_id, "commit", e),
    }

    result
}

async fn commit_in_tx(
    conn: &mut SqliteConnection,
    shift_id: Uuid,
    requests: &[AssignmentRequest],
) -> Result<CommitOutcome> {
    let mut slot = load_unlocked(conn, shift_id).await?;

    let mut entries = Vec::with_capacity(requests.len());
    let mut seated = HashSet::new();
    let mut requested = 0u32;
    for request in requests {
        let validated = validate(conn, request, slot.date, &slot.label).await?;
        for id in occupants(&validated.entry) {
            if !seated.insert(id) {
                return Err(Rejection::DuplicatePublisher(id).into());
            }
        }
        requested += validated.slot_cost;
        entries.push(validated.entry);
    }

    if requested > slot.capacity {
        return Err(RosterError::CapacityExceeded {
            capacity: slot.capacity,
            requested,
        });
    }

    slot.version = store(conn, &slot, &entries).await?;
    slot.assignments = entries;

    Ok(CommitOutcome::new(slot))
}

/// Publishers an entry places on the shift
///
/// A guardian is seated only by their own entry, so one adult may cover
/// several minors.
fn occupants(entry: &AssignmentEntry) -> Vec<Uuid> {
    match entry {
        AssignmentEntry::MinorWithGuardian { publisher_id, .. } => vec![*publisher_id],
        other => other.participants(),
    }
}

/// Empty a slot's assignment set
pub async fn clear(
    pool: &SqlitePool,
    settings: &RosterSettings,
    shift_id: Uuid,
) -> Result<CommitOutcome> {
    let result = with_timeout(settings.db_timeout, async {
        let mut tx = pool.begin().await?;
        let outcome = clear_in_tx(&mut tx, shift_id).await;
        finish(tx, outcome).await
    })
    .await;

    match &result {
        Ok(_) => info!(shift_id = %shift_id, "Cleared shift assignments"),
        Err(e) => log_refusal(shift_id, "clear", e),
    }

    result
}

async fn clear_in_tx(conn: &mut SqliteConnection, shift_id: Uuid) -> Result<CommitOutcome> {
    let mut slot = load_unlocked(conn, shift_id).await?;
    slot.version = store(conn, &slot, &[]).await?;
    slot.assignments.clear();
    Ok(CommitOutcome::new(slot))
}

/// Change a slot's label, capacity or lock flag
///
/// Capacity may not drop below the cost of the stored assignment set.
/// Allowed on locked slots so they can be unlocked.
pub async fn update_slot(
    pool: &SqlitePool,
    settings: &RosterSettings,
    shift_id: Uuid,
    update: SlotUpdate,
) -> Result<CommitOutcome> {
    let result = with_timeout(settings.db_timeout, async {
        let mut tx = pool.begin().await?;
        let outcome = update_in_tx(&mut tx, shift_id, update).await;
        finish(tx, outcome).await
    })
    .await;

    match &result {
        Ok(outcome) => info!(
            shift_id = %shift_id,
            capacity = outcome.shift.capacity,
            locked = outcome.shift.locked,
            "Updated shift slot"
        ),
        Err(e) => log_refusal(shift_id, "update", e),
    }

    result
}

async fn update_in_tx(
    conn: &mut SqliteConnection,
    shift_id: Uuid,
    update: SlotUpdate,
) -> Result<CommitOutcome> {
    let mut slot = shifts::get_shift(conn, shift_id)
        .await?
        .ok_or_else(|| RosterError::NotFound(format!("Shift {}", shift_id)))?;

    if let Some(label) = update.label {
        let label = label.trim().to_string();
        if label.is_empty() {
            return Err(RosterError::Validation("Shift label cannot be empty".to_string()));
        }
        slot.label = label;
    }
    if let Some(capacity) = update.capacity {
        if capacity == 0 {
            return Err(RosterError::Validation("Capacity must be positive".to_string()));
        }
        let used = slot.slots_used();
        if used > capacity {
            return Err(RosterError::CapacityExceeded {
                capacity,
                requested: used,
            });
        }
        slot.capacity = capacity;
    }
    if let Some(locked) = update.locked {
        slot.locked = locked;
    }

    slot.version = shifts::update_slot_settings(
        conn,
        slot.id,
        slot.version,
        &slot.label,
        slot.capacity,
        slot.locked,
    )
    .await?
    .ok_or_else(|| conflict(shift_id))?;

    Ok(CommitOutcome::new(slot))
}

async fn load_unlocked(conn: &mut SqliteConnection, shift_id: Uuid) -> Result<ShiftSlot> {
    let slot = shifts::get_shift(conn, shift_id)
        .await?
        .ok_or_else(|| RosterError::NotFound(format!("Shift {}", shift_id)))?;

    if slot.locked {
        return Err(RosterError::Locked(shift_id));
    }

    Ok(slot)
}

/// Write `entries` against the version read earlier in this transaction
async fn store(
    conn: &mut SqliteConnection,
    slot: &ShiftSlot,
    entries: &[AssignmentEntry],
) -> Result<i64> {
    shifts::replace_assignments(conn, slot.id, slot.version, entries)
        .await?
        .ok_or_else(|| conflict(slot.id))
}

fn conflict(shift_id: Uuid) -> RosterError {
    RosterError::Conflict(format!(
        "Shift {} was modified concurrently; reload and retry",
        shift_id
    ))
}

/// Commit on success; otherwise roll back before returning the error
async fn finish<T>(tx: Transaction<'_, Sqlite>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

fn log_refusal(shift_id: Uuid, operation: &str, err: &RosterError) {
    match err {
        RosterError::Internal(msg) => {
            tracing::error!(shift_id = %shift_id, operation, "Storage failure: {}", msg)
        }
        e if e.is_retryable() => {
            warn!(shift_id = %shift_id, operation, "Retryable failure: {}", e)
        }
        e => warn!(shift_id = %shift_id, operation, "Refused: {}", e),
    }
}
