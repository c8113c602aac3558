//! Integration tests for the assignment engine
//!
//! Tests cover:
//! - Capacity accounting at the boundary and atomic refusal of over-full batches
//! - Replace semantics and idempotent resubmission
//! - Locked slots, clearing and slot updates
//! - Fairness history window and suggestion ordering
//! - Version conflicts, concurrent commits and timeouts

use std::time::Duration;

use chrono::{Days, NaiveDate};
use poc_common::db::{init_database, init_memory_database};
use poc_common::{AssignmentEntry, Category, Publisher, ShiftSlot};
use poc_turnos::db::availability::{mark_availability, AvailabilityMark};
use poc_turnos::db::publishers::{
    create_publisher, pair_publishers, update_publisher, NewPublisher, PublisherUpdate,
};
use poc_turnos::db::shifts::{self, create_day, NewDay, NewSlot};
use poc_turnos::error::{Rejection, RosterError};
use poc_turnos::roster::committer::{clear, commit, update_slot, SlotUpdate};
use poc_turnos::roster::suggester::Suggester;
use poc_turnos::roster::validator::AssignmentRequest;
use poc_turnos::roster::RosterSettings;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

const LABEL: &str = "manana";

fn shift_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
}

// =============================================================================
// Helpers
// =============================================================================

async fn publisher(pool: &SqlitePool, name: &str) -> Publisher {
    create_publisher(
        pool,
        NewPublisher {
            name: name.to_string(),
            category: None,
            guardian_id: None,
            active: None,
        },
    )
    .await
    .unwrap()
}

async fn minor(pool: &SqlitePool, name: &str, guardian: &Publisher) -> Publisher {
    create_publisher(
        pool,
        NewPublisher {
            name: name.to_string(),
            category: Some(Category::Minor),
            guardian_id: Some(guardian.id),
            active: None,
        },
    )
    .await
    .unwrap()
}

async fn couple(pool: &SqlitePool, first: &str, second: &str) -> (Publisher, Publisher) {
    let a = publisher(pool, first).await;
    let b = publisher(pool, second).await;
    pair_publishers(pool, a.id, b.id).await.unwrap()
}

async fn slot_on(pool: &SqlitePool, date: NaiveDate, capacity: Option<u32>) -> ShiftSlot {
    let day = create_day(
        pool,
        NewDay {
            date,
            location: "Plaza Mayor".to_string(),
            slots: vec![NewSlot {
                label: LABEL.to_string(),
                capacity,
            }],
        },
        3,
    )
    .await
    .unwrap();
    day.slots.into_iter().next().unwrap()
}

async fn slot(pool: &SqlitePool) -> ShiftSlot {
    slot_on(pool, shift_date(), None).await
}

async fn reload(pool: &SqlitePool, id: Uuid) -> ShiftSlot {
    let mut conn = pool.acquire().await.unwrap();
    shifts::get_shift(&mut conn, id).await.unwrap().unwrap()
}

async fn set_available(pool: &SqlitePool, id: Uuid, available: bool) {
    mark_availability(
        pool,
        id,
        AvailabilityMark {
            date: shift_date(),
            shift_label: LABEL.to_string(),
            available,
        },
    )
    .await
    .unwrap();
}

fn settings() -> RosterSettings {
    RosterSettings::default()
}

fn lock(locked: bool) -> SlotUpdate {
    SlotUpdate {
        locked: Some(locked),
        ..Default::default()
    }
}

// =============================================================================
// Capacity
// =============================================================================

#[tokio::test]
async fn test_exact_capacity_accepted() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let (b, c) = couple(&pool, "Bruno", "Carla").await;
    let shift = slot(&pool).await;

    let outcome = commit(
        &pool,
        &settings(),
        shift.id,
        &[AssignmentRequest::solo(a.id), AssignmentRequest::couple(b.id, c.id)],
    )
    .await
    .unwrap();

    assert_eq!(outcome.slots_used, 3);
    assert_eq!(outcome.slots_free, 0);
    assert_eq!(
        outcome.shift.assignments,
        vec![
            AssignmentEntry::Solo { publisher_id: a.id },
            AssignmentEntry::Couple {
                publisher_id: b.id,
                partner_id: c.id,
            },
        ]
    );

    let stored = reload(&pool, shift.id).await;
    assert_eq!(stored.assignments, outcome.shift.assignments);
    assert_eq!(stored.version, outcome.shift.version);
}

#[tokio::test]
async fn test_over_capacity_refused_without_side_effects() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let d = publisher(&pool, "Diego").await;
    let (b, c) = couple(&pool, "Bruno", "Carla").await;
    let shift = slot(&pool).await;

    commit(&pool, &settings(), shift.id, &[AssignmentRequest::solo(d.id)]).await.unwrap();
    let before = reload(&pool, shift.id).await;

    let result = commit(
        &pool,
        &settings(),
        shift.id,
        &[
            AssignmentRequest::solo(a.id),
            AssignmentRequest::solo(d.id),
            AssignmentRequest::couple(b.id, c.id),
        ],
    )
    .await;

    assert!(matches!(
        result,
        Err(RosterError::CapacityExceeded {
            capacity: 3,
            requested: 4
        })
    ));
    assert_eq!(reload(&pool, shift.id).await, before);
}

#[tokio::test]
async fn test_minor_rides_with_guardian() {
    let pool = init_memory_database().await.unwrap();
    let guardian = publisher(&pool, "Elena").await;
    let kid = minor(&pool, "Fede", &guardian).await;
    let (b, c) = couple(&pool, "Bruno", "Carla").await;
    let shift = slot(&pool).await;

    let outcome = commit(
        &pool,
        &settings(),
        shift.id,
        &[
            AssignmentRequest::solo(guardian.id),
            AssignmentRequest::minor(kid.id, guardian.id),
            AssignmentRequest::couple(b.id, c.id),
        ],
    )
    .await
    .unwrap();

    assert_eq!(outcome.slots_used, 3);
    assert_eq!(outcome.shift.assignments.len(), 3);
}

#[tokio::test]
async fn test_minors_cannot_cover_each_other() {
    let pool = init_memory_database().await.unwrap();
    let guardian = publisher(&pool, "Elena").await;
    let kid = minor(&pool, "Fede", &guardian).await;
    let other_kid = minor(&pool, "Gala", &guardian).await;
    let shift = slot_on(&pool, shift_date(), Some(1)).await;
    let before = reload(&pool, shift.id).await;

    let result = commit(
        &pool,
        &settings(),
        shift.id,
        &[AssignmentRequest::minor(kid.id, kid.id)],
    )
    .await;
    assert!(matches!(
        result,
        Err(RosterError::Rejected(Rejection::GuardianNotAdult { .. }))
    ));

    let result = commit(
        &pool,
        &settings(),
        shift.id,
        &[
            AssignmentRequest::minor(kid.id, other_kid.id),
            AssignmentRequest::minor(other_kid.id, kid.id),
        ],
    )
    .await;
    assert!(matches!(
        result,
        Err(RosterError::Rejected(Rejection::GuardianNotAdult { .. }))
    ));

    assert_eq!(reload(&pool, shift.id).await, before);
}

#[tokio::test]
async fn test_publisher_listed_twice_refused() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let (b, c) = couple(&pool, "Bruno", "Carla").await;
    let shift = slot(&pool).await;

    let result = commit(
        &pool,
        &settings(),
        shift.id,
        &[AssignmentRequest::solo(a.id), AssignmentRequest::solo(a.id)],
    )
    .await;
    assert!(matches!(
        result,
        Err(RosterError::Rejected(Rejection::DuplicatePublisher(id))) if id == a.id
    ));

    let result = commit(
        &pool,
        &settings(),
        shift.id,
        &[AssignmentRequest::couple(b.id, c.id), AssignmentRequest::solo(b.id)],
    )
    .await;
    assert!(matches!(
        result,
        Err(RosterError::Rejected(Rejection::DuplicatePublisher(id))) if id == b.id
    ));

    assert!(reload(&pool, shift.id).await.assignments.is_empty());
}

#[tokio::test]
async fn test_one_guardian_covers_two_minors() {
    let pool = init_memory_database().await.unwrap();
    let guardian = publisher(&pool, "Elena").await;
    let kid = minor(&pool, "Fede", &guardian).await;
    let other_kid = minor(&pool, "Gala", &guardian).await;
    let shift = slot_on(&pool, shift_date(), Some(1)).await;

    let outcome = commit(
        &pool,
        &settings(),
        shift.id,
        &[
            AssignmentRequest::solo(guardian.id),
            AssignmentRequest::minor(kid.id, guardian.id),
            AssignmentRequest::minor(other_kid.id, guardian.id),
        ],
    )
    .await
    .unwrap();

    assert_eq!(outcome.slots_used, 1);
    assert_eq!(outcome.shift.assignments.len(), 3);
}

// =============================================================================
// Validation through the committer
// =============================================================================

#[tokio::test]
async fn test_one_bad_entry_refuses_the_batch() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let b = publisher(&pool, "Bruno").await;
    set_available(&pool, b.id, false).await;
    let shift = slot(&pool).await;

    let result = commit(
        &pool,
        &settings(),
        shift.id,
        &[AssignmentRequest::solo(a.id), AssignmentRequest::solo(b.id)],
    )
    .await;

    match result {
        Err(RosterError::Rejected(Rejection::Unavailable { name })) => assert_eq!(name, "Bruno"),
        other => panic!("expected unavailable rejection, got {:?}", other),
    }
    assert!(reload(&pool, shift.id).await.assignments.is_empty());
}

#[tokio::test]
async fn test_unknown_publisher_and_inactive_publisher() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let deactivate = PublisherUpdate {
        active: Some(false),
        ..Default::default()
    };
    update_publisher(&pool, a.id, deactivate).await.unwrap();
    let shift = slot(&pool).await;

    let ghost = Uuid::new_v4();
    let result = commit(&pool, &settings(), shift.id, &[AssignmentRequest::solo(ghost)]).await;
    assert!(matches!(
        result,
        Err(RosterError::Rejected(Rejection::PublisherNotFound(id))) if id == ghost
    ));

    let result = commit(&pool, &settings(), shift.id, &[AssignmentRequest::solo(a.id)]).await;
    assert!(matches!(
        result,
        Err(RosterError::Rejected(Rejection::PublisherNotFound(id))) if id == a.id
    ));
}

#[tokio::test]
async fn test_empty_batch_and_unknown_shift() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let shift = slot(&pool).await;

    let result = commit(&pool, &settings(), shift.id, &[]).await;
    assert!(matches!(result, Err(RosterError::Validation(_))));

    let result = commit(&pool, &settings(), Uuid::new_v4(), &[AssignmentRequest::solo(a.id)]).await;
    assert!(matches!(result, Err(RosterError::NotFound(_))));
}

#[tokio::test]
async fn test_later_unavailability_keeps_committed_entry() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let shift = slot(&pool).await;

    commit(&pool, &settings(), shift.id, &[AssignmentRequest::solo(a.id)]).await.unwrap();
    set_available(&pool, a.id, false).await;

    let stored = reload(&pool, shift.id).await;
    assert_eq!(stored.assignments, vec![AssignmentEntry::Solo { publisher_id: a.id }]);

    // A resubmission re-validates and is refused
    let result = commit(&pool, &settings(), shift.id, &[AssignmentRequest::solo(a.id)]).await;
    assert!(matches!(result, Err(RosterError::Rejected(Rejection::Unavailable { .. }))));
}

// =============================================================================
// Replace semantics
// =============================================================================

#[tokio::test]
async fn test_commit_replaces_previous_set() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let b = publisher(&pool, "Bruno").await;
    let shift = slot(&pool).await;

    commit(&pool, &settings(), shift.id, &[AssignmentRequest::solo(a.id)]).await.unwrap();
    let outcome =
        commit(&pool, &settings(), shift.id, &[AssignmentRequest::solo(b.id)]).await.unwrap();

    assert_eq!(outcome.shift.assignments, vec![AssignmentEntry::Solo { publisher_id: b.id }]);
    assert_eq!(outcome.slots_used, 1);
}

#[tokio::test]
async fn test_resubmission_is_idempotent() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let (b, c) = couple(&pool, "Bruno", "Carla").await;
    let shift = slot(&pool).await;
    let batch = [AssignmentRequest::solo(a.id), AssignmentRequest::couple(b.id, c.id)];

    let first = commit(&pool, &settings(), shift.id, &batch).await.unwrap();
    let second = commit(&pool, &settings(), shift.id, &batch).await.unwrap();

    assert_eq!(first.shift.assignments, second.shift.assignments);
    assert_eq!(first.slots_used, second.slots_used);
    assert_eq!(second.shift.version, first.shift.version + 1);
}

// =============================================================================
// Lock, clear, update
// =============================================================================

#[tokio::test]
async fn test_locked_slot_refuses_commit_and_clear() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let shift = slot(&pool).await;

    commit(&pool, &settings(), shift.id, &[AssignmentRequest::solo(a.id)]).await.unwrap();
    update_slot(&pool, &settings(), shift.id, lock(true)).await.unwrap();

    let result = commit(&pool, &settings(), shift.id, &[AssignmentRequest::solo(a.id)]).await;
    assert!(matches!(result, Err(RosterError::Locked(id)) if id == shift.id));

    let result = clear(&pool, &settings(), shift.id).await;
    assert!(matches!(result, Err(RosterError::Locked(_))));
    assert_eq!(reload(&pool, shift.id).await.assignments.len(), 1);

    update_slot(&pool, &settings(), shift.id, lock(false)).await.unwrap();
    let outcome = clear(&pool, &settings(), shift.id).await.unwrap();
    assert!(outcome.shift.assignments.is_empty());
    assert_eq!(outcome.slots_free, 3);
}

#[tokio::test]
async fn test_capacity_cannot_drop_below_current_cost() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let (b, c) = couple(&pool, "Bruno", "Carla").await;
    let shift = slot(&pool).await;

    let full = [
        AssignmentRequest::solo(a.id),
        AssignmentRequest::couple(b.id, c.id),
    ];
    commit(&pool, &settings(), shift.id, &full).await.unwrap();

    let result = update_slot(
        &pool,
        &settings(),
        shift.id,
        SlotUpdate {
            capacity: Some(2),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(
        result,
        Err(RosterError::CapacityExceeded {
            capacity: 2,
            requested: 3
        })
    ));

    let outcome = update_slot(
        &pool,
        &settings(),
        shift.id,
        SlotUpdate {
            capacity: Some(5),
            label: Some("tarde".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(outcome.shift.capacity, 5);
    assert_eq!(outcome.shift.label, "tarde");
    assert_eq!(outcome.slots_free, 2);
}

// =============================================================================
// Fairness and suggestions
// =============================================================================

#[tokio::test]
async fn test_recent_assignment_window() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let date = shift_date();

    let inside = slot_on(&pool, date - Days::new(10), None).await;
    let outside = slot_on(&pool, date - Days::new(40), None).await;
    let same_day = slot_on(&pool, date, None).await;

    // Availability defaults to true on all three dates
    for shift in [&inside, &outside, &same_day] {
        commit(&pool, &settings(), shift.id, &[AssignmentRequest::solo(a.id)]).await.unwrap();
    }

    let mut conn = pool.acquire().await.unwrap();
    let count = shifts::count_recent_assignments(&mut conn, a.id, date, 30).await.unwrap();
    assert_eq!(count, 1);

    let count = shifts::count_recent_assignments(&mut conn, a.id, date, 60).await.unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_suggestion_prefers_least_recently_assigned() {
    let pool = init_memory_database().await.unwrap();
    let busy = publisher(&pool, "Ana").await;
    let idle = publisher(&pool, "Bruno").await;

    let earlier = slot_on(&pool, shift_date() - Days::new(7), None).await;
    commit(&pool, &settings(), earlier.id, &[AssignmentRequest::solo(busy.id)]).await.unwrap();

    let shift = slot_on(&pool, shift_date(), Some(1)).await;
    let suggester = Suggester::new(Some(42));

    for _ in 0..5 {
        let suggestion = suggester.suggest(&pool, &settings(), shift.id).await.unwrap();
        assert_eq!(suggestion.entries.len(), 1);
        let expected = AssignmentEntry::Solo {
            publisher_id: idle.id,
        };
        assert_eq!(suggestion.entries[0].entry, expected);
        assert_eq!(suggestion.slots_used, 1);
        assert_eq!(suggestion.slots_free, 0);
    }
}

#[tokio::test]
async fn test_suggestion_skips_unavailable_and_minors() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let b = publisher(&pool, "Bruno").await;
    let _kid = minor(&pool, "Fede", &a).await;
    set_available(&pool, b.id, false).await;
    let shift = slot(&pool).await;

    let suggestion = Suggester::new(Some(1)).suggest(&pool, &settings(), shift.id).await.unwrap();

    let suggested: Vec<Uuid> = suggestion.entries.iter().map(|e| e.entry.publisher_id()).collect();
    assert_eq!(suggested, vec![a.id]);
    assert_eq!(suggestion.capacity, 3);
    assert_eq!(suggestion.slots_free, 2);
}

#[tokio::test]
async fn test_suggestion_is_accepted_by_committer() {
    let pool = init_memory_database().await.unwrap();
    publisher(&pool, "Ana").await;
    couple(&pool, "Bruno", "Carla").await;
    publisher(&pool, "Diego").await;
    let shift = slot(&pool).await;

    let suggestion = Suggester::new(Some(9)).suggest(&pool, &settings(), shift.id).await.unwrap();
    assert!(suggestion.slots_used <= 3);

    let requests: Vec<AssignmentRequest> = suggestion
        .entries
        .iter()
        .map(|e| match e.entry {
            AssignmentEntry::Couple {
                publisher_id,
                partner_id,
            } => AssignmentRequest::couple(publisher_id, partner_id),
            ref other => AssignmentRequest::solo(other.publisher_id()),
        })
        .collect();

    let outcome = commit(&pool, &settings(), shift.id, &requests).await.unwrap();
    assert_eq!(outcome.slots_used, suggestion.slots_used);
}

#[tokio::test]
async fn test_suggestion_unknown_shift() {
    let pool = init_memory_database().await.unwrap();
    let result = Suggester::new(None).suggest(&pool, &settings(), Uuid::new_v4()).await;
    assert!(matches!(result, Err(RosterError::NotFound(_))));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_stale_version_is_not_written() {
    let pool = init_memory_database().await.unwrap();
    let a = publisher(&pool, "Ana").await;
    let shift = slot(&pool).await;

    commit(&pool, &settings(), shift.id, &[AssignmentRequest::solo(a.id)]).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let written =
        shifts::replace_assignments(&mut conn, shift.id, shift.version, &[]).await.unwrap();
    assert_eq!(written, None);
}

#[tokio::test]
async fn test_concurrent_commits_never_interleave() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("concurrent.db")).await.unwrap();

    let a = publisher(&pool, "Ana").await;
    let b = publisher(&pool, "Bruno").await;
    let (c, d) = couple(&pool, "Carla", "Diego").await;
    let shift = slot(&pool).await;

    let first_batch = vec![AssignmentRequest::solo(a.id), AssignmentRequest::solo(b.id)];
    let second_batch = vec![AssignmentRequest::couple(c.id, d.id)];

    let settings = settings();
    let (first, second) = tokio::join!(
        commit(&pool, &settings, shift.id, &first_batch),
        commit(&pool, &settings, shift.id, &second_batch),
    );

    assert!(first.is_ok() || second.is_ok());
    for result in [&first, &second] {
        if let Err(e) = result {
            assert!(matches!(e, RosterError::Conflict(_)), "unexpected error {:?}", e);
            assert!(e.is_retryable());
        }
    }

    // The stored set is exactly one of the two batches
    let stored = reload(&pool, shift.id).await;
    let solo_set = vec![
        AssignmentEntry::Solo { publisher_id: a.id },
        AssignmentEntry::Solo { publisher_id: b.id },
    ];
    let couple_set = vec![AssignmentEntry::Couple {
        publisher_id: c.id,
        partner_id: d.id,
    }];
    assert!(stored.assignments == solo_set || stored.assignments == couple_set);
}

#[tokio::test]
async fn test_blocked_writer_times_out() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("timeout.db")).await.unwrap();

    let a = publisher(&pool, "Ana").await;
    let shift = slot(&pool).await;

    let mut locker = pool.acquire().await.unwrap();
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *locker).await.unwrap();

    let impatient = RosterSettings {
        db_timeout: Duration::from_millis(200),
        ..settings()
    };
    let result = commit(&pool, &impatient, shift.id, &[AssignmentRequest::solo(a.id)]).await;

    sqlx::query("ROLLBACK").execute(&mut *locker).await.unwrap();

    match result {
        Err(e @ RosterError::Timeout(_)) => assert!(e.is_retryable()),
        other => panic!("expected timeout, got {:?}", other),
    }
}
