//! Shift registry
//!
//! Shift days own their slots; each slot owns an ordered assignment set
//! that is replaced wholesale. Every assignment mutation bumps the slot's
//! `version`, and [`replace_assignments`] only writes when the caller's
//! expected version still matches, so two writers that read the same state
//! cannot both succeed.

use chrono::{Days, NaiveDate};
use poc_common::db::parse_id;
use poc_common::{AssignmentEntry, Error, Result, ShiftDay, ShiftSlot};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// Slot definition supplied when creating a day
#[derive(Debug, Clone, Deserialize)]
pub struct NewSlot {
    #[serde(alias = "turno")]
    pub label: String,
    #[serde(default, alias = "capacidad")]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDay {
    #[serde(alias = "fecha")]
    pub date: NaiveDate,
    #[serde(alias = "ubicacion")]
    pub location: String,
    #[serde(default, alias = "turnos")]
    pub slots: Vec<NewSlot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DayUpdate {
    #[serde(default, alias = "fecha")]
    pub date: Option<NaiveDate>,
    #[serde(default, alias = "ubicacion")]
    pub location: Option<String>,
}

/// Day with its slot count, for listings
#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    #[serde(flatten)]
    pub day: ShiftDay,
    pub total_slots: i64,
}

/// Day with its slots
#[derive(Debug, Clone, Serialize)]
pub struct DayWithSlots {
    pub day: ShiftDay,
    pub slots: Vec<ShiftSlot>,
}

fn row_to_day(row: &SqliteRow) -> Result<ShiftDay> {
    Ok(ShiftDay {
        id: parse_id(&row.get::<String, _>("guid"))?,
        date: row.get("date"),
        location: row.get("location"),
    })
}

// ============================================================================
// Days
// ============================================================================

/// All days, newest first
pub async fn list_days(pool: &SqlitePool) -> Result<Vec<DaySummary>> {
    let rows = sqlx::query(
        r#"
        SELECT d.guid, d.date, d.location, COUNT(s.guid) AS total_slots
        FROM shift_days d
        LEFT JOIN shift_slots s ON s.day_id = d.guid
        GROUP BY d.guid
        ORDER BY d.date DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(DaySummary {
                day: row_to_day(row)?,
                total_slots: row.get("total_slots"),
            })
        })
        .collect()
}

pub async fn get_day(pool: &SqlitePool, id: Uuid) -> Result<DayWithSlots> {
    let mut conn = pool.acquire().await?;

    let row = sqlx::query("SELECT guid, date, location FROM shift_days WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Shift day {}", id)))?;
    let day = row_to_day(&row)?;

    let slot_ids: Vec<String> =
        sqlx::query_scalar("SELECT guid FROM shift_slots WHERE day_id = ? ORDER BY label")
            .bind(id.to_string())
            .fetch_all(&mut *conn)
            .await?;

    let mut slots = Vec::with_capacity(slot_ids.len());
    for slot_id in slot_ids {
        if let Some(slot) = get_shift(&mut conn, parse_id(&slot_id)?).await? {
            slots.push(slot);
        }
    }

    Ok(DayWithSlots { day, slots })
}

/// Create a day and its slots in one transaction
///
/// Slots without a capacity get `default_capacity`.
pub async fn create_day(
    pool: &SqlitePool,
    new: NewDay,
    default_capacity: u32,
) -> Result<DayWithSlots> {
    let location = new.location.trim().to_string();
    if location.is_empty() {
        return Err(Error::InvalidInput("Location is required".to_string()));
    }

    let mut tx = pool.begin().await?;
    let day = ShiftDay {
        id: Uuid::new_v4(),
        date: new.date,
        location,
    };

    sqlx::query("INSERT INTO shift_days (guid, date, location) VALUES (?, ?, ?)")
        .bind(day.id.to_string())
        .bind(day.date)
        .bind(&day.location)
        .execute(&mut *tx)
        .await?;

    let mut slots = Vec::with_capacity(new.slots.len());
    for slot in new.slots {
        let label = slot.label.trim().to_string();
        if label.is_empty() {
            return Err(Error::InvalidInput("Shift label is required".to_string()));
        }
        let capacity = slot.capacity.unwrap_or(default_capacity);
        if capacity == 0 {
            return Err(Error::InvalidInput("Capacity must be positive".to_string()));
        }

        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO shift_slots (guid, day_id, label, capacity) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(day.id.to_string())
            .bind(&label)
            .bind(capacity as i64)
            .execute(&mut *tx)
            .await?;

        slots.push(ShiftSlot {
            id,
            day_id: day.id,
            date: day.date,
            location: day.location.clone(),
            label,
            capacity,
            locked: false,
            version: 0,
            assignments: Vec::new(),
        });
    }

    tx.commit().await?;

    info!(day_id = %day.id, date = %day.date, slots = slots.len(), "Created shift day");

    Ok(DayWithSlots { day, slots })
}

pub async fn update_day(pool: &SqlitePool, id: Uuid, update: DayUpdate) -> Result<ShiftDay> {
    let location = update.location.map(|l| l.trim().to_string());
    if location.as_deref() == Some("") {
        return Err(Error::InvalidInput("Location cannot be empty".to_string()));
    }

    let result = sqlx::query(
        r#"
        UPDATE shift_days
        SET date = COALESCE(?, date),
            location = COALESCE(?, location),
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(update.date)
    .bind(location)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Shift day {}", id)));
    }

    let row = sqlx::query("SELECT guid, date, location FROM shift_days WHERE guid = ?")
        .bind(id.to_string())
        .fetch_one(pool)
        .await?;

    row_to_day(&row)
}

/// Delete a day; its slots and their assignments cascade
pub async fn delete_day(pool: &SqlitePool, id: Uuid) -> Result<ShiftDay> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query("SELECT guid, date, location FROM shift_days WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Shift day {}", id)))?;
    let day = row_to_day(&row)?;

    sqlx::query("DELETE FROM shift_days WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(day_id = %id, "Deleted shift day");

    Ok(day)
}

// ============================================================================
// Slots
// ============================================================================

/// Load a slot with its day's date and location and its assignment set
pub async fn get_shift(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<ShiftSlot>> {
    let row = sqlx::query(
        r#"
        SELECT s.guid, s.day_id, s.label, s.capacity, s.locked, s.version,
               d.date, d.location
        FROM shift_slots s
        JOIN shift_days d ON s.day_id = d.guid
        WHERE s.guid = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let assignments = load_assignments(conn, id).await?;

    Ok(Some(ShiftSlot {
        id,
        day_id: parse_id(&row.get::<String, _>("day_id"))?,
        date: row.get("date"),
        location: row.get("location"),
        label: row.get("label"),
        capacity: row.get::<i64, _>("capacity") as u32,
        locked: row.get("locked"),
        version: row.get("version"),
        assignments,
    }))
}

async fn load_assignments(
    conn: &mut SqliteConnection,
    slot_id: Uuid,
) -> Result<Vec<AssignmentEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT kind, publisher_id, companion_id
        FROM slot_assignments
        WHERE slot_id = ?
        ORDER BY position
        "#,
    )
    .bind(slot_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let kind: String = row.get("kind");
            let publisher_id = parse_id(&row.get::<String, _>("publisher_id"))?;
            let companion_id = row
                .get::<Option<String>, _>("companion_id")
                .as_deref()
                .map(parse_id)
                .transpose()?;
            AssignmentEntry::from_columns(&kind, publisher_id, companion_id)
        })
        .collect()
}

/// Replace a slot's assignment set if it is still at `expected_version`
///
/// Returns the new version, or `None` when the slot changed (or was
/// locked) since the caller read it. Must run inside the caller's
/// transaction.
pub async fn replace_assignments(
    conn: &mut SqliteConnection,
    slot_id: Uuid,
    expected_version: i64,
    entries: &[AssignmentEntry],
) -> Result<Option<i64>> {
    let result = sqlx::query(
        r#"
        UPDATE shift_slots
        SET version = version + 1, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ? AND version = ? AND locked = 0
        "#,
    )
    .bind(slot_id.to_string())
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    sqlx::query("DELETE FROM slot_assignments WHERE slot_id = ?")
        .bind(slot_id.to_string())
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM slot_participants WHERE slot_id = ?")
        .bind(slot_id.to_string())
        .execute(&mut *conn)
        .await?;

    for (position, entry) in entries.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO slot_assignments (slot_id, position, kind, publisher_id, companion_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(slot_id.to_string())
        .bind(position as i64)
        .bind(entry.kind_str())
        .bind(entry.publisher_id().to_string())
        .bind(entry.companion_id().map(|id| id.to_string()))
        .execute(&mut *conn)
        .await?;

        for participant in entry.participants() {
            sqlx::query(
                "INSERT OR IGNORE INTO slot_participants (slot_id, publisher_id) VALUES (?, ?)",
            )
            .bind(slot_id.to_string())
            .bind(participant.to_string())
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(Some(expected_version + 1))
}

/// Change a slot's label, capacity or lock flag if still at `expected_version`
///
/// Returns the new version, or `None` on a version mismatch.
pub async fn update_slot_settings(
    conn: &mut SqliteConnection,
    slot_id: Uuid,
    expected_version: i64,
    label: &str,
    capacity: u32,
    locked: bool,
) -> Result<Option<i64>> {
    let result = sqlx::query(
        r#"
        UPDATE shift_slots
        SET label = ?, capacity = ?, locked = ?, version = version + 1,
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ? AND version = ?
        "#,
    )
    .bind(label)
    .bind(capacity as i64)
    .bind(locked)
    .bind(slot_id.to_string())
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;

    Ok((result.rows_affected() > 0).then_some(expected_version + 1))
}

/// Number of slots dated in `[before - window_days, before)` whose
/// assignment set includes `publisher_id` in any role
pub async fn count_recent_assignments(
    conn: &mut SqliteConnection,
    publisher_id: Uuid,
    before: NaiveDate,
    window_days: u32,
) -> Result<u32> {
    let window_start = before
        .checked_sub_days(Days::new(u64::from(window_days)))
        .unwrap_or(NaiveDate::MIN);

    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM slot_participants sp
        JOIN shift_slots s ON sp.slot_id = s.guid
        JOIN shift_days d ON s.day_id = d.guid
        WHERE sp.publisher_id = ?
          AND d.date >= ?
          AND d.date < ?
        "#,
    )
    .bind(publisher_id.to_string())
    .bind(window_start)
    .bind(before)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count as u32)
}
