//! Availability ledger
//!
//! Per-publisher, per-date, per-shift-label overrides. A missing record
//! means available; writes are idempotent upserts where the last write wins.

use chrono::NaiveDate;
use poc_common::db::parse_id;
use poc_common::{AvailabilityRecord, Error, Publisher, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::publishers::{get_active_publisher, row_to_publisher};

/// One entry of a multi-shift availability update
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityMark {
    #[serde(alias = "fecha")]
    pub date: NaiveDate,
    #[serde(alias = "turno")]
    pub shift_label: String,
    #[serde(default = "default_available", alias = "disponible")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// Availability record joined with its publisher
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityListing {
    #[serde(flatten)]
    pub record: AvailabilityRecord,
    pub name: String,
    pub category: String,
    pub pair_id: Option<Uuid>,
    pub pair_name: Option<String>,
}

fn row_to_record(row: &SqliteRow) -> Result<AvailabilityRecord> {
    Ok(AvailabilityRecord {
        id: parse_id(&row.get::<String, _>("guid"))?,
        publisher_id: parse_id(&row.get::<String, _>("publisher_id"))?,
        date: row.get("date"),
        shift_label: row.get("shift_label"),
        available: row.get("available"),
    })
}

/// Resolved availability; true when no record exists
pub async fn is_available(
    conn: &mut SqliteConnection,
    publisher_id: Uuid,
    date: NaiveDate,
    shift_label: &str,
) -> Result<bool> {
    let available: Option<bool> = sqlx::query_scalar(
        "SELECT available FROM availability \
         WHERE publisher_id = ? AND date = ? AND shift_label = ?",
    )
    .bind(publisher_id.to_string())
    .bind(date)
    .bind(shift_label)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(available.unwrap_or(true))
}

/// Active publishers whose resolved availability is true, ordered by name
pub async fn available_publishers(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    shift_label: &str,
) -> Result<Vec<Publisher>> {
    let rows = sqlx::query(
        r#"
        SELECT p.guid, p.name, p.category, p.pair_id, p.guardian_id, p.active
        FROM publishers p
        LEFT JOIN availability a ON a.publisher_id = p.guid
            AND a.date = ?
            AND a.shift_label = ?
        WHERE p.active = 1
          AND COALESCE(a.available, 1) = 1
        ORDER BY p.name
        "#,
    )
    .bind(date)
    .bind(shift_label)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(row_to_publisher).collect()
}

async fn upsert(
    conn: &mut SqliteConnection,
    publisher_id: Uuid,
    mark: &AvailabilityMark,
) -> Result<AvailabilityRecord> {
    let label = mark.shift_label.trim();
    if label.is_empty() {
        return Err(Error::InvalidInput("Shift label is required".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO availability (guid, publisher_id, date, shift_label, available)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (publisher_id, date, shift_label)
        DO UPDATE SET available = excluded.available, created_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(publisher_id.to_string())
    .bind(mark.date)
    .bind(label)
    .bind(mark.available)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query(
        r#"
        SELECT guid, publisher_id, date, shift_label, available
        FROM availability
        WHERE publisher_id = ? AND date = ? AND shift_label = ?
        "#,
    )
    .bind(publisher_id.to_string())
    .bind(mark.date)
    .bind(label)
    .fetch_one(&mut *conn)
    .await?;

    row_to_record(&row)
}

async fn ensure_active(conn: &mut SqliteConnection, publisher_id: Uuid) -> Result<()> {
    get_active_publisher(conn, publisher_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| Error::NotFound(format!("Publisher {} not found or inactive", publisher_id)))
}

/// Record availability for one (date, label)
pub async fn mark_availability(
    pool: &SqlitePool,
    publisher_id: Uuid,
    mark: AvailabilityMark,
) -> Result<AvailabilityRecord> {
    let mut conn = pool.acquire().await?;
    ensure_active(&mut conn, publisher_id).await?;

    let record = upsert(&mut conn, publisher_id, &mark).await?;

    info!(
        publisher_id = %publisher_id,
        date = %record.date,
        shift_label = %record.shift_label,
        available = record.available,
        "Marked availability"
    );

    Ok(record)
}

/// Record several availabilities in one transaction
pub async fn mark_availability_many(
    pool: &SqlitePool,
    publisher_id: Uuid,
    marks: &[AvailabilityMark],
) -> Result<Vec<AvailabilityRecord>> {
    if marks.is_empty() {
        return Err(Error::InvalidInput("At least one availability entry is required".to_string()));
    }

    let mut tx = pool.begin().await?;
    ensure_active(&mut tx, publisher_id).await?;

    let mut records = Vec::with_capacity(marks.len());
    for mark in marks {
        records.push(upsert(&mut tx, publisher_id, mark).await?);
    }

    tx.commit().await?;

    info!(publisher_id = %publisher_id, count = records.len(), "Marked availability batch");

    Ok(records)
}

/// Records of one publisher, optionally bounded by date (inclusive)
pub async fn list_for_publisher(
    pool: &SqlitePool,
    publisher_id: Uuid,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<AvailabilityRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, publisher_id, date, shift_label, available
        FROM availability
        WHERE publisher_id = ?
          AND (? IS NULL OR date >= ?)
          AND (? IS NULL OR date <= ?)
        ORDER BY date, shift_label
        "#,
    )
    .bind(publisher_id.to_string())
    .bind(from)
    .bind(from)
    .bind(to)
    .bind(to)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_record).collect()
}

/// Explicit records for a (date, label), with publisher names
pub async fn list_for_date_label(
    pool: &SqlitePool,
    date: NaiveDate,
    shift_label: &str,
) -> Result<Vec<AvailabilityListing>> {
    let rows = sqlx::query(
        r#"
        SELECT a.guid, a.publisher_id, a.date, a.shift_label, a.available,
               p.name, p.category, p.pair_id, pair.name AS pair_name
        FROM availability a
        JOIN publishers p ON a.publisher_id = p.guid
        LEFT JOIN publishers pair ON p.pair_id = pair.guid
        WHERE a.date = ? AND a.shift_label = ?
        ORDER BY p.name
        "#,
    )
    .bind(date)
    .bind(shift_label)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(AvailabilityListing {
                record: row_to_record(row)?,
                name: row.get("name"),
                category: row.get("category"),
                pair_id: row
                    .get::<Option<String>, _>("pair_id")
                    .as_deref()
                    .map(parse_id)
                    .transpose()?,
                pair_name: row.get("pair_name"),
            })
        })
        .collect()
}

/// Delete one record, restoring the available-by-default state
pub async fn remove_availability(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM availability WHERE guid = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Availability {}", id)));
    }

    Ok(())
}
