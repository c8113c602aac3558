//! Database initialization
//!
//! Creates the database file and schema on first run. Every table is
//! created with `CREATE TABLE IF NOT EXISTS`, so initialization is safe to
//! repeat against an existing database.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection and create tables if needed
///
/// Connection options are applied per connection (foreign keys, WAL,
/// busy timeout), so every pooled connection behaves the same.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Limited to one connection that is never recycled, since every SQLite
/// in-memory connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_publishers_table(pool).await?;
    create_availability_table(pool).await?;
    create_shift_days_table(pool).await?;
    create_shift_slots_table(pool).await?;
    create_slot_assignments_table(pool).await?;
    create_slot_participants_table(pool).await?;
    Ok(())
}

async fn create_publishers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS publishers (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'individual'
                CHECK (category IN ('individual', 'paired', 'minor')),
            pair_id TEXT REFERENCES publishers(guid) ON DELETE SET NULL,
            guardian_id TEXT REFERENCES publishers(guid) ON DELETE SET NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per (publisher, date, label); absence means available
async fn create_availability_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS availability (
            guid TEXT PRIMARY KEY,
            publisher_id TEXT NOT NULL REFERENCES publishers(guid) ON DELETE CASCADE,
            date TEXT NOT NULL,
            shift_label TEXT NOT NULL,
            available INTEGER NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (publisher_id, date, shift_label)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_shift_days_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS shift_days (
            guid TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            location TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_shift_days_date ON shift_days(date)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_shift_slots_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS shift_slots (
            guid TEXT PRIMARY KEY,
            day_id TEXT NOT NULL REFERENCES shift_days(guid) ON DELETE CASCADE,
            label TEXT NOT NULL,
            capacity INTEGER NOT NULL DEFAULT 3 CHECK (capacity > 0),
            locked INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Ordered assignment set of a slot, replaced wholesale on commit
async fn create_slot_assignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS slot_assignments (
            slot_id TEXT NOT NULL REFERENCES shift_slots(guid) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('solo', 'couple', 'minor_with_guardian')),
            publisher_id TEXT NOT NULL,
            companion_id TEXT,
            PRIMARY KEY (slot_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Publishers appearing in a slot's assignment set, for history queries
async fn create_slot_participants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS slot_participants (
            slot_id TEXT NOT NULL REFERENCES shift_slots(guid) ON DELETE CASCADE,
            publisher_id TEXT NOT NULL,
            PRIMARY KEY (slot_id, publisher_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_slot_participants_publisher \
         ON slot_participants(publisher_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
