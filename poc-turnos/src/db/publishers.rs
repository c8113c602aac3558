//! Publisher directory
//!
//! Pairing is only ever changed through [`pair_publishers`] and
//! [`unpair_publisher`], which update both sides in one transaction so
//! partner references stay mutual.

use poc_common::db::parse_id;
use poc_common::{Category, Error, Publisher, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

const SELECT_DETAIL: &str = r#"
    SELECT p.guid, p.name, p.category, p.pair_id, p.guardian_id, p.active,
           pair.name AS pair_name, guardian.name AS guardian_name
    FROM publishers p
    LEFT JOIN publishers pair ON p.pair_id = pair.guid
    LEFT JOIN publishers guardian ON p.guardian_id = guardian.guid
"#;

/// Publisher with partner and guardian display names
#[derive(Debug, Clone, Serialize)]
pub struct PublisherDetail {
    #[serde(flatten)]
    pub publisher: Publisher,
    pub pair_name: Option<String>,
    pub guardian_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPublisher {
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "tipo")]
    pub category: Option<Category>,
    #[serde(default, alias = "tutor_id")]
    pub guardian_id: Option<Uuid>,
    #[serde(default, alias = "activo")]
    pub active: Option<bool>,
}

/// Partial update; pairing is not editable here
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublisherUpdate {
    #[serde(default, alias = "nombre")]
    pub name: Option<String>,
    #[serde(default, alias = "tipo")]
    pub category: Option<Category>,
    #[serde(default, alias = "tutor_id")]
    pub guardian_id: Option<Uuid>,
    #[serde(default, alias = "activo")]
    pub active: Option<bool>,
}

pub(crate) fn row_to_publisher(row: &SqliteRow) -> Result<Publisher> {
    let category: String = row.get("category");
    Ok(Publisher {
        id: parse_id(&row.get::<String, _>("guid"))?,
        name: row.get("name"),
        category: Category::parse(&category)
            .ok_or_else(|| Error::Internal(format!("Unknown category '{}'", category)))?,
        pair_id: row.get::<Option<String>, _>("pair_id").as_deref().map(parse_id).transpose()?,
        guardian_id: row
            .get::<Option<String>, _>("guardian_id")
            .as_deref()
            .map(parse_id)
            .transpose()?,
        active: row.get("active"),
    })
}

fn row_to_detail(row: &SqliteRow) -> Result<PublisherDetail> {
    Ok(PublisherDetail {
        publisher: row_to_publisher(row)?,
        pair_name: row.get("pair_name"),
        guardian_name: row.get("guardian_name"),
    })
}

/// Look up a publisher regardless of active flag
pub async fn get_publisher(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Publisher>> {
    let row = sqlx::query(
        "SELECT guid, name, category, pair_id, guardian_id, active FROM publishers WHERE guid = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_publisher).transpose()
}

/// Look up a publisher, treating inactive ones as absent
pub async fn get_active_publisher(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Publisher>> {
    Ok(get_publisher(conn, id).await?.filter(|p| p.active))
}

pub async fn list_publishers(pool: &SqlitePool) -> Result<Vec<PublisherDetail>> {
    let rows = sqlx::query(&format!("{} ORDER BY p.name", SELECT_DETAIL))
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_detail).collect()
}

pub async fn get_publisher_detail(pool: &SqlitePool, id: Uuid) -> Result<PublisherDetail> {
    let row = sqlx::query(&format!("{} WHERE p.guid = ?", SELECT_DETAIL))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Publisher {}", id)))?;

    row_to_detail(&row)
}

async fn ensure_guardian_exists(
    conn: &mut SqliteConnection,
    guardian_id: Option<Uuid>,
) -> Result<()> {
    if let Some(guardian_id) = guardian_id {
        if get_publisher(conn, guardian_id).await?.is_none() {
            return Err(Error::InvalidInput(format!("Guardian {} does not exist", guardian_id)));
        }
    }
    Ok(())
}

fn pairing_not_editable() -> Error {
    Error::InvalidInput("Couples are registered through the pairing operation".to_string())
}

/// Create a publisher
///
/// Always created unpaired; couples are linked by [`pair_publishers`].
pub async fn create_publisher(pool: &SqlitePool, new: NewPublisher) -> Result<Publisher> {
    let name = new.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::InvalidInput("Name is required".to_string()));
    }
    if new.category == Some(Category::Paired) {
        return Err(pairing_not_editable());
    }

    let mut conn = pool.acquire().await?;
    ensure_guardian_exists(&mut conn, new.guardian_id).await?;

    let publisher = Publisher {
        id: Uuid::new_v4(),
        name,
        category: new.category.unwrap_or_default(),
        pair_id: None,
        guardian_id: new.guardian_id,
        active: new.active.unwrap_or(true),
    };

    sqlx::query(
        r#"
        INSERT INTO publishers (guid, name, category, guardian_id, active)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(publisher.id.to_string())
    .bind(&publisher.name)
    .bind(publisher.category.as_str())
    .bind(publisher.guardian_id.map(|id| id.to_string()))
    .bind(publisher.active)
    .execute(&mut *conn)
    .await?;

    info!(
        publisher_id = %publisher.id,
        category = publisher.category.as_str(),
        "Created publisher"
    );

    Ok(publisher)
}

/// Apply a partial update
///
/// Moving a paired publisher to another category dissolves the pairing on
/// both sides.
pub async fn update_publisher(
    pool: &SqlitePool,
    id: Uuid,
    update: PublisherUpdate,
) -> Result<Publisher> {
    let mut tx = pool.begin().await?;

    let mut publisher = get_publisher(&mut tx, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Publisher {}", id)))?;

    if let Some(name) = update.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput("Name cannot be empty".to_string()));
        }
        publisher.name = name;
    }
    if update.guardian_id.is_some() {
        ensure_guardian_exists(&mut tx, update.guardian_id).await?;
        publisher.guardian_id = update.guardian_id;
    }
    if let Some(active) = update.active {
        publisher.active = active;
    }
    if let Some(category) = update.category {
        if category == Category::Paired && publisher.category != Category::Paired {
            return Err(pairing_not_editable());
        }
        if publisher.category == Category::Paired && category != Category::Paired {
            dissolve_pair(&mut tx, &publisher).await?;
            publisher.pair_id = None;
        }
        publisher.category = category;
    }

    sqlx::query(
        r#"
        UPDATE publishers
        SET name = ?, category = ?, pair_id = ?, guardian_id = ?, active = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(&publisher.name)
    .bind(publisher.category.as_str())
    .bind(publisher.pair_id.map(|id| id.to_string()))
    .bind(publisher.guardian_id.map(|id| id.to_string()))
    .bind(publisher.active)
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(publisher)
}

/// Delete a publisher; a former partner reverts to individual
pub async fn delete_publisher(pool: &SqlitePool, id: Uuid) -> Result<Publisher> {
    let mut tx = pool.begin().await?;

    let publisher = get_publisher(&mut tx, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Publisher {}", id)))?;

    dissolve_pair(&mut tx, &publisher).await?;

    sqlx::query("DELETE FROM publishers WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(publisher_id = %id, "Deleted publisher");

    Ok(publisher)
}

/// Reset the partner that points back at `publisher`
async fn dissolve_pair(conn: &mut SqliteConnection, publisher: &Publisher) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE publishers
        SET category = 'individual', pair_id = NULL, updated_at = CURRENT_TIMESTAMP
        WHERE pair_id = ?
        "#,
    )
    .bind(publisher.id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Register `a` and `b` as a couple
///
/// Any previous partner of either one is reset to individual first.
pub async fn pair_publishers(
    pool: &SqlitePool,
    a: Uuid,
    b: Uuid) -> Result<(Publisher,
    Publisher,
)> {
    if a == b {
        return Err(Error::InvalidInput("A publisher cannot be paired with themselves".to_string()));
    }

    let mut tx = pool.begin().await?;

    let first = get_publisher(&mut tx, a)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Publisher {}", a)))?;
    let second = get_publisher(&mut tx, b)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Publisher {}", b)))?;

    dissolve_pair(&mut tx, &first).await?;
    dissolve_pair(&mut tx, &second).await?;

    for (id, partner) in [(a, b), (b, a)] {
        sqlx::query(
            r#"
            UPDATE publishers
            SET category = 'paired', pair_id = ?, updated_at = CURRENT_TIMESTAMP
            WHERE guid = ?
            "#,
        )
        .bind(partner.to_string())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(first = %a, second = %b, "Paired publishers");

    let first = Publisher {
        category: Category::Paired,
        pair_id: Some(b),
        ..first
    };
    let second = Publisher {
        category: Category::Paired,
        pair_id: Some(a),
        ..second
    };
    Ok((first, second))
}

/// Dissolve the pairing of `id` on both sides
pub async fn unpair_publisher(pool: &SqlitePool, id: Uuid) -> Result<Publisher> {
    let mut tx = pool.begin().await?;

    let publisher = get_publisher(&mut tx, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Publisher {}", id)))?;

    dissolve_pair(&mut tx, &publisher).await?;

    sqlx::query(
        r#"
        UPDATE publishers
        SET category = 'individual', pair_id = NULL, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Publisher {
        category: Category::Individual,
        pair_id: None,
        ..publisher
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use poc_common::db::init_memory_database;

    fn named(name: &str) -> NewPublisher {
        NewPublisher {
            name: name.to_string(),
            category: None,
            guardian_id: None,
            active: None,
        }
    }

    #[tokio::test]
    async fn test_create_defaults_to_active_individual() {
        let pool = init_memory_database().await.unwrap();
        let p = create_publisher(&pool, named("  Ana  ")).await.unwrap();
        assert_eq!(p.name, "Ana");
        assert_eq!(p.category, Category::Individual);
        assert!(p.active);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let pool = init_memory_database().await.unwrap();
        let err = create_publisher(&pool, named("   ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_pairing_is_mutual_and_replaces_previous_partner() {
        let pool = init_memory_database().await.unwrap();
        let a = create_publisher(&pool, named("Ana")).await.unwrap();
        let b = create_publisher(&pool, named("Beto")).await.unwrap();
        let c = create_publisher(&pool, named("Carla")).await.unwrap();

        pair_publishers(&pool, a.id, b.id).await.unwrap();
        pair_publishers(&pool, a.id, c.id).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let a = get_publisher(&mut conn, a.id).await.unwrap().unwrap();
        let b = get_publisher(&mut conn, b.id).await.unwrap().unwrap();
        let c = get_publisher(&mut conn, c.id).await.unwrap().unwrap();

        assert!(a.is_paired_with(&c));
        assert_eq!(b.category, Category::Individual);
        assert_eq!(b.pair_id, None);
    }

    #[tokio::test]
    async fn test_delete_resets_partner() {
        let pool = init_memory_database().await.unwrap();
        let a = create_publisher(&pool, named("Ana")).await.unwrap();
        let b = create_publisher(&pool, named("Beto")).await.unwrap();
        pair_publishers(&pool, a.id, b.id).await.unwrap();

        delete_publisher(&pool, a.id).await.unwrap();

        let detail = get_publisher_detail(&pool, b.id).await.unwrap();
        assert_eq!(detail.publisher.category, Category::Individual);
        assert_eq!(detail.pair_name, None);
    }

    #[tokio::test]
    async fn test_self_pairing_rejected() {
        let pool = init_memory_database().await.unwrap();
        let a = create_publisher(&pool, named("Ana")).await.unwrap();
        assert!(matches!(
            pair_publishers(&pool, a.id, a.id).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
