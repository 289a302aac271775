//! Database operations for the envelopes table.

use clinic_sync_engine::{Collection, Envelope, Payload, Revision};
use sqlx::{sqlite::SqliteRow, Executor, Row, Sqlite};

use crate::error::Result;

const SELECT_COLUMNS: &str = "SELECT collection, record_id, payload, sync_state, endpoint, \
     payload_encoding, revision, updated_at FROM envelopes";

/// A stored envelope row from the database.
#[derive(Debug, Clone)]
pub struct StoredEnvelope {
    pub collection: String,
    pub record_id: String,
    /// JSON object text
    pub payload: String,
    pub sync_state: String,
    pub endpoint: Option<String>,
    pub payload_encoding: String,
    pub revision: i64,
    pub updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for StoredEnvelope {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(StoredEnvelope {
            collection: row.try_get("collection")?,
            record_id: row.try_get("record_id")?,
            payload: row.try_get("payload")?,
            sync_state: row.try_get("sync_state")?,
            endpoint: row.try_get("endpoint")?,
            payload_encoding: row.try_get("payload_encoding")?,
            revision: row.try_get("revision")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredEnvelope {
    /// Flatten an envelope into its row representation.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self> {
        Ok(StoredEnvelope {
            collection: envelope.collection().as_str().to_string(),
            record_id: envelope.id.clone(),
            payload: serde_json::to_string(envelope.payload.fields())?,
            sync_state: envelope.sync_state.as_str().to_string(),
            endpoint: envelope.endpoint.clone(),
            payload_encoding: envelope.payload_encoding.as_str().to_string(),
            revision: envelope.revision as i64,
            updated_at: envelope.updated_at as i64,
        })
    }

    /// Convert database row to an engine envelope.
    pub fn to_envelope(&self) -> Result<Envelope> {
        let collection: Collection = self.collection.parse()?;
        let fields: serde_json::Value = serde_json::from_str(&self.payload)?;

        Ok(Envelope {
            id: self.record_id.clone(),
            payload: Payload::new(collection, fields)?,
            sync_state: self.sync_state.parse()?,
            endpoint: self.endpoint.clone(),
            payload_encoding: self.payload_encoding.parse()?,
            revision: self.revision.max(0) as Revision,
            updated_at: self.updated_at.max(0) as u64,
        })
    }
}

/// Get all envelopes of a collection in insertion order, tombstones included.
pub async fn fetch_collection<'e, E>(
    executor: E,
    collection: Collection,
) -> std::result::Result<Vec<StoredEnvelope>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, StoredEnvelope>(&format!(
        "{SELECT_COLUMNS} WHERE collection = ?1 ORDER BY seq ASC"
    ))
    .bind(collection.as_str())
    .fetch_all(executor)
    .await
}

/// Get an envelope by collection and record ID, tombstones included.
pub async fn fetch_envelope<'e, E>(
    executor: E,
    collection: Collection,
    record_id: &str,
) -> std::result::Result<Option<StoredEnvelope>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, StoredEnvelope>(&format!(
        "{SELECT_COLUMNS} WHERE collection = ?1 AND record_id = ?2"
    ))
    .bind(collection.as_str())
    .bind(record_id)
    .fetch_optional(executor)
    .await
}

/// Insert a new envelope.
pub async fn insert_envelope<'e, E>(
    executor: E,
    row: &StoredEnvelope,
) -> std::result::Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO envelopes (
            collection, record_id, payload, sync_state, endpoint,
            payload_encoding, revision, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&row.collection)
    .bind(&row.record_id)
    .bind(&row.payload)
    .bind(&row.sync_state)
    .bind(&row.endpoint)
    .bind(&row.payload_encoding)
    .bind(row.revision)
    .bind(row.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Overwrite an existing envelope in place, keeping its insertion position.
pub async fn update_envelope<'e, E>(
    executor: E,
    row: &StoredEnvelope,
) -> std::result::Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE envelopes SET
            payload = ?3,
            sync_state = ?4,
            endpoint = ?5,
            payload_encoding = ?6,
            revision = ?7,
            updated_at = ?8
        WHERE collection = ?1 AND record_id = ?2
        "#,
    )
    .bind(&row.collection)
    .bind(&row.record_id)
    .bind(&row.payload)
    .bind(&row.sync_state)
    .bind(&row.endpoint)
    .bind(&row.payload_encoding)
    .bind(row.revision)
    .bind(row.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Write a clean envelope unless a dirty one with the same ID exists.
///
/// Returns the number of rows written (0 when a dirty row was kept).
pub async fn upsert_clean<'e, E>(
    executor: E,
    row: &StoredEnvelope,
) -> std::result::Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO envelopes (
            collection, record_id, payload, sync_state, endpoint,
            payload_encoding, revision, updated_at
        )
        VALUES (?1, ?2, ?3, 'clean', NULL, ?4, 0, ?5)
        ON CONFLICT (collection, record_id) DO UPDATE SET
            payload = excluded.payload,
            payload_encoding = excluded.payload_encoding,
            updated_at = excluded.updated_at
        WHERE envelopes.sync_state = 'clean'
        "#,
    )
    .bind(&row.collection)
    .bind(&row.record_id)
    .bind(&row.payload)
    .bind(&row.payload_encoding)
    .bind(row.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Remove one envelope regardless of its state.
pub async fn delete_envelope<'e, E>(
    executor: E,
    collection: Collection,
    record_id: &str,
) -> std::result::Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM envelopes WHERE collection = ?1 AND record_id = ?2")
        .bind(collection.as_str())
        .bind(record_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Remove a dirty envelope only if it is still at `revision`.
pub async fn delete_acknowledged<'e, E>(
    executor: E,
    collection: Collection,
    record_id: &str,
    revision: Revision,
) -> std::result::Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM envelopes
        WHERE collection = ?1 AND record_id = ?2 AND revision = ?3
          AND sync_state != 'clean'
        "#,
    )
    .bind(collection.as_str())
    .bind(record_id)
    .bind(revision as i64)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Remove every clean envelope of a collection.
pub async fn delete_clean<'e, E>(
    executor: E,
    collection: Collection,
) -> std::result::Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result =
        sqlx::query("DELETE FROM envelopes WHERE collection = ?1 AND sync_state = 'clean'")
            .bind(collection.as_str())
            .execute(executor)
            .await?;

    Ok(result.rows_affected())
}

/// Remove every envelope of a collection.
pub async fn delete_collection<'e, E>(
    executor: E,
    collection: Collection,
) -> std::result::Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM envelopes WHERE collection = ?1")
        .bind(collection.as_str())
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Count dirty envelopes in one collection.
pub async fn count_dirty<'e, E>(
    executor: E,
    collection: Collection,
) -> std::result::Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM envelopes WHERE collection = ?1 AND sync_state != 'clean'",
    )
    .bind(collection.as_str())
    .fetch_one(executor)
    .await?;

    Ok(result.0)
}

/// Count dirty envelopes across all collections.
pub async fn count_all_dirty<'e, E>(executor: E) -> std::result::Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM envelopes WHERE sync_state != 'clean'")
            .fetch_one(executor)
            .await?;

    Ok(result.0)
}
