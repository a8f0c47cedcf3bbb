//! libSQL backend for the `RecordStore` trait.
//!
//! Every table shares one `records` table keyed by `(table_name, id)`. The row
//! itself is stored as a JSON document in `body`; `user_id` is duplicated into
//! its own column for owner filtering.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};

use crate::db::{ListQuery, RecordStore, Row, Table, require_identity};
use crate::error::DatabaseError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    table_name TEXT NOT NULL,
    id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (table_name, id)
);
CREATE INDEX IF NOT EXISTS idx_records_owner ON records (table_name, user_id);
"#;

/// libSQL record store.
pub struct LibSqlStore {
    db: Arc<LibSqlDatabase>,
}

impl LibSqlStore {
    /// Create a new local embedded database.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {}", e))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {}", e)))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Create the schema if it does not exist yet.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Query(format!("Migration failed: {}", e)))?;
        Ok(())
    }

    /// Create a new connection to the database.
    ///
    /// Sets `PRAGMA busy_timeout = 5000` on every connection so concurrent
    /// writers wait up to 5 seconds instead of failing instantly with
    /// "database is locked".
    pub async fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {}", e)))?;
        conn.query("PRAGMA busy_timeout = 5000", ())
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to set busy_timeout: {}", e)))?;
        Ok(conn)
    }

    async fn fetch_body(
        &self,
        conn: &Connection,
        table: Table,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Row>, DatabaseError> {
        let mut rows = conn
            .query(
                "SELECT body FROM records WHERE table_name = ?1 AND id = ?2 AND user_id = ?3",
                params![table.as_str(), id, user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            Some(row) => Ok(Some(parse_body(&get_text(&row, 0))?)),
            None => Ok(None),
        }
    }
}

// ==================== Helper functions ====================

fn get_text(row: &libsql::Row, idx: i32) -> String {
    row.get::<String>(idx).unwrap_or_default()
}

fn parse_body(body: &str) -> Result<Row, DatabaseError> {
    match serde_json::from_str::<serde_json::Value>(body)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(DatabaseError::Serialization(format!(
            "record body is not an object: {}",
            other
        ))),
    }
}

/// Only plain snake_case identifiers are allowed in JSON paths.
fn json_path(field: &str) -> Result<String, DatabaseError> {
    if field.is_empty()
        || !field
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(DatabaseError::Query(format!(
            "invalid sort field '{}'",
            field
        )));
    }
    Ok(format!("$.{}", field))
}

#[async_trait]
impl RecordStore for LibSqlStore {
    async fn insert(&self, table: Table, row: Row) -> Result<(), DatabaseError> {
        let (id, user_id) = require_identity(&row)?;
        let body = serde_json::to_string(&row)?;
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO records (table_name, id, user_id, body) VALUES (?1, ?2, ?3, ?4)",
            params![table.as_str(), id, user_id, body],
        )
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, table: Table, query: &ListQuery) -> Result<Vec<Row>, DatabaseError> {
        let path = json_path(query.order_by)?;
        let direction = if query.descending { "DESC" } else { "ASC" };
        // SQLite treats a negative LIMIT as unbounded.
        let limit = query.limit.map(|l| l as i64).unwrap_or(-1);
        // json_extract raises on malformed JSON, so corrupt bodies sort as NULL.
        let sql = format!(
            "SELECT id, body FROM records WHERE table_name = ?1 AND user_id = ?2 \
             ORDER BY CASE WHEN json_valid(body) THEN json_extract(body, ?3) END {direction}, \
             rowid {direction} LIMIT ?4"
        );

        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &sql,
                params![table.as_str(), query.user_id.as_str(), path, limit],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            match parse_body(&get_text(&row, 1)) {
                Ok(body) => results.push(body),
                Err(e) => tracing::warn!(
                    "Skipping corrupt {} record {}: {}",
                    table,
                    get_text(&row, 0),
                    e
                ),
            }
        }
        Ok(results)
    }

    async fn update(
        &self,
        table: Table,
        id: &str,
        user_id: &str,
        patch: Row,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        let mut body = self
            .fetch_body(&conn, table, id, user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: table.to_string(),
                id: id.to_string(),
            })?;

        for (key, value) in patch {
            if key == "id" || key == "user_id" {
                continue;
            }
            body.insert(key, value);
        }

        conn.execute(
            "UPDATE records SET body = ?4 WHERE table_name = ?1 AND id = ?2 AND user_id = ?3",
            params![table.as_str(), id, user_id, serde_json::to_string(&body)?],
        )
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, table: Table, id: &str, user_id: &str) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let count = conn
            .execute(
                "DELETE FROM records WHERE table_name = ?1 AND id = ?2 AND user_id = ?3",
                params![table.as_str(), id, user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_path_rejects_injection() {
        assert_eq!(json_path("created_at").unwrap(), "$.created_at");
        assert!(json_path("created_at') --").is_err());
        assert!(json_path("").is_err());
    }

    #[test]
    fn test_parse_body_requires_object() {
        assert!(parse_body(r#"{"id":"x"}"#).is_ok());
        assert!(parse_body("[1,2]").is_err());
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let store = LibSqlStore::new_local(&dir.path().join("corrupt.db"))
            .await
            .unwrap();
        store.run_migrations().await.unwrap();

        let mut good = Row::new();
        good.insert("id".into(), "agent_ok".into());
        good.insert("user_id".into(), "u1".into());
        good.insert("created_at".into(), "2024-05-01T12:00:00.000Z".into());
        store.insert(Table::Agents, good).await.unwrap();

        let conn = store.connect().await.unwrap();
        for (id, body) in [("agent_truncated", "{\"id\": \"agent_trunc"), ("agent_array", "[1, 2]")] {
            conn.execute(
                "INSERT INTO records (table_name, id, user_id, body) VALUES (?1, ?2, ?3, ?4)",
                params![Table::Agents.as_str(), id, "u1", body],
            )
            .await
            .unwrap();
        }

        let rows = store
            .list(Table::Agents, &ListQuery::newest_first("u1"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "agent_ok");
    }
}
