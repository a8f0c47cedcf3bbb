//! Record store abstraction.
//!
//! The hosted backend is modelled as a small table-oriented record store: each
//! table holds JSON rows keyed by `id` and owned by `user_id`. Rows use the
//! snake_case storage field names; typed record shapes and their codecs live
//! in [`crate::data::records`].
//!
//! Two implementations exist:
//!
//! - [`InMemoryStore`]: process-local, used by tests and demos
//! - `LibSqlStore` (feature `libsql`, default): embedded libSQL database file

mod memory;

#[cfg(feature = "libsql")]
pub mod libsql_backend;

pub use memory::InMemoryStore;

#[cfg(feature = "libsql")]
pub use libsql_backend::LibSqlStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::error::DatabaseError;

/// A storage row: a JSON object with snake_case keys.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Tables known to the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Agents,
    Workflows,
    SystemPrompts,
    Projects,
    ChatMessages,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agents => "agents",
            Self::Workflows => "workflows",
            Self::SystemPrompts => "system_prompts",
            Self::Projects => "projects",
            Self::ChatMessages => "chat_messages",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a list query: rows owned by `user_id`, sorted by one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub user_id: String,
    /// Storage field to sort on.
    pub order_by: &'static str,
    pub descending: bool,
    pub limit: Option<usize>,
}

impl ListQuery {
    /// Newest first by `created_at`.
    pub fn newest_first(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            order_by: "created_at",
            descending: true,
            limit: None,
        }
    }

    pub fn order_by(mut self, field: &'static str, descending: bool) -> Self {
        self.order_by = field;
        self.descending = descending;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Backend-agnostic record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new row. The row must carry `id` and `user_id`.
    async fn insert(&self, table: Table, row: Row) -> Result<(), DatabaseError>;

    /// List rows owned by `query.user_id`.
    async fn list(&self, table: Table, query: &ListQuery) -> Result<Vec<Row>, DatabaseError>;

    /// Merge `patch` into the row with `id` owned by `user_id`.
    async fn update(
        &self,
        table: Table,
        id: &str,
        user_id: &str,
        patch: Row,
    ) -> Result<(), DatabaseError>;

    /// Delete the row with `id` owned by `user_id`. Returns whether a row was removed.
    async fn delete(&self, table: Table, id: &str, user_id: &str) -> Result<bool, DatabaseError>;
}

/// Create a record store from configuration, run migrations, and return it.
pub async fn connect_from_config(
    config: &DatabaseConfig,
) -> Result<Arc<dyn RecordStore>, DatabaseError> {
    match config.backend {
        DatabaseBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "libsql")]
        DatabaseBackend::LibSql => {
            let store = LibSqlStore::new_local(&config.libsql_path).await?;
            store.run_migrations().await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "libsql"))]
        DatabaseBackend::LibSql => Err(DatabaseError::Pool(
            "libSQL backend not available. Enable the 'libsql' feature.".to_string(),
        )),
    }
}

/// Read a string field from a row.
pub(crate) fn row_str<'a>(row: &'a Row, field: &str) -> Option<&'a str> {
    row.get(field).and_then(|v| v.as_str())
}

/// Validate that `row` carries the identity fields every table requires.
pub(crate) fn require_identity(row: &Row) -> Result<(&str, &str), DatabaseError> {
    let id = row_str(row, "id")
        .ok_or_else(|| DatabaseError::Query("row is missing string field 'id'".to_string()))?;
    let user_id = row_str(row, "user_id").ok_or_else(|| {
        DatabaseError::Query("row is missing string field 'user_id'".to_string())
    })?;
    Ok((id, user_id))
}
