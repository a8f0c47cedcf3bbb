//! In-memory record store.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::db::{ListQuery, RecordStore, Row, Table, require_identity, row_str};
use crate::error::DatabaseError;

/// Process-local record store.
///
/// Rows are kept in insertion order per table. Failures can be queued with
/// [`fail_next`](Self::fail_next) to exercise rate-limit and error paths: each
/// queued error is returned by the next operation instead of running it.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<Table, Vec<Row>>>,
    injected: Mutex<VecDeque<DatabaseError>>,
    operations: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error to be returned by the next operation.
    pub fn fail_next(&self, error: DatabaseError) {
        if let Ok(mut queue) = self.injected.lock() {
            queue.push_back(error);
        }
    }

    /// Number of operations attempted, including injected failures.
    pub fn operations(&self) -> u64 {
        self.operations.load(AtomicOrdering::Relaxed)
    }

    /// All rows of a table in insertion order, regardless of owner.
    pub async fn rows(&self, table: Table) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    fn begin(&self) -> Result<(), DatabaseError> {
        self.operations.fetch_add(1, AtomicOrdering::Relaxed);
        let injected = self.injected.lock().ok().and_then(|mut q| q.pop_front());
        match injected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert(&self, table: Table, row: Row) -> Result<(), DatabaseError> {
        self.begin()?;
        let (id, _) = require_identity(&row)?;

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();
        if rows.iter().any(|r| row_str(r, "id") == Some(id)) {
            return Err(DatabaseError::Query(format!(
                "duplicate id '{}' in table {}",
                id, table
            )));
        }
        rows.push(row);
        Ok(())
    }

    async fn list(&self, table: Table, query: &ListQuery) -> Result<Vec<Row>, DatabaseError> {
        self.begin()?;
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(&table) else {
            return Ok(Vec::new());
        };

        // Newest insertions first so that, after a stable sort, ties on the
        // sort field come back most-recent first when descending.
        let mut owned: Vec<Row> = if query.descending {
            rows.iter()
                .rev()
                .filter(|r| row_str(r, "user_id") == Some(query.user_id.as_str()))
                .cloned()
                .collect()
        } else {
            rows.iter()
                .filter(|r| row_str(r, "user_id") == Some(query.user_id.as_str()))
                .cloned()
                .collect()
        };

        owned.sort_by(|a, b| {
            let ord = compare_values(a.get(query.order_by), b.get(query.order_by));
            if query.descending { ord.reverse() } else { ord }
        });

        if let Some(limit) = query.limit {
            owned.truncate(limit);
        }
        Ok(owned)
    }

    async fn update(
        &self,
        table: Table,
        id: &str,
        user_id: &str,
        patch: Row,
    ) -> Result<(), DatabaseError> {
        self.begin()?;
        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(&table)
            .and_then(|rows| {
                rows.iter_mut().find(|r| {
                    row_str(r, "id") == Some(id) && row_str(r, "user_id") == Some(user_id)
                })
            })
            .ok_or_else(|| DatabaseError::NotFound {
                entity: table.to_string(),
                id: id.to_string(),
            })?;

        for (key, value) in patch {
            // Identity is immutable.
            if key == "id" || key == "user_id" {
                continue;
            }
            row.insert(key, value);
        }
        Ok(())
    }

    async fn delete(&self, table: Table, id: &str, user_id: &str) -> Result<bool, DatabaseError> {
        self.begin()?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(&table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| !(row_str(r, "id") == Some(id) && row_str(r, "user_id") == Some(user_id)));
        Ok(rows.len() != before)
    }
}

/// Order two JSON values: timestamps chronologically, numbers numerically,
/// everything else by string form. Missing values sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => x.with_timezone(&Utc).cmp(&y.with_timezone(&Utc)),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
