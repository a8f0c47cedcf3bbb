//! Time-bounded memo of read results.
//!
//! Keys combine an entity kind, a user and optional query parameters, so a
//! write for one user only evicts that user's entries of that kind.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::config::CacheConfig;

/// What a cached value is a listing of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Agents,
    Workflows,
    SystemPrompts,
    Projects,
    ChatMessages,
    /// Marker that default data has been seeded for a user.
    Initialized,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agents => "agents",
            Self::Workflows => "workflows",
            Self::SystemPrompts => "system_prompts",
            Self::Projects => "projects",
            Self::ChatMessages => "chat_messages",
            Self::Initialized => "initialized",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key: `(kind, user, params)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: EntityKind,
    pub user_id: String,
    /// Canonical JSON of the query parameters, if any.
    pub params: Option<String>,
}

impl CacheKey {
    pub fn new(kind: EntityKind, user_id: impl Into<String>) -> Self {
        Self {
            kind,
            user_id: user_id.into(),
            params: None,
        }
    }

    /// Key with parameters. Parameter objects that differ only in field
    /// order produce the same key.
    pub fn with_params<P: Serialize>(kind: EntityKind, user_id: impl Into<String>, params: &P) -> Self {
        let params = match serde_json::to_value(params) {
            Ok(value) => {
                let mut out = String::new();
                write_canonical(&value, &mut out);
                out
            }
            Err(e) => {
                tracing::warn!("Unserializable cache parameters for {}: {}", kind, e);
                String::from("<invalid>")
            }
        };
        Self {
            kind,
            user_id: user_id.into(),
            params: Some(params),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.params {
            Some(p) => write!(f, "{}:{}:{}", self.kind, self.user_id, p),
            None => write!(f, "{}:{}", self.kind, self.user_id),
        }
    }
}

/// JSON with object keys sorted at every level.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    stored_at: Instant,
}

/// Invalidation counter snapshot for one `(kind, user)` scope.
///
/// A reader takes one before it fetches and hands it back to
/// [`ResultCache::set_if_current`]; any invalidation of the scope in between
/// makes the snapshot stale and the write is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    epoch: u64,
    scoped: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    scoped: HashMap<(EntityKind, String), u64>,
    kinds: HashMap<EntityKind, u64>,
    epoch: u64,
}

impl CacheState {
    fn generation(&self, kind: EntityKind, user_id: &str) -> Generation {
        let scoped = self
            .scoped
            .get(&(kind, user_id.to_string()))
            .copied()
            .unwrap_or(0);
        Generation {
            epoch: self.epoch + self.kinds.get(&kind).copied().unwrap_or(0),
            scoped,
        }
    }

    fn insert(&mut self, key: CacheKey, value: Arc<dyn Any + Send + Sync>) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }
}

/// In-memory result cache with a fixed freshness window.
pub struct ResultCache {
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl ResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_ttl(config.ttl)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch a fresh value. Expired entries are evicted on access.
    pub async fn get<T>(&self, key: &CacheKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        {
            let state = self.state.read().await;
            match state.entries.get(key) {
                None => return None,
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    return entry.value.downcast_ref::<T>().cloned();
                }
                Some(_) => {}
            }
        }

        let mut state = self.state.write().await;
        if state
            .entries
            .get(key)
            .is_some_and(|e| e.stored_at.elapsed() >= self.ttl)
        {
            state.entries.remove(key);
            tracing::debug!("Cache entry expired: {}", key);
        }
        None
    }

    pub async fn set<T>(&self, key: CacheKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.state.write().await.insert(key, Arc::new(value));
    }

    /// Current invalidation generation of `(kind, user_id)`.
    pub async fn generation(&self, kind: EntityKind, user_id: &str) -> Generation {
        self.state.read().await.generation(kind, user_id)
    }

    /// Store `value` only if the key's scope has not been invalidated since
    /// `seen` was taken. Returns whether the value was stored.
    pub async fn set_if_current<T>(&self, key: CacheKey, value: T, seen: Generation) -> bool
    where
        T: Send + Sync + 'static,
    {
        let mut state = self.state.write().await;
        if state.generation(key.kind, &key.user_id) != seen {
            tracing::debug!("Discarding stale read for {}", key);
            return false;
        }
        state.insert(key, Arc::new(value));
        true
    }

    /// Drop every entry for `(kind, user_id)`, whatever its parameters.
    /// Returns the number of entries removed.
    pub async fn invalidate(&self, kind: EntityKind, user_id: &str) -> usize {
        let mut state = self.state.write().await;
        *state.scoped.entry((kind, user_id.to_string())).or_insert(0) += 1;
        let before = state.entries.len();
        state
            .entries
            .retain(|k, _| !(k.kind == kind && k.user_id == user_id));
        let removed = before - state.entries.len();
        if removed > 0 {
            tracing::debug!("Invalidated {} cache entries for {}:{}", removed, kind, user_id);
        }
        removed
    }

    /// Drop every entry of `kind` for all users.
    pub async fn invalidate_kind(&self, kind: EntityKind) -> usize {
        let mut state = self.state.write().await;
        *state.kinds.entry(kind).or_insert(0) += 1;
        let before = state.entries.len();
        state.entries.retain(|k, _| k.kind != kind);
        before - state.entries.len()
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.epoch += 1;
        state.entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
