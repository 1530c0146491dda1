//! In-process session attributes.
//!
//! Attributes are stored as JSON per client session id. The single `RwLock` is the only
//! serialization between concurrent requests of one session. A session untouched for longer
//! than the idle timeout reads back as empty and is dropped on its next access or by
//! [`SessionStore::sweep`].

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::SearchType;
use crate::errors::ApiError;
use crate::grid::SortSpec;

/// Idle time after which a session is forgotten, unless configured otherwise.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

type Attributes = HashMap<String, serde_json::Value>;

#[derive(Debug)]
struct SessionEntry {
    attributes: Attributes,
    last_access: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            attributes: Attributes::new(),
            last_access: Instant::now(),
        }
    }

    fn is_expired(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.duration_since(self.last_access) > idle_timeout
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, SessionEntry>>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    /// Live attributes of `session`, touched. An expired session is evicted first.
    fn live<'a>(&self, sessions: &'a mut HashMap<String, SessionEntry>, session: &str) -> Option<&'a mut Attributes> {
        let now = Instant::now();
        if sessions.get(session).is_some_and(|entry| entry.is_expired(now, self.idle_timeout)) {
            sessions.remove(session);
            debug!(session, "Session expired");
            return None;
        }
        let entry = sessions.get_mut(session)?;
        entry.last_access = now;
        Some(&mut entry.attributes)
    }

    /// Read an attribute. A value that no longer deserializes is treated as absent.
    pub async fn get<T: DeserializeOwned>(&self, session: &str, key: &str) -> Option<T> {
        let mut guard = self.inner.write().await;
        let value = self.live(&mut guard, session)?.get(key)?.clone();
        drop(guard);
        serde_json::from_value(value)
            .map_err(|err| warn!(session, key, error = %err, "Discarding unreadable session attribute"))
            .ok()
    }

    /// # Errors
    /// Fails only if `value` cannot be represented as JSON.
    pub async fn put<T: Serialize>(&self, session: &str, key: &str, value: &T) -> Result<(), ApiError> {
        let json = serde_json::to_value(value)
            .map_err(|err| ApiError::internal("Cannot store session state", Some(err.to_string())))?;
        let mut guard = self.inner.write().await;
        if self.live(&mut guard, session).is_none() {
            guard.insert(session.to_string(), SessionEntry::new());
        }
        if let Some(attrs) = guard.get_mut(session) {
            attrs.attributes.insert(key.to_string(), json);
        }
        Ok(())
    }

    pub async fn remove(&self, session: &str, key: &str) -> bool {
        let mut guard = self.inner.write().await;
        self.live(&mut guard, session)
            .is_some_and(|attrs| attrs.remove(key).is_some())
    }

    /// Remove every key owned by `search_type`, leaving all other attributes alone.
    pub async fn clear_type(&self, session: &str, search_type: SearchType) {
        let mut guard = self.inner.write().await;
        if let Some(attrs) = self.live(&mut guard, session) {
            for key in search_type.session_keys() {
                attrs.remove(&key);
            }
        }
    }

    pub async fn keys(&self, session: &str) -> Vec<String> {
        let mut guard = self.inner.write().await;
        let mut keys: Vec<String> = self
            .live(&mut guard, session)
            .map(|attrs| attrs.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Number of sessions held, expired or not.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Drop every expired session. Returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, entry| !entry.is_expired(now, self.idle_timeout));
        before - guard.len()
    }

    /// Sweep on a fixed period for as long as the runtime lives.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let store = self.clone();
        let period = period.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let evicted = store.sweep().await;
                if evicted > 0 {
                    debug!(evicted, "Evicted idle sessions");
                }
            }
        })
    }
}

/// Last grid position of a search, reused when the client omits paging or sorting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GridState {
    pub start: u64,
    pub limit: u64,
    #[serde(default)]
    pub sorters: Vec<SortSpec>,
}

/// Progress of the last export of a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportMonitor {
    pub format: String,
    pub file_name: String,
    pub rows: u64,
    pub completed: bool,
}
