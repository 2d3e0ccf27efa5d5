//! # Session Cache
//!
//! Endpoint-keyed client sessions.
//!
//! A session is created on first contact from an endpoint, gains a character
//! id after character selection, and is destroyed on disconnect or idle
//! timeout. The cache owns sessions exclusively; lookups return clones.
//!
//! ## Features
//! - **Thread-safe**: Mutex-guarded inner map for safe concurrent access
//! - **TTL-based expiration**: idle sessions expire after a configurable duration
//! - **Memory-bounded**: configurable maximum entries to prevent unbounded growth

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, trace};

/// One connected client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque token the client must present in-world.
    pub token: String,
    pub user_id: i64,
    /// Set after character selection.
    pub character_id: Option<i64>,
    created_at: Instant,
    last_seen: Instant,
}

impl Session {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.last_seen.elapsed() > ttl
    }
}

/// Thread-safe in-memory session cache keyed by remote endpoint.
#[derive(Debug)]
pub struct SessionCache {
    max_entries: usize,
    idle_ttl: Duration,
    inner: Mutex<SessionCacheInner>,
}

#[derive(Debug)]
struct SessionCacheInner {
    sessions: HashMap<SocketAddr, Session>,
    total_created: u64,
}

impl SessionCache {
    /// # Arguments
    /// * `max_entries` - maximum number of sessions to hold (e.g., 4096)
    /// * `idle_ttl` - idle duration after which a session expires
    pub fn new(max_entries: usize, idle_ttl: Duration) -> Self {
        Self {
            max_entries,
            idle_ttl,
            inner: Mutex::new(SessionCacheInner {
                sessions: HashMap::with_capacity(max_entries),
                total_created: 0,
            }),
        }
    }

    /// Creates a session for an endpoint and returns its token. A prior
    /// session for the same endpoint is replaced.
    pub async fn create_session(&self, endpoint: SocketAddr, user_id: i64) -> String {
        let token = format!("{:032x}", rand::random::<u128>());
        let now = Instant::now();
        let session = Session {
            token: token.clone(),
            user_id,
            character_id: None,
            created_at: now,
            last_seen: now,
        };

        let mut inner = self.inner.lock().await;
        Self::evict_expired(&mut inner, self.idle_ttl);

        inner.sessions.insert(endpoint, session);
        inner.total_created += 1;

        if inner.sessions.len() > self.max_entries {
            Self::evict_oldest(&mut inner);
        }

        trace!(session_count = inner.sessions.len(), %endpoint, "Session created");
        token
    }

    /// Attaches a character id after character selection. Returns false when
    /// no live session exists for the endpoint.
    pub async fn set_character(&self, endpoint: SocketAddr, character_id: i64) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.sessions.get_mut(&endpoint) {
            Some(session) => {
                session.character_id = Some(character_id);
                session.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Looks a session up by endpoint, refreshing its idle expiry.
    pub async fn get_session(&self, endpoint: SocketAddr) -> Option<Session> {
        let mut inner = self.inner.lock().await;

        if let Some(session) = inner.sessions.get_mut(&endpoint) {
            if !session.is_expired(self.idle_ttl) {
                session.last_seen = Instant::now();
                trace!(%endpoint, "Session cache hit");
                return Some(session.clone());
            }
        }

        inner.sessions.remove(&endpoint);
        trace!(%endpoint, "Session cache miss or expired");
        None
    }

    pub async fn delete_session(&self, endpoint: SocketAddr) {
        let mut inner = self.inner.lock().await;
        if inner.sessions.remove(&endpoint).is_some() {
            debug!(%endpoint, "Session deleted");
        }
    }

    pub async fn stats(&self) -> SessionCacheStats {
        let inner = self.inner.lock().await;
        let expired_count = inner
            .sessions
            .values()
            .filter(|s| s.is_expired(self.idle_ttl))
            .count();

        SessionCacheStats {
            total_entries: inner.sessions.len(),
            max_entries: self.max_entries,
            expired_count,
            total_created: inner.total_created,
        }
    }

    fn evict_expired(inner: &mut SessionCacheInner, ttl: Duration) {
        let before = inner.sessions.len();
        inner.sessions.retain(|_, session| !session.is_expired(ttl));
        let after = inner.sessions.len();

        if before != after {
            debug!(
                removed_count = before - after,
                remaining_count = after,
                "Expired sessions evicted"
            );
        }
    }

    fn evict_oldest(inner: &mut SessionCacheInner) {
        if let Some(oldest_key) = inner
            .sessions
            .iter()
            .min_by_key(|(_, session)| session.last_seen)
            .map(|(k, _)| *k)
        {
            inner.sessions.remove(&oldest_key);
            debug!("Oldest session evicted to make room");
        }
    }
}

/// Statistics about the session cache
#[derive(Debug, Clone, Copy)]
pub struct SessionCacheStats {
    pub total_entries: usize,
    pub max_entries: usize,
    pub expired_count: usize,
    pub total_created: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let cache = SessionCache::new(10, Duration::from_secs(60));

        let token = cache.create_session(endpoint(1000), 42).await;
        let session = cache.get_session(endpoint(1000)).await.unwrap();

        assert_eq!(session.token, token);
        assert_eq!(session.user_id, 42);
        assert_eq!(session.character_id, None);
    }

    #[tokio::test]
    async fn test_missing_session() {
        let cache = SessionCache::new(10, Duration::from_secs(60));
        assert!(cache.get_session(endpoint(1001)).await.is_none());
    }

    #[tokio::test]
    async fn test_set_character() {
        let cache = SessionCache::new(10, Duration::from_secs(60));

        cache.create_session(endpoint(1002), 7).await;
        assert!(cache.set_character(endpoint(1002), 333).await);

        let session = cache.get_session(endpoint(1002)).await.unwrap();
        assert_eq!(session.character_id, Some(333));

        assert!(!cache.set_character(endpoint(9999), 333).await);
    }

    #[tokio::test]
    async fn test_capacity_eviction() {
        let cache = SessionCache::new(3, Duration::from_secs(60));

        for i in 0..5u16 {
            cache.create_session(endpoint(2000 + i), i as i64).await;
        }

        let stats = cache.stats().await;
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.total_created, 5);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = SessionCache::new(10, Duration::from_secs(60));

        cache.create_session(endpoint(1003), 1).await;
        cache.delete_session(endpoint(1003)).await;

        assert!(cache.get_session(endpoint(1003)).await.is_none());
    }
}
