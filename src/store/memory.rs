use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::KvStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local store. Contents are lost on restart.
///
/// Expired entries are dropped lazily on access; `purge_expired` or the
/// sweeper task reclaims entries nobody reads again.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.map.len();
        self.map.retain(|_, e| !e.is_expired(now));
        before - self.map.len()
    }

    /// Run `purge_expired` every `every` on the current runtime.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = self.purge_expired();
                if removed > 0 {
                    debug!("Store sweeper removed {} expired entries", removed);
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let expired = match self.map.get(key) {
            Some(e) if !e.is_expired(now) => return Some(e.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.map.remove_if(key, |_, e| e.is_expired(now));
        }
        None
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let expires_at = ttl.map(|t| Instant::now() + t);
        self.map.insert(key.to_string(), Entry { value, expires_at });
    }

    async fn remove(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.map
            .remove(key)
            .and_then(|(_, e)| (!e.is_expired(now)).then_some(e.value))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        match self.map.get_mut(key) {
            Some(mut e) if !e.is_expired(now) => {
                e.expires_at = Some(now + ttl);
                true
            }
            _ => false,
        }
    }

    async fn incr(&self, key: &str, ttl: Duration) -> u64 {
        let now = Instant::now();
        let fresh = || Entry {
            value: "0".to_string(),
            expires_at: Some(now + ttl),
        };
        let mut entry = self.map.entry(key.to_string()).or_insert_with(fresh);
        if entry.is_expired(now) {
            *entry = fresh();
        }
        let next = entry.value.parse::<u64>().unwrap_or(0) + 1;
        entry.value = next.to_string();
        next
    }
}
