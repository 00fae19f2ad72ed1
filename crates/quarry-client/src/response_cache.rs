//! In-memory TTL cache for raw API response bodies, keyed by URL. Absorbs
//! bursts of identical queries without touching the persistent cache.

use rustc_hash::FxHashMap;
use tokio::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct ResponseCache {
    ttl: Duration,
    entries: tokio::sync::Mutex<FxHashMap<String, (Vec<u8>, Instant)>>,
}

impl ResponseCache {
    pub(crate) fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_seconds),
            entries: tokio::sync::Mutex::new(FxHashMap::default()),
        }
    }

    /// The cached body for a URL, unless expired (expired entries are
    /// removed on observation).
    pub(crate) async fn get(&self, url: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().await;
        match entries.get(url) {
            Some((body, expires_at)) if Instant::now() < *expires_at => Some(body.clone()),
            Some(_) => {
                entries.remove(url);
                None
            }
            None => None,
        }
    }

    pub(crate) async fn insert(&self, url: &str, body: Vec<u8>) {
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .lock()
            .await
            .insert(url.to_string(), (body, expires_at));
    }

    pub(crate) async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
