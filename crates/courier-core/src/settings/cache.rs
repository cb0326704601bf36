//! Cache-with-TTL seam.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// String cache with per-entry expiry, owned by the host application.
pub trait Cache: Send + Sync {
    /// Returns the cached value if present and not expired.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores a value for `ttl`.
    fn set(&self, key: &str, value: String, ttl: Duration);

    /// Removes a value.
    fn forget(&self, key: &str);
}

/// In-process [`Cache`] implementation.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries();
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        let expires = Instant::now() + ttl;
        self.entries().insert(key.to_string(), (value, expires));
    }

    fn forget(&self, key: &str) {
        self.entries().remove(key);
    }
}
