//! Capped in-memory cache, lazily purged on miss (spec §4.5).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use pqo_schemas::idempotency::IdempotencyRecord;

pub struct LocalCache {
    max_entries: usize,
    entries: Mutex<HashMap<String, IdempotencyRecord>>,
}

impl LocalCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<IdempotencyRecord> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(record) if record.expires_at > now => Some(record.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, record: IdempotencyRecord) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        purge_expired(&mut entries, Utc::now());
        if entries.len() >= self.max_entries && !entries.contains_key(&record.key) {
            // No ordering metadata kept for strict LRU; drop an arbitrary
            // entry rather than let the cache grow unbounded.
            if let Some(victim) = entries.keys().next().cloned() {
                entries.remove(&victim);
            }
        }
        entries.insert(record.key.clone(), record);
    }

    pub fn purge_expired_now(&self) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        purge_expired(&mut entries, Utc::now());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }
}

fn purge_expired(entries: &mut HashMap<String, IdempotencyRecord>, now: DateTime<Utc>) {
    entries.retain(|_, record| record.expires_at > now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pqo_schemas::idempotency::IdempotencyStatus;

    fn record(key: &str, expires_in_secs: i64) -> IdempotencyRecord {
        IdempotencyRecord {
            key: key.to_string(),
            status: IdempotencyStatus::Completed,
            cached_result: None,
            error: None,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_secs),
            lease: None,
        }
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = LocalCache::new(10);
        cache.put(record("k1", -10));
        assert!(cache.get("k1", Utc::now()).is_none());
    }

    #[test]
    fn fresh_entries_round_trip() {
        let cache = LocalCache::new(10);
        cache.put(record("k1", 60));
        assert!(cache.get("k1", Utc::now()).is_some());
    }

    #[test]
    fn cache_evicts_when_over_capacity() {
        let cache = LocalCache::new(2);
        cache.put(record("k1", 60));
        cache.put(record("k2", 60));
        cache.put(record("k3", 60));
        assert!(cache.len() <= 2);
    }
}
