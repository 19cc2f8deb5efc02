use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::SharedStore;

/// Process-local store used by tests and the stub deployment.
///
/// Records every `set` in order and can be switched offline to exercise the
/// unreachable-store paths.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
    offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the store becoming unreachable (or reachable again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every successful `set`, oldest first. Flushes do not clear it.
    pub fn write_log(&self) -> Vec<(String, String)> {
        self.writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(anyhow!("in-memory store is offline"));
        }
        Ok(())
    }
}

impl SharedStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_online()?;
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_online()?;
        self.entries
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        self.writes
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn flush_all(&self) -> Result<()> {
        self.check_online()?;
        self.entries
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_store_fails_every_call() {
        let store = InMemoryStore::new();
        store.set("k", "v").expect("set");
        store.set_offline(true);
        assert!(store.get("k").is_err());
        assert!(store.set("k", "w").is_err());
        assert!(store.flush_all().is_err());
        store.set_offline(false);
        assert_eq!(store.get("k").expect("get").as_deref(), Some("v"));
    }

    #[test]
    fn flush_clears_entries_but_keeps_write_log() {
        let store = InMemoryStore::new();
        store.set("a", "1").expect("set");
        store.flush_all().expect("flush");
        assert!(!store.exists("a").expect("exists"));
        assert_eq!(store.write_log().len(), 1);
    }
}
