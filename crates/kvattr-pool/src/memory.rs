//! In-process key-value backend
//!
//! `MemoryStore` is a shared map that speaks the same five commands as a real
//! backend. Every command is recorded so callers can count round trips, and
//! key prefixes can be marked as failing to simulate transport faults.

use dashmap::DashMap;
use kvattr_common::{KvAttrError, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::config::PoolSpec;
use crate::connection::{Connector, KvConnection};

/// One backend round trip as seen by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub op: &'static str,
    pub keys: Vec<String>,
}

impl CommandRecord {
    /// True if any key of this command starts with `prefix`
    pub fn touches(&self, prefix: &str) -> bool {
        self.keys.iter().any(|k| k.starts_with(prefix))
    }
}

#[derive(Default)]
struct StoreInner {
    data: DashMap<String, String>,
    log: Mutex<Vec<CommandRecord>>,
    failing: RwLock<Vec<String>>,
}

/// Shared in-memory backend. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection to this store
    pub fn connection(&self) -> MemoryConnection {
        MemoryConnection {
            store: self.clone(),
        }
    }

    /// Read a key directly, bypassing the command log
    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner.data.get(key).map(|v| v.value().clone())
    }

    /// Check a key directly, bypassing the command log
    pub fn contains(&self, key: &str) -> bool {
        self.inner.data.contains_key(key)
    }

    /// Write a key directly, bypassing the command log
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.data.insert(key.into(), value.into());
    }

    /// Keys starting with `prefix`, sorted
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .data
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    /// Every command executed so far
    pub fn commands(&self) -> Vec<CommandRecord> {
        self.inner.log.lock().clone()
    }

    /// Commands that touched at least one key starting with `prefix`
    pub fn commands_touching(&self, prefix: &str) -> Vec<CommandRecord> {
        self.inner
            .log
            .lock()
            .iter()
            .filter(|c| c.touches(prefix))
            .cloned()
            .collect()
    }

    /// Make every command touching a key under `prefix` fail with a transport error
    pub fn fail_prefix(&self, prefix: impl Into<String>) {
        self.inner.failing.write().push(prefix.into());
    }

    /// Undo [`MemoryStore::fail_prefix`]
    pub fn heal_prefix(&self, prefix: &str) {
        self.inner.failing.write().retain(|p| p != prefix);
    }

    fn record(&self, op: &'static str, keys: Vec<String>) -> Result<()> {
        let failing = self
            .inner
            .failing
            .read()
            .iter()
            .find(|p| keys.iter().any(|k| k.starts_with(p.as_str())))
            .cloned();

        self.inner.log.lock().push(CommandRecord { op, keys });

        match failing {
            Some(prefix) => Err(KvAttrError::Transport(format!(
                "{} failed: backend unavailable for '{}'",
                op, prefix
            ))),
            None => Ok(()),
        }
    }
}

/// Connection handle onto a [`MemoryStore`]
pub struct MemoryConnection {
    store: MemoryStore,
}

impl KvConnection for MemoryConnection {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.store.record("GET", vec![key.to_string()])?;
        Ok(self.store.peek(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.store.record("SET", vec![key.to_string()])?;
        self.store.insert(key, value);
        Ok(())
    }

    fn del(&mut self, keys: &[String]) -> Result<usize> {
        self.store.record("DEL", keys.to_vec())?;
        Ok(keys
            .iter()
            .filter(|k| self.store.inner.data.remove(k.as_str()).is_some())
            .count())
    }

    fn mget(&mut self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.store.record("MGET", keys.to_vec())?;
        Ok(keys.iter().map(|k| self.store.peek(k)).collect())
    }

    fn mset(&mut self, pairs: &[(String, String)]) -> Result<()> {
        self.store
            .record("MSET", pairs.iter().map(|(k, _)| k.clone()).collect())?;
        for (key, value) in pairs {
            self.store.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// Connector handing out [`MemoryStore`] connections, one store per address
#[derive(Default)]
pub struct MemoryConnector {
    stores: DashMap<String, MemoryStore>,
}

impl MemoryConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The store behind an address, created on first use
    pub fn store(&self, url: &str) -> MemoryStore {
        self.stores.entry(url.to_string()).or_default().clone()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, spec: &PoolSpec) -> Result<Box<dyn KvConnection>> {
        let url = spec.connection_url()?;
        Ok(Box::new(self.store(&url).connection()))
    }
}
