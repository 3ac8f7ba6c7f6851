//! Shared fixtures: record types backed by two in-memory pools
//!
//! `primary` is the default pool and `secondary` a named one. Every test
//! uses fresh identities, so tests can share the stores while running in
//! parallel.

#![allow(dead_code)]

use kvattr::prelude::*;
use kvattr::{KvAttrError, MemoryConnector, MemoryStore, PoolRegistry, Result};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const PRIMARY_URL: &str = "memory://primary";
pub const SECONDARY_URL: &str = "memory://secondary";

static CONNECTOR: Lazy<Arc<MemoryConnector>> = Lazy::new(|| Arc::new(MemoryConnector::new()));

pub static REGISTRY: Lazy<PoolRegistry> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    PoolRegistry::new(
        vec![
            PoolSpec::from_url(PRIMARY_URL).name("primary").pool_size(4).mark_default(),
            PoolSpec::from_url(SECONDARY_URL).name("secondary").pool_size(2),
        ],
        CONNECTOR.clone(),
    )
    .expect("valid test pools")
});

static NEXT_ID: AtomicU64 = AtomicU64::new(1000);

pub fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub fn primary() -> MemoryStore {
    CONNECTOR.store(PRIMARY_URL)
}

pub fn secondary() -> MemoryStore {
    CONNECTOR.store(SECONDARY_URL)
}

/// Operations of every command that touched keys under `prefix`
pub fn ops(store: &MemoryStore, prefix: &str) -> Vec<&'static str> {
    store.commands_touching(prefix).iter().map(|c| c.op).collect()
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

static POST_SCHEMA: Lazy<AttrSchema> = Lazy::new(|| {
    let mut schema = AttrSchema::new("Post");
    schema
        .define("name", AttrKind::String, AttrOptions::new())
        .define("int_version", AttrKind::Integer, AttrOptions::new())
        .define("default_title", AttrKind::String, AttrOptions::new().default("Untitled"))
        .define("title", AttrKind::String, AttrOptions::new())
        .define("content", AttrKind::String, AttrOptions::new().touch(Touch::Timestamp))
        .define(
            "version",
            AttrKind::Integer,
            AttrOptions::new()
                .default(1)
                .touch(Touch::columns(["saved_at", "changed_at"])),
        );
    schema
});

static POST_HOOKS: Lazy<AttrHooks<Post>> = Lazy::new(|| {
    AttrHooks::new()
        .before_save(Post::before_save)
        .after_save(Post::after_save)
        .touch(Post::touch)
});

#[derive(Debug, Default)]
pub struct Post {
    pub id: Option<u64>,
    pub attrs: AttrCache,
    /// Save callbacks in the order they ran
    pub calls: Vec<&'static str>,
    /// Column lists passed to each touch
    pub touched: Vec<Vec<String>>,
    /// Makes the before-save callback fail
    pub reject_save: bool,
    /// Makes the touch capability fail
    pub reject_touch: bool,
}

impl Post {
    /// Unsaved record
    pub fn new() -> Self {
        Self::default()
    }

    /// Persisted record with a fresh id
    pub fn create() -> Self {
        Self::with_id(next_id())
    }

    pub fn with_id(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Key prefix of this record, e.g. `posts:1000:`
    pub fn prefix(&self) -> String {
        format!("posts:{}:", self.id.unwrap_or_default())
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }

    fn before_save(&mut self) -> Result<()> {
        self.calls.push("before");
        if self.reject_save {
            return Err(KvAttrError::Hook("save rejected".to_string()));
        }
        Ok(())
    }

    fn after_save(&mut self) -> Result<()> {
        self.calls.push("after");
        Ok(())
    }

    fn touch(&mut self, columns: &[String]) -> Result<()> {
        if self.reject_touch {
            return Err(KvAttrError::Hook("touch rejected".to_string()));
        }
        self.touched.push(columns.to_vec());
        Ok(())
    }
}

impl AttrModel for Post {
    fn attr_schema() -> &'static AttrSchema {
        &POST_SCHEMA
    }

    fn attr_field(&self, field: &str) -> Option<String> {
        match field {
            "id" => self.id.map(|id| id.to_string()),
            _ => None,
        }
    }

    fn attr_cache(&self) -> &AttrCache {
        &self.attrs
    }

    fn attr_cache_mut(&mut self) -> &mut AttrCache {
        &mut self.attrs
    }

    fn attr_pools(&self) -> Result<&PoolRegistry> {
        Ok(&*REGISTRY)
    }

    fn attr_hooks() -> Option<&'static AttrHooks<Self>> {
        Some(&*POST_HOOKS)
    }
}

// ---------------------------------------------------------------------------
// CustomIdField: keyed by `uuid` instead of `id`
// ---------------------------------------------------------------------------

static CUSTOM_ID_SCHEMA: Lazy<AttrSchema> = Lazy::new(|| {
    let mut schema = AttrSchema::new("CustomIdField");
    schema
        .set_identity_field("uuid")
        .expect("identity field set once")
        .define("content", AttrKind::String, AttrOptions::new());
    schema
});

#[derive(Debug, Default)]
pub struct CustomIdField {
    pub id: u64,
    pub uuid: String,
    pub attrs: AttrCache,
}

impl CustomIdField {
    pub fn create() -> Self {
        let n = next_id();
        Self {
            id: n,
            uuid: format!("uuid-{}", n),
            attrs: AttrCache::new(),
        }
    }
}

impl AttrModel for CustomIdField {
    fn attr_schema() -> &'static AttrSchema {
        &CUSTOM_ID_SCHEMA
    }

    fn attr_field(&self, field: &str) -> Option<String> {
        match field {
            "id" => Some(self.id.to_string()),
            "uuid" => Some(self.uuid.clone()),
            _ => None,
        }
    }

    fn attr_cache(&self) -> &AttrCache {
        &self.attrs
    }

    fn attr_cache_mut(&mut self) -> &mut AttrCache {
        &mut self.attrs
    }

    fn attr_pools(&self) -> Result<&PoolRegistry> {
        Ok(&*REGISTRY)
    }
}

// ---------------------------------------------------------------------------
// CustomPoolName: routed through `secondary`, except `views`
// ---------------------------------------------------------------------------

static CUSTOM_POOL_SCHEMA: Lazy<AttrSchema> = Lazy::new(|| {
    let mut schema = AttrSchema::new("CustomPoolName");
    schema
        .set_pool("secondary")
        .expect("pool set once")
        .define("title", AttrKind::String, AttrOptions::new())
        .define("body", AttrKind::String, AttrOptions::new())
        .define("views", AttrKind::Integer, AttrOptions::new().pool("primary"));
    schema
});

#[derive(Debug, Default)]
pub struct CustomPoolName {
    pub id: u64,
    pub attrs: AttrCache,
}

impl CustomPoolName {
    pub fn create() -> Self {
        Self {
            id: next_id(),
            attrs: AttrCache::new(),
        }
    }

    pub fn prefix(&self) -> String {
        format!("custom_pool_names:{}:", self.id)
    }
}

impl AttrModel for CustomPoolName {
    fn attr_schema() -> &'static AttrSchema {
        &CUSTOM_POOL_SCHEMA
    }

    fn attr_field(&self, field: &str) -> Option<String> {
        (field == "id").then(|| self.id.to_string())
    }

    fn attr_cache(&self) -> &AttrCache {
        &self.attrs
    }

    fn attr_cache_mut(&mut self) -> &mut AttrCache {
        &mut self.attrs
    }

    fn attr_pools(&self) -> Result<&PoolRegistry> {
        Ok(&*REGISTRY)
    }
}
