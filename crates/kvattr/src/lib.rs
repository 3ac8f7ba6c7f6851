//! Attribute-level key-value caching for ORM records
//!
//! Selected fields of a record live in a key-value backend under
//! `<collection>:<id>:<attribute>` instead of the relational store, and take
//! part in the record's lifecycle and change tracking.
//!
//! # Example
//! ```rust,ignore
//! use kvattr::prelude::*;
//! use once_cell::sync::Lazy;
//!
//! static POST: Lazy<AttrSchema> = Lazy::new(|| {
//!     let mut schema = AttrSchema::new("Post");
//!     schema
//!         .define("title", AttrKind::String, AttrOptions::new())
//!         .define("version", AttrKind::Integer, AttrOptions::new().default(1));
//!     schema
//! });
//!
//! struct Post {
//!     id: i64,
//!     attrs: AttrCache,
//! }
//!
//! impl AttrModel for Post {
//!     fn attr_schema() -> &'static AttrSchema { &POST }
//!     fn attr_field(&self, field: &str) -> Option<String> {
//!         (field == "id").then(|| self.id.to_string())
//!     }
//!     fn attr_cache(&self) -> &AttrCache { &self.attrs }
//!     fn attr_cache_mut(&mut self) -> &mut AttrCache { &mut self.attrs }
//! }
//!
//! kvattr::configure(PoolSpec::from_url("redis://localhost:8888"))?;
//!
//! let mut post = Post { id: 7, attrs: AttrCache::new() };
//! assert_eq!(post.get_int("version")?, Some(1));
//! post.set_attr("version", "5")?;
//! post.save_attrs()?;
//! ```

pub mod batch;
pub mod coerce;
pub mod engine;
pub mod inflect;
pub mod lifecycle;
pub mod model;
pub mod schema;
pub mod state;

pub use batch::{load_many, LoadAttrs};
pub use coerce::{coerce, coerce_as, decode, default_for, parse_int, AttrKind, AttrValue, IntoAttr};
pub use engine::AttrAccess;
pub use lifecycle::{AttrLifecycle, LifecycleEvent};
pub use model::{AttrHooks, AttrModel, HookFn, TouchFn};
pub use schema::{AttrDefinition, AttrOptions, AttrSchema, Touch, DEFAULT_IDENTITY_FIELD};
pub use state::{AttrCache, AttrChange, Slot};

#[cfg(feature = "redis")]
pub use kvattr_pool::configure;
pub use kvattr_pool::{
    configure_with, global, Connector, KvConnection, MemoryConnector, MemoryStore, Pool,
    PoolConfig, PoolRegistry, PoolSpec,
};

pub use kvattr_common::{KvAttrError, Result};

/// Everything a host type needs to declare and use cached attributes
pub mod prelude {
    pub use crate::{
        AttrAccess, AttrCache, AttrHooks, AttrKind, AttrLifecycle, AttrModel, AttrOptions,
        AttrSchema, AttrValue, LoadAttrs, PoolSpec, Touch,
    };
}
