//! Named connection pools for kvattr
//!
//! Pools are configured once per process from one spec or a list of named
//! specs, then resolved by name. Connections come from a [`Connector`]:
//! Redis-protocol servers by default, or the in-process [`MemoryStore`].

mod config;
mod connection;
mod memory;
mod pool;
#[cfg(feature = "redis")]
mod redis;
mod registry;

pub use config::{PoolConfig, PoolSpec, DEFAULT_POOL_NAME};
pub use connection::{Connector, KvConnection};
pub use memory::{CommandRecord, MemoryConnection, MemoryConnector, MemoryStore};
pub use pool::{Pool, PoolStats, PooledConnection};
#[cfg(feature = "redis")]
pub use registry::configure;
pub use registry::{configure_with, global, PoolRegistry};

#[cfg(feature = "redis")]
pub use crate::redis::{RedisConnection, RedisConnector};

pub use kvattr_common::{KvAttrError, Result};
