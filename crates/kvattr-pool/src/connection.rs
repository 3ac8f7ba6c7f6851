//! Backend connection contract
//!
//! The engine only ever speaks five commands to a backend. Keys and values are
//! opaque text; absence is `None`, never an error.

use kvattr_common::Result;

use crate::config::PoolSpec;

/// A single connection to a key-value backend
pub trait KvConnection: Send {
    /// GET key
    fn get(&mut self, key: &str) -> Result<Option<String>>;

    /// SET key value
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// DEL key [key ...]
    ///
    /// Returns the number of keys that existed. Deleting an absent key is not an error.
    fn del(&mut self, keys: &[String]) -> Result<usize>;

    /// MGET key [key ...]
    ///
    /// Values are positional, in the same order as `keys`.
    fn mget(&mut self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// MSET key value [key value ...]
    fn mset(&mut self, pairs: &[(String, String)]) -> Result<()>;
}

/// Opens new backend connections for a pool
pub trait Connector: Send + Sync {
    fn connect(&self, spec: &PoolSpec) -> Result<Box<dyn KvConnection>>;
}

impl<F> Connector for F
where
    F: Fn(&PoolSpec) -> Result<Box<dyn KvConnection>> + Send + Sync,
{
    fn connect(&self, spec: &PoolSpec) -> Result<Box<dyn KvConnection>> {
        self(spec)
    }
}
