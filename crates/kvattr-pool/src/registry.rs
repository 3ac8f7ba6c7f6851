//! Named pool registry
//!
//! Holds every configured pool by name plus the designated default. A
//! process-wide registry can be installed once with [`configure`] or
//! [`configure_with`] and read back with [`global`].

use kvattr_common::{KvAttrError, Result};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::{PoolConfig, PoolSpec, DEFAULT_POOL_NAME};
use crate::connection::Connector;
use crate::pool::Pool;

static REGISTRY: OnceCell<PoolRegistry> = OnceCell::new();

/// Set of named pools with one default
#[derive(Debug)]
pub struct PoolRegistry {
    pools: HashMap<String, Arc<Pool>>,
    /// Configuration order
    order: Vec<String>,
    default_name: String,
}

impl PoolRegistry {
    /// Validate `config` and build its pools. No connection is opened.
    ///
    /// A single spec is named `default` unless it carries a name. A list
    /// needs every entry named, unique names and exactly one `default: true`.
    pub fn new(config: impl Into<PoolConfig>, connector: Arc<dyn Connector>) -> Result<Self> {
        let (specs, default_name) = match config.into() {
            PoolConfig::Single(mut spec) => {
                let name = spec
                    .name
                    .get_or_insert_with(|| DEFAULT_POOL_NAME.to_string())
                    .clone();
                (vec![spec], name)
            }
            PoolConfig::Multi(specs) => {
                let default_name = Self::validate_multi(&specs)?;
                (specs, default_name)
            }
        };

        let mut pools = HashMap::with_capacity(specs.len());
        let mut order = Vec::with_capacity(specs.len());
        for spec in specs {
            Self::validate_spec(&spec)?;
            let name = spec.name.clone().unwrap_or_else(|| DEFAULT_POOL_NAME.to_string());
            info!(pool = %name, size = spec.pool_size, "Configured key-value pool");
            order.push(name.clone());
            pools.insert(name.clone(), Arc::new(Pool::new(name, spec, Arc::clone(&connector))));
        }

        Ok(Self {
            pools,
            order,
            default_name,
        })
    }

    fn validate_multi(specs: &[PoolSpec]) -> Result<String> {
        if specs.is_empty() {
            return Err(KvAttrError::Configuration(
                "pool list must not be empty".to_string(),
            ));
        }

        let mut seen = Vec::with_capacity(specs.len());
        for (idx, spec) in specs.iter().enumerate() {
            let name = match spec.name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name,
                _ => {
                    return Err(KvAttrError::Configuration(format!(
                        "pool #{} ({}) needs a name when several pools are configured",
                        idx,
                        spec.label()
                    )))
                }
            };
            if seen.contains(&name) {
                return Err(KvAttrError::Configuration(format!(
                    "duplicate pool name '{}'",
                    name
                )));
            }
            seen.push(name);
        }

        let defaults: Vec<&PoolSpec> = specs.iter().filter(|s| s.default).collect();
        match defaults.as_slice() {
            [only] => Ok(only.label()),
            [] => Err(KvAttrError::Configuration(
                "one pool must be flagged `default: true`".to_string(),
            )),
            _ => Err(KvAttrError::Configuration(format!(
                "only one pool may be the default, found {}",
                defaults.len()
            ))),
        }
    }

    fn validate_spec(spec: &PoolSpec) -> Result<()> {
        spec.connection_url()?;
        if spec.pool_size == 0 {
            return Err(KvAttrError::Configuration(format!(
                "pool '{}' must allow at least one connection",
                spec.label()
            )));
        }
        Ok(())
    }

    /// Pool registered under `name`, or the default pool for `None`
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<Pool>> {
        let name = name.unwrap_or(&self.default_name);
        self.pools
            .get(name)
            .cloned()
            .ok_or_else(|| KvAttrError::UnknownPool(name.to_string()))
    }

    /// The default pool
    pub fn default_pool(&self) -> Arc<Pool> {
        // The default name is always registered by `new`
        match self.pools.get(&self.default_name) {
            Some(pool) => Arc::clone(pool),
            None => unreachable!("default pool '{}' missing", self.default_name),
        }
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Pool names in configuration order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }
}

/// Install the process-wide registry backed by Redis connections
#[cfg(feature = "redis")]
pub fn configure(config: impl Into<PoolConfig>) -> Result<&'static PoolRegistry> {
    configure_with(config, Arc::new(crate::redis::RedisConnector))
}

/// Install the process-wide registry with a custom connector
///
/// Fails if a registry is already installed.
pub fn configure_with(
    config: impl Into<PoolConfig>,
    connector: Arc<dyn Connector>,
) -> Result<&'static PoolRegistry> {
    let registry = PoolRegistry::new(config, connector)?;
    REGISTRY.set(registry).map_err(|_| {
        KvAttrError::Configuration("key-value pools are already configured".to_string())
    })?;
    global()
}

/// The process-wide registry
pub fn global() -> Result<&'static PoolRegistry> {
    REGISTRY.get().ok_or_else(|| {
        KvAttrError::Configuration(
            "key-value pools are not configured, call kvattr_pool::configure first".to_string(),
        )
    })
}
