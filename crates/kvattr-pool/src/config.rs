//! Pool configuration
//!
//! A pool is described by a [`PoolSpec`]. Setup accepts either one spec or a
//! list of named specs, from code, JSON, YAML or the environment.
//!
//! # Example
//! ```rust,ignore
//! use kvattr_pool::{PoolConfig, PoolSpec};
//!
//! // Single pool, becomes the `default` pool
//! let config = PoolConfig::from(PoolSpec::from_url("redis://localhost:8888"));
//!
//! // Several pools, exactly one flagged as default
//! let config = PoolConfig::from_yaml(r#"
//! - { url: "redis://localhost:8888", name: ssdb, pool_size: 10, timeout: 2, default: true }
//! - { url: "redis://localhost:6379", name: redis, pool_size: 5, timeout: 3 }
//! "#)?;
//! ```

use kvattr_common::{KvAttrError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name given to a single pool configured without a name
pub const DEFAULT_POOL_NAME: &str = "default";

/// Connection and sizing parameters for one pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSpec {
    /// Pool name (required when several pools are configured)
    pub name: Option<String>,
    /// Backend URL, takes precedence over host/port
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Maximum concurrent connections
    #[serde(alias = "pool")]
    pub pool_size: usize,
    /// Checkout timeout, in (fractional) seconds
    ///
    /// Also bounds connect, read and write on Redis connections. Zero means
    /// no limit.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Marks the default pool in a multi-pool list
    pub default: bool,
}

impl Default for PoolSpec {
    fn default() -> Self {
        Self {
            name: None,
            url: None,
            host: None,
            port: None,
            pool_size: 1,
            timeout: Duration::from_secs(1),
            default: false,
        }
    }
}

impl PoolSpec {
    /// Create a spec for the given backend URL
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Create a spec for the given host and port
    pub fn from_host(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Default::default()
        }
    }

    /// Set the pool name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the maximum pool size
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the checkout timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Flag this spec as the default pool
    pub fn mark_default(mut self) -> Self {
        self.default = true;
        self
    }

    /// Backend address for this spec
    ///
    /// `url` wins over `host`/`port`; host/port form a `redis://host:port/` URL.
    pub fn connection_url(&self) -> Result<String> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.to_string());
        }
        match (self.host.as_deref(), self.port) {
            (Some(host), Some(port)) if !host.trim().is_empty() => {
                Ok(format!("redis://{}:{}/", host, port))
            }
            (Some(host), None) if !host.trim().is_empty() => Err(KvAttrError::Configuration(
                format!("pool host '{}' given without a port", host),
            )),
            _ => Err(KvAttrError::Configuration(
                "pool spec needs either `url` or `host` and `port`".to_string(),
            )),
        }
    }

    /// Label used in logs and errors
    pub fn label(&self) -> String {
        match (&self.name, &self.url) {
            (Some(name), _) => name.clone(),
            (None, Some(url)) => url.clone(),
            (None, None) => format!(
                "{}:{}",
                self.host.as_deref().unwrap_or("?"),
                self.port.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string())
            ),
        }
    }
}

/// Either one pool spec or a list of named specs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PoolConfig {
    /// Several named pools, exactly one flagged `default`
    Multi(Vec<PoolSpec>),
    /// One pool; named `default` unless a name is given
    Single(PoolSpec),
}

impl From<PoolSpec> for PoolConfig {
    fn from(spec: PoolSpec) -> Self {
        PoolConfig::Single(spec)
    }
}

impl From<Vec<PoolSpec>> for PoolConfig {
    fn from(specs: Vec<PoolSpec>) -> Self {
        PoolConfig::Multi(specs)
    }
}

impl PoolConfig {
    /// Parse configuration from a JSON object or array
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Parse configuration from a YAML mapping or sequence
    pub fn from_yaml(input: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Build a single-pool configuration from environment variables.
    ///
    /// Reads `KVATTR_URL`, or `KVATTR_HOST` and `KVATTR_PORT`, plus the optional
    /// `KVATTR_POOL_NAME`, `KVATTR_POOL_SIZE` and `KVATTR_TIMEOUT` (seconds).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PoolConfig::from_env`] with a custom variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut spec = PoolSpec {
            url: lookup("KVATTR_URL"),
            host: lookup("KVATTR_HOST"),
            name: lookup("KVATTR_POOL_NAME"),
            ..Default::default()
        };

        if let Some(port) = lookup("KVATTR_PORT") {
            spec.port = Some(port.trim().parse().map_err(|_| {
                KvAttrError::Configuration(format!("KVATTR_PORT is not a port number: '{}'", port))
            })?);
        }
        if let Some(size) = lookup("KVATTR_POOL_SIZE") {
            spec.pool_size = size.trim().parse().map_err(|_| {
                KvAttrError::Configuration(format!("KVATTR_POOL_SIZE is not a number: '{}'", size))
            })?;
        }
        if let Some(timeout) = lookup("KVATTR_TIMEOUT") {
            let secs: f64 = timeout.trim().parse().map_err(|_| {
                KvAttrError::Configuration(format!("KVATTR_TIMEOUT is not a number: '{}'", timeout))
            })?;
            spec.timeout = duration_secs::from_f64(secs)
                .map_err(KvAttrError::Configuration)?;
        }

        // Fail here rather than at first checkout
        spec.connection_url()?;
        Ok(PoolConfig::Single(spec))
    }
}

/// Durations as (fractional) seconds in configuration files
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        from_f64(secs).map_err(serde::de::Error::custom)
    }

    pub fn from_f64(secs: f64) -> Result<Duration, String> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(format!("timeout must be a non-negative number of seconds, got {}", secs));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_pool_spec_defaults() {
        let spec = PoolSpec::from_url("redis://localhost:8888");
        assert_eq!(spec.pool_size, 1);
        assert_eq!(spec.timeout, Duration::from_secs(1));
        assert!(!spec.default);
        assert_eq!(spec.name, None);
    }

    #[test]
    fn test_pool_spec_builder() {
        let spec = PoolSpec::from_host("localhost", 8888)
            .name("ssdb")
            .pool_size(10)
            .timeout(Duration::from_secs(18))
            .mark_default();

        assert_eq!(spec.name.as_deref(), Some("ssdb"));
        assert_eq!(spec.pool_size, 10);
        assert_eq!(spec.timeout, Duration::from_secs(18));
        assert!(spec.default);
    }

    #[test]
    fn test_connection_url_prefers_url() {
        let mut spec = PoolSpec::from_url("redis://localhost:6379/15");
        spec.host = Some("other".to_string());
        spec.port = Some(1);
        assert_eq!(spec.connection_url().unwrap(), "redis://localhost:6379/15");
    }

    #[test]
    fn test_connection_url_from_host_port() {
        let spec = PoolSpec::from_host("localhost", 8888);
        assert_eq!(spec.connection_url().unwrap(), "redis://localhost:8888/");
    }

    #[test]
    fn test_connection_url_missing_address() {
        let spec = PoolSpec::default();
        assert!(matches!(
            spec.connection_url(),
            Err(KvAttrError::Configuration(_))
        ));

        let mut spec = PoolSpec::default();
        spec.host = Some("localhost".to_string());
        assert!(matches!(
            spec.connection_url(),
            Err(KvAttrError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_json_single() {
        let config = PoolConfig::from_json(r#"{"url": "redis://localhost:8888", "pool": 4}"#).unwrap();
        match config {
            PoolConfig::Single(spec) => {
                assert_eq!(spec.url.as_deref(), Some("redis://localhost:8888"));
                assert_eq!(spec.pool_size, 4);
            }
            other => panic!("expected single spec, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_multi() {
        let config = PoolConfig::from_json(
            r#"[
                {"url": "redis://localhost:8888", "name": "ssdb", "pool_size": 10, "timeout": 2, "default": true},
                {"url": "redis://localhost:6379", "name": "redis", "pool_size": 5, "timeout": 0.5}
            ]"#,
        )
        .unwrap();

        match config {
            PoolConfig::Multi(specs) => {
                assert_eq!(specs.len(), 2);
                assert!(specs[0].default);
                assert_eq!(specs[0].timeout, Duration::from_secs(2));
                assert_eq!(specs[1].timeout, Duration::from_millis(500));
                assert_eq!(specs[1].pool_size, 5);
            }
            other => panic!("expected multi spec, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_empty_list_is_multi() {
        let config = PoolConfig::from_json("[]").unwrap();
        assert_eq!(config, PoolConfig::Multi(vec![]));
    }

    #[test]
    fn test_from_json_null_is_error() {
        assert!(matches!(
            PoolConfig::from_json("null"),
            Err(KvAttrError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_json_negative_timeout() {
        let result = PoolConfig::from_json(r#"{"url": "redis://x", "timeout": -1}"#);
        assert!(matches!(result, Err(KvAttrError::Configuration(_))));
    }

    #[test]
    fn test_from_yaml_multi() {
        let config = PoolConfig::from_yaml(
            "- { url: \"redis://localhost:8888\", name: ssdb, default: true }\n\
             - { host: localhost, port: 6379, name: redis }\n",
        )
        .unwrap();

        match config {
            PoolConfig::Multi(specs) => {
                assert_eq!(specs[1].connection_url().unwrap(), "redis://localhost:6379/");
                assert_eq!(specs[1].pool_size, 1);
            }
            other => panic!("expected multi spec, got {:?}", other),
        }
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("KVATTR_HOST", "localhost"),
            ("KVATTR_PORT", "8888"),
            ("KVATTR_POOL_SIZE", "3"),
            ("KVATTR_TIMEOUT", "0.25"),
        ]
        .into_iter()
        .collect();

        let config = PoolConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        match config {
            PoolConfig::Single(spec) => {
                assert_eq!(spec.connection_url().unwrap(), "redis://localhost:8888/");
                assert_eq!(spec.pool_size, 3);
                assert_eq!(spec.timeout, Duration::from_millis(250));
            }
            other => panic!("expected single spec, got {:?}", other),
        }
    }

    #[test]
    fn test_from_lookup_requires_address() {
        let result = PoolConfig::from_lookup(|_| None);
        assert!(matches!(result, Err(KvAttrError::Configuration(_))));
    }

    #[test]
    fn test_from_lookup_bad_port() {
        let result = PoolConfig::from_lookup(|k| match k {
            "KVATTR_HOST" => Some("localhost".to_string()),
            "KVATTR_PORT" => Some("eighty".to_string()),
            _ => None,
        });
        assert!(matches!(result, Err(KvAttrError::Configuration(_))));
    }
}
