//! Redis-protocol backend
//!
//! Works against any server speaking the Redis wire protocol (Redis, SSDB,
//! Pika, ...). Connections are synchronous; pooling is done by [`crate::Pool`].

use kvattr_common::{KvAttrError, Result};
use redis::Commands;
use tracing::debug;

use crate::config::PoolSpec;
use crate::connection::{Connector, KvConnection};

/// Opens blocking connections with `redis::Client`
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

impl Connector for RedisConnector {
    fn connect(&self, spec: &PoolSpec) -> Result<Box<dyn KvConnection>> {
        let url = spec.connection_url()?;
        debug!("Connecting to key-value backend: pool={}, url={}", spec.label(), url);

        let client = redis::Client::open(url.as_str())
            .map_err(|e| KvAttrError::Configuration(format!("Invalid backend url '{}': {}", url, e)))?;
        // Zero means no limit, as for pool checkout
        let conn = if spec.timeout.is_zero() {
            client.get_connection()?
        } else {
            let conn = client.get_connection_with_timeout(spec.timeout)?;
            conn.set_read_timeout(Some(spec.timeout))?;
            conn.set_write_timeout(Some(spec.timeout))?;
            conn
        };

        Ok(Box::new(RedisConnection { conn }))
    }
}

/// One blocking Redis-protocol connection
pub struct RedisConnection {
    conn: redis::Connection,
}

impl KvConnection for RedisConnection {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.conn.get(key)?)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.set::<_, _, ()>(key, value)?;
        Ok(())
    }

    fn del(&mut self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        Ok(redis::cmd("DEL").arg(keys).query(&mut self.conn)?)
    }

    fn mget(&mut self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        Ok(redis::cmd("MGET").arg(keys).query(&mut self.conn)?)
    }

    fn mset(&mut self, pairs: &[(String, String)]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("MSET");
        for (key, value) in pairs {
            cmd.arg(key).arg(value);
        }
        cmd.query::<()>(&mut self.conn)?;
        Ok(())
    }
}
