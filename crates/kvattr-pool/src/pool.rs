//! Bounded connection pool
//!
//! Provides a thread-safe connection pool with:
//! - At most `pool_size` connections, opened lazily
//! - Blocking checkout bounded by the configured timeout
//! - RAII guard for automatic return to pool

use kvattr_common::{KvAttrError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::PoolSpec;
use crate::connection::{Connector, KvConnection};

struct PoolState {
    /// Connections ready for checkout
    idle: VecDeque<Box<dyn KvConnection>>,
    /// Connections checked out or being opened
    active: usize,
}

/// Named, bounded pool of backend connections
///
/// # Example
///
/// ```no_run
/// use kvattr_pool::{MemoryConnector, Pool, PoolSpec, KvConnection};
/// use std::sync::Arc;
///
/// # fn example() -> kvattr_common::Result<()> {
/// let pool = Pool::new(
///     "default",
///     PoolSpec::from_url("memory://local").pool_size(4),
///     Arc::new(MemoryConnector::new()),
/// );
///
/// // Returned to the pool when dropped
/// let mut conn = pool.acquire()?;
/// conn.set("posts:1:title", "hello")?;
/// # Ok(())
/// # }
/// ```
pub struct Pool {
    name: String,
    spec: PoolSpec,
    connector: Arc<dyn Connector>,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl Pool {
    /// Create a pool without opening any connection
    pub fn new(name: impl Into<String>, spec: PoolSpec, connector: Arc<dyn Connector>) -> Self {
        Self {
            name: name.into(),
            spec,
            connector,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                active: 0,
            }),
            available: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &PoolSpec {
        &self.spec
    }

    fn capacity(&self) -> usize {
        self.spec.pool_size.max(1)
    }

    /// Check out a connection
    ///
    /// This method will:
    /// 1. Reuse an idle connection
    /// 2. Open a new connection if the pool is below `pool_size`
    /// 3. Block until a connection is returned
    /// 4. Return `Err(KvAttrError::PoolTimeout)` once the configured timeout elapses
    ///
    /// A zero timeout waits without limit.
    pub fn acquire(&self) -> Result<PooledConnection<'_>> {
        let deadline = (!self.spec.timeout.is_zero()).then(|| Instant::now() + self.spec.timeout);
        let mut state = self.state.lock();

        loop {
            if let Some(conn) = state.idle.pop_back() {
                state.active += 1;
                return Ok(PooledConnection {
                    conn: Some(conn),
                    pool: self,
                });
            }

            if state.active + state.idle.len() < self.capacity() {
                // Reserve the slot before connecting outside the lock
                state.active += 1;
                drop(state);

                return match self.connector.connect(&self.spec) {
                    Ok(conn) => {
                        debug!(pool = %self.name, "Opened backend connection");
                        Ok(PooledConnection {
                            conn: Some(conn),
                            pool: self,
                        })
                    }
                    Err(e) => {
                        self.release_slot();
                        warn!(pool = %self.name, error = %e, "Failed to open backend connection");
                        Err(e)
                    }
                };
            }

            match deadline {
                Some(deadline) if Instant::now() >= deadline => {
                    warn!(pool = %self.name, timeout = ?self.spec.timeout, "Pool checkout timed out");
                    return Err(KvAttrError::PoolTimeout {
                        pool: self.name.clone(),
                        timeout: self.spec.timeout,
                    });
                }
                Some(deadline) => {
                    self.available.wait_until(&mut state, deadline);
                }
                None => self.available.wait(&mut state),
            }
        }
    }

    /// Run `f` with a checked-out connection
    ///
    /// A connection whose command failed is discarded instead of returned.
    pub fn with<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn KvConnection) -> Result<T>,
    {
        let mut conn = self.acquire()?;
        match f(&mut *conn) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(pool = %self.name, error = %e, "Discarding connection after failed command");
                conn.discard();
                Err(e)
            }
        }
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            idle: state.idle.len(),
            active: state.active,
            size: self.capacity(),
        }
    }

    fn release(&self, conn: Box<dyn KvConnection>) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
        state.idle.push_back(conn);
        drop(state);
        self.available.notify_one();
    }

    fn release_slot(&self) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
        drop(state);
        self.available.notify_one();
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("spec", &self.spec.label())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub active: usize,
    pub size: usize,
}

/// RAII guard for a pooled connection
///
/// The connection goes back to the pool when dropped.
pub struct PooledConnection<'a> {
    conn: Option<Box<dyn KvConnection>>,
    pool: &'a Pool,
}

impl PooledConnection<'_> {
    /// Close the connection instead of returning it, freeing its slot
    pub fn discard(mut self) {
        if self.conn.take().is_some() {
            self.pool.release_slot();
        }
    }

    /// Name of the owning pool
    pub fn pool_name(&self) -> &str {
        self.pool.name()
    }
}

impl fmt::Debug for PooledConnection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool", &self.pool.name())
            .field("open", &self.conn.is_some())
            .finish()
    }
}

impl Deref for PooledConnection<'_> {
    type Target = dyn KvConnection;

    fn deref(&self) -> &Self::Target {
        // Only `discard` and `drop` take the connection, both consume the guard
        match self.conn.as_deref() {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.conn.as_deref_mut() {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
