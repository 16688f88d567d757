//! Connection pool seam and the fixed-size reference pool.

use super::{Connection, ConnectionId};
use crate::config::PoolConfig;
use crate::errors::ConnectionUnavailableError;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Leases connections for exclusive use.
///
/// Implementations must be safe to call from many tasks and threads at once.
/// A leased connection is never handed to a second caller before it is
/// released.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Leases a connection, waiting at most `timeout` for one to free up.
    async fn lease(&self, timeout: Duration) -> Result<Connection, ConnectionUnavailableError>;

    /// Blocking variant of [`ConnectionPool::lease`] for synchronous callers.
    ///
    /// Must not be called from inside an async runtime worker.
    fn lease_blocking(&self, timeout: Duration) -> Result<Connection, ConnectionUnavailableError>;

    /// Returns a leased connection to the pool.
    fn release(&self, connection: &Connection);

    /// Returns whether the connection is currently usable.
    fn is_healthy(&self, _id: ConnectionId) -> bool {
        true
    }

    /// Returns the number of connections that could be leased right now.
    fn available(&self) -> usize;

    /// Returns the total number of connections in the pool.
    fn size(&self) -> usize;
}

/// A pool over a fixed set of connections.
///
/// Idle connections are kept in FIFO order, so the connection released
/// longest ago is leased first.
pub struct StaticConnectionPool {
    connections: Vec<Connection>,
    idle: Mutex<VecDeque<Connection>>,
    leased: DashMap<ConnectionId, Connection>,
    unhealthy: DashSet<ConnectionId>,
    released: Notify,
    released_blocking: Condvar,
}

impl StaticConnectionPool {
    /// Creates a pool over the given connections, all initially idle.
    #[must_use]
    pub fn new(connections: Vec<Connection>) -> Self {
        Self {
            idle: Mutex::new(connections.iter().cloned().collect()),
            connections,
            leased: DashMap::new(),
            unhealthy: DashSet::new(),
            released: Notify::new(),
            released_blocking: Condvar::new(),
        }
    }

    /// Creates a pool from configuration.
    ///
    /// Connections are interleaved across endpoints so consecutive leases
    /// spread over all of them.
    #[must_use]
    pub fn from_config(config: &PoolConfig) -> Self {
        let mut connections = Vec::with_capacity(config.total_connections());
        for _ in 0..config.connections_per_endpoint {
            for endpoint in &config.endpoints {
                let id = ConnectionId::new(connections.len() as u64);
                connections.push(Connection::new(id, endpoint.as_str()));
            }
        }
        Self::new(connections)
    }

    /// Returns every connection owned by the pool.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Returns the number of connections currently leased.
    #[must_use]
    pub fn leased_count(&self) -> usize {
        self.leased.len()
    }

    /// Returns whether the connection is currently leased.
    #[must_use]
    pub fn is_leased(&self, id: ConnectionId) -> bool {
        self.leased.contains_key(&id)
    }

    /// Flags a connection as broken. It will not be leased until
    /// [`StaticConnectionPool::mark_healthy`] is called.
    pub fn mark_unhealthy(&self, id: ConnectionId) {
        if self.unhealthy.insert(id) {
            warn!(connection_id = %id, "Connection marked unhealthy");
        }
    }

    /// Clears the broken flag of a connection.
    pub fn mark_healthy(&self, id: ConnectionId) {
        if self.unhealthy.remove(&id).is_some() {
            debug!(connection_id = %id, "Connection healthy again");
            self.notify_released();
        }
    }

    fn take_idle(&self, idle: &mut VecDeque<Connection>) -> Option<Connection> {
        let position = idle
            .iter()
            .position(|connection| !self.unhealthy.contains(&connection.id()))?;
        let connection = idle.remove(position)?;
        self.leased.insert(connection.id(), connection.clone());
        Some(connection)
    }

    fn try_lease(&self) -> Option<Connection> {
        let mut idle = self.idle.lock();
        self.take_idle(&mut idle)
    }

    fn unavailable(&self, timeout: Duration) -> ConnectionUnavailableError {
        warn!(
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            pool_size = self.connections.len(),
            leased = self.leased.len(),
            "Connection lease timed out"
        );
        ConnectionUnavailableError::new(timeout, self.connections.len())
    }

    fn notify_released(&self) {
        self.released.notify_one();
        self.released_blocking.notify_one();
    }
}

impl std::fmt::Debug for StaticConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticConnectionPool")
            .field("size", &self.connections.len())
            .field("leased", &self.leased.len())
            .field("unhealthy", &self.unhealthy.len())
            .finish()
    }
}

#[async_trait]
impl ConnectionPool for StaticConnectionPool {
    async fn lease(&self, timeout: Duration) -> Result<Connection, ConnectionUnavailableError> {
        let wait = async {
            loop {
                // Register interest before checking, so a release between
                // the check and the await is not lost.
                let notified = self.released.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if let Some(connection) = self.try_lease() {
                    return connection;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(connection) => {
                debug!(connection_id = %connection.id(), "Connection leased");
                Ok(connection)
            }
            Err(_) => Err(self.unavailable(timeout)),
        }
    }

    fn lease_blocking(&self, timeout: Duration) -> Result<Connection, ConnectionUnavailableError> {
        let deadline = Instant::now() + timeout;
        let mut idle = self.idle.lock();
        loop {
            if let Some(connection) = self.take_idle(&mut idle) {
                debug!(connection_id = %connection.id(), "Connection leased");
                return Ok(connection);
            }
            if self.released_blocking.wait_until(&mut idle, deadline).timed_out() {
                return self
                    .take_idle(&mut idle)
                    .ok_or_else(|| self.unavailable(timeout));
            }
        }
    }

    fn release(&self, connection: &Connection) {
        let Some((_, connection)) = self.leased.remove(&connection.id()) else {
            warn!(connection_id = %connection.id(), "Ignoring release of a connection that is not leased");
            return;
        };

        self.idle.lock().push_back(connection.clone());
        debug!(connection_id = %connection.id(), "Connection released");
        self.notify_released();
    }

    fn is_healthy(&self, id: ConnectionId) -> bool {
        !self.unhealthy.contains(&id)
    }

    fn available(&self) -> usize {
        self.idle
            .lock()
            .iter()
            .filter(|connection| !self.unhealthy.contains(&connection.id()))
            .count()
    }

    fn size(&self) -> usize {
        self.connections.len()
    }
}
