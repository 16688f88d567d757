//! Backend connections and the pool that leases them.
//!
//! This module provides:
//! - Connection handles identified by a pool-unique id
//! - The `ConnectionPool` seam the conversation layer leases through
//! - A fixed-size pool with bounded, exclusive leases

mod handle;
mod pool;

pub use handle::{Connection, ConnectionId};
pub use pool::{ConnectionPool, StaticConnectionPool};
