//! Assertions on connection affinity and pool state.

use crate::communication::Response;
use crate::connection::{ConnectionId, ConnectionPool};

/// Asserts that every response was served by the same connection and
/// returns that connection.
pub fn assert_single_connection(responses: &[Response]) -> ConnectionId {
    let Some(first) = responses.first() else {
        panic!("Expected at least one response");
    };
    let served: Vec<ConnectionId> = responses.iter().map(|r| r.connection).collect();
    assert!(
        served.iter().all(|id| *id == first.connection),
        "Expected all responses on {}, got {:?}",
        first.connection,
        served
    );
    first.connection
}

/// Asserts that no connection is leased.
pub fn assert_pool_idle(pool: &dyn ConnectionPool) {
    assert_eq!(
        pool.available(),
        pool.size(),
        "Expected an idle pool, {} of {} connections leased",
        pool.size() - pool.available(),
        pool.size()
    );
}
