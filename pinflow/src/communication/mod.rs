//! Request dispatch.
//!
//! This module provides:
//! - The request/response values handed to the communication layer
//! - The `Communication` seam that performs the actual round-trip
//! - `RequestRouter`, which picks the connection for every request

mod request;
mod router;

pub use request::{Method, Request, Response};
pub use router::{RequestRouter, Route};

use crate::connection::ConnectionId;
use crate::errors::TransportError;
use async_trait::async_trait;

/// Executes requests against the server.
///
/// With `pinned` set, the request must go out on that connection. Without
/// it, the implementation picks a connection with its own load-balancing
/// policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Communication: Send + Sync {
    /// Executes a single request.
    async fn execute(
        &self,
        request: Request,
        pinned: Option<ConnectionId>,
    ) -> Result<Response, TransportError>;
}
