//! Per-request connection selection.

use super::{Communication, Request, Response};
use crate::connection::{ConnectionId, ConnectionPool};
use crate::conversation::{ConversationContext, ConversationId, ConversationLevel};
use crate::errors::{ConversationError, PinflowError, PinnedConnectionLostError};
use std::sync::Arc;
use tracing::{trace, warn};

/// Where a request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// On the connection pinned by an active conversation.
    Pinned {
        /// The conversation the request belongs to.
        conversation: ConversationId,
        /// The pinned connection.
        connection: ConnectionId,
    },
    /// Wherever the communication layer's load balancing puts it.
    LoadBalanced,
}

impl Route {
    /// Returns the connection hint for the communication layer.
    #[must_use]
    pub const fn pinned_connection(&self) -> Option<ConnectionId> {
        match self {
            Self::Pinned { connection, .. } => Some(*connection),
            Self::LoadBalanced => None,
        }
    }
}

/// Chooses a connection for each outgoing request from the ambient
/// conversation context.
///
/// This is the only place conversation state influences dispatch; request
/// builders never look at it.
#[derive(Clone)]
pub struct RequestRouter {
    communication: Arc<dyn Communication>,
    pool: Arc<dyn ConnectionPool>,
}

impl RequestRouter {
    /// Creates a router dispatching through `communication`.
    ///
    /// `pool` is only consulted for connection health.
    #[must_use]
    pub fn new(communication: Arc<dyn Communication>, pool: Arc<dyn ConnectionPool>) -> Self {
        Self {
            communication,
            pool,
        }
    }

    /// Decides the route for a request issued under `context`.
    pub fn route(&self, context: &ConversationContext) -> Result<Route, ConversationError> {
        let Some(conversation) = context.conversation() else {
            return Ok(Route::LoadBalanced);
        };

        let connection = conversation.ensure_active()?.id();
        if self.pool.is_healthy(connection) {
            return Ok(Route::Pinned {
                conversation: conversation.id(),
                connection,
            });
        }

        match conversation.level() {
            ConversationLevel::Required => Err(PinnedConnectionLostError {
                conversation: conversation.id(),
                connection,
            }
            .into()),
            ConversationLevel::Preferred => {
                warn!(
                    conversation_id = %conversation.id(),
                    connection_id = %connection,
                    "Pinned connection unavailable, falling back to load-balanced routing"
                );
                Ok(Route::LoadBalanced)
            }
        }
    }

    /// Executes a request, pinned to the ambient conversation's connection
    /// if there is one.
    pub async fn execute(&self, request: Request) -> Result<Response, PinflowError> {
        let route = self.route(&ConversationContext::current())?;
        trace!(%request, ?route, "Dispatching request");
        let response = self
            .communication
            .execute(request, route.pinned_connection())
            .await?;
        Ok(response)
    }
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}
