//! The async driver client.

use crate::communication::{Communication, Request, RequestRouter, Response};
use crate::config::DriverConfig;
use crate::connection::{ConnectionPool, StaticConnectionPool};
use crate::conversation::ConversationManager;
use crate::errors::{ConversationError, PinflowError};
use crate::events::EventSink;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Entry point of the driver: owns the pool, the conversation manager and
/// the router for one client instance.
///
/// Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct DriverClient {
    config: Arc<DriverConfig>,
    pool: Arc<dyn ConnectionPool>,
    manager: ConversationManager,
    router: RequestRouter,
}

impl DriverClient {
    /// Creates a client over an existing pool and communication layer.
    #[must_use]
    pub fn new(
        config: DriverConfig,
        pool: Arc<dyn ConnectionPool>,
        communication: Arc<dyn Communication>,
    ) -> Self {
        let manager = ConversationManager::new(pool.clone(), config.conversation.clone());
        let router = RequestRouter::new(communication, pool.clone());
        Self {
            config: Arc::new(config),
            pool,
            manager,
            router,
        }
    }

    /// Validates `config` and creates a client with a
    /// [`StaticConnectionPool`] built from it.
    pub fn with_static_pool(
        config: DriverConfig,
        communication: Arc<dyn Communication>,
    ) -> Result<Self, PinflowError> {
        config.validate()?;
        let pool = Arc::new(StaticConnectionPool::from_config(&config.pool));
        info!(
            endpoints = ?config.pool.endpoints,
            connections = pool.connections().len(),
            "Driver client created"
        );
        Ok(Self::new(config, pool, communication))
    }

    /// Sets the sink receiving conversation lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.manager = self.manager.with_event_sink(sink);
        self
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Returns the connection pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<dyn ConnectionPool> {
        &self.pool
    }

    /// Returns the conversation manager.
    #[must_use]
    pub const fn conversation_manager(&self) -> &ConversationManager {
        &self.manager
    }

    /// Returns the request router.
    #[must_use]
    pub const fn router(&self) -> &RequestRouter {
        &self.router
    }

    /// Executes a request, pinned if the caller is inside a conversation.
    pub async fn execute(&self, request: Request) -> Result<Response, PinflowError> {
        self.router.execute(request).await
    }

    /// Runs `work` in a conversation of the configured default level.
    pub async fn conversation<Fut, T, E>(&self, work: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: From<ConversationError>,
    {
        self.manager
            .with_conversation(self.config.conversation.default_level, work)
            .await
    }
}

impl std::fmt::Debug for DriverClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverClient")
            .field("endpoints", &self.config.pool.endpoints)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}
