//! In-memory communication layer for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crate::communication::{Communication, Request, Response};
use crate::connection::{ConnectionId, ConnectionPool};
use crate::errors::TransportError;

/// One request seen by a [`RecordingCommunication`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The request as dispatched.
    pub request: Request,
    /// The connection hint the router passed.
    pub pinned: Option<ConnectionId>,
    /// The connection that served the request.
    pub connection: ConnectionId,
    /// The thread that dispatched the request.
    pub thread: ThreadId,
    /// When the request reached the transport.
    pub started_at: Instant,
    /// When the response was produced.
    pub finished_at: Instant,
}

impl RecordedCall {
    /// Returns true if the two calls were in flight at the same time.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.started_at < other.finished_at && other.started_at < self.finished_at
    }
}

/// A communication layer that serves every request in memory and records
/// which connection it went to.
///
/// Pinned requests are served on the hinted connection. Unpinned ones
/// briefly lease a connection from the pool, the way a load-balancing
/// transport would.
pub struct RecordingCommunication {
    pool: Arc<dyn ConnectionPool>,
    lease_timeout: Duration,
    latency: Option<Duration>,
    failures: Mutex<VecDeque<TransportError>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingCommunication {
    /// Creates a recording layer over `pool`.
    #[must_use]
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        Self {
            pool,
            lease_timeout: Duration::from_millis(100),
            latency: None,
            failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Delays every response by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the next request fail with `error`. Queued failures are used
    /// in order.
    pub fn fail_next(&self, error: TransportError) {
        self.failures.lock().push_back(error);
    }

    /// Returns all recorded calls in dispatch order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the connections that served each request, in order.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.calls.lock().iter().map(|call| call.connection).collect()
    }

    /// Returns the number of recorded calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Clears recorded calls and queued failures.
    pub fn reset(&self) {
        self.calls.lock().clear();
        self.failures.lock().clear();
    }

    async fn load_balanced(&self) -> Result<ConnectionId, TransportError> {
        let connection = self
            .pool
            .lease(self.lease_timeout)
            .await
            .map_err(|err| TransportError::new(err.to_string()))?;
        let id = connection.id();
        self.pool.release(&connection);
        Ok(id)
    }
}

#[async_trait]
impl Communication for RecordingCommunication {
    async fn execute(
        &self,
        request: Request,
        pinned: Option<ConnectionId>,
    ) -> Result<Response, TransportError> {
        let started_at = Instant::now();
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let connection = match pinned {
            Some(id) => id,
            None => self.load_balanced().await?,
        };

        let body = json!({ "path": request.path, "connection": connection });
        self.calls.lock().push(RecordedCall {
            request,
            pinned,
            connection,
            thread: std::thread::current().id(),
            started_at,
            finished_at: Instant::now(),
        });

        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        Ok(Response::new(200, connection).with_body(body))
    }
}

impl std::fmt::Debug for RecordingCommunication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingCommunication")
            .field("calls", &self.call_count())
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}
