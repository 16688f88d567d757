//! # Pinflow
//!
//! Connection affinity for reactive database drivers.
//!
//! A driver normally load-balances every request over its connection pool.
//! Some server-side state, like a cursor or a stream transaction, lives on
//! one connection, so the follow-up requests must go to that same
//! connection. Pinflow provides *conversations* for this:
//!
//! - **Scoped pinning**: every request issued inside a conversation goes to
//!   the connection leased when it opened
//! - **Ambient propagation**: the active conversation travels with async
//!   work across suspension points and worker threads, and with synchronous
//!   call chains on one thread
//! - **Guaranteed release**: the connection goes back to the pool however
//!   the scope ends, including errors, panics and cancellation
//! - **No nesting**: opening a conversation inside another one fails fast
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pinflow::prelude::*;
//!
//! let client = DriverClient::with_static_pool(DriverConfig::from_file("driver.json")?, transport)?;
//!
//! let rows = client
//!     .conversation_manager()
//!     .require_conversation(async {
//!         let first = client.execute(Request::post("_system", "/_api/cursor")).await?;
//!         let next = client.execute(Request::put("_system", "/_api/cursor/42")).await?;
//!         Ok::<_, PinflowError>(vec![first, next])
//!     })
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

#[cfg(feature = "blocking")]
pub mod blocking;
pub mod client;
pub mod communication;
pub mod config;
pub mod connection;
pub mod conversation;
pub mod errors;
pub mod events;
pub mod observability;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "blocking")]
    pub use crate::blocking::BlockingClient;
    pub use crate::client::DriverClient;
    pub use crate::communication::{Communication, Method, Request, Response};
    pub use crate::config::{
        BlockingConfig, ConversationConfig, DriverConfig, LoggingConfig, PoolConfig,
    };
    pub use crate::connection::{Connection, ConnectionId, ConnectionPool, StaticConnectionPool};
    pub use crate::conversation::{
        spawn, Conversation, ConversationContext, ConversationId, ConversationLevel,
        ConversationManager, ConversationState, ThreadConversation,
    };
    pub use crate::errors::{
        BlockingInRuntimeError, ConnectionUnavailableError, ConversationError, PinflowError,
        PinnedConnectionLostError, ReentrancyError, TransportError, UsedAfterReleaseError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::init_tracing;
}
