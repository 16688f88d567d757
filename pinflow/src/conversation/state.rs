//! The conversation record and its lifecycle.

use crate::connection::Connection;
use crate::errors::UsedAfterReleaseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use uuid::Uuid;

/// Opaque identifier of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a conversation.
///
/// Transitions only move forward: `Created -> Active -> Released`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Constructed, connection leased, not yet attached to any work.
    Created,
    /// Attached to a scope; requests are pinned to its connection.
    Active,
    /// Scope ended and the connection went back to the pool.
    Released,
}

impl ConversationState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Active => 1,
            Self::Released => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Active,
            _ => Self::Released,
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Released => "released",
        };
        write!(f, "{s}")
    }
}

/// How strictly requests must stick to the pinned connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationLevel {
    /// Requests fail if the pinned connection becomes unusable.
    #[default]
    Required,
    /// Requests fall back to load-balanced routing if the pinned connection
    /// becomes unusable.
    Preferred,
}

impl fmt::Display for ConversationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Preferred => write!(f, "preferred"),
        }
    }
}

/// One pinned connection for one execution scope.
///
/// Everything except the state is immutable after construction.
pub struct Conversation {
    id: ConversationId,
    level: ConversationLevel,
    connection: Connection,
    opened_at: DateTime<Utc>,
    state: AtomicU8,
}

impl Conversation {
    /// Creates a conversation in the `Created` state around a leased
    /// connection.
    #[must_use]
    pub fn new(level: ConversationLevel, connection: Connection) -> Self {
        Self {
            id: ConversationId::new(),
            level,
            connection,
            opened_at: Utc::now(),
            state: AtomicU8::new(ConversationState::Created.as_u8()),
        }
    }

    /// Returns the conversation id.
    #[must_use]
    pub const fn id(&self) -> ConversationId {
        self.id
    }

    /// Returns the conversation level.
    #[must_use]
    pub const fn level(&self) -> ConversationLevel {
        self.level
    }

    /// Returns the pinned connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns when the conversation was opened.
    #[must_use]
    pub const fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConversationState {
        ConversationState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns true while requests may be pinned to this conversation.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == ConversationState::Active
    }

    /// Returns the pinned connection, or an error if the conversation was
    /// already released.
    pub fn ensure_active(&self) -> Result<&Connection, UsedAfterReleaseError> {
        if self.state() == ConversationState::Released {
            return Err(UsedAfterReleaseError {
                conversation: self.id,
                connection: self.connection.id(),
            });
        }
        Ok(&self.connection)
    }

    /// Moves `Created -> Active`. Returns false if the conversation was not
    /// in the `Created` state.
    pub(crate) fn activate(&self) -> bool {
        self.transition(ConversationState::Created, ConversationState::Active)
    }

    /// Moves the conversation to `Released`.
    ///
    /// Returns true for exactly one caller; every later call returns false.
    pub(crate) fn mark_released(&self) -> bool {
        let released = ConversationState::Released.as_u8();
        self.state.swap(released, Ordering::AcqRel) != released
    }

    fn transition(&self, from: ConversationState, to: ConversationState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("id", &self.id)
            .field("level", &self.level)
            .field("connection", &self.connection.id())
            .field("state", &self.state())
            .finish()
    }
}
