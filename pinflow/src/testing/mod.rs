//! Testing utilities for code running on pinflow.
//!
//! This module provides:
//! - A communication layer that records which connection served each request
//! - A ready-made driver fixture over a static pool
//! - Assertions on connection affinity and pool state

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_pool_idle, assert_single_connection};
pub use fixtures::TestDriver;
pub use mocks::{RecordedCall, RecordingCommunication};
