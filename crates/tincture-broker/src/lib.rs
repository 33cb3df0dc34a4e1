#![forbid(unsafe_code)]

//! The privileged side of tincture.
//!
//! # Role in tincture
//! Everything that needs elevated rights goes through [`PrivilegedBroker`].
//! It owns the [`BrokerConnection`] state machine, refuses to issue anything
//! while the connection is not `Ready`, and only ever renders commands from
//! the `tincture-guard` verb menu into argument vectors.
//!
//! # This crate provides
//! - [`BrokerConnection`]: wait-free snapshots, single-writer transitions,
//!   and change subscriptions.
//! - [`HelperTransport`] with the process-backed [`ProcessTransport`].
//! - [`PrivilegedBroker`] operations: install, uninstall, overlay state,
//!   settings, and raw allow-listed command lines.
//! - `testing::ScriptedTransport` behind the `test-helpers` feature.

/// Allow-listed privileged calls.
pub mod broker;
/// Connection state machine.
pub mod connection;
/// Error types.
pub mod error;
/// Transport trait and the process-backed transport.
pub mod transport;

/// Scripted transport for tests.
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use broker::{BrokerConfig, PrivilegedBroker};
pub use connection::{Binder, BrokerConnection, ConnectionSnapshot, ConnectionState, Permission};
pub use error::{BrokerError, Result, TransportError};
pub use transport::{CommandOutput, HelperTransport, ProcessTransport};
