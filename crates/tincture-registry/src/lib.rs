#![forbid(unsafe_code)]

//! The agent's record of installed overlays.
//!
//! # Role in tincture
//! [`OverlayRegistry`] is the only writer of overlay state. It pairs each
//! host mutation issued through `tincture-broker` with the matching table
//! update, so a failed privileged call never leaves a stale record behind.
//!
//! # This crate provides
//! - [`OverlayRegistry`]: install, enable/disable, priority, delete, relation
//!   metadata, and batch variants that report per-item failures.
//! - [`RegistryStore`] with [`JsonFileStore`] and [`MemoryStore`].
//! - [`OverlayEntry`], the persisted record.

/// Persisted records.
pub mod entry;
/// Error types.
pub mod error;
/// The registry.
pub mod registry;
/// Storage backends.
pub mod store;

pub use entry::OverlayEntry;
pub use error::{RegistryError, Result, StoreError};
pub use registry::{BatchFailure, BatchReport, EnableFailurePolicy, InstallOutcome, OverlayRegistry};
pub use store::{FORMAT_VERSION, JsonFileStore, MemoryStore, RegistryStore};
