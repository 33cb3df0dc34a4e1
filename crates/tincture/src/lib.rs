#![forbid(unsafe_code)]

//! The tincture agent.
//!
//! # Role in tincture
//! This crate wires the validator, compiler, broker, and registry into one
//! [`Agent`] and puts a command line on top of it. Library users drive the
//! [`Agent`] directly, or through a [`PipelineWorker`] when the calling
//! thread must not block on the helper.
//!
//! # This crate provides
//! - [`Agent`]: apply, update, enable/disable, priority, remove, batches,
//!   settings, and status, each reported on the [`EventHub`].
//! - [`AgentConfig`], loaded from TOML.
//! - [`AgentError`] with its [`FailureKind`] and process exit code.
//! - The `tincture` binary ([`cli`]).

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod pipeline;
pub mod scratch;
pub mod util;
pub mod worker;

pub use cli::{Cli, Commands, run, run_from_env};
pub use config::{AgentConfig, ConfigError, HelperConfig, LogFormat};
pub use error::{AgentError, FailureKind, Result};
pub use events::{EventHub, PipelineEvent, Stage};
pub use pipeline::{Agent, AgentStatus, inspect_archive};
pub use scratch::ScratchDir;
pub use worker::{Job, PipelineWorker};
