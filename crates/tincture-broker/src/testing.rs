//! In-process transport double.
//!
//! [`ScriptedTransport`] records every argv it receives and answers from a
//! list of rules matched by substring against the joined command line. The
//! first matching rule wins; with no match the call succeeds with empty
//! output. Clones share state, so a test can keep one handle and move the
//! other into a broker.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::broker::{BrokerConfig, PrivilegedBroker};
use crate::error::TransportError;
use crate::transport::{CommandOutput, HelperTransport};

#[derive(Debug, Clone)]
enum Reply {
    Exit { status: i32, stderr: String },
    Stdout(String),
    TimeOut,
    SpawnError,
}

#[derive(Debug, Default)]
struct Script {
    grant: bool,
    rules: Vec<(String, Reply)>,
    calls: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    /// Grants permission and succeeds every call.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::with_grant(true)
    }

    /// Refuses the permission grant.
    #[must_use]
    pub fn denying() -> Self {
        Self::with_grant(false)
    }

    fn with_grant(grant: bool) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                grant,
                ..Script::default()
            })),
        }
    }

    fn rule(self, needle: &str, reply: Reply) -> Self {
        self.lock().rules.push((needle.to_string(), reply));
        self
    }

    /// Exit with `status` and `stderr` when the command line contains `needle`.
    #[must_use]
    pub fn fail_when_contains(self, needle: &str, status: i32, stderr: &str) -> Self {
        self.rule(
            needle,
            Reply::Exit {
                status,
                stderr: stderr.to_string(),
            },
        )
    }

    /// Succeed with `stdout` when the command line contains `needle`.
    #[must_use]
    pub fn respond_when_contains(self, needle: &str, stdout: &str) -> Self {
        self.rule(needle, Reply::Stdout(stdout.to_string()))
    }

    #[must_use]
    pub fn time_out_when_contains(self, needle: &str) -> Self {
        self.rule(needle, Reply::TimeOut)
    }

    #[must_use]
    pub fn spawn_error_when_contains(self, needle: &str) -> Self {
        self.rule(needle, Reply::SpawnError)
    }

    /// Every argv received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.lock().calls.clone()
    }

    /// Calls whose joined command line contains `needle`.
    #[must_use]
    pub fn calls_containing(&self, needle: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|argv| argv.join(" ").contains(needle))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HelperTransport for ScriptedTransport {
    fn handshake(&self) -> Result<bool, TransportError> {
        Ok(self.lock().grant)
    }

    fn spawn_and_wait(
        &self,
        argv: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, TransportError> {
        let mut script = self.lock();
        script.calls.push(argv.to_vec());
        let line = argv.join(" ");
        let reply = script
            .rules
            .iter()
            .find(|(needle, _)| line.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone());
        let output = |status: i32, stdout: String, stderr: String| CommandOutput {
            status,
            stdout,
            stderr,
            elapsed: Duration::ZERO,
        };
        match reply {
            None => Ok(output(0, String::new(), String::new())),
            Some(Reply::Exit { status, stderr }) => Ok(output(status, String::new(), stderr)),
            Some(Reply::Stdout(stdout)) => Ok(output(0, stdout, String::new())),
            Some(Reply::TimeOut) => Err(TransportError::TimedOut(timeout)),
            Some(Reply::SpawnError) => Err(TransportError::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "scripted spawn failure",
            ))),
        }
    }
}

/// A connected broker over `transport` with the given install roots.
///
/// # Panics
///
/// Panics if the transport refuses the handshake.
pub fn ready_broker(transport: ScriptedTransport, install_roots: Vec<PathBuf>) -> PrivilegedBroker {
    let broker = PrivilegedBroker::new(
        transport,
        BrokerConfig {
            install_roots,
            call_timeout: Duration::from_secs(1),
        },
    );
    broker
        .connect()
        .expect("scripted transport must grant permission");
    broker
}
