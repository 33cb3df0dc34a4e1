//! Allow-listed privileged calls.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tincture_guard::{OverlayVerb, PrivilegedCommand, SettingKey, validate_file_path};
use tracing::{info, warn};

use crate::connection::{BrokerConnection, ConnectionState};
use crate::error::{BrokerError, Result, TransportError};
use crate::transport::{CommandOutput, HelperTransport};

/// Broker limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Directories an archive must live under to be installed.
    pub install_roots: Vec<PathBuf>,
    /// Per-call wait before a helper is abandoned.
    pub call_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            install_roots: Vec::new(),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Issues [`PrivilegedCommand`]s through a [`HelperTransport`] while the
/// connection is ready.
///
/// Every call revalidates its command, checks readiness, then blocks until
/// the helper exits or the call timeout passes. Nothing is retried.
pub struct PrivilegedBroker {
    connection: Arc<BrokerConnection>,
    transport: Box<dyn HelperTransport>,
    config: BrokerConfig,
}

impl std::fmt::Debug for PrivilegedBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegedBroker")
            .field("state", &self.connection.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PrivilegedBroker {
    pub fn new(transport: impl HelperTransport + 'static, config: BrokerConfig) -> Self {
        Self::with_connection(Arc::new(BrokerConnection::new()), transport, config)
    }

    /// Share an existing connection, e.g. one a host callback also drives.
    pub fn with_connection(
        connection: Arc<BrokerConnection>,
        transport: impl HelperTransport + 'static,
        config: BrokerConfig,
    ) -> Self {
        Self {
            connection,
            transport: Box::new(transport),
            config,
        }
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<BrokerConnection> {
        &self.connection
    }

    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.connection.is_ready()
    }

    /// Request permission and perform the transport handshake.
    pub fn connect(&self) -> Result<ConnectionState> {
        if self.connection.is_ready() {
            return Ok(ConnectionState::Ready);
        }
        self.connection.request_permission();
        match self.transport.handshake() {
            Ok(true) => {
                self.connection.permission_result(true);
                Ok(self.connection.binder_received())
            }
            Ok(false) => {
                let state = self.connection.permission_result(false);
                warn!(target: "tincture_broker::state", "helper refused the permission grant");
                Err(BrokerError::unavailable(state, "permission denied by helper"))
            }
            Err(err) => {
                let state = self.connection.reset();
                warn!(target: "tincture_broker::state", error = %err, "helper handshake failed");
                Err(BrokerError::unavailable(state, err.to_string()))
            }
        }
    }

    /// Parse `command` against the verb menu and run it. Unknown shapes
    /// never spawn a process.
    pub fn run_command(&self, command: &str) -> Result<CommandOutput> {
        let parsed = PrivilegedCommand::parse(command)?;
        self.execute(&parsed)
    }

    /// Run a structured command. A non-zero exit is an error.
    pub fn execute(&self, command: &PrivilegedCommand) -> Result<CommandOutput> {
        command.validate()?;
        if let PrivilegedCommand::Install { path } = command {
            if !validate_file_path(path, self.config.install_roots.as_slice()) {
                return Err(BrokerError::PathNotAllowed { path: path.clone() });
            }
        }

        let verb = command.verb();
        let target = command.target();
        let snapshot = self.connection.snapshot();
        if snapshot.state() != ConnectionState::Ready {
            warn!(
                target: "tincture_broker::exec",
                verb,
                subject = %target,
                state = %snapshot.state(),
                "privileged call refused: broker not ready"
            );
            return Err(BrokerError::unavailable(
                snapshot.state(),
                format!("cannot {verb} {target} while {}", snapshot.state()),
            ));
        }

        let output = match self
            .transport
            .spawn_and_wait(&command.argv(), self.config.call_timeout)
        {
            Ok(output) => output,
            Err(source) => {
                if matches!(source, TransportError::Spawn(_) | TransportError::HelperMissing(_)) {
                    self.connection.binder_died();
                }
                warn!(
                    target: "tincture_broker::exec",
                    verb,
                    subject = %target,
                    error = %source,
                    "privileged call failed to run"
                );
                return Err(BrokerError::Transport {
                    verb,
                    target,
                    source,
                });
            }
        };

        if !output.success() {
            warn!(
                target: "tincture_broker::exec",
                verb,
                subject = %target,
                status = output.status,
                stderr = %output.stderr.trim(),
                "privileged call exited non-zero"
            );
            return Err(BrokerError::CallFailed {
                verb,
                target,
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }

        info!(
            target: "tincture_broker::exec",
            verb,
            subject = %target,
            elapsed_ms = output.elapsed.as_millis() as u64,
            "privileged call succeeded"
        );
        Ok(output)
    }

    /// `pm install -r <path>`; `path` must sit under an install root.
    pub fn install_package(&self, path: &Path) -> Result<()> {
        self.execute(&PrivilegedCommand::install(path)?).map(drop)
    }

    pub fn uninstall_package(&self, identity: &str) -> Result<()> {
        self.execute(&PrivilegedCommand::uninstall(identity)?)
            .map(drop)
    }

    pub fn set_overlay_state(&self, identity: &str, verb: OverlayVerb) -> Result<()> {
        self.execute(&PrivilegedCommand::overlay(identity, verb)?)
            .map(drop)
    }

    /// Current value of `key`, trimmed. The host prints `null` for unset keys.
    pub fn read_setting(&self, key: SettingKey) -> Result<Option<String>> {
        let output = self.execute(&PrivilegedCommand::read_setting(key))?;
        let value = output.stdout.trim();
        Ok((!value.is_empty() && value != "null").then(|| value.to_string()))
    }

    pub fn write_setting(&self, key: SettingKey, value: &str) -> Result<()> {
        self.execute(&PrivilegedCommand::write_setting(key, value)?)
            .map(drop)
    }
}
