//! How rendered argument vectors reach the privileged helper.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::TransportError;

/// Captured result of one helper call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `-1` when the process was terminated by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Channel to the privileged helper.
///
/// `spawn_and_wait` blocks the calling thread. Implementations must never
/// hand `argv` to a shell.
pub trait HelperTransport: Send + Sync {
    /// Run the permission grant flow. `Ok(false)` means the grant was refused.
    fn handshake(&self) -> Result<bool, TransportError>;

    /// Run one command and wait for it, giving up after `timeout`.
    fn spawn_and_wait(
        &self,
        argv: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, TransportError>;
}

/// Runs a helper program such as `sudo -n` with the command words appended
/// as separate arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTransport {
    program: PathBuf,
    prefix_args: Vec<String>,
    probe: Option<Vec<String>>,
    probe_timeout: Duration,
}

impl ProcessTransport {
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(program: impl Into<PathBuf>, prefix_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args,
            probe: None,
            probe_timeout: Self::DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Resolve `name` on `PATH`.
    pub fn discover(name: &str, prefix_args: Vec<String>) -> Result<Self, TransportError> {
        let program =
            which::which(name).map_err(|_| TransportError::HelperMissing(name.to_string()))?;
        Ok(Self::new(program, prefix_args))
    }

    /// Arguments run through the helper during the handshake; exit 0 grants.
    #[must_use]
    pub fn with_probe(mut self, probe: Vec<String>, timeout: Duration) -> Self {
        self.probe = Some(probe);
        self.probe_timeout = timeout;
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, argv: &[String]) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.prefix_args)
            .args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl HelperTransport for ProcessTransport {
    fn handshake(&self) -> Result<bool, TransportError> {
        if !self.program.is_file() {
            return Err(TransportError::HelperMissing(
                self.program.display().to_string(),
            ));
        }
        match &self.probe {
            Some(probe) => Ok(self.spawn_and_wait(probe, self.probe_timeout)?.success()),
            None => Ok(true),
        }
    }

    fn spawn_and_wait(
        &self,
        argv: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, TransportError> {
        let started = Instant::now();
        let mut child = self.command(argv).spawn().map_err(TransportError::Spawn)?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                abandon(child, argv);
                return Err(TransportError::TimedOut(timeout));
            }
            Err(err) => {
                abandon(child, argv);
                return Err(TransportError::Wait(err));
            }
        };

        let output = CommandOutput {
            status: status.code().unwrap_or(-1),
            stdout: collect(stdout),
            stderr: collect(stderr),
            elapsed: started.elapsed(),
        };
        debug!(
            target: "tincture_broker::exec",
            program = %self.program.display(),
            status = output.status,
            elapsed_ms = output.elapsed.as_millis() as u64,
            "helper finished"
        );
        Ok(output)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Leave a timed-out helper running and reap it in the background.
fn abandon(mut child: Child, argv: &[String]) {
    warn!(
        target: "tincture_broker::exec",
        pid = child.id(),
        verb = %argv.get(..2).map(|words| words.join(" ")).unwrap_or_default(),
        "abandoning helper past its deadline"
    );
    thread::spawn(move || {
        let _ = child.wait();
    });
}
