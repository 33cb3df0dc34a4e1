//! Dedicated pipeline thread.
//!
//! Privileged calls block for as long as the helper runs. A caller that must
//! stay responsive hands jobs to a [`PipelineWorker`] instead and watches
//! the agent's [`EventHub`](crate::events::EventHub) for outcomes. Jobs run
//! one at a time in submission order.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tincture_compiler::ThemeSpec;
use tracing::debug;

use crate::error::{AgentError, Result};
use crate::pipeline::Agent;

/// Queue depth before `submit` blocks.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum Job {
    Apply(ThemeSpec),
    Update { identity: String, spec: ThemeSpec },
    SetEnabled { identities: Vec<String>, enabled: bool },
    SetPriority { identity: String, priority: i32 },
    Remove(String),
}

impl Job {
    fn label(&self) -> &'static str {
        match self {
            Self::Apply(_) => "apply",
            Self::Update { .. } => "update",
            Self::SetEnabled { .. } => "set-enabled",
            Self::SetPriority { .. } => "set-priority",
            Self::Remove(_) => "remove",
        }
    }
}

enum Msg {
    Run(Job),
    Shutdown,
}

pub struct PipelineWorker {
    sender: mpsc::SyncSender<Msg>,
    handle: Option<JoinHandle<()>>,
}

impl PipelineWorker {
    pub fn start(agent: Arc<Agent>) -> Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<Msg>(CHANNEL_CAPACITY);
        let handle = thread::Builder::new()
            .name("tincture-pipeline".into())
            .spawn(move || worker_loop(&agent, &rx))
            .map_err(|e| AgentError::io("tincture-pipeline", e))?;
        Ok(Self {
            sender: tx,
            handle: Some(handle),
        })
    }

    /// Queue `job`. Fails once the worker has stopped.
    pub fn submit(&self, job: Job) -> Result<()> {
        self.sender
            .send(Msg::Run(job))
            .map_err(|_| AgentError::exit(1, "pipeline worker has stopped"))
    }

    /// Finish queued jobs, then stop.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.sender.send(Msg::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PipelineWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(agent: &Agent, rx: &mpsc::Receiver<Msg>) {
    while let Ok(Msg::Run(job)) = rx.recv() {
        let label = job.label();
        // Outcomes reach callers through the event hub.
        let ok = match job {
            Job::Apply(spec) => agent.apply(&spec).is_ok(),
            Job::Update { identity, spec } => agent.update(&identity, &spec).is_ok(),
            Job::SetEnabled {
                identities,
                enabled,
            } => agent.batch_set_enabled(&identities, enabled).is_ok(),
            Job::SetPriority { identity, priority } => {
                agent.set_priority(&identity, priority).is_ok()
            }
            Job::Remove(identity) => agent.remove(&identity).is_ok(),
        };
        debug!(target: "tincture::pipeline", job = label, ok, "worker job finished");
    }
}
