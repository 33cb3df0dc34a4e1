//! Caller-facing pipeline notifications.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::error::FailureKind;

/// Which pipeline operation an event reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Connect,
    Compile,
    Install,
    Update,
    Enable,
    Disable,
    Priority,
    Remove,
    Settings,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Compile => "compile",
            Self::Install => "install",
            Self::Update => "update",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Priority => "priority",
            Self::Remove => "remove",
            Self::Settings => "settings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Succeeded {
        stage: Stage,
        identities: Vec<String>,
    },
    Failed {
        stage: Stage,
        kind: FailureKind,
        message: String,
    },
}

impl PipelineEvent {
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Succeeded { stage, .. } | Self::Failed { stage, .. } => *stage,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Fan-out of [`PipelineEvent`]s to any number of receivers.
#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<Sender<PipelineEvent>>>,
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> Receiver<PipelineEvent> {
        let (tx, rx) = mpsc::channel();
        self.lock().push(tx);
        rx
    }

    /// Send to every live subscriber, dropping those whose receiver is gone.
    pub fn publish(&self, event: PipelineEvent) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<PipelineEvent>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
