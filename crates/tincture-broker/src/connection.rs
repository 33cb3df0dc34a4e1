//! Broker connection state.
//!
//! One [`BrokerConnection`] exists per agent process. Transitions go through
//! a single writer lock; readers load an [`ArcSwap`] snapshot and never take
//! the lock.
//!
//! ```text
//! Unconnected ──request──▶ PermissionPending ──granted+binder──▶ Ready
//!                                   │                              │
//!                                   └──denied──▶ Denied   binder died
//!                                                                  ▼
//!                                           Ready ◀──binder── Dead
//! ```

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use tracing::{debug, info};

/// Permission as reported by the helper's grant flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Unset,
    Requested,
    Granted,
    Denied,
}

/// Liveness of the helper binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binder {
    /// Never received since the last permission request.
    Absent,
    Alive,
    /// Was alive, then died.
    Lost,
}

/// Derived connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Unconnected,
    PermissionPending,
    Ready,
    Denied,
    Dead,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unconnected => "unconnected",
            Self::PermissionPending => "permission-pending",
            Self::Ready => "ready",
            Self::Denied => "denied",
            Self::Dead => "dead",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub permission: Permission,
    pub binder: Binder,
    /// Incremented on every applied transition.
    pub generation: u64,
}

impl ConnectionSnapshot {
    const INITIAL: Self = Self {
        permission: Permission::Unset,
        binder: Binder::Absent,
        generation: 0,
    };

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match (self.permission, self.binder) {
            (Permission::Unset, _) => ConnectionState::Unconnected,
            (Permission::Requested, _) | (Permission::Granted, Binder::Absent) => {
                ConnectionState::PermissionPending
            }
            (Permission::Denied, _) => ConnectionState::Denied,
            (Permission::Granted, Binder::Alive) => ConnectionState::Ready,
            (Permission::Granted, Binder::Lost) => ConnectionState::Dead,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    RequestPermission,
    PermissionResult(bool),
    BinderReceived,
    BinderDied,
    Reset,
}

impl Transition {
    fn apply(self, current: ConnectionSnapshot) -> Option<ConnectionSnapshot> {
        let (permission, binder) = match (self, current.permission, current.binder) {
            (Self::RequestPermission, Permission::Requested, _) => return None,
            (Self::RequestPermission, _, _) => (Permission::Requested, Binder::Absent),
            (Self::PermissionResult(granted), Permission::Requested, binder) => {
                let permission = if granted {
                    Permission::Granted
                } else {
                    Permission::Denied
                };
                (permission, binder)
            }
            (Self::BinderReceived, Permission::Granted, Binder::Absent | Binder::Lost) => {
                (Permission::Granted, Binder::Alive)
            }
            (Self::BinderDied, Permission::Granted, Binder::Alive) => {
                (Permission::Granted, Binder::Lost)
            }
            (Self::Reset, Permission::Unset, _) => return None,
            (Self::Reset, _, _) => (Permission::Unset, Binder::Absent),
            _ => return None,
        };
        Some(ConnectionSnapshot {
            permission,
            binder,
            generation: current.generation + 1,
        })
    }
}

/// Shared connection state with wait-free reads and change subscriptions.
#[derive(Debug)]
pub struct BrokerConnection {
    current: ArcSwap<ConnectionSnapshot>,
    writer: Mutex<Vec<Sender<ConnectionSnapshot>>>,
}

impl Default for BrokerConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerConnection {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ConnectionSnapshot::INITIAL),
            writer: Mutex::new(Vec::new()),
        }
    }

    /// Current snapshot. Wait-free.
    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        **self.current.load()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.snapshot().state()
    }

    /// Evaluated on every call.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Receive every snapshot published after this call.
    pub fn subscribe(&self) -> Receiver<ConnectionSnapshot> {
        let (tx, rx) = mpsc::channel();
        self.lock_writer().push(tx);
        rx
    }

    /// Start (or restart) the permission flow.
    pub fn request_permission(&self) -> ConnectionState {
        self.transition(Transition::RequestPermission)
    }

    /// Outcome of the permission flow. Ignored unless a request is pending.
    pub fn permission_result(&self, granted: bool) -> ConnectionState {
        self.transition(Transition::PermissionResult(granted))
    }

    /// The helper binder arrived (first time or after a loss).
    pub fn binder_received(&self) -> ConnectionState {
        self.transition(Transition::BinderReceived)
    }

    /// The helper binder died.
    pub fn binder_died(&self) -> ConnectionState {
        self.transition(Transition::BinderDied)
    }

    /// Forget everything and return to `Unconnected`.
    pub fn reset(&self) -> ConnectionState {
        self.transition(Transition::Reset)
    }

    fn lock_writer(&self) -> MutexGuard<'_, Vec<Sender<ConnectionSnapshot>>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, transition: Transition) -> ConnectionState {
        let mut subscribers = self.lock_writer();
        let current = self.snapshot();
        let Some(next) = transition.apply(current) else {
            debug!(
                target: "tincture_broker::state",
                ?transition,
                state = %current.state(),
                "ignored connection transition"
            );
            return current.state();
        };
        self.current.store(Arc::new(next));
        subscribers.retain(|tx| tx.send(next).is_ok());
        info!(
            target: "tincture_broker::state",
            from = %current.state(),
            to = %next.state(),
            generation = next.generation,
            "broker connection changed"
        );
        next.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> BrokerConnection {
        let connection = BrokerConnection::new();
        connection.request_permission();
        connection.permission_result(true);
        connection.binder_received();
        connection
    }

    #[test]
    fn starts_unconnected() {
        let connection = BrokerConnection::new();
        assert_eq!(connection.state(), ConnectionState::Unconnected);
        assert!(!connection.is_ready());
        assert_eq!(connection.snapshot().generation, 0);
    }

    #[test]
    fn grant_then_binder_reaches_ready() {
        let connection = BrokerConnection::new();
        assert_eq!(connection.request_permission(), ConnectionState::PermissionPending);
        assert_eq!(connection.permission_result(true), ConnectionState::PermissionPending);
        assert_eq!(connection.binder_received(), ConnectionState::Ready);
        assert!(connection.is_ready());
    }

    #[test]
    fn denial_is_terminal_until_requested_again() {
        let connection = BrokerConnection::new();
        connection.request_permission();
        assert_eq!(connection.permission_result(false), ConnectionState::Denied);
        assert_eq!(connection.binder_received(), ConnectionState::Denied);
        assert_eq!(connection.request_permission(), ConnectionState::PermissionPending);
    }

    #[test]
    fn binder_loss_and_recovery() {
        let connection = ready();
        assert_eq!(connection.binder_died(), ConnectionState::Dead);
        assert!(!connection.is_ready());
        assert_eq!(connection.binder_received(), ConnectionState::Ready);
    }

    #[test]
    fn out_of_order_transitions_are_ignored() {
        let connection = BrokerConnection::new();
        assert_eq!(connection.permission_result(true), ConnectionState::Unconnected);
        assert_eq!(connection.binder_received(), ConnectionState::Unconnected);
        assert_eq!(connection.binder_died(), ConnectionState::Unconnected);
        assert_eq!(connection.snapshot().generation, 0);
    }

    #[test]
    fn subscribers_see_every_published_snapshot() {
        let connection = BrokerConnection::new();
        let rx = connection.subscribe();
        connection.request_permission();
        connection.permission_result(true);
        connection.binder_received();
        connection.binder_died();
        let states: Vec<ConnectionState> = rx.try_iter().map(|s| s.state()).collect();
        assert_eq!(
            states,
            vec![
                ConnectionState::PermissionPending,
                ConnectionState::PermissionPending,
                ConnectionState::Ready,
                ConnectionState::Dead,
            ]
        );
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let connection = BrokerConnection::new();
        drop(connection.subscribe());
        let live = connection.subscribe();
        connection.request_permission();
        assert_eq!(connection.lock_writer().len(), 1);
        assert_eq!(live.try_recv().map(|s| s.generation), Ok(1));
    }

    #[test]
    fn reset_returns_to_unconnected() {
        let connection = ready();
        assert_eq!(connection.reset(), ConnectionState::Unconnected);
        assert_eq!(connection.reset(), ConnectionState::Unconnected);
    }

    #[test]
    fn concurrent_readers_never_block_writers() {
        let connection = Arc::new(ready());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let connection = Arc::clone(&connection);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let state = connection.state();
                        assert!(matches!(state, ConnectionState::Ready | ConnectionState::Dead));
                    }
                })
            })
            .collect();
        for _ in 0..100 {
            connection.binder_died();
            connection.binder_received();
        }
        for reader in readers {
            reader.join().expect("reader thread");
        }
        assert!(connection.is_ready());
    }
}
