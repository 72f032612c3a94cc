//! Process lifecycle state.
//!
//! `Unstarted -> Running -> Stopping -> Stopped`. The stop transition happens
//! at most once no matter how many signals arrive; waiters are woken through a
//! watch channel. A stop caused by a failure records its reason so the
//! process can exit unsuccessfully once cleanup is done.

use std::fmt;
use std::sync::OnceLock;

use tokio::sync::watch;

/// Lifecycle of the exporter process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Unstarted,
    Running,
    Stopping,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared lifecycle handle.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<LifecycleState>,
    fault: OnceLock<String>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Unstarted);
        Self {
            state,
            fault: OnceLock::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Whether scrapes may run.
    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Move from `Unstarted` to `Running`.
    ///
    /// Returns `false` if a stop was already requested.
    pub fn mark_running(&self) -> bool {
        let changed = self.transition(|s| s == LifecycleState::Unstarted, LifecycleState::Running);
        if changed {
            tracing::info!("Exporter running");
        }
        changed
    }

    /// Request shutdown.
    ///
    /// Returns `true` only for the call that performed the transition; every
    /// later call is a no-op.
    pub fn stop(&self) -> bool {
        let changed = self.transition(|s| s < LifecycleState::Stopping, LifecycleState::Stopping);
        if changed {
            tracing::info!("Stop requested, shutting down");
        } else {
            tracing::debug!(state = %self.state(), "Stop already requested");
        }
        changed
    }

    /// Request shutdown because of an unrecoverable failure.
    ///
    /// The first reason is kept; see [`fault`](Self::fault).
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        tracing::error!(reason = %reason, "Unrecoverable failure");
        let _ = self.fault.set(reason);
        self.stop()
    }

    /// Reason of the failure that requested shutdown, if any.
    pub fn fault(&self) -> Option<&str> {
        self.fault.get().map(String::as_str)
    }

    /// Mark cleanup as complete.
    pub fn mark_stopped(&self) {
        if self.transition(|s| s != LifecycleState::Stopped, LifecycleState::Stopped) {
            tracing::info!("Exporter stopped");
        }
    }

    /// Resolve once a stop has been requested.
    pub async fn stop_requested(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|s| *s >= LifecycleState::Stopping).await;
    }

    fn transition(&self, allowed: impl Fn(LifecycleState) -> bool, next: LifecycleState) -> bool {
        self.state.send_if_modified(|state| {
            if allowed(*state) {
                tracing::debug!(from = %state, to = %next, "Lifecycle transition");
                *state = next;
                true
            } else {
                false
            }
        })
    }
}
