//! Lifecycle state and in-flight accounting for one server.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Listening,
    Draining,
    Stopped,
    Failed,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Created => "created",
            ServerState::Listening => "listening",
            ServerState::Draining => "draining",
            ServerState::Stopped => "stopped",
            ServerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight connection finished.
    Idle,
    /// The deadline passed with this many connections still running.
    Forced { abandoned: usize },
}

/// Shutdown coordinator. Cheap to clone; every clone observes and controls
/// the same server.
///
/// Obtain one from [`App::shutdown`](crate::App::shutdown) before serving
/// and call [`Shutdown::request_drain`] from anywhere to stop the server.
#[derive(Clone)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

struct Inner {
    in_flight: AtomicUsize,
    idle: Notify,
    state: watch::Sender<ServerState>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ServerState::Created);
        Self {
            inner: Arc::new(Inner {
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                state,
            }),
        }
    }

    pub fn state(&self) -> ServerState {
        *self.inner.state.borrow()
    }

    /// A receiver that sees every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.inner.state.subscribe()
    }

    /// Stops accepting connections and starts draining. Has no effect once
    /// the server is already draining, stopped or failed. A drain requested
    /// before the server starts makes it stop as soon as it is listening.
    pub fn request_drain(&self) {
        let changed = self.transition(|s| {
            matches!(s, ServerState::Created | ServerState::Listening).then_some(ServerState::Draining)
        });
        if changed {
            info!(in_flight = self.in_flight(), "drain requested");
        }
    }

    pub fn is_draining(&self) -> bool {
        self.state() == ServerState::Draining
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Resolves once the server reaches `Stopped` or `Failed`.
    pub async fn stopped(&self) -> ServerState {
        let mut rx = self.subscribe();
        let reached = rx
            .wait_for(|s| matches!(s, ServerState::Stopped | ServerState::Failed))
            .await
            .map(|state| *state);
        reached.unwrap_or_else(|_| self.state())
    }

    pub(crate) fn mark_listening(&self) {
        self.transition(|s| (s == ServerState::Created).then_some(ServerState::Listening));
    }

    pub(crate) fn mark_stopped(&self) {
        self.transition(|s| (s != ServerState::Failed).then_some(ServerState::Stopped));
    }

    pub(crate) fn mark_failed(&self) {
        self.transition(|s| (s != ServerState::Stopped).then_some(ServerState::Failed));
    }

    fn transition(&self, next: impl FnOnce(ServerState) -> Option<ServerState>) -> bool {
        self.inner.state.send_if_modified(|state| match next(*state) {
            Some(new) if new != *state => {
                *state = new;
                true
            }
            _ => false,
        })
    }

    /// Counts a request as in flight until the guard is dropped.
    pub(crate) fn enter(&self) -> InFlightGuard {
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Resolves when no connection is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Waits for in-flight work up to `deadline`. Running tasks are never
    /// aborted; a forced outcome only means the server stops waiting.
    pub(crate) async fn drain(&self, deadline: Duration) -> DrainOutcome {
        match tokio::time::timeout(deadline, self.wait_idle()).await {
            Ok(()) => DrainOutcome::Idle,
            Err(_) => {
                let abandoned = self.in_flight();
                warn!(
                    abandoned,
                    deadline_ms = deadline.as_millis() as u64,
                    "drain deadline reached; forcing shutdown"
                );
                DrainOutcome::Forced { abandoned }
            }
        }
    }
}

/// Decrements the in-flight count on drop, including during unwinding.
pub(crate) struct InFlightGuard {
    inner: Arc<Inner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_the_lifecycle() {
        let shutdown = Shutdown::new();
        assert_eq!(shutdown.state(), ServerState::Created);

        shutdown.mark_listening();
        assert_eq!(shutdown.state(), ServerState::Listening);

        shutdown.request_drain();
        assert!(shutdown.is_draining());

        // A late listening mark never undoes a drain.
        shutdown.mark_listening();
        assert!(shutdown.is_draining());

        shutdown.mark_stopped();
        assert_eq!(shutdown.state(), ServerState::Stopped);

        shutdown.request_drain();
        shutdown.mark_failed();
        assert_eq!(shutdown.state(), ServerState::Stopped);
    }

    #[test]
    fn drain_before_listening_sticks() {
        let shutdown = Shutdown::new();
        shutdown.request_drain();
        shutdown.mark_listening();
        assert_eq!(shutdown.state(), ServerState::Draining);
    }

    #[test]
    fn guard_balances_counter_even_on_panic() {
        let shutdown = Shutdown::new();
        let clone = shutdown.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = clone.enter();
            panic!("handler blew up");
        }));
        assert!(result.is_err());
        assert_eq!(shutdown.in_flight(), 0);
    }

    #[tokio::test]
    async fn drain_with_nothing_in_flight_is_immediate() {
        let shutdown = Shutdown::new();
        let outcome = shutdown.drain(Duration::from_secs(30)).await;
        assert_eq!(outcome, DrainOutcome::Idle);
    }

    #[tokio::test]
    async fn drain_waits_for_guards() {
        let shutdown = Shutdown::new();
        let guard = shutdown.enter();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });
        assert_eq!(shutdown.drain(Duration::from_secs(5)).await, DrainOutcome::Idle);
        assert_eq!(shutdown.in_flight(), 0);
    }

    #[tokio::test]
    async fn drain_deadline_reports_abandoned_work() {
        let shutdown = Shutdown::new();
        let _stuck = shutdown.enter();
        let outcome = shutdown.drain(Duration::from_millis(20)).await;
        assert_eq!(outcome, DrainOutcome::Forced { abandoned: 1 });
    }

    #[tokio::test]
    async fn stopped_resolves_on_terminal_state() {
        let shutdown = Shutdown::new();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.stopped().await })
        };
        shutdown.mark_listening();
        shutdown.mark_failed();
        assert_eq!(waiter.await.unwrap(), ServerState::Failed);
    }
}
