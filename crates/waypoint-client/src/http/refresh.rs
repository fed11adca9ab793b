//! Single-flight session refresh
//!
//! State machine: `Idle -> Refreshing -> (Refreshed | Rejected) -> Idle`.
//!
//! The first caller that needs a refresh while the coordinator is idle becomes
//! the leader: it installs a shared outcome and calls
//! [`AuthHandlers::refresh_session`]. Every caller arriving while the refresh
//! is in flight attaches to that outcome instead of starting its own. Only the
//! leader may log the user out, so a failed refresh logs out at most once no
//! matter how many requests were waiting on it.
//!
//! Each settled refresh advances an epoch. Callers sample it with
//! [`RefreshCoordinator::epoch`] before reading the token and pass it to
//! [`RefreshCoordinator::refresh_since`]; a caller whose token read predates
//! a refresh that has since settled receives that refresh's outcome instead of
//! leading a new one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

use crate::http::auth::{AuthHandlers, TokenFreshness};

/// Result shared by every caller attached to one refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The session was refreshed; the handlers now expose the new token
    Refreshed,
    /// The refresh failed
    Rejected {
        reason: String,
        /// Whether this failure logged the user out
        logged_out: bool,
    },
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed)
    }
}

/// Observable coordinator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
}

type SharedOutcome = watch::Receiver<Option<RefreshOutcome>>;

enum Phase {
    Idle,
    Refreshing(SharedOutcome),
}

struct RefreshState {
    phase: Phase,
    /// Number of refreshes that have settled
    epoch: u64,
    /// Outcome of the refresh that produced `epoch`
    last: Option<RefreshOutcome>,
}

enum Role {
    Leader(watch::Sender<Option<RefreshOutcome>>),
    Follower(SharedOutcome),
    Settled(RefreshOutcome),
}

/// Ensures at most one session refresh runs at a time
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    freshness: TokenFreshness,
    refresh_count: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(freshness: TokenFreshness) -> Self {
        Self {
            state: Mutex::new(RefreshState {
                phase: Phase::Idle,
                epoch: 0,
                last: None,
            }),
            freshness,
            refresh_count: AtomicU64::new(0),
        }
    }

    pub fn phase(&self) -> RefreshPhase {
        match &self.lock_state().phase {
            Phase::Idle => RefreshPhase::Idle,
            Phase::Refreshing(_) => RefreshPhase::Refreshing,
        }
    }

    /// Number of refreshes that have settled so far
    pub fn epoch(&self) -> u64 {
        self.lock_state().epoch
    }

    /// Number of times `refresh_session` has been invoked
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::SeqCst)
    }

    /// Refresh the session, or wait for the refresh already in flight
    pub async fn refresh(&self, handlers: &dyn AuthHandlers) -> RefreshOutcome {
        let epoch = self.epoch();
        self.refresh_since(handlers, epoch).await
    }

    /// Like [`refresh`](Self::refresh), for a caller that decided to refresh
    /// based on a token read at `observed_epoch`
    pub async fn refresh_since(
        &self,
        handlers: &dyn AuthHandlers,
        observed_epoch: u64,
    ) -> RefreshOutcome {
        match self.join(observed_epoch) {
            Role::Leader(outcome) => self.lead(outcome, handlers).await,
            Role::Follower(outcome) => Self::follow(outcome).await,
            Role::Settled(outcome) => outcome,
        }
    }

    fn join(&self, observed_epoch: u64) -> Role {
        let mut state = self.lock_state();
        if let Phase::Refreshing(outcome) = &state.phase {
            tracing::debug!("Refresh already in flight, waiting for it");
            return Role::Follower(outcome.clone());
        }

        if state.epoch != observed_epoch {
            if let Some(last) = &state.last {
                tracing::debug!(epoch = state.epoch, "Refresh settled since token was read");
                return Role::Settled(last.clone());
            }
        }

        let (sender, receiver) = watch::channel(None);
        state.phase = Phase::Refreshing(receiver);
        Role::Leader(sender)
    }

    async fn lead(
        &self,
        sender: watch::Sender<Option<RefreshOutcome>>,
        handlers: &dyn AuthHandlers,
    ) -> RefreshOutcome {
        // Resets the slot even if this future is dropped mid-refresh
        let reset = ResetOnDrop {
            state: &self.state,
            armed: true,
        };

        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!("Refreshing session");

        let outcome = match handlers.refresh_session().await {
            Ok(()) => {
                tracing::info!("Session refreshed");
                RefreshOutcome::Refreshed
            }
            Err(error) => {
                let logged_out = !self.freshness.is_usable(handlers.token().as_deref());
                if logged_out {
                    handlers.logout();
                }
                tracing::error!(error = %error, logged_out, "Session refresh failed");
                RefreshOutcome::Rejected {
                    reason: error.to_string(),
                    logged_out,
                }
            }
        };

        reset.settle(outcome.clone());
        sender.send_replace(Some(outcome.clone()));
        outcome
    }

    async fn follow(mut outcome: SharedOutcome) -> RefreshOutcome {
        match outcome.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone().unwrap_or_else(abandoned),
            Err(_) => abandoned(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        lock(&self.state)
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new(TokenFreshness::default())
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("phase", &self.phase())
            .field("epoch", &self.epoch())
            .field("refresh_count", &self.refresh_count())
            .finish()
    }
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn abandoned() -> RefreshOutcome {
    RefreshOutcome::Rejected {
        reason: "refresh was abandoned before completing".to_string(),
        logged_out: false,
    }
}

struct ResetOnDrop<'a> {
    state: &'a Mutex<RefreshState>,
    armed: bool,
}

impl ResetOnDrop<'_> {
    /// Record `outcome` as the latest epoch and return to idle in one step
    fn settle(mut self, outcome: RefreshOutcome) {
        let mut state = lock(self.state);
        state.phase = Phase::Idle;
        state.epoch += 1;
        state.last = Some(outcome);
        self.armed = false;
    }
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.state).phase = Phase::Idle;
        }
    }
}
