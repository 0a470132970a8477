//! Operation poller.
//!
//! Reads a resource's provisioning state on a fixed interval until it reaches
//! a target state, leaves the pending set, or an absolute deadline passes.
//! Time is read and slept through an injected `Clock` so the loop can be
//! driven by virtual time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::client::snapshots::SnapshotsApi;
use crate::client::storage::StorageAccountsApi;
use crate::config::PollConfig;
use crate::error::ClientError;
use crate::model::{Coordinates, ProvisioningState};

/// Shortest wait between two reads, whatever the configured interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Source of time for the poller.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` returns immediately and advances time.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_nanos: AtomicU64,
    sleeps: AtomicU32,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_nanos: AtomicU64::new(0),
            sleeps: AtomicU32::new(0),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.offset_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }

    /// Number of `sleep` calls so far.
    pub fn sleeps(&self) -> u32 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
    }
}

/// Anything that can report a resource's current provisioning state.
#[async_trait]
pub trait StateSource: Send + Sync {
    async fn provisioning_state(&self, target: &Coordinates)
    -> Result<ProvisioningState, ClientError>;
}

/// Storage accounts report their state through `get_properties`.
pub struct AccountStates<'a, C: ?Sized>(pub &'a C);

#[async_trait]
impl<C: StorageAccountsApi + ?Sized> StateSource for AccountStates<'_, C> {
    async fn provisioning_state(
        &self,
        target: &Coordinates,
    ) -> Result<ProvisioningState, ClientError> {
        let account = self.0.get_properties(target).await?;
        Ok(account
            .provisioning_state()
            .cloned()
            .unwrap_or_else(|| ProvisioningState::Unknown(String::new())))
    }
}

/// Snapshots report their state through `get`.
pub struct SnapshotStates<'a, C: ?Sized>(pub &'a C);

#[async_trait]
impl<C: SnapshotsApi + ?Sized> StateSource for SnapshotStates<'_, C> {
    async fn provisioning_state(
        &self,
        target: &Coordinates,
    ) -> Result<ProvisioningState, ClientError> {
        let snapshot = self.0.get(target).await?;
        Ok(snapshot
            .provisioning_state()
            .cloned()
            .unwrap_or_else(|| ProvisioningState::Unknown(String::new())))
    }
}

/// What to wait for and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSpec {
    pub pending: Vec<ProvisioningState>,
    pub target: Vec<ProvisioningState>,
    pub timeout: Duration,
    pub interval: Duration,
    /// Consecutive not-found reads tolerated before failing.
    pub not_found_checks: u32,
}

impl PollSpec {
    /// Wait applied after a create: `Creating`/`Updating` until `Succeeded`.
    pub fn creation(config: &PollConfig) -> Self {
        Self {
            pending: vec![ProvisioningState::Creating, ProvisioningState::Updating],
            target: vec![ProvisioningState::Succeeded],
            timeout: config.timeout(),
            interval: config.interval(),
            not_found_checks: config.not_found_checks,
        }
    }
}

/// A successful wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub state: ProvisioningState,
    pub polls: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("reached unexpected state {state} after {polls} polls")]
    UnexpectedState {
        state: ProvisioningState,
        polls: u32,
    },

    #[error("still {last_state} after {polls} polls ({elapsed:?})")]
    Timeout {
        last_state: ProvisioningState,
        polls: u32,
        elapsed: Duration,
    },

    #[error("poll {polls} failed: {source}")]
    Client {
        polls: u32,
        #[source]
        source: ClientError,
    },

    #[error("resource not found for {polls} consecutive polls")]
    Vanished { polls: u32 },
}

/// Polls a state source until a terminal outcome.
#[derive(Clone)]
pub struct Poller {
    clock: Arc<dyn Clock>,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(Arc::new(TokioClock))
    }
}

impl Poller {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub async fn await_terminal(
        &self,
        source: &dyn StateSource,
        target: &Coordinates,
        spec: &PollSpec,
    ) -> Result<PollOutcome, PollError> {
        let started = self.clock.now();
        let deadline = started + spec.timeout;
        let mut polls = 0u32;
        let mut not_found_streak = 0u32;
        let mut last_state = ProvisioningState::Unknown(String::new());

        loop {
            polls += 1;
            match source.provisioning_state(target).await {
                Ok(state) => {
                    not_found_streak = 0;
                    if spec.target.contains(&state) {
                        let elapsed = self.clock.now() - started;
                        debug!(%target, %state, polls, ?elapsed, "Reached target state");
                        return Ok(PollOutcome {
                            state,
                            polls,
                            elapsed,
                        });
                    }
                    if !spec.pending.contains(&state) {
                        warn!(%target, %state, polls, terminal = state.is_terminal(), "Reached unexpected state");
                        return Err(PollError::UnexpectedState { state, polls });
                    }
                    debug!(%target, %state, polls, "Still pending");
                    last_state = state;
                }
                Err(e) if e.is_not_found() => {
                    not_found_streak += 1;
                    if not_found_streak > spec.not_found_checks {
                        return Err(PollError::Vanished { polls });
                    }
                    debug!(%target, polls, "Not found yet");
                }
                Err(source) => return Err(PollError::Client { polls, source }),
            }

            let now = self.clock.now();
            if now >= deadline {
                return Err(PollError::Timeout {
                    last_state,
                    polls,
                    elapsed: now - started,
                });
            }
            let interval = spec.interval.max(MIN_POLL_INTERVAL);
            self.clock.sleep(interval.min(deadline - now)).await;
        }
    }
}
