//! Polling supervisor: the ingest loop with backoff and a circuit breaker.
//!
//! One cooperative loop drives ingestion: fetch a batch, advance the offset
//! cursor, hand each update to the dispatch callback, repeat. Suspension
//! points are the fetch itself and the failure sleeps. Dispatch is
//! fire-and-forget — the supervisor never awaits handler completion, so
//! there is no ordering guarantee between two updates' pipelines, only
//! monotonic offset advancement in update-id order.
//!
//! # Failure protocol
//!
//! Every fetch failure increments a consecutive-failure counter. Below the
//! circuit-breaker threshold the loop sleeps
//! `min(backoff_factor * 2^failures, max_backoff)` seconds. At the
//! threshold the circuit opens: the loop sleeps `circuit_breaker_timeout`
//! and resets the counter, bypassing the backoff formula for that
//! transition. A successful fetch resets both the counter and the backoff.
//!
//! The decisions themselves are pure functions on [`PollingState`]
//! ([`PollingState::on_fetch_failure`]), so the protocol is testable
//! without sleeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use courier_core::update::{RawUpdate, UpdateType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::source::UpdateSource;

// ============================================================================
// Configuration
// ============================================================================

/// Polling loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Long-poll hold time in seconds.
    pub timeout: u32,
    /// Maximum updates per fetched batch.
    pub limit: u32,
    /// Discard updates accumulated while the bot was down.
    pub drop_pending_updates: bool,
    /// Update types to receive; empty means all.
    pub allowed_updates: Vec<UpdateType>,
    /// Base factor of the exponential backoff curve.
    pub backoff_factor: f64,
    /// Backoff ceiling in seconds.
    pub max_backoff: f64,
    /// Consecutive failures that trip the circuit breaker.
    pub circuit_breaker_threshold: u32,
    /// Circuit-open pause in seconds.
    pub circuit_breaker_timeout: f64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            limit: 100,
            drop_pending_updates: false,
            allowed_updates: Vec::new(),
            backoff_factor: 0.5,
            max_backoff: 60.0,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout: 60.0,
        }
    }
}

// ============================================================================
// State machine
// ============================================================================

/// What the loop must do after a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailureAction {
    /// Sleep the exponential-backoff delay, then poll again.
    BackOff(Duration),
    /// Circuit tripped: sleep the circuit timeout, then poll again with a
    /// fresh failure counter.
    OpenCircuit(Duration),
}

/// Mutable loop state, owned by the supervisor's run loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollingState {
    /// Next fetch offset.
    pub offset: i64,
    /// Fetch failures since the last success.
    pub consecutive_failures: u32,
    /// Last computed backoff delay in seconds.
    pub backoff_seconds: f64,
    /// Whether the circuit breaker is currently open.
    pub circuit_open: bool,
    /// Whether the loop should keep iterating.
    pub running: bool,
}

impl PollingState {
    /// Initial state with the given starting offset.
    pub fn new(offset: i64) -> Self {
        Self {
            offset,
            consecutive_failures: 0,
            backoff_seconds: 0.0,
            circuit_open: false,
            running: true,
        }
    }

    /// Records a successful fetch: failure tracking resets.
    pub fn on_fetch_success(&mut self) {
        self.consecutive_failures = 0;
        self.backoff_seconds = 0.0;
        self.circuit_open = false;
    }

    /// Advances the offset cursor past a fetched update. Called before the
    /// update is submitted for dispatch, which is what makes delivery
    /// at-least-once with no redelivery on handler failure.
    pub fn advance(&mut self, update_id: i64) {
        self.offset = update_id + 1;
    }

    /// Records a fetch failure and decides the loop's next move.
    pub fn on_fetch_failure(&mut self, config: &PollingConfig) -> FailureAction {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= config.circuit_breaker_threshold {
            self.circuit_open = true;
            self.consecutive_failures = 0;
            FailureAction::OpenCircuit(Duration::from_secs_f64(config.circuit_breaker_timeout))
        } else {
            let delay = backoff_delay(
                config.backoff_factor,
                self.consecutive_failures,
                config.max_backoff,
            );
            self.backoff_seconds = delay;
            FailureAction::BackOff(Duration::from_secs_f64(delay))
        }
    }

    /// Closes the circuit after the open-state sleep has elapsed.
    pub fn close_circuit(&mut self) {
        self.circuit_open = false;
    }
}

/// The exponential backoff curve: `min(factor * 2^failures, max)` seconds.
pub fn backoff_delay(factor: f64, consecutive_failures: u32, max: f64) -> f64 {
    let exp = 2f64.powi(consecutive_failures.min(i32::MAX as u32) as i32);
    (factor * exp).min(max)
}

// ============================================================================
// Supervisor
// ============================================================================

/// Drives the polling loop against an [`UpdateSource`].
pub struct PollingSupervisor {
    source: Arc<dyn UpdateSource>,
    config: PollingConfig,
    running: Arc<AtomicBool>,
}

impl PollingSupervisor {
    /// Creates a supervisor.
    ///
    /// The `running` flag is shared with whoever needs to stop the loop;
    /// clearing it is observed at the top of the next iteration
    /// (cooperative — an in-flight fetch or sleep is not interrupted).
    pub fn new(
        source: Arc<dyn UpdateSource>,
        config: PollingConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            config,
            running,
        }
    }

    /// Runs the loop until the running flag is cleared.
    ///
    /// `dispatch` is invoked once per fetched update, after the offset has
    /// already advanced past it; it must not block (hand the update to a
    /// worker pool and return). Returns the final state, whose `offset` is
    /// where a restarted loop should resume.
    pub async fn run<F>(&self, dispatch: F) -> PollingState
    where
        F: Fn(RawUpdate),
    {
        let mut state = PollingState::new(0);

        if self.config.drop_pending_updates {
            self.drop_pending(&mut state).await;
        }

        info!(offset = state.offset, "polling loop started");
        while self.running.load(Ordering::SeqCst) {
            match self
                .source
                .fetch_updates(
                    state.offset,
                    self.config.limit,
                    self.config.timeout,
                    &self.config.allowed_updates,
                )
                .await
            {
                Ok(batch) => {
                    state.on_fetch_success();
                    if !batch.is_empty() {
                        debug!(count = batch.len(), offset = state.offset, "batch fetched");
                    }
                    for update in batch {
                        state.advance(update.id);
                        dispatch(update);
                    }
                }
                Err(error) => {
                    warn!(%error, offset = state.offset, "fetch failed");
                    match state.on_fetch_failure(&self.config) {
                        FailureAction::BackOff(delay) => {
                            debug!(
                                delay_secs = state.backoff_seconds,
                                failures = state.consecutive_failures,
                                "backing off"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        FailureAction::OpenCircuit(delay) => {
                            warn!(delay_secs = delay.as_secs_f64(), "circuit breaker open");
                            tokio::time::sleep(delay).await;
                            state.close_circuit();
                        }
                    }
                }
            }
        }

        state.running = false;
        info!(offset = state.offset, "polling loop stopped");
        state
    }

    /// One fetch with `offset = -1`, discarding everything pending and
    /// leaving the cursor past the newest update.
    async fn drop_pending(&self, state: &mut PollingState) {
        match self
            .source
            .fetch_updates(-1, self.config.limit, 0, &self.config.allowed_updates)
            .await
        {
            Ok(batch) => {
                let dropped = batch.len();
                for update in batch {
                    state.advance(update.id);
                }
                info!(dropped, offset = state.offset, "pending updates dropped");
            }
            Err(error) => {
                warn!(%error, "failed to drop pending updates, continuing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceError, SourceResult};
    use async_trait::async_trait;
    use courier_core::update::{Chat, ChatKind, Message, UpdateKind, User};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    fn update(id: i64) -> RawUpdate {
        RawUpdate::new(
            id,
            UpdateKind::Message(Message::text(
                User::new(1, "u"),
                Chat::new(2, ChatKind::Private),
                "hi",
            )),
        )
    }

    /// Source replaying a script of results; clears the running flag when
    /// the script is exhausted so the loop exits.
    struct ScriptedSource {
        script: Mutex<VecDeque<SourceResult<Vec<RawUpdate>>>>,
        offsets: Mutex<Vec<i64>>,
        running: Arc<AtomicBool>,
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        async fn fetch_updates(
            &self,
            offset: i64,
            _limit: u32,
            _timeout: u32,
            _allowed: &[UpdateType],
        ) -> SourceResult<Vec<RawUpdate>> {
            self.offsets.lock().push(offset);
            match self.script.lock().pop_front() {
                Some(result) => result,
                None => {
                    self.running.store(false, Ordering::SeqCst);
                    Ok(Vec::new())
                }
            }
        }
    }

    fn scripted(
        script: Vec<SourceResult<Vec<RawUpdate>>>,
    ) -> (Arc<ScriptedSource>, Arc<AtomicBool>) {
        let running = Arc::new(AtomicBool::new(true));
        let source = Arc::new(ScriptedSource {
            script: Mutex::new(script.into()),
            offsets: Mutex::new(Vec::new()),
            running: Arc::clone(&running),
        });
        (source, running)
    }

    #[test]
    fn test_backoff_sequence() {
        let delays: Vec<f64> = [1u32, 2, 3, 4, 5, 10]
            .iter()
            .map(|&n| backoff_delay(0.5, n, 60.0))
            .collect();
        assert_eq!(delays, vec![1.0, 2.0, 4.0, 8.0, 16.0, 60.0]);
    }

    #[test]
    fn test_circuit_breaker_trips_at_threshold() {
        let config = PollingConfig::default();
        let mut state = PollingState::new(0);

        for expected in [1.0, 2.0, 4.0, 8.0] {
            let action = state.on_fetch_failure(&config);
            assert_eq!(
                action,
                FailureAction::BackOff(Duration::from_secs_f64(expected))
            );
        }
        assert_eq!(state.consecutive_failures, 4);

        // Fifth consecutive failure: circuit opens, counter resets, and the
        // sleep is the circuit timeout rather than the backoff formula.
        let action = state.on_fetch_failure(&config);
        assert_eq!(action, FailureAction::OpenCircuit(Duration::from_secs(60)));
        assert!(state.circuit_open);
        assert_eq!(state.consecutive_failures, 0);

        state.close_circuit();
        assert!(!state.circuit_open);
    }

    #[test]
    fn test_success_resets_failure_tracking() {
        let config = PollingConfig::default();
        let mut state = PollingState::new(0);
        state.on_fetch_failure(&config);
        state.on_fetch_failure(&config);
        state.on_fetch_success();
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.backoff_seconds, 0.0);

        // Counting starts over after a success.
        let action = state.on_fetch_failure(&config);
        assert_eq!(action, FailureAction::BackOff(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_offset_advances_past_batch() {
        let (source, running) = scripted(vec![Ok(vec![update(101), update(102), update(103)])]);
        let supervisor = PollingSupervisor::new(
            Arc::clone(&source) as Arc<dyn UpdateSource>,
            PollingConfig::default(),
            running,
        );

        let dispatched = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&dispatched);
        let state = supervisor.run(move |u| seen.lock().push(u.id)).await;

        assert_eq!(state.offset, 104);
        assert_eq!(*dispatched.lock(), vec![101, 102, 103]);
        // The fetch after the batch used the advanced offset.
        assert_eq!(*source.offsets.lock(), vec![0, 104]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_then_recovery() {
        let (source, running) = scripted(vec![
            Err(SourceError::Network("down".into())),
            Err(SourceError::Network("still down".into())),
            Ok(vec![update(7)]),
        ]);
        let supervisor = PollingSupervisor::new(
            Arc::clone(&source) as Arc<dyn UpdateSource>,
            PollingConfig::default(),
            running,
        );

        let state = supervisor.run(|_| {}).await;
        assert_eq!(state.offset, 8);
        assert_eq!(state.consecutive_failures, 0);
        // Failed fetches do not advance the offset.
        assert_eq!(*source.offsets.lock(), vec![0, 0, 0, 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_pending_prefetches_with_sentinel_offset() {
        let (source, running) = scripted(vec![Ok(vec![update(50)])]);
        let config = PollingConfig {
            drop_pending_updates: true,
            ..PollingConfig::default()
        };
        let supervisor =
            PollingSupervisor::new(Arc::clone(&source) as Arc<dyn UpdateSource>, config, running);

        let dispatched = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&dispatched);
        supervisor.run(move |u| seen.lock().push(u.id)).await;

        // The prefetch used -1 and its updates were not dispatched.
        assert_eq!(source.offsets.lock()[0], -1);
        assert!(dispatched.lock().is_empty());
        assert_eq!(source.offsets.lock()[1], 51);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_flag_observed_at_loop_top() {
        let (source, running) = scripted(vec![]);
        running.store(false, Ordering::SeqCst);
        let supervisor = PollingSupervisor::new(
            Arc::clone(&source) as Arc<dyn UpdateSource>,
            PollingConfig::default(),
            running,
        );

        let state = supervisor.run(|_| {}).await;
        assert!(!state.running);
        // No fetch happened at all.
        assert!(source.offsets.lock().is_empty());
    }
}
