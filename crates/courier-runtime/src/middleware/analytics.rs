//! Usage analytics middleware.
//!
//! Tracks user sessions, per-command usage statistics, and error counts
//! across the pipeline. All state lives behind one mutex shared by every
//! concurrently executing chain; accessors hand out owned snapshots so
//! callers never hold the lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use courier_core::context::Context;
use courier_core::error::{HandlerError, HandlerResult};
use parking_lot::Mutex;

use super::{Middleware, Next};

/// Smoothing factor for the per-command response-time moving average.
const RESPONSE_TIME_ALPHA: f64 = 0.1;

struct Session {
    started: Instant,
    last_activity: Instant,
    commands_used: HashSet<String>,
    messages_sent: u64,
    errors_encountered: u64,
}

struct CommandRecord {
    total_uses: u64,
    unique_users: u64,
    error_count: u64,
    average_response_time: Duration,
    last_used: Instant,
}

struct AnalyticsState {
    sessions: HashMap<i64, Session>,
    commands: HashMap<String, CommandRecord>,
    updates_seen: u64,
    errors_seen: u64,
}

/// Snapshot of one command's usage statistics.
#[derive(Debug, Clone)]
pub struct CommandStats {
    /// The command token, leading slash included.
    pub command: String,
    /// Total invocations since startup or [`reset`](AnalyticsMiddleware::reset).
    pub total_uses: u64,
    /// Distinct users seen invoking the command.
    pub unique_users: u64,
    /// Pipeline failures attributed to the command.
    pub error_count: u64,
    /// Exponential moving average of successful pipeline duration.
    pub average_response_time: Duration,
}

impl CommandStats {
    /// Fraction of invocations that did not fail, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total_uses == 0 {
            return 100.0;
        }
        let successes = self.total_uses.saturating_sub(self.error_count);
        (successes as f64 / self.total_uses as f64) * 100.0
    }
}

/// Aggregate snapshot across all live sessions.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsSummary {
    /// Sessions with activity within the session timeout.
    pub active_users: usize,
    /// Updates that entered the pipeline since the last reset.
    pub updates_seen: u64,
    /// Pipeline failures fanned out since the last reset.
    pub errors_seen: u64,
    /// Distinct commands with at least one recorded use.
    pub commands_tracked: usize,
    /// Mean session length across live sessions.
    pub average_session_duration: Duration,
    /// Mean updates per live session.
    pub average_messages_per_session: f64,
}

/// Collects session, command, and error analytics as updates flow through.
///
/// Sessions expire lazily: an expired entry is evicted the next time the
/// same user appears or a snapshot is taken, the same strategy
/// [`MemoryStorage`](crate::storage::MemoryStorage) uses for TTLs. The
/// middleware never drops or fails an update; it observes and forwards.
pub struct AnalyticsMiddleware {
    session_timeout: Duration,
    max_sessions: usize,
    inner: Mutex<AnalyticsState>,
}

impl Default for AnalyticsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyticsMiddleware {
    /// Creates a collector with a 30 minute session timeout and room for
    /// 10,000 concurrent sessions.
    pub fn new() -> Self {
        Self::with_limits(Duration::from_secs(1800), 10_000)
    }

    /// Creates a collector with explicit session timeout and session cap.
    pub fn with_limits(session_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            session_timeout,
            max_sessions,
            inner: Mutex::new(AnalyticsState {
                sessions: HashMap::new(),
                commands: HashMap::new(),
                updates_seen: 0,
                errors_seen: 0,
            }),
        }
    }

    /// Records one inbound update for `user_id`, with its command token if
    /// the update carries one. Separated out so the bookkeeping is testable
    /// without a pipeline.
    fn record_update(&self, user_id: i64, command: Option<&str>, now: Instant) {
        let mut state = self.inner.lock();
        state.updates_seen += 1;

        let session = state.sessions.entry(user_id).or_insert_with(|| Session {
            started: now,
            last_activity: now,
            commands_used: HashSet::new(),
            messages_sent: 0,
            errors_encountered: 0,
        });
        if now.duration_since(session.last_activity) > self.session_timeout {
            // Stale session: the user came back after the timeout.
            session.started = now;
            session.commands_used.clear();
            session.messages_sent = 0;
            session.errors_encountered = 0;
        }
        session.last_activity = now;
        session.messages_sent += 1;

        if let Some(command) = command {
            let first_use = session.commands_used.insert(command.to_string());
            let record = state
                .commands
                .entry(command.to_string())
                .or_insert_with(|| CommandRecord {
                    total_uses: 0,
                    unique_users: 0,
                    error_count: 0,
                    average_response_time: Duration::ZERO,
                    last_used: now,
                });
            record.total_uses += 1;
            record.last_used = now;
            if first_use {
                record.unique_users += 1;
            }
        }

        if state.sessions.len() > self.max_sessions {
            Self::evict_expired(&mut state, self.session_timeout, now);
        }
    }

    /// Folds a successful pipeline duration into the command's moving
    /// average.
    fn record_success(&self, command: &str, elapsed: Duration) {
        let mut state = self.inner.lock();
        if let Some(record) = state.commands.get_mut(command) {
            let previous = record.average_response_time.as_secs_f64();
            let smoothed =
                RESPONSE_TIME_ALPHA * elapsed.as_secs_f64() + (1.0 - RESPONSE_TIME_ALPHA) * previous;
            record.average_response_time = Duration::from_secs_f64(smoothed);
        }
    }

    /// Attributes one pipeline failure to the user's session and, when the
    /// update carried a command, to that command's record.
    fn record_error(&self, user_id: i64, command: Option<&str>) {
        let mut state = self.inner.lock();
        state.errors_seen += 1;
        if let Some(session) = state.sessions.get_mut(&user_id) {
            session.errors_encountered += 1;
        }
        if let Some(command) = command
            && let Some(record) = state.commands.get_mut(command)
        {
            record.error_count += 1;
        }
    }

    fn evict_expired(state: &mut AnalyticsState, timeout: Duration, now: Instant) {
        state
            .sessions
            .retain(|_, session| now.duration_since(session.last_activity) <= timeout);
    }

    /// Usage statistics for one command, if it has been seen.
    pub fn command_stats(&self, command: &str) -> Option<CommandStats> {
        let state = self.inner.lock();
        state.commands.get(command).map(|record| CommandStats {
            command: command.to_string(),
            total_uses: record.total_uses,
            unique_users: record.unique_users,
            error_count: record.error_count,
            average_response_time: record.average_response_time,
        })
    }

    /// The `limit` most-used commands, descending by total use.
    pub fn top_commands(&self, limit: usize) -> Vec<CommandStats> {
        let state = self.inner.lock();
        let mut stats: Vec<CommandStats> = state
            .commands
            .iter()
            .map(|(command, record)| CommandStats {
                command: command.clone(),
                total_uses: record.total_uses,
                unique_users: record.unique_users,
                error_count: record.error_count,
                average_response_time: record.average_response_time,
            })
            .collect();
        stats.sort_by(|a, b| b.total_uses.cmp(&a.total_uses));
        stats.truncate(limit);
        stats
    }

    /// Aggregate snapshot across live sessions. Evicts expired sessions as
    /// a side effect.
    pub fn summary(&self) -> AnalyticsSummary {
        self.summary_at(Instant::now())
    }

    fn summary_at(&self, now: Instant) -> AnalyticsSummary {
        let mut state = self.inner.lock();
        Self::evict_expired(&mut state, self.session_timeout, now);

        let active = state.sessions.len();
        let mut summary = AnalyticsSummary {
            active_users: active,
            updates_seen: state.updates_seen,
            errors_seen: state.errors_seen,
            commands_tracked: state.commands.len(),
            ..AnalyticsSummary::default()
        };
        if active > 0 {
            let total_duration: Duration = state
                .sessions
                .values()
                .map(|s| s.last_activity.duration_since(s.started))
                .sum();
            let total_messages: u64 = state.sessions.values().map(|s| s.messages_sent).sum();
            summary.average_session_duration = total_duration / active as u32;
            summary.average_messages_per_session = total_messages as f64 / active as f64;
        }
        summary
    }

    /// Clears all collected data.
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        state.sessions.clear();
        state.commands.clear();
        state.updates_seen = 0;
        state.errors_seen = 0;
    }
}

#[async_trait]
impl Middleware for AnalyticsMiddleware {
    async fn on_update(&self, ctx: Arc<Context>, next: Next) -> HandlerResult {
        let user_id = ctx.user().id;
        let command = ctx.command().map(str::to_string);
        self.record_update(user_id, command.as_deref(), Instant::now());

        let started = Instant::now();
        let result = next.run(Arc::clone(&ctx)).await;
        if result.is_ok()
            && let Some(command) = command.as_deref()
        {
            self.record_success(command, started.elapsed());
        }
        result
    }

    async fn on_error(&self, ctx: Arc<Context>, _error: &HandlerError) {
        self.record_error(ctx.user().id, ctx.command());
    }
}
