//! Engine facade: registration surface plus the wired dispatch pipeline.
//!
//! The engine owns the router, the middleware chain, and the collaborator
//! handles, and connects them to a [`PollingSupervisor`]: fetched updates
//! are routed, a context is built for each match, and the middleware
//! pipeline is submitted to the worker pool fire-and-forget.
//!
//! ```rust,ignore
//! use courier_runtime::engine::Engine;
//!
//! let mut engine = Engine::new(source);
//! engine.on(
//!     EventSpec::message().text("/ping"),
//!     into_handler(|_ctx| async { Ok(()) }),
//!     0,
//! );
//! engine.use_middleware(Arc::new(LoggerMiddleware::new()));
//! engine.run_polling(PollingConfig::default()).await?;
//! ```
//!
//! Registration (`on`, `use_middleware`) must complete before
//! `run_polling`; registering concurrently with an active loop is a
//! precondition violation, not defended at runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use courier_core::context::Context;
use courier_core::handler::BoxedHandler;
use courier_core::router::{Route, Router, RouterCounts};
use courier_core::spec::EventSpec;
use courier_core::update::{RawUpdate, UpdateKind, UpdateType};
use tracing::{info, trace};

use crate::error::{RuntimeError, RuntimeResult};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::polling::{PollingConfig, PollingSupervisor};
use crate::source::UpdateSource;
use crate::transport::{Transport, TransportStats};
use crate::worker::{SpawnPool, WorkerPool, WorkerStats};

/// Engine statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Whether the polling loop is active.
    pub running: bool,
    /// Registered handler counts by category.
    pub handlers: RouterCounts,
    /// Registered middleware count.
    pub middleware: usize,
    /// Worker pool statistics.
    pub workers: WorkerStats,
    /// Transport statistics, when a transport is attached.
    pub transport: Option<TransportStats>,
}

/// The update dispatch engine.
pub struct Engine {
    router: Router,
    chain: MiddlewareChain,
    source: Arc<dyn UpdateSource>,
    pool: Arc<dyn WorkerPool>,
    transport: Option<Arc<dyn Transport>>,
    running: Arc<AtomicBool>,
}

impl Engine {
    /// Creates an engine over an update source, with a [`SpawnPool`] as the
    /// worker pool and no transport attached.
    pub fn new(source: Arc<dyn UpdateSource>) -> Self {
        Self {
            router: Router::new(),
            chain: MiddlewareChain::new(),
            source,
            pool: Arc::new(SpawnPool::new()),
            transport: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replaces the worker pool.
    pub fn with_pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Attaches the outbound transport, closed when the engine stops.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Registers a handler for the updates matched by `spec`.
    pub fn on(&mut self, spec: EventSpec, handler: BoxedHandler, priority: i32) {
        self.router.add_handler(spec, handler, priority);
    }

    /// Appends a middleware to the pipeline.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.chain.push(middleware);
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Routes an update without dispatching it. Exposed for tests and for
    /// callers feeding updates from somewhere other than the polling loop.
    pub fn route(&self, update: &UpdateKind, update_type: UpdateType) -> Option<Route> {
        self.router.route(update, update_type)
    }

    /// Runs the polling loop until [`stop`](Engine::stop) is called.
    ///
    /// Returns [`RuntimeError::AlreadyRunning`] immediately if the loop is
    /// already active. On shutdown the worker pool is stopped and the
    /// transport (if any) is closed.
    pub async fn run_polling(&self, config: PollingConfig) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyRunning);
        }

        let counts = self.router.counts();
        info!(
            commands = counts.commands,
            handlers = counts.text + counts.callback + counts.inline + counts.other,
            middleware = self.chain.len(),
            "engine starting"
        );

        self.pool.start().await;

        let router = Arc::new(self.router.clone());
        let chain = Arc::new(self.chain.clone());
        let pool = Arc::clone(&self.pool);
        let supervisor = PollingSupervisor::new(
            Arc::clone(&self.source),
            config,
            Arc::clone(&self.running),
        );

        supervisor
            .run(move |update: RawUpdate| {
                let update_type = update.kind.update_type();
                let Some(route) = router.route(&update.kind, update_type) else {
                    trace!(update_id = update.id, %update_type, "no route, update dropped");
                    return;
                };
                let ctx = Arc::new(Context::build(update, route.result));
                let handler = route.handler;
                let chain = Arc::clone(&chain);
                pool.submit(Box::pin(async move {
                    chain.execute(ctx, handler).await.is_ok()
                }));
            })
            .await;

        self.pool.stop().await;
        if let Some(transport) = &self.transport {
            transport.close().await;
        }
        self.running.store(false, Ordering::SeqCst);
        info!("engine stopped");
        Ok(())
    }

    /// Signals the polling loop to stop. Cooperative: the flag is observed
    /// at the top of the next loop iteration, and in-flight work finishes.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the polling loop is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current statistics.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            running: self.is_running(),
            handlers: self.router.counts(),
            middleware: self.chain.len(),
            workers: self.pool.stats(),
            transport: self.transport.as_ref().map(|t| t.stats()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceResult;
    use async_trait::async_trait;
    use courier_core::handler::into_handler;
    use courier_core::update::{Chat, ChatKind, Message, User};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    fn message(id: i64, text: &str) -> RawUpdate {
        RawUpdate::new(
            id,
            UpdateKind::Message(Message::text(
                User::new(1, "u"),
                Chat::new(2, ChatKind::Private),
                text,
            )),
        )
    }

    struct ScriptedSource {
        script: Mutex<VecDeque<SourceResult<Vec<RawUpdate>>>>,
        stop_when_done: Arc<AtomicBool>,
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        async fn fetch_updates(
            &self,
            _offset: i64,
            _limit: u32,
            _timeout: u32,
            _allowed: &[UpdateType],
        ) -> SourceResult<Vec<RawUpdate>> {
            match self.script.lock().pop_front() {
                Some(result) => result,
                None => {
                    self.stop_when_done.store(false, Ordering::SeqCst);
                    Ok(Vec::new())
                }
            }
        }
    }

    fn engine_with_script(script: Vec<SourceResult<Vec<RawUpdate>>>) -> Engine {
        // The scripted source clears the engine's own running flag once the
        // script runs out, so run_polling returns on its own.
        let stop_flag = Arc::new(AtomicBool::new(false));
        let source = Arc::new(ScriptedSource {
            script: Mutex::new(script.into()),
            stop_when_done: Arc::clone(&stop_flag),
        });
        let mut engine = Engine::new(source);
        engine.running = Arc::clone(&stop_flag);
        engine
    }

    fn counting_handler(calls: &Arc<AtomicUsize>) -> BoxedHandler {
        let counter = Arc::clone(calls);
        into_handler(move |_ctx| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_ping_fast_path_beats_higher_priority_pattern() {
        let mut engine = engine_with_script(vec![Ok(vec![message(101, "/ping")])]);

        let command_calls = Arc::new(AtomicUsize::new(0));
        let pattern_calls = Arc::new(AtomicUsize::new(0));
        engine.on(
            EventSpec::message().text("/ping"),
            counting_handler(&command_calls),
            0,
        );
        engine.on(
            EventSpec::message().pattern(r"^/p.*").unwrap(),
            counting_handler(&pattern_calls),
            10,
        );

        engine.run_polling(PollingConfig::default()).await.unwrap();
        while engine.stats().workers.processed < 1 {
            tokio::task::yield_now().await;
        }

        assert_eq!(command_calls.load(Ordering::SeqCst), 1);
        assert_eq!(pattern_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrouted_updates_are_dropped_silently() {
        let mut engine = engine_with_script(vec![Ok(vec![message(101, "nothing matches")])]);
        let calls = Arc::new(AtomicUsize::new(0));
        engine.on(
            EventSpec::message().text("/only"),
            counting_handler(&calls),
            0,
        );

        engine.run_polling(PollingConfig::default()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.stats().workers.processed, 0);
    }

    #[tokio::test]
    async fn test_handler_failure_counts_as_failed_task() {
        let mut engine = engine_with_script(vec![Ok(vec![message(101, "/boom")])]);
        engine.on(
            EventSpec::message().text("/boom"),
            into_handler(|_ctx| async {
                Err(courier_core::error::HandlerError::msg("nope"))
            }),
            0,
        );

        engine.run_polling(PollingConfig::default()).await.unwrap();
        while engine.stats().workers.processed < 1 {
            tokio::task::yield_now().await;
        }
        assert_eq!(engine.stats().workers.failed, 1);
    }

    #[tokio::test]
    async fn test_run_polling_twice_is_an_error() {
        let engine = Arc::new(engine_with_script(vec![]));
        // Hold the running flag ourselves to simulate an active loop.
        engine.running.store(true, Ordering::SeqCst);

        let err = engine
            .run_polling(PollingConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyRunning));
    }

    #[tokio::test]
    async fn test_stats_reflect_registration() {
        let mut engine = engine_with_script(vec![]);
        engine.on(
            EventSpec::message().text("/a"),
            into_handler(|_ctx| async { Ok(()) }),
            0,
        );
        engine.on(
            EventSpec::callback_query().data("x"),
            into_handler(|_ctx| async { Ok(()) }),
            0,
        );
        engine.use_middleware(Arc::new(crate::middleware::LoggerMiddleware::new()));

        let stats = engine.stats();
        assert!(!stats.running);
        assert_eq!(stats.handlers.commands, 1);
        assert_eq!(stats.handlers.callback, 1);
        assert_eq!(stats.middleware, 1);
        assert_eq!(stats.transport, None);
    }
}
