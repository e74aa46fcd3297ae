//! Per-user rate limiting middleware.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use courier_core::context::Context;
use courier_core::error::HandlerResult;
use parking_lot::Mutex;
use tracing::warn;

use super::{Middleware, Next};

struct Window {
    started: Instant,
    count: u32,
}

/// Caps how many updates a user may push through per fixed time window.
///
/// Over-limit updates are dropped silently, like unauthorized ones. The
/// counter map is shared across all concurrently executing chains and
/// guards itself with its own mutex.
pub struct RateLimiterMiddleware {
    max_per_window: u32,
    window: Duration,
    windows: Mutex<HashMap<i64, Window>>,
}

impl RateLimiterMiddleware {
    /// Creates a limiter allowing `max_per_window` updates per `window`.
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Records one hit for `user_id` and reports whether it is within the
    /// limit. Separated out so the windowing logic is testable without a
    /// pipeline.
    fn admit(&self, user_id: i64, now: Instant) -> bool {
        let mut windows = self.windows.lock();
        let window = windows.entry(user_id).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }
        window.count += 1;
        window.count <= self.max_per_window
    }
}

#[async_trait]
impl Middleware for RateLimiterMiddleware {
    async fn on_update(&self, ctx: Arc<Context>, next: Next) -> HandlerResult {
        let user_id = ctx.user().id;
        if !self.admit(user_id, Instant::now()) {
            warn!(user_id, update_id = ctx.update_id(), "rate limit exceeded, update dropped");
            return Ok(());
        }
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_limit() {
        let limiter = RateLimiterMiddleware::new(2, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.admit(1, now));
        assert!(limiter.admit(1, now));
        assert!(!limiter.admit(1, now));
        // Another user has their own window.
        assert!(limiter.admit(2, now));
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiterMiddleware::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.admit(1, now));
        assert!(!limiter.admit(1, now));
        assert!(limiter.admit(1, now + Duration::from_secs(61)));
    }
}
