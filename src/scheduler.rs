//! Scheduler - the clock time-based combinators run against

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pluggable clock for debounce, throttle and delay.
#[async_trait]
pub trait Scheduler: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;

    /// Resolve once the scheduler's clock reaches `deadline`.
    async fn sleep_until(&self, deadline: Instant);
}

/// Timer future that owns its scheduler, for storing inside stream state.
pub(crate) fn timer(scheduler: &Arc<dyn Scheduler>, due: Duration) -> BoxFuture<'static, ()> {
    let scheduler = Arc::clone(scheduler);
    let deadline = scheduler.now() + due;
    Box::pin(async move { scheduler.sleep_until(deadline).await })
}

/// Scheduler backed by `tokio::time`.
///
/// Honors `tokio::time::pause`, so tests can drive it with virtual time.
#[cfg(feature = "native")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[cfg(feature = "native")]
impl TokioScheduler {
    pub fn shared() -> Arc<dyn Scheduler> { Arc::new(Self) }
}

#[cfg(feature = "native")]
#[async_trait]
impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant { tokio::time::Instant::now().into_std() }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
    }
}
