//! Flatten: turn a pipeline's stream of effects into one stream of values
//!
//! # Strategies
//!
//! | Strategy | Combinator | Behaviour |
//! |----------|------------|-----------|
//! | `Cancellable` | [`SwitchLatest`] | newest effect replaces the running one |
//! | `Debounce` | [`Debounce`] | newest effect runs once forwards go quiet for `due` |
//! | `Throttle` | [`Throttle`] | at most one effect started per `interval` window |
//! | `MaxConcurrent` | [`MaxConcurrent`] | up to `limit` effects run side by side, rest queue |
//!
//! Every combinator ends its stream once it is idle (no live inner effect, no
//! pending timer, nothing queued), via [`Redirects::close_or_next`]. A failure
//! from any inner effect is delivered and ends the stream.

mod concurrent;
mod debounce;
mod switch;
mod throttle;

pub use concurrent::MaxConcurrent;
pub use debounce::Debounce;
pub use switch::SwitchLatest;
pub use throttle::Throttle;

use crate::effect::{Effect, EffectStream};
use crate::registry::Redirects;
use crate::scheduler::Scheduler;
use futures::stream::StreamExt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// How effects forwarded under one identity are combined.
#[derive(Debug, Clone)]
pub enum Strategy {
    Cancellable,
    Debounce { due: Duration, scheduler: Arc<dyn Scheduler> },
    Throttle { interval: Duration, scheduler: Arc<dyn Scheduler>, latest: bool },
    MaxConcurrent(usize),
}

impl Strategy {
    pub fn debounce(due: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::Debounce { due, scheduler }
    }

    pub fn throttle(interval: Duration, scheduler: Arc<dyn Scheduler>, latest: bool) -> Self {
        Self::Throttle { interval, scheduler, latest }
    }

    /// `limit` of zero is raised to one.
    pub fn max_concurrent(limit: usize) -> Self {
        if limit == 0 {
            tracing::warn!("max_concurrent limit 0 raised to 1");
        }
        Self::MaxConcurrent(limit.max(1))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cancellable => "cancellable",
            Self::Debounce { .. } => "debounce",
            Self::Throttle { .. } => "throttle",
            Self::MaxConcurrent(_) => "max_concurrent",
        }
    }

    pub fn flatten<T, E>(self, redirects: Redirects<T, E>) -> EffectStream<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        match self {
            Self::Cancellable => SwitchLatest::new(redirects).boxed(),
            Self::Debounce { due, scheduler } => Debounce::new(redirects, due, scheduler).boxed(),
            Self::Throttle { interval, scheduler, latest } => {
                Throttle::new(redirects, interval, scheduler, latest).boxed()
            }
            Self::MaxConcurrent(limit) => MaxConcurrent::new(redirects, limit.max(1)).boxed(),
        }
    }
}

/// Next forwarded effect, if one is ready. Drops `outer` once it ends.
fn poll_one<T, E>(outer: &mut Option<Redirects<T, E>>, cx: &mut Context<'_>) -> Option<Effect<T, E>> {
    let polled = outer.as_mut()?.poll_next_unpin(cx);
    match polled {
        Poll::Ready(Some(effect)) => Some(effect),
        Poll::Ready(None) => {
            *outer = None;
            None
        }
        Poll::Pending => None,
    }
}

/// Drain every ready effect, keeping only the newest. The older ones are
/// dropped unsubscribed, so their work never starts.
fn poll_latest<T, E>(outer: &mut Option<Redirects<T, E>>, cx: &mut Context<'_>) -> Option<Effect<T, E>> {
    let mut latest = None;
    while let Some(effect) = poll_one(outer, cx) {
        latest = Some(effect);
    }
    latest
}

enum Inner<T, E> {
    Item(Result<T, E>),
    Pending,
    /// No inner effect is running.
    Idle,
}

fn poll_inner<T, E>(inner: &mut Option<EffectStream<T, E>>, cx: &mut Context<'_>) -> Inner<T, E> {
    let Some(stream) = inner.as_mut() else {
        return Inner::Idle;
    };
    match stream.poll_next_unpin(cx) {
        Poll::Ready(Some(item)) => Inner::Item(item),
        Poll::Ready(None) => {
            *inner = None;
            Inner::Idle
        }
        Poll::Pending => Inner::Pending,
    }
}

/// Unsubscribe the running inner effect, then subscribe `effect`.
fn switch_to<T, E>(inner: &mut Option<EffectStream<T, E>>, effect: Effect<T, E>)
where
    T: Send + 'static,
    E: Send + 'static,
{
    *inner = None;
    *inner = Some(effect.into_stream());
}
