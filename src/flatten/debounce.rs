//! Debounce, then switch

use super::{poll_inner, poll_latest, switch_to, Inner};
use crate::effect::{Effect, EffectStream};
use crate::registry::Redirects;
use crate::scheduler::{self, Scheduler};
use futures::future::BoxFuture;
use futures::stream::Stream;
use futures::FutureExt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Holds each forwarded effect for `due`; a newer forward discards it and
/// restarts the wait. A held effect is never subscribed until it fires.
/// The running inner effect keeps going until the next one fires.
pub struct Debounce<T, E> {
    outer: Option<Redirects<T, E>>,
    due: Duration,
    scheduler: Arc<dyn Scheduler>,
    pending: Option<(Effect<T, E>, BoxFuture<'static, ()>)>,
    inner: Option<EffectStream<T, E>>,
}

impl<T, E> Debounce<T, E> {
    pub fn new(redirects: Redirects<T, E>, due: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { outer: Some(redirects), due, scheduler, pending: None, inner: None }
    }

    fn hold(&mut self, effect: Effect<T, E>) {
        self.pending = Some((effect, scheduler::timer(&self.scheduler, self.due)));
    }
}

impl<T: Send + 'static, E: Send + 'static> Stream for Debounce<T, E> {
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(latest) = poll_latest(&mut this.outer, cx) {
                this.hold(latest);
            }

            let fired = match this.pending.as_mut() {
                Some((_, timer)) => timer.poll_unpin(cx).is_ready(),
                None => false,
            };
            if fired {
                if let Some((effect, _)) = this.pending.take() {
                    switch_to(&mut this.inner, effect);
                }
            }

            match poll_inner(&mut this.inner, cx) {
                Inner::Item(Ok(value)) => return Poll::Ready(Some(Ok(value))),
                Inner::Item(Err(error)) => {
                    this.inner = None;
                    this.pending = None;
                    this.outer = None;
                    return Poll::Ready(Some(Err(error)));
                }
                Inner::Pending => return Poll::Pending,
                Inner::Idle => {}
            }

            if this.pending.is_some() {
                return Poll::Pending;
            }

            match this.outer.as_mut().and_then(Redirects::close_or_next) {
                Some(effect) => this.hold(effect),
                None => {
                    this.outer = None;
                    return Poll::Ready(None);
                }
            }
        }
    }
}
