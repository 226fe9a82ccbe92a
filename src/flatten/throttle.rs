//! Throttle, then switch

use super::{poll_inner, poll_one, switch_to, Inner};
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

/// Starts at most one effect per `interval`.
///
/// An effect forwarded while no window is open starts immediately and opens
/// a window. Effects forwarded inside the window are held: the newest one if
/// `latest`, otherwise the first. When the window ends the held effect starts
/// and opens the next window; with nothing held the window simply closes.
pub struct Throttle<T, E> {
    outer: Option<Redirects<T, E>>,
    interval: Duration,
    scheduler: Arc<dyn Scheduler>,
    latest: bool,
    window: Option<BoxFuture<'static, ()>>,
    held: Option<Effect<T, E>>,
    inner: Option<EffectStream<T, E>>,
}

impl<T, E> Throttle<T, E> {
    pub fn new(redirects: Redirects<T, E>, interval: Duration, scheduler: Arc<dyn Scheduler>, latest: bool) -> Self {
        Self { outer: Some(redirects), interval, scheduler, latest, window: None, held: None, inner: None }
    }
}

impl<T: Send + 'static, E: Send + 'static> Throttle<T, E> {
    fn start(&mut self, effect: Effect<T, E>) {
        switch_to(&mut self.inner, effect);
        self.window = Some(scheduler::timer(&self.scheduler, self.interval));
    }

    fn offer(&mut self, effect: Effect<T, E>) {
        if self.window.is_none() {
            self.start(effect);
        } else if self.latest || self.held.is_none() {
            self.held = Some(effect);
        }
    }

    /// Close an elapsed window, starting the held effect if there is one.
    fn poll_window(&mut self, cx: &mut Context<'_>) {
        while let Some(window) = self.window.as_mut() {
            if window.poll_unpin(cx).is_pending() {
                return;
            }
            self.window = None;
            match self.held.take() {
                Some(effect) => self.start(effect),
                None => return,
            }
        }
    }
}

impl<T: Send + 'static, E: Send + 'static> Stream for Throttle<T, E> {
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            while let Some(effect) = poll_one(&mut this.outer, cx) {
                this.offer(effect);
            }
            this.poll_window(cx);

            match poll_inner(&mut this.inner, cx) {
                Inner::Item(Ok(value)) => return Poll::Ready(Some(Ok(value))),
                Inner::Item(Err(error)) => {
                    this.inner = None;
                    this.held = None;
                    this.window = None;
                    this.outer = None;
                    return Poll::Ready(Some(Err(error)));
                }
                Inner::Pending => return Poll::Pending,
                Inner::Idle => {}
            }

            if this.window.is_some() {
                return Poll::Pending;
            }

            match this.outer.as_mut().and_then(Redirects::close_or_next) {
                Some(effect) => this.offer(effect),
                None => {
                    this.outer = None;
                    return Poll::Ready(None);
                }
            }
        }
    }
}
