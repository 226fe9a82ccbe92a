//! Bounded concurrent flatten

use super::poll_one;
use crate::effect::EffectStream;
use crate::registry::Redirects;
use futures::stream::{SelectAll, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Runs up to `limit` forwarded effects at once and interleaves their
/// values. Further effects wait in the redirection channel, in order, and
/// are only subscribed when a slot frees. The bound is strict.
pub struct MaxConcurrent<T, E> {
    outer: Option<Redirects<T, E>>,
    limit: usize,
    active: SelectAll<EffectStream<T, E>>,
}

impl<T: Send + 'static, E: Send + 'static> MaxConcurrent<T, E> {
    pub fn new(redirects: Redirects<T, E>, limit: usize) -> Self {
        Self { outer: Some(redirects), limit: limit.max(1), active: SelectAll::new() }
    }

    pub fn active(&self) -> usize { self.active.len() }
}

impl<T: Send + 'static, E: Send + 'static> Stream for MaxConcurrent<T, E> {
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            while this.active.len() < this.limit {
                match poll_one(&mut this.outer, cx) {
                    Some(effect) => this.active.push(effect.into_stream()),
                    None => break,
                }
            }

            if this.active.is_empty() {
                match this.outer.as_mut().and_then(Redirects::close_or_next) {
                    Some(effect) => {
                        this.active.push(effect.into_stream());
                        continue;
                    }
                    None => {
                        this.outer = None;
                        return Poll::Ready(None);
                    }
                }
            }

            let running = this.active.len();
            match this.active.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(value))) => return Poll::Ready(Some(Ok(value))),
                Poll::Ready(Some(Err(error))) => {
                    this.active = SelectAll::new();
                    this.outer = None;
                    return Poll::Ready(Some(Err(error)));
                }
                Poll::Ready(None) => {}
                // A slot freed while the others stayed pending.
                Poll::Pending if this.active.len() < running && this.outer.is_some() => {}
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
