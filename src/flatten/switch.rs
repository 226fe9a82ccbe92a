//! Switch-to-latest

use super::{poll_inner, poll_latest, switch_to, Inner};
use crate::effect::EffectStream;
use crate::registry::Redirects;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Runs only the most recently forwarded effect.
pub struct SwitchLatest<T, E> {
    outer: Option<Redirects<T, E>>,
    inner: Option<EffectStream<T, E>>,
}

impl<T, E> SwitchLatest<T, E> {
    pub fn new(redirects: Redirects<T, E>) -> Self {
        Self { outer: Some(redirects), inner: None }
    }
}

impl<T: Send + 'static, E: Send + 'static> Stream for SwitchLatest<T, E> {
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(latest) = poll_latest(&mut this.outer, cx) {
                switch_to(&mut this.inner, latest);
            }

            match poll_inner(&mut this.inner, cx) {
                Inner::Item(Ok(value)) => return Poll::Ready(Some(Ok(value))),
                Inner::Item(Err(error)) => {
                    this.inner = None;
                    this.outer = None;
                    return Poll::Ready(Some(Err(error)));
                }
                Inner::Pending => return Poll::Pending,
                Inner::Idle => {}
            }

            match this.outer.as_mut().and_then(Redirects::close_or_next) {
                Some(effect) => switch_to(&mut this.inner, effect),
                None => {
                    this.outer = None;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use crate::registry::{Claim, Registry};
    use crate::EffectId;
    use futures::executor::block_on;
    use futures::StreamExt;

    #[test]
    fn queued_forwards_collapse_to_newest() {
        let registry = Registry::new();
        let id = EffectId::new("switch");
        let Claim::Created(redirects) = registry.claim(id.clone(), Effect::<i32>::value(1)) else {
            panic!("first claim must create");
        };
        registry.claim(id.clone(), Effect::<i32>::value(2));
        registry.claim(id.clone(), Effect::<i32>::value(3));

        let values: Vec<_> = block_on(SwitchLatest::new(redirects).collect());
        assert_eq!(values, vec![Ok(3)]);
        assert!(!registry.contains(&id));
    }

    #[test]
    fn failure_ends_the_pipeline() {
        let registry = Registry::new();
        let id = EffectId::new("switch-failure");
        let Claim::Created(redirects) = registry.claim(id.clone(), Effect::<i32, &str>::failure("boom")) else {
            panic!("first claim must create");
        };
        let mut stream = SwitchLatest::new(redirects);
        assert_eq!(block_on(stream.next()), Some(Err("boom")));
        assert!(!registry.contains(&id));
        assert_eq!(block_on(stream.next()), None);
    }
}
