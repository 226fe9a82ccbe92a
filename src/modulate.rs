//! Modulate: start keyed work, or redirect the keyed work already running
//!
//! # Flow
//!
//! ```text
//! effect.cancellable(id)            (nothing happens yet)
//!     │ subscribe
//!     ▼
//! Registry::claim(id, effect)
//!     ├── no live context → Created(redirects) → flatten(redirects) → subscriber
//!     └── live context    → effect forwarded   → subscriber completes empty
//!
//! pipeline idle / failed / dropped → registry entry cleared
//! ```
//!
//! # Operators
//!
//! | Operator | Strategy |
//! |----------|----------|
//! | `effect.cancellable(id)` | switch to latest |
//! | `effect.debounce(id, due, scheduler)` | debounce, then switch |
//! | `effect.throttle(id, interval, scheduler, latest)` | throttle, then switch |
//! | `effect.max_concurrent(id, limit)` | bounded concurrent flatten |
//! | `Effect::cancel(id)` | forward the empty effect |
//!
//! All of them use [`Registry::global`]; the `*_in` forms take an explicit
//! registry.

use crate::effect::{Effect, EffectStream};
use crate::flatten::Strategy;
use crate::id::EffectId;
use crate::registry::{Claim, Redirects, Registry};
use crate::scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;

impl<T: Send + 'static, E: Send + 'static> Effect<T, E> {
    /// Run this effect under `id`, combined with every other effect issued
    /// under `id` by `flatten`.
    ///
    /// The first subscriber for `id` owns the pipeline and receives its
    /// output. Later subscribers while it runs inject their effect into it
    /// and complete immediately without values.
    pub fn modulate<F>(self, registry: &Registry, id: EffectId, flatten: F) -> Effect<T, E>
    where
        F: FnOnce(Redirects<T, E>) -> EffectStream<T, E> + Send + 'static,
    {
        let registry = registry.clone();
        Effect::deferred(move || match registry.claim(id, self) {
            Claim::Created(redirects) => Effect::new(flatten(redirects)),
            Claim::Joined => Effect::none(),
        })
    }

    pub fn modulated(self, id: EffectId, strategy: Strategy) -> Effect<T, E> {
        self.modulated_in(Registry::global(), id, strategy)
    }

    pub fn modulated_in(self, registry: &Registry, id: EffectId, strategy: Strategy) -> Effect<T, E> {
        tracing::trace!(id = %id, strategy = strategy.name(), "modulate");
        self.modulate(registry, id, move |redirects| strategy.flatten(redirects))
    }

    /// Only the newest effect under `id` runs; starting one cancels the
    /// one before it.
    pub fn cancellable(self, id: EffectId) -> Effect<T, E> {
        self.modulated(id, Strategy::Cancellable)
    }

    /// Start only after `due` passes with no newer effect under `id`.
    pub fn debounce(self, id: EffectId, due: Duration, scheduler: Arc<dyn Scheduler>) -> Effect<T, E> {
        self.modulated(id, Strategy::debounce(due, scheduler))
    }

    pub fn throttle(self, id: EffectId, interval: Duration, scheduler: Arc<dyn Scheduler>, latest: bool) -> Effect<T, E> {
        self.modulated(id, Strategy::throttle(interval, scheduler, latest))
    }

    /// At most `limit` effects under `id` run at once.
    pub fn max_concurrent(self, id: EffectId, limit: usize) -> Effect<T, E> {
        self.modulated(id, Strategy::max_concurrent(limit))
    }

    /// Effect that, when subscribed, ends the live inner effect under `id`.
    /// Completes without values; a no-op if nothing runs under `id`.
    pub fn cancel(id: EffectId) -> Effect<T, E> { cancel_in(Registry::global(), id) }
}

/// [`Effect::cancel`] as a free function.
pub fn cancel<T: Send + 'static, E: Send + 'static>(id: EffectId) -> Effect<T, E> {
    cancel_in(Registry::global(), id)
}

pub fn cancel_in<T: Send + 'static, E: Send + 'static>(registry: &Registry, id: EffectId) -> Effect<T, E> {
    let registry = registry.clone();
    Effect::deferred(move || {
        registry.cancel(&id);
        Effect::none()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::StreamExt;
    use std::convert::Infallible;

    #[test]
    fn nothing_is_claimed_before_subscription() {
        let registry = Registry::new();
        let id = EffectId::new("lazy");
        let effect = Effect::<i32>::value(1).modulated_in(&registry, id.clone(), Strategy::Cancellable);
        assert!(!registry.contains(&id));

        let stream = effect.into_stream();
        assert!(registry.contains(&id));
        drop(stream);
        assert!(!registry.contains(&id));
    }

    #[test]
    fn joining_subscriber_completes_empty() {
        let registry = Registry::new();
        let id = EffectId::new("join");
        let owner = Effect::<i32>::value(1).modulated_in(&registry, id.clone(), Strategy::Cancellable).into_stream();
        let joined: Vec<_> = block_on(
            Effect::<i32>::value(2).modulated_in(&registry, id.clone(), Strategy::Cancellable).into_stream().collect(),
        );
        assert!(joined.is_empty());

        let delivered: Vec<_> = block_on(owner.collect());
        assert_eq!(delivered, vec![Ok(2)]);
    }

    #[test]
    fn cancel_without_pipeline_completes_quietly() {
        let registry = Registry::new();
        let items: Vec<Result<(), Infallible>> = block_on(cancel_in(&registry, EffectId::new("idle")).into_stream().collect());
        assert!(items.is_empty());
    }

    #[test]
    fn cancel_empties_the_pipeline() {
        let registry = Registry::new();
        let id = EffectId::new("cancel");
        let subject = crate::Subject::<i32>::new();
        let owner = subject.effect().modulated_in(&registry, id.clone(), Strategy::Cancellable).into_stream();

        block_on(cancel_in::<(), Infallible>(&registry, id.clone()).into_stream().collect::<Vec<_>>());
        subject.send(1);

        let delivered: Vec<_> = block_on(owner.collect());
        assert!(delivered.is_empty());
        assert!(!registry.contains(&id));
    }
}
