//! Effect: a lazy, cancellable stream of `Result<T, E>`
//!
//! An `Effect` is a recipe. Nothing runs until it is subscribed, either with
//! [`Effect::into_stream`] or (native) [`Effect::subscribe`]. Dropping the
//! subscription cancels the work.
//!
//! A stream element `Err(e)` is terminal: nothing is delivered after it.
//!
//! # Constructors
//!
//! | Constructor | Produces |
//! |-------------|----------|
//! | `Effect::new(stream)` | the stream's items |
//! | `Effect::deferred(f)` | whatever `f()` returns, built at subscription |
//! | `Effect::value(v)` / `Effect::values(iter)` | fixed values, then completion |
//! | `Effect::failure(e)` | a single failure |
//! | `Effect::none()` | immediate completion (the cancellation sentinel) |
//! | `Effect::future(fut)` | the future's result |
//! | `Subject::effect()` | values pushed into a [`Subject`] |

mod subject;
#[cfg(feature = "native")]
mod subscription;

pub use subject::Subject;
#[cfg(feature = "native")]
pub use subscription::{Event, Subscription};

use crate::scheduler::{self, Scheduler};
use futures::future::{self, Future};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Running form of an effect.
pub type EffectStream<T, E> = BoxStream<'static, Result<T, E>>;

pub struct Effect<T, E = Infallible> {
    make: Box<dyn FnOnce() -> EffectStream<T, E> + Send>,
}

impl<T, E> fmt::Debug for Effect<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Effect") }
}

impl<T: Send + 'static, E: Send + 'static> Effect<T, E> {
    /// Effect over an existing stream. Items after the first `Err` are dropped.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        Self {
            make: Box::new(move || {
                stream
                    .scan(false, |failed, item| {
                        if *failed {
                            return future::ready(None);
                        }
                        *failed = item.is_err();
                        future::ready(Some(item))
                    })
                    .boxed()
            }),
        }
    }

    /// Build the effect only when it is subscribed.
    pub fn deferred<F>(f: F) -> Self
    where
        F: FnOnce() -> Effect<T, E> + Send + 'static,
    {
        Self { make: Box::new(move || f().into_stream()) }
    }

    pub fn value(value: T) -> Self {
        Self { make: Box::new(move || stream::once(future::ready(Ok(value))).boxed()) }
    }

    pub fn values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = values.into_iter().collect();
        Self { make: Box::new(move || stream::iter(values.into_iter().map(Ok)).boxed()) }
    }

    pub fn failure(error: E) -> Self {
        Self { make: Box::new(move || stream::once(future::ready(Err(error))).boxed()) }
    }

    /// Completes immediately without a value.
    pub fn none() -> Self {
        Self { make: Box::new(|| stream::empty().boxed()) }
    }

    pub fn future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self { make: Box::new(move || stream::once(fut).boxed()) }
    }

    /// Subscribe: run the factory and hand back the live stream.
    pub fn into_stream(self) -> EffectStream<T, E> { (self.make)() }

    pub fn map<U, F>(self, f: F) -> Effect<U, E>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        let mut f = f;
        Effect { make: Box::new(move || self.into_stream().map(move |item| item.map(&mut f)).boxed()) }
    }

    pub fn map_err<G, F>(self, f: F) -> Effect<T, G>
    where
        G: Send + 'static,
        F: FnMut(E) -> G + Send + 'static,
    {
        let mut f = f;
        Effect { make: Box::new(move || self.into_stream().map(move |item| item.map_err(&mut f)).boxed()) }
    }

    /// Start this effect `due` after it is subscribed.
    pub fn delay(self, due: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            make: Box::new(move || {
                let timer = scheduler::timer(&scheduler, due);
                stream::once(async move {
                    timer.await;
                    self.into_stream()
                })
                .flatten()
                .boxed()
            }),
        }
    }
}
