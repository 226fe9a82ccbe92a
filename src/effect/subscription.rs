//! Subscription - drive an effect on a tokio task

use super::Effect;
use futures::StreamExt;
use std::marker::PhantomData;
use tokio::task::JoinHandle;

/// What a subscriber observes. `Output` any number of times, then exactly
/// one of the terminal events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T, E> {
    Output(T),
    Failure(E),
    Finished,
    Cancelled,
}

/// Handler wrapper that reports `Cancelled` if dropped before a terminal event.
struct Sink<T, E, F: FnMut(Event<T, E>)> {
    handler: F,
    done: bool,
    _marker: PhantomData<fn(T, E)>,
}

impl<T, E, F: FnMut(Event<T, E>)> Sink<T, E, F> {
    fn deliver(&mut self, event: Event<T, E>) {
        if !matches!(event, Event::Output(_)) {
            self.done = true;
        }
        (self.handler)(event);
    }
}

impl<T, E, F: FnMut(Event<T, E>)> Drop for Sink<T, E, F> {
    fn drop(&mut self) {
        if !self.done {
            self.deliver(Event::Cancelled);
        }
    }
}

/// Live subscription. Dropping it cancels the effect.
#[derive(Debug)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Let the effect run to completion without holding the subscription.
    pub fn detach(mut self) { self.task.take(); }
}

impl Drop for Subscription {
    fn drop(&mut self) { self.cancel(); }
}

impl<T: Send + 'static, E: Send + 'static> Effect<T, E> {
    /// Subscribe on the current tokio runtime.
    ///
    /// The effect's factory runs synchronously here, so modulation claims
    /// happen in call order; values are delivered from a spawned task.
    pub fn subscribe<F>(self, handler: F) -> Subscription
    where
        F: FnMut(Event<T, E>) + Send + 'static,
    {
        let mut stream = self.into_stream();
        let mut sink = Sink { handler, done: false, _marker: PhantomData };
        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(value) => sink.deliver(Event::Output(value)),
                    Err(error) => {
                        sink.deliver(Event::Failure(error));
                        return;
                    }
                }
            }
            sink.deliver(Event::Finished);
        });
        Subscription { task: Some(task) }
    }
}
