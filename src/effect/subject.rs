//! Subject - push values into every live subscriber

use super::Effect;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};

enum State<T, E> {
    Open(Vec<UnboundedSender<Result<T, E>>>),
    Finished,
    Failed(E),
}

/// Multicast push source.
///
/// Values sent while nobody is subscribed are dropped. Once finished or
/// failed, later subscribers complete (or fail) immediately.
pub struct Subject<T, E = Infallible> {
    state: Arc<Mutex<State<T, E>>>,
}

impl<T, E> Clone for Subject<T, E> {
    fn clone(&self) -> Self { Self { state: Arc::clone(&self.state) } }
}

impl<T, E> Default for Subject<T, E> {
    fn default() -> Self { Self { state: Arc::new(Mutex::new(State::Open(Vec::new()))) } }
}

impl<T, E> Subject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> MutexGuard<'_, State<T, E>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn send(&self, value: T) {
        if let State::Open(subscribers) = &mut *self.lock() {
            subscribers.retain(|tx| tx.unbounded_send(Ok(value.clone())).is_ok());
        }
    }

    pub fn finish(&self) {
        let mut state = self.lock();
        if matches!(*state, State::Open(_)) {
            *state = State::Finished;
        }
    }

    pub fn fail(&self, error: E) {
        let mut state = self.lock();
        if let State::Open(subscribers) = &*state {
            for tx in subscribers {
                let _ = tx.unbounded_send(Err(error.clone()));
            }
            *state = State::Failed(error);
        }
    }

    /// Number of subscribers still attached.
    pub fn subscriber_count(&self) -> usize {
        match &mut *self.lock() {
            State::Open(subscribers) => {
                subscribers.retain(|tx| !tx.is_closed());
                subscribers.len()
            }
            _ => 0,
        }
    }

    /// Effect that attaches a new subscriber when it is subscribed.
    pub fn effect(&self) -> Effect<T, E> {
        let subject = self.clone();
        Effect::deferred(move || {
            let mut state = subject.lock();
            let effect = match &mut *state {
                State::Open(subscribers) => {
                    let (tx, rx) = unbounded();
                    subscribers.push(tx);
                    Effect::new(rx)
                }
                State::Finished => Effect::none(),
                State::Failed(error) => Effect::failure(error.clone()),
            };
            effect
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::StreamExt;

    #[test]
    fn multicasts_to_live_subscribers() {
        let subject = Subject::<i32>::new();
        subject.send(0);

        let mut a = subject.effect().into_stream();
        let mut b = subject.effect().into_stream();
        assert_eq!(subject.subscriber_count(), 2);

        subject.send(1);
        subject.finish();

        assert_eq!(block_on(a.next()), Some(Ok(1)));
        assert_eq!(block_on(a.next()), None);
        assert_eq!(block_on(b.next()), Some(Ok(1)));
        assert_eq!(block_on(b.next()), None);
    }

    #[test]
    fn dropped_subscribers_detach() {
        let subject = Subject::<i32>::new();
        let stream = subject.effect().into_stream();
        assert_eq!(subject.subscriber_count(), 1);
        drop(stream);
        assert_eq!(subject.subscriber_count(), 0);
    }

    #[test]
    fn failure_reaches_late_subscribers() {
        let subject = Subject::<i32, String>::new();
        subject.fail("gone".to_string());
        let items: Vec<_> = block_on(subject.effect().into_stream().collect());
        assert_eq!(items, vec![Err("gone".to_string())]);
    }

    #[test]
    fn unsubscribed_effect_attaches_nothing() {
        let subject = Subject::<i32>::new();
        let _effect = subject.effect();
        assert_eq!(subject.subscriber_count(), 0);
    }
}
