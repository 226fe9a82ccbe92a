//! Registry - which identities currently have a running pipeline
//!
//! # Layout
//!
//! ```text
//! Registry (one Mutex)
//!   └── EffectId
//!         └── TypeId of (T, E) → RedirectContext<T, E>
//!                                   │ sender
//!                                   ▼
//!                               Redirects<T, E>  (receiver, owned by the pipeline)
//! ```
//!
//! Identities are namespaced per concrete effect type: an effect can only be
//! forwarded into a context built for the same `(T, E)`. `cancel` is the one
//! operation that reaches every type under an id.
//!
//! Every read-modify-write (claim, idle close, remove-if-current, cancel)
//! happens inside one critical section. Values removed from the map are
//! dropped after the lock is released.

use crate::effect::Effect;
use crate::id::EffectId;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::stream::{Stream, StreamExt};
use once_cell::sync::Lazy;
use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

type Slot = HashMap<TypeId, Arc<dyn ErasedContext>>;
type Contexts = HashMap<EffectId, Slot>;

fn type_key<T: 'static, E: 'static>() -> TypeId { TypeId::of::<(T, E)>() }

/// Type-erased face of a context, as stored in the map.
trait ErasedContext: Send + Sync {
    fn instance(&self) -> u64;
    fn forward_empty(&self) -> bool;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Sending half of one identity's redirection channel.
pub struct RedirectContext<T, E> {
    id: EffectId,
    key: TypeId,
    instance: u64,
    tx: UnboundedSender<Effect<T, E>>,
}

impl<T, E> RedirectContext<T, E> {
    pub fn id(&self) -> &EffectId { &self.id }

    /// Unique per context; distinguishes a replaced context from its successor.
    pub fn instance(&self) -> u64 { self.instance }

    /// True once the pipeline stopped accepting effects.
    pub fn is_closed(&self) -> bool { self.tx.is_closed() }
}

impl<T: Send + 'static, E: Send + 'static> RedirectContext<T, E> {
    /// Push an effect into the running pipeline. Hands it back if the
    /// pipeline already closed.
    pub fn forward(&self, effect: Effect<T, E>) -> Result<(), Effect<T, E>> {
        self.tx.unbounded_send(effect).map_err(|err| err.into_inner())
    }

    /// Push the empty sentinel, ending whatever inner effect is live.
    pub fn forward_empty(&self) -> bool { self.forward(Effect::none()).is_ok() }
}

impl<T: Send + 'static, E: Send + 'static> ErasedContext for RedirectContext<T, E> {
    fn instance(&self) -> u64 { self.instance }
    fn forward_empty(&self) -> bool { RedirectContext::forward_empty(self) }
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> { self }
}

impl<T, E> fmt::Debug for RedirectContext<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectContext").field("id", &self.id).field("instance", &self.instance).finish()
    }
}

/// Outcome of [`Registry::claim`].
pub enum Claim<T, E> {
    /// A pipeline was already running; the effect was forwarded into it.
    Joined,
    /// No pipeline was running; this one was installed and seeded.
    Created(Redirects<T, E>),
}

/// Receiving half: the stream of effects a flatten combinator consumes.
///
/// Yields the seeding effect first, then every forwarded effect in order.
/// Dropping it tears the pipeline down and clears its registry entry.
pub struct Redirects<T, E> {
    registry: Registry,
    context: Arc<RedirectContext<T, E>>,
    first: Option<Effect<T, E>>,
    rx: UnboundedReceiver<Effect<T, E>>,
    closed: bool,
}

impl<T, E> Redirects<T, E> {
    pub fn id(&self) -> &EffectId { &self.context.id }

    pub fn context(&self) -> &Arc<RedirectContext<T, E>> { &self.context }

    /// For a combinator with nothing left to run.
    ///
    /// Returns the next queued effect if one arrived, otherwise unregisters
    /// the pipeline and ends this stream. Both happen under the registry lock,
    /// so a concurrent `claim` either lands here or starts a fresh pipeline.
    pub fn close_or_next(&mut self) -> Option<Effect<T, E>> {
        if let Some(first) = self.first.take() {
            return Some(first);
        }
        if self.closed {
            return None;
        }
        let mut contexts = self.registry.lock();
        if let Ok(Some(effect)) = self.rx.try_next() {
            return Some(effect);
        }
        self.rx.close();
        self.closed = true;
        let removed = remove_locked(&mut contexts, &self.context.id, self.context.key, self.context.instance);
        drop(contexts);
        drop(removed);
        tracing::debug!(id = %self.context.id, "pipeline drained, closed");
        None
    }
}

impl<T, E> Stream for Redirects<T, E> {
    type Item = Effect<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(first) = self.first.take() {
            return Poll::Ready(Some(first));
        }
        if self.closed {
            return Poll::Ready(None);
        }
        let next = self.rx.poll_next_unpin(cx);
        if let Poll::Ready(None) = next {
            self.closed = true;
        }
        next
    }
}

impl<T, E> Drop for Redirects<T, E> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let removed = {
            let mut contexts = self.registry.lock();
            self.rx.close();
            remove_locked(&mut contexts, &self.context.id, self.context.key, self.context.instance)
        };
        if removed.is_some() {
            tracing::debug!(id = %self.context.id, "pipeline torn down");
        }
    }
}

/// Remove the entry for `(id, key)` only if it is still `instance`.
fn remove_locked(contexts: &mut Contexts, id: &EffectId, key: TypeId, instance: u64) -> Option<Arc<dyn ErasedContext>> {
    let slot = contexts.get_mut(id)?;
    if slot.get(&key)?.instance() != instance {
        return None;
    }
    let removed = slot.remove(&key);
    if slot.is_empty() {
        contexts.remove(id);
    }
    removed
}

fn find<T, E>(contexts: &Contexts, id: &EffectId) -> Option<Arc<RedirectContext<T, E>>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let erased = contexts.get(id)?.get(&type_key::<T, E>())?;
    Arc::clone(erased).into_any().downcast::<RedirectContext<T, E>>().ok()
}

/// Identity → redirection context map.
///
/// Cloning gives another handle to the same map. [`Registry::global`] is the
/// process-wide instance the effect operators use by default.
#[derive(Clone, Default)]
pub struct Registry {
    contexts: Arc<Mutex<Contexts>>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    pub fn global() -> &'static Registry { &GLOBAL }

    fn lock(&self) -> MutexGuard<'_, Contexts> {
        self.contexts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn lookup<T, E>(&self, id: &EffectId) -> Option<Arc<RedirectContext<T, E>>>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        find(&self.lock(), id)
    }

    /// Install `context`. Returns false if its identity already has one.
    pub fn insert<T, E>(&self, context: Arc<RedirectContext<T, E>>) -> bool
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        let mut contexts = self.lock();
        match contexts.entry(context.id.clone()).or_default().entry(context.key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(context);
                true
            }
        }
    }

    /// Clear the entry for `context`'s identity, but only if it still maps
    /// to `context` itself.
    pub fn remove<T, E>(&self, context: &RedirectContext<T, E>) -> bool {
        let removed = remove_locked(&mut self.lock(), &context.id, context.key, context.instance);
        removed.is_some()
    }

    /// Build an unregistered context and the pipeline source it feeds.
    pub fn open<T, E>(&self, id: EffectId, first: Effect<T, E>) -> (Arc<RedirectContext<T, E>>, Redirects<T, E>)
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = unbounded();
        let context = Arc::new(RedirectContext {
            id,
            key: type_key::<T, E>(),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            tx,
        });
        let redirects = Redirects {
            registry: self.clone(),
            context: Arc::clone(&context),
            first: Some(first),
            rx,
            closed: false,
        };
        (context, redirects)
    }

    /// Atomic lookup-or-create: forward into the live pipeline for `id`, or
    /// install a new one seeded with `effect`.
    pub fn claim<T, E>(&self, id: EffectId, effect: Effect<T, E>) -> Claim<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        let mut contexts = self.lock();
        let (effect, stale) = match find::<T, E>(&contexts, &id) {
            Some(live) => match live.forward(effect) {
                Ok(()) => {
                    tracing::debug!(id = %id, instance = live.instance, "forwarded into running pipeline");
                    return Claim::Joined;
                }
                Err(effect) => {
                    tracing::warn!(id = %id, instance = live.instance, "replacing closed pipeline");
                    (effect, remove_locked(&mut contexts, &id, live.key, live.instance))
                }
            },
            None => (effect, None),
        };
        let (context, redirects) = self.open(id.clone(), effect);
        let instance = context.instance;
        contexts.entry(id.clone()).or_default().insert(context.key, context);
        drop(contexts);
        drop(stale);
        tracing::debug!(id = %id, instance, "pipeline started");
        Claim::Created(redirects)
    }

    /// Forward the empty sentinel to every context under `id`, whatever its
    /// effect type. Returns how many were signalled; zero is not an error.
    pub fn cancel(&self, id: &EffectId) -> usize {
        let contexts = self.lock();
        let signalled = contexts
            .get(id)
            .map_or(0, |slot| slot.values().filter(|context| context.forward_empty()).count());
        drop(contexts);
        tracing::debug!(id = %id, signalled, "cancel");
        signalled
    }

    /// Whether any pipeline is running under `id`.
    pub fn contains(&self, id: &EffectId) -> bool { self.lock().contains_key(id) }

    /// Number of live contexts across all identities and types.
    pub fn len(&self) -> usize { self.lock().values().map(HashMap::len).sum() }

    pub fn is_empty(&self) -> bool { self.lock().is_empty() }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("len", &self.len()).finish()
    }
}
