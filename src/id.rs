//! EffectId: the token that decides which effects share a pipeline
//!
//! Two flavours:
//!
//! | Constructor | Equal when |
//! |-------------|------------|
//! | `EffectId::new(key)` | same key type and `key == other` |
//! | `EffectId::here()` / `effect_id!()` / `EffectId::from_call_site(..)` | same `(file, line, column)` |
//!
//! An explicit key never equals a call-site id, even if the key happens to
//! be a `CallSite`-looking tuple.

use serde::Serialize;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Object-safe view over any `Hash + Eq` key.
trait Key: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_key(&self, other: &dyn Key) -> bool;
    fn hash_key(&self, state: &mut dyn Hasher);
    fn fmt_key(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<K> Key for K
where
    K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any { self }

    fn eq_key(&self, other: &dyn Key) -> bool {
        other.as_any().downcast_ref::<K>().map_or(false, |other| other == self)
    }

    fn hash_key(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<K>().hash(&mut state);
        self.hash(&mut state);
    }

    fn fmt_key(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(self, f) }
}

/// Source location an id was captured at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Clone)]
enum Repr {
    Key(Arc<dyn Key>),
    Site(CallSite),
}

/// Identity under which effects are modulated.
#[derive(Clone)]
pub struct EffectId(Repr);

impl EffectId {
    /// Wrap any hashable value.
    pub fn new<K>(key: K) -> Self
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        Self(Repr::Key(Arc::new(key)))
    }

    pub fn from_call_site(file: &'static str, line: u32, column: u32) -> Self {
        Self(Repr::Site(CallSite { file, line, column }))
    }

    /// Id of the location that calls this function.
    ///
    /// Calling `here()` inside a helper gives every caller of that helper the
    /// same id; mark the helper `#[track_caller]` to push the capture outward.
    #[track_caller]
    pub fn here() -> Self {
        let location = Location::caller();
        Self::from_call_site(location.file(), location.line(), location.column())
    }

    pub fn call_site(&self) -> Option<CallSite> {
        match &self.0 {
            Repr::Site(site) => Some(*site),
            Repr::Key(_) => None,
        }
    }
}

impl From<CallSite> for EffectId {
    fn from(site: CallSite) -> Self { Self(Repr::Site(site)) }
}

impl PartialEq for EffectId {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Repr::Key(a), Repr::Key(b)) => a.eq_key(b.as_ref()),
            (Repr::Site(a), Repr::Site(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for EffectId {}

impl Hash for EffectId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Repr::Key(key) => {
                0u8.hash(state);
                key.hash_key(state);
            }
            Repr::Site(site) => {
                1u8.hash(state);
                site.hash(state);
            }
        }
    }
}

impl fmt::Debug for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EffectId(")?;
        fmt::Display::fmt(self, f)?;
        f.write_str(")")
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Key(key) => key.fmt_key(f),
            Repr::Site(site) => fmt::Display::fmt(site, f),
        }
    }
}

/// Build an [`EffectId`].
///
/// `effect_id!()` captures the macro's own location; `effect_id!(key)` wraps
/// an explicit key.
#[macro_export]
macro_rules! effect_id {
    () => {
        $crate::EffectId::from_call_site(file!(), line!(), column!())
    };
    ($key:expr) => {
        $crate::EffectId::new($key)
    };
}
