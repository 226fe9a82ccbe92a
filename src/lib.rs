//! Effect modulation: keyed cancellation, debounce, throttle and bounded
//! concurrency for lazy effects.
//!
//! # Architecture
//!
//! ```text
//! effect.debounce(id, ..)  ──subscribe──►  Registry (global or explicit)
//!                                            │
//!                     ┌──────────────────────┴────────────────────┐
//!                     │ no live context                           │ live context
//!                     ▼                                           ▼
//!            RedirectContext + Redirects                 forward(effect)
//!                     │                                  subscriber completes
//!                     ▼
//!            flatten combinator (switch / debounce / throttle / bounded)
//!                     │
//!                     ▼
//!            owner subscriber receives values
//! ```
//!
//! Effects that share an [`EffectId`] share one pipeline while it runs. The
//! first subscriber owns it; later ones inject their effect and return.
//!
//! # Operators
//!
//! | Operator | Method | Description |
//! |----------|--------|-------------|
//! | cancellable | `effect.cancellable(id)` | newest effect replaces the running one |
//! | debounce | `effect.debounce(id, due, scheduler)` | run after `due` of quiet |
//! | throttle | `effect.throttle(id, interval, scheduler, latest)` | one start per window |
//! | max concurrent | `effect.max_concurrent(id, limit)` | at most `limit` at once |
//! | cancel | `Effect::cancel(id)` | end whatever runs under `id` |
//!
//! # Features
//!
//! - `native` - tokio subscriptions, `TokioScheduler`, logging setup
//!
//! # Usage
//!
//! ```ignore
//! use effect_modulation::{effect_id, Effect, Event, TokioScheduler};
//! use std::time::Duration;
//!
//! let search = effect_id!();
//! let _sub = Effect::<String>::future(async { Ok(fetch("rust").await) })
//!     .debounce(search, Duration::from_millis(300), TokioScheduler::shared())
//!     .subscribe(|event| if let Event::Output(hits) = event { println!("{hits}") });
//! ```

pub mod config;
pub mod effect;
pub mod error;
pub mod flatten;
pub mod id;
pub mod modulate;
pub mod registry;
pub mod scheduler;

#[cfg(feature = "native")]
pub mod logging;

// =============================================================================
// Re-exports
// =============================================================================
pub use config::StrategyDef;
pub use effect::{Effect, EffectStream, Subject};
pub use error::ModulationError;
pub use flatten::Strategy;
pub use id::{CallSite, EffectId};
pub use modulate::{cancel, cancel_in};
pub use registry::{Claim, RedirectContext, Redirects, Registry};
pub use scheduler::Scheduler;

#[cfg(feature = "native")]
pub use effect::{Event, Subscription};
#[cfg(feature = "native")]
pub use scheduler::TokioScheduler;
