//! Strategy configuration: serializable definitions compiled into [`Strategy`]
//!
//! ```json
//! {"kind": "cancellable"}
//! {"kind": "debounce", "due_ms": 300}
//! {"kind": "throttle", "interval_ms": 1000, "latest": true}
//! {"kind": "max_concurrent", "limit": 2}
//! ```

use crate::error::{ModulationError, Result};
use crate::flatten::Strategy;
use crate::scheduler::Scheduler;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Raw strategy definition (for serialization)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyDef {
    Cancellable,
    Debounce { due_ms: u64 },
    Throttle {
        interval_ms: u64,
        #[serde(default)]
        latest: bool,
    },
    MaxConcurrent { limit: usize },
}

impl StrategyDef {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cancellable => "cancellable",
            Self::Debounce { .. } => "debounce",
            Self::Throttle { .. } => "throttle",
            Self::MaxConcurrent { .. } => "max_concurrent",
        }
    }
}

impl Strategy {
    /// Timed strategies run on `scheduler`. A configured limit of zero is
    /// rejected rather than clamped.
    pub fn compile(def: StrategyDef, scheduler: Arc<dyn Scheduler>) -> Result<Self> {
        Ok(match def {
            StrategyDef::Cancellable => Self::Cancellable,
            StrategyDef::Debounce { due_ms } => Self::debounce(Duration::from_millis(due_ms), scheduler),
            StrategyDef::Throttle { interval_ms: 0, .. } => {
                return Err(ModulationError::InvalidStrategy("throttle interval must be positive".into()));
            }
            StrategyDef::Throttle { interval_ms, latest } => {
                Self::throttle(Duration::from_millis(interval_ms), scheduler, latest)
            }
            StrategyDef::MaxConcurrent { limit: 0 } => return Err(ModulationError::ZeroLimit),
            StrategyDef::MaxConcurrent { limit } => Self::MaxConcurrent(limit),
        })
    }

    pub fn from_value(value: Value, scheduler: Arc<dyn Scheduler>) -> anyhow::Result<Self> {
        Ok(Self::compile(serde_json::from_value(value)?, scheduler)?)
    }

    /// Serializable form of this strategy. The scheduler is not part of it.
    pub fn to_def(&self) -> StrategyDef {
        match self {
            Self::Cancellable => StrategyDef::Cancellable,
            Self::Debounce { due, .. } => StrategyDef::Debounce { due_ms: millis(*due) },
            Self::Throttle { interval, latest, .. } => {
                StrategyDef::Throttle { interval_ms: millis(*interval), latest: *latest }
            }
            Self::MaxConcurrent(limit) => StrategyDef::MaxConcurrent { limit: *limit },
        }
    }
}

fn millis(duration: Duration) -> u64 { u64::try_from(duration.as_millis()).unwrap_or(u64::MAX) }

#[cfg(all(test, feature = "native"))]
mod tests {
    use super::*;
    use crate::scheduler::TokioScheduler;
    use serde_json::json;

    fn compile(value: Value) -> anyhow::Result<Strategy> { Strategy::from_value(value, TokioScheduler::shared()) }

    #[test]
    fn parses_every_kind() {
        assert!(matches!(compile(json!({"kind": "cancellable"})).unwrap(), Strategy::Cancellable));

        match compile(json!({"kind": "debounce", "due_ms": 300})).unwrap() {
            Strategy::Debounce { due, .. } => assert_eq!(due, Duration::from_millis(300)),
            other => panic!("unexpected {}", other.name()),
        }

        match compile(json!({"kind": "throttle", "interval_ms": 1000})).unwrap() {
            Strategy::Throttle { interval, latest, .. } => {
                assert_eq!(interval, Duration::from_secs(1));
                assert!(!latest);
            }
            other => panic!("unexpected {}", other.name()),
        }

        assert!(matches!(compile(json!({"kind": "max_concurrent", "limit": 2})).unwrap(), Strategy::MaxConcurrent(2)));
    }

    #[test]
    fn rejects_invalid_definitions() {
        let zero = Strategy::compile(StrategyDef::MaxConcurrent { limit: 0 }, TokioScheduler::shared());
        assert_eq!(zero.unwrap_err(), ModulationError::ZeroLimit);

        let still = Strategy::compile(StrategyDef::Throttle { interval_ms: 0, latest: true }, TokioScheduler::shared());
        assert!(matches!(still, Err(ModulationError::InvalidStrategy(_))));

        assert!(compile(json!({"kind": "exhaust"})).is_err());
        assert!(compile(json!({"kind": "debounce"})).is_err());
    }

    #[test]
    fn definition_survives_compile() {
        let def = StrategyDef::Throttle { interval_ms: 250, latest: true };
        let strategy = Strategy::compile(def.clone(), TokioScheduler::shared()).unwrap();
        assert_eq!(strategy.to_def(), def);
        assert_eq!(serde_json::to_value(&def).unwrap(), json!({"kind": "throttle", "interval_ms": 250, "latest": true}));
    }
}
