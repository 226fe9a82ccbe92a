//! Errors raised while configuring modulation.
//!
//! Effect failures are never wrapped here: they flow through a pipeline
//! untouched, typed by the effect's own `E`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModulationError {
    /// A bounded flatten needs at least one slot.
    #[error("max_concurrent limit must be at least 1")]
    ZeroLimit,

    #[error("invalid strategy: {0}")]
    InvalidStrategy(String),
}

pub type Result<T> = std::result::Result<T, ModulationError>;
