use zg_core::entity::EntityId;

/// Alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the time-control engine.
///
/// Only configuration problems are fatal; everything that can go wrong at
/// runtime is recovered locally (dropped with a diagnostic) because a frozen
/// simulation is worse than a degraded one.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine configuration is invalid. Raised at construction, before
    /// any world state exists.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A command referenced an entity that does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// A bubble spawn request failed validation.
    #[error("invalid bubble: {0}")]
    InvalidBubble(String),
}
