use gridkeep_ecs::EcsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// Rejected at startup: unknown action kind, bad seed, out-of-range
    /// grid dimensions. The engine refuses to start rather than run with a
    /// config it cannot honor.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A fatal condition detected mid-run (negative hp on a non-dead
    /// entity, spatial index corruption surviving a rebuild). Propagates up
    /// through the tick loop and stops the engine; `EngineManager` reports
    /// it via `stats().last_error`.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
