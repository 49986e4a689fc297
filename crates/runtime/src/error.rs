//! Runtime error taxonomy.
//!
//! Only genuinely fatal conditions are errors. Expected requirement
//! failures travel inside the success channel as
//! [`UseOutcome::Failed`](crate::process::UseOutcome::Failed), and
//! post-commit cosmetic failures are logged without propagating.

use arbiter_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A core attack/damage/save formula failed to evaluate. Guaranteed to
    /// surface before any resource consumption.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("action use requires a persistence port")]
    MissingPersistence,

    #[error("template placement failed: {0}")]
    Template(String),

    #[error("hook '{hook}' failed at {point}: {reason}")]
    Hook {
        hook: &'static str,
        point: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
