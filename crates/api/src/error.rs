use pinwatch_core::error::CoreError;

/// Failure while processing one unit of ingestion work (a rule, a dispatch).
///
/// Pipeline errors never reach the device or real-time viewers; they are
/// logged where the unit of work is abandoned.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A domain-level error, e.g. a rule with an unknown comparator.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A storage read or write failed (after any configured retries).
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = Result<T, PipelineError>;
