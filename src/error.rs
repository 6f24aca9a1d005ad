use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the simulation core.
///
/// Numerical degeneracies (lost events, positions drifting out of the
/// domain) are recovered internally and never surface here; this enum covers
/// the failures the caller must act on.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration or API parameter; construct a new simulator.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Scheduler bookkeeping failure (e.g. a particle lost from the event
    /// queue). Not recoverable; indicates a programming error.
    #[error("broken invariant: {0}")]
    BrokenInvariant(String),

    /// Propagated I/O errors from the results/totals writers.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
