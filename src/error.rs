use thiserror::Error;

#[derive(Debug, PartialEq, Error)]
pub enum Error {
    /// Observation cursors are session-owned and only move one run at a
    /// time: a cursor outside the log should never be formed by correct
    /// callers. Aborts the directional run.
    #[error("internal error: observation cursor out of range")]
    CursorOutOfRange,

    /// Directional buffers are pre-sized from a full pass over the log
    /// before either run starts. Writing past that count aborts the run.
    #[error("internal error: solution buffer overrun")]
    BufferOverrun,

    /// The log contained no rover epochs at all: there is nothing to
    /// pre-size combined buffers with, and nothing to process.
    #[error("empty observation log")]
    EmptyLog,

    /// The estimator was asked to process an epoch before any point fix
    /// seeded its prior state.
    #[error("internal error: estimator prior not initialized")]
    UninitializedEstimator,

    /// Raised by the recursive solver collaborator when its epoch
    /// resolution failed in a non-recoverable way.
    #[error("epoch solver error: {0}")]
    EpochSolver(String),
}
