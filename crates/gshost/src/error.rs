use thiserror::Error;

use crate::engine::Phase;

pub type GsResult<T> = Result<T, GsError>;

/// Local faults and marshaling failures.
///
/// Engine-reported run outcomes are not errors; they come back as
/// [`crate::Outcome`] values. This type covers everything that is decided on
/// the host side: contract violations are rejected here without ever
/// reaching the engine.
#[derive(Debug, Error)]
pub enum GsError {
    #[error("`{op}` is not legal while the instance is {phase}")]
    InvalidSequence { op: &'static str, phase: Phase },

    #[error("an engine instance is already active in this process")]
    InstanceAlreadyActive,

    #[error("engine refused to create an instance (code {0})")]
    CreateFailed(i32),

    #[error("`{op}` was rejected by the engine (code {code})")]
    Rejected { op: &'static str, code: i32 },

    #[error("chunk of {0} bytes exceeds the 65535-byte run-string limit")]
    ChunkTooLarge(usize),

    #[error("revision query failed: engine expects a {0}-byte structure")]
    RevisionMismatch(i32),

    #[error("failed to load the engine library: {0}")]
    Library(#[from] libloading::Error),

    #[error("embedded NUL byte in a string passed to the engine: {0}")]
    Nul(#[from] std::ffi::NulError),
}
