use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors crossing the engine boundary. Queries never panic: the caller
/// always gets a ranked list or one of these.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The on-disk index contradicts its own invariants (truncated
    /// varbyte, overflowing value, block/lexicon incoherence).
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl EngineError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        EngineError::CorruptIndex(msg.into())
    }

    /// Process exit code per the external contract: 1 for fatal I/O,
    /// 2 for a corrupt index detected at load.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::CorruptIndex(_) => 2,
            _ => 1,
        }
    }
}
