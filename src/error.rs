use thiserror::Error;

#[derive(Error, Debug)]
pub enum KpiError {
    /// A supply used as a divisor is zero.
    #[error("Invalid supply: divisor supply is zero")]
    InvalidSupply,

    #[error("Inconsistent input: {0}")]
    InconsistentInput(String),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Chain mismatch: expected chain {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Invalid campaign draft: {0}")]
    InvalidDraft(String),

    #[error("Chain read failed: {0}")]
    Chain(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KpiError>;
