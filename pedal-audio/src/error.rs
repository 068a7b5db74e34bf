//! Error types for chain and cabinet operations

use thiserror::Error;

/// A rejected effect-chain operation. The chain is left unchanged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainError {
    #[error("Effect chain is full")]
    ChainFull,
    #[error("No effect at index {0}")]
    IndexOutOfRange(usize),
    #[error("Parameter slot {0} out of range")]
    ParamOutOfRange(usize),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CabinetError {
    #[error("Impulse response is empty")]
    EmptyImpulse,
    #[error("No cabinet slot {0}")]
    IndexOutOfRange(usize),
}
