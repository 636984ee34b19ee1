use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors surfaced by the settlement engine.
///
/// Validation failures (`InvalidMove`, `SessionNotActive`,
/// `InsufficientFunds`, ...) are synchronous and mutation-free.
/// `AlreadySettled` and `SessionNotTerminal` indicate caller misuse; the
/// session is left untouched. `Persistence` during settlement is fatal for
/// that session, which stays `Terminal` pending manual reconciliation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("account {0} is already registered")]
    AccountExists(u64),
    #[error("account {0} not found")]
    AccountNotFound(u64),
    #[error("session {0} already exists")]
    SessionExists(u64),
    #[error("session {0} not found")]
    SessionNotFound(u64),
    #[error("invalid session request: {reason}")]
    InvalidRequest { reason: &'static str },
    #[error("stake {stake} is below the minimum of {min}")]
    StakeBelowMinimum { stake: u64, min: u64 },
    #[error("insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: u64, required: u64 },
    #[error("illegal move at cell {cell}")]
    InvalidMove { cell: u8 },
    #[error("session {0} is not accepting moves")]
    SessionNotActive(u64),
    #[error("session {0} has not reached a terminal outcome")]
    SessionNotTerminal(u64),
    #[error("session {0} is already settled")]
    AlreadySettled(u64),
    #[error("persistence failure: {0}")]
    Persistence(#[from] GatewayError),
}
