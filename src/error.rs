use thiserror::Error;

use crate::ledger::{AccountId, Amount};

/// Failure reported by the external asset ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The source account cannot cover the transfer.
    #[error("account {account} holds {available}, transfer needs {requested}")]
    InsufficientFunds {
        account: AccountId,
        available: Amount,
        requested: Amount,
    },

    /// The asset ledger refused the transfer for its own reasons.
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Canonical error type returned by every pool operation.
///
/// Any of these aborts the whole call: no ledger state is mutated and no
/// event is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    /// A non-owner invoked an owner-restricted operation.
    #[error("caller is not the owner ({caller})")]
    Unauthorized { caller: AccountId },

    /// Withdrawal exceeds the participant's staked balance.
    #[error("insufficient staked balance for {participant}: have {balance}, requested {requested}")]
    InsufficientBalance {
        participant: AccountId,
        balance: Amount,
        requested: Amount,
    },

    /// Reserve removal exceeds the current reserve.
    #[error("insufficient reserve: have {reserve}, requested {requested}")]
    InsufficientReserve { reserve: Amount, requested: Amount },

    /// A positive amount was required.
    #[error("amount must be greater than zero")]
    InvalidAmount,

    /// The external asset ledger reported failure.
    #[error("asset transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    /// An operation was entered while an external call was still in flight.
    #[error("re-entrant call rejected")]
    Reentrant,

    /// Checked arithmetic overflowed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// The pool was constructed with a config that failed validation.
    #[error("invalid pool config: {0}")]
    InvalidConfig(String),

    /// A snapshot failed integrity checks on restore.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

pub type Result<T> = std::result::Result<T, StakingError>;
