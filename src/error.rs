//! Error types for the transaction manager
//!
//! Two layers: `Error` covers programmer errors surfaced synchronously to the
//! caller (unknown id, malformed input), while `TxFailure` is the structured
//! failure recorded on a transaction when its lifecycle ends badly. Ledger
//! failures are never thrown to callers; they are stored on the record and
//! published through the event stream.

use serde::Serialize;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::record::{TxId, TxState};

/// Transaction manager error type
#[derive(Error, Debug)]
pub enum Error {
    /// Transaction not found
    #[error("transaction not found: {0}")]
    NotFound(TxId),

    /// Invocation method was empty
    #[error("invocation method must not be empty")]
    EmptyMethod,

    /// Transaction is not in a submittable state
    #[error("transaction {id} cannot be submitted from state {state}")]
    NotSubmittable {
        /// Transaction id
        id: TxId,
        /// State the record was found in
        state: TxState,
    },

    /// Attempted state transition violates the lifecycle ordering
    #[error("transaction {id}: illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Transaction id
        id: TxId,
        /// Current state
        from: TxState,
        /// Rejected target state
        to: TxState,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a recorded transaction failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// The signer declined to authorize the dispatch
    UserRejected,

    /// The account cannot cover price x resource limit
    InsufficientFunds,

    /// The invocation would revert; nothing was dispatched
    EstimationFailed,

    /// No signing/dispatch capability available
    NoSigner,

    /// No terminal status observed within the configured timeout
    Timeout,

    /// The replacement chain hit its configured depth cap
    ReplacementExhausted,

    /// Transport or network failure during dispatch
    DispatchFailed,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::UserRejected => write!(f, "UserRejected"),
            FailureKind::InsufficientFunds => write!(f, "InsufficientFunds"),
            FailureKind::EstimationFailed => write!(f, "EstimationFailed"),
            FailureKind::NoSigner => write!(f, "NoSigner"),
            FailureKind::Timeout => write!(f, "Timeout"),
            FailureKind::ReplacementExhausted => write!(f, "ReplacementExhausted"),
            FailureKind::DispatchFailed => write!(f, "DispatchFailed"),
        }
    }
}

/// Structured failure stored on a transaction record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxFailure {
    /// Failure classification
    pub kind: FailureKind,

    /// Underlying message, preserved verbatim
    pub message: String,
}

impl TxFailure {
    /// Create a new failure
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify a dispatch error from the ledger client by its message.
    ///
    /// Node and wallet implementations only agree on message substrings, so
    /// anything unrecognized stays `DispatchFailed` with the message kept.
    pub fn classify_dispatch(err: &LedgerError) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();

        let kind = if lower.contains("insufficient funds") {
            FailureKind::InsufficientFunds
        } else if lower.contains("user rejected") || lower.contains("user denied") {
            FailureKind::UserRejected
        } else {
            FailureKind::DispatchFailed
        };

        Self { kind, message }
    }
}
