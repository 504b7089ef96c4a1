//! Ledger client capability
//!
//! The manager never talks to a node directly; everything network-facing goes
//! through the `LedgerClient` trait. The wallet/provider layer implements it
//! in production, tests script a mock against it.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::record::Invocation;

/// Error returned by a ledger client operation.
///
/// Carries the node or wallet message verbatim; the manager classifies it by
/// substring (see `TxFailure::classify_dispatch`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct LedgerError(String);

impl LedgerError {
    /// Create a new ledger error
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Network-assigned reference to a dispatched transaction (its hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TxHandle(String);

impl TxHandle {
    /// Create a handle from its string form
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// The handle as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal outcome payload for a dispatched transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    /// Handle the receipt belongs to
    pub handle: TxHandle,

    /// Whether execution succeeded on chain
    pub success: bool,

    /// Block the transaction was included in
    pub block_number: u64,

    /// Gas consumed, when the node reports it
    pub gas_used: Option<u64>,
}

/// Node-side view of a dispatched transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandleStatus {
    /// Price the transaction was dispatched with
    pub price: u128,

    /// Sequence number (account nonce) it occupies
    pub sequence: u64,

    /// Gas limit it was dispatched with
    pub gas_limit: u64,

    /// Set once the transaction has a block reference
    pub mined: Option<TxReceipt>,
}

/// Capability for estimating, pricing, dispatching and observing
/// transactions on the external ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Whether a signing capability is currently available
    fn has_signer(&self) -> bool;

    /// Estimate the gas cost of an invocation.
    ///
    /// Fails when the call would revert; nothing is dispatched in that case.
    async fn estimate_cost(&self, invocation: &Invocation) -> Result<u64, LedgerError>;

    /// Current network base price
    async fn current_price(&self) -> Result<u128, LedgerError>;

    /// Sign and dispatch an invocation.
    ///
    /// Passing `sequence` pins the account nonce, which is how a replacement
    /// supersedes the original instead of queueing behind it.
    async fn dispatch(
        &self,
        invocation: &Invocation,
        price: u128,
        gas_limit: u64,
        sequence: Option<u64>,
    ) -> Result<TxHandle, LedgerError>;

    /// Fetch the node's view of a dispatched transaction, if it knows it
    async fn fetch_by_handle(&self, handle: &TxHandle) -> Result<Option<HandleStatus>, LedgerError>;

    /// Wait until `confirmations` blocks have been observed on top of the
    /// transaction's inclusion and return its receipt.
    ///
    /// May suspend indefinitely; the monitor applies the timeout.
    async fn await_confirmations(
        &self,
        handle: &TxHandle,
        confirmations: u32,
    ) -> Result<TxReceipt, LedgerError>;
}
