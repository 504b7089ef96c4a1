//! Transaction records and the lifecycle state machine
//!
//! A `TxRecord` is the unit of state the manager tracks: one described
//! contract invocation and everything observed about it since creation.
//! Records move through the states monotonically and freeze once terminal.

use serde::Serialize;
use uuid::Uuid;

use crate::config::TxSettings;
use crate::error::{Error, Result, TxFailure};
use crate::ledger::{TxHandle, TxReceipt};

/// Opaque unique transaction identifier, assigned once at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TxId(Uuid);

impl TxId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a tracked transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxState {
    /// Created but not yet handed to the ledger
    Pending,

    /// Submission in progress (estimating, pricing, signing)
    Broadcasting,

    /// Dispatched and waiting for inclusion
    Mining,

    /// At least one confirmation observed, threshold not yet reached
    Confirming,

    /// Confirmed successfully
    Completed,

    /// Included but execution reverted on chain
    Reverted,

    /// Failed before or during monitoring
    Failed,
}

impl TxState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Completed | TxState::Reverted | TxState::Failed)
    }

    /// Check if the transaction is in flight (submitted, not resolved)
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            TxState::Broadcasting | TxState::Mining | TxState::Confirming
        )
    }

    /// Check if this state indicates success
    pub fn is_successful(&self) -> bool {
        matches!(self, TxState::Completed)
    }

    /// Ordering rank used to enforce monotonic transitions
    fn rank(&self) -> u8 {
        match self {
            TxState::Pending => 0,
            TxState::Broadcasting => 1,
            TxState::Mining => 2,
            TxState::Confirming => 3,
            TxState::Completed | TxState::Reverted | TxState::Failed => 4,
        }
    }
}

impl std::fmt::Display for TxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxState::Pending => write!(f, "Pending"),
            TxState::Broadcasting => write!(f, "Broadcasting"),
            TxState::Mining => write!(f, "Mining"),
            TxState::Confirming => write!(f, "Confirming"),
            TxState::Completed => write!(f, "Completed"),
            TxState::Reverted => write!(f, "Reverted"),
            TxState::Failed => write!(f, "Failed"),
        }
    }
}

/// Described invocation of a named method on a remote contract
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    /// Contract address the call is directed at
    pub target: String,

    /// Method name
    pub method: String,

    /// Call parameters, opaque to the manager
    pub params: serde_json::Value,
}

/// Everything tracked about one transaction
#[derive(Debug, Clone, Serialize)]
pub struct TxRecord {
    /// Unique identifier, the sole lookup key for the record's lifetime
    pub id: TxId,

    /// Human-readable label
    pub description: String,

    /// The described invocation, immutable after creation
    pub invocation: Invocation,

    /// Resolved configuration, frozen at creation
    pub settings: TxSettings,

    /// Current lifecycle state
    pub state: TxState,

    /// Handle from the original broadcast; kept for audit after replacement
    pub handle: Option<TxHandle>,

    /// Handle of the latest replacement, if any
    pub replacement_handle: Option<TxHandle>,

    /// Replacement chain depth
    pub replacements: u32,

    /// Confirmations observed on the active handle
    pub confirmations: u32,

    /// Creation timestamp (unix milliseconds)
    pub create_time_ms: u64,

    /// Terminal resolution timestamp (unix milliseconds)
    pub confirm_time_ms: Option<u64>,

    /// Receipt from the ledger, set with the terminal transition
    pub receipt: Option<TxReceipt>,

    /// Recorded failure, set when the state becomes Failed
    pub failure: Option<TxFailure>,
}

impl TxRecord {
    pub(crate) fn new(
        id: TxId,
        description: String,
        invocation: Invocation,
        settings: TxSettings,
        create_time_ms: u64,
    ) -> Self {
        Self {
            id,
            description,
            invocation,
            settings,
            state: TxState::Pending,
            handle: None,
            replacement_handle: None,
            replacements: 0,
            confirmations: 0,
            create_time_ms,
            confirm_time_ms: None,
            receipt: None,
            failure: None,
        }
    }

    /// The handle the current watcher should be attached to: the latest
    /// replacement if one exists, the original broadcast handle otherwise.
    pub fn active_handle(&self) -> Option<&TxHandle> {
        self.replacement_handle.as_ref().or(self.handle.as_ref())
    }

    /// Move to `next`, rejecting regressions and any transition out of a
    /// terminal state. Equal-rank moves are allowed (replacement keeps the
    /// record in Mining).
    pub(crate) fn transition(&mut self, next: TxState) -> Result<()> {
        if self.state.is_terminal() || next.rank() < self.state.rank() {
            return Err(Error::IllegalTransition {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Resolve the record as confirmed successful
    pub(crate) fn resolve_success(&mut self, receipt: TxReceipt, now_ms: u64) -> Result<()> {
        self.transition(TxState::Completed)?;
        self.confirm_time_ms = Some(now_ms);
        self.receipt = Some(receipt);
        Ok(())
    }

    /// Resolve the record as reverted on chain
    pub(crate) fn resolve_reverted(&mut self, receipt: TxReceipt, now_ms: u64) -> Result<()> {
        self.transition(TxState::Reverted)?;
        self.confirm_time_ms = Some(now_ms);
        self.receipt = Some(receipt);
        Ok(())
    }

    /// Resolve the record as failed with a classified error
    pub(crate) fn resolve_failed(&mut self, failure: TxFailure, now_ms: u64) -> Result<()> {
        self.transition(TxState::Failed)?;
        self.confirm_time_ms = Some(now_ms);
        self.failure = Some(failure);
        Ok(())
    }

    /// Total time from creation to terminal resolution (milliseconds)
    pub fn total_time_ms(&self) -> Option<u64> {
        self.confirm_time_ms
            .map(|t| t.saturating_sub(self.create_time_ms))
    }
}
