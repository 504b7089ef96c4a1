//! # Transaction Manager
//!
//! Lifecycle manager for asynchronous write operations against an external
//! ledger (a blockchain reached through a remote node).
//!
//! This crate provides:
//! - Transaction registration and lookup (pending, in flight, resolved)
//! - Submission with multiplicative pricing and buffered gas limits
//! - Confirmation monitoring with per-transaction timeouts
//! - Fee-bumped replacement of stuck transactions at the same nonce
//! - A broadcast event stream of full record snapshots for observers
//!
//! Callers describe an invocation (target contract, method, params), submit
//! it, and read the outcome from the record or the event stream; ledger
//! failures are recorded and published, never thrown.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod events;
mod ledger;
mod manager;
mod monitor;
mod record;
mod registry;
mod replacement;
mod submitter;

#[cfg(test)]
mod testing;

pub use config::{ManagerConfig, TxOptions, TxSettings};
pub use error::{Error, FailureKind, Result, TxFailure};
pub use events::{EventBus, TxEvent};
pub use ledger::{HandleStatus, LedgerClient, LedgerError, TxHandle, TxReceipt};
pub use manager::TxManager;
pub use monitor::Monitor;
pub use record::{Invocation, TxId, TxRecord, TxState};
pub use registry::{TxRegistry, TxStatistics};
pub use replacement::ReplacementEngine;
pub use submitter::Submitter;
