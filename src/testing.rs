//! Scripted ledger client for tests
//!
//! The mock is driven entirely by per-handle scripts: dispatches pop queued
//! results, confirmation waits follow a `ConfirmScript`, and every dispatch
//! is recorded so tests can assert on pricing, gas and sequence numbers.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ledger::{HandleStatus, LedgerClient, LedgerError, TxHandle, TxReceipt};
use crate::record::Invocation;

/// What a confirmation wait against a given handle should do
#[derive(Debug, Clone)]
pub(crate) enum ConfirmScript {
    /// Serve each confirmation after `step`, ending in a receipt
    Confirm {
        step: Duration,
        success: bool,
        block_number: u64,
    },

    /// Never produce a confirmation
    Stall,

    /// Fail the wait with a transport error
    Break(String),
}

/// Arguments of one recorded dispatch call
#[derive(Debug, Clone)]
pub(crate) struct DispatchRecord {
    pub method: String,
    pub price: u128,
    pub gas_limit: u64,
    pub sequence: Option<u64>,
}

pub(crate) struct MockLedger {
    signer: bool,
    estimate: Result<u64, LedgerError>,
    price: u128,
    dispatch_queue: Mutex<VecDeque<Result<TxHandle, LedgerError>>>,
    dispatches: Mutex<Vec<DispatchRecord>>,
    statuses: Mutex<HashMap<TxHandle, HandleStatus>>,
    scripts: Mutex<HashMap<TxHandle, ConfirmScript>>,
}

impl MockLedger {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            signer: true,
            estimate: Ok(100_000),
            price: 50,
            dispatch_queue: Mutex::new(VecDeque::new()),
            dispatches: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
            scripts: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn without_signer(self: Arc<Self>) -> Arc<Self> {
        let mut inner = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("mock already shared"));
        inner.signer = false;
        Arc::new(inner)
    }

    pub(crate) fn with_estimate(self: Arc<Self>, estimate: Result<u64, LedgerError>) -> Arc<Self> {
        let mut inner = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("mock already shared"));
        inner.estimate = estimate;
        Arc::new(inner)
    }

    pub(crate) fn with_price(self: Arc<Self>, price: u128) -> Arc<Self> {
        let mut inner = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("mock already shared"));
        inner.price = price;
        Arc::new(inner)
    }

    /// Queue the result of the next dispatch call
    pub(crate) fn push_dispatch(&self, result: Result<TxHandle, LedgerError>) {
        self.dispatch_queue.lock().push_back(result);
    }

    /// Script the confirmation behavior for a handle
    pub(crate) fn script(&self, handle: &TxHandle, script: ConfirmScript) {
        self.scripts.lock().insert(handle.clone(), script);
    }

    /// Set what `fetch_by_handle` returns for a handle
    pub(crate) fn set_status(&self, handle: &TxHandle, status: HandleStatus) {
        self.statuses.lock().insert(handle.clone(), status);
    }

    /// All dispatch calls observed so far
    pub(crate) fn dispatched(&self) -> Vec<DispatchRecord> {
        self.dispatches.lock().clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn has_signer(&self) -> bool {
        self.signer
    }

    async fn estimate_cost(&self, _invocation: &Invocation) -> Result<u64, LedgerError> {
        self.estimate.clone()
    }

    async fn current_price(&self) -> Result<u128, LedgerError> {
        Ok(self.price)
    }

    async fn dispatch(
        &self,
        invocation: &Invocation,
        price: u128,
        gas_limit: u64,
        sequence: Option<u64>,
    ) -> Result<TxHandle, LedgerError> {
        self.dispatches.lock().push(DispatchRecord {
            method: invocation.method.clone(),
            price,
            gas_limit,
            sequence,
        });
        self.dispatch_queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(TxHandle::new("0xdefault")))
    }

    async fn fetch_by_handle(&self, handle: &TxHandle) -> Result<Option<HandleStatus>, LedgerError> {
        Ok(self.statuses.lock().get(handle).cloned())
    }

    async fn await_confirmations(
        &self,
        handle: &TxHandle,
        _confirmations: u32,
    ) -> Result<TxReceipt, LedgerError> {
        let script = self
            .scripts
            .lock()
            .get(handle)
            .cloned()
            .unwrap_or(ConfirmScript::Stall);

        match script {
            ConfirmScript::Confirm {
                step,
                success,
                block_number,
            } => {
                tokio::time::sleep(step).await;
                Ok(TxReceipt {
                    handle: handle.clone(),
                    success,
                    block_number,
                    gas_used: Some(21_000),
                })
            }
            ConfirmScript::Stall => std::future::pending().await,
            ConfirmScript::Break(message) => Err(LedgerError::new(message)),
        }
    }
}
