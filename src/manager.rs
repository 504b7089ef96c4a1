//! Transaction manager facade
//!
//! Wires the registry, submitter, monitor and replacement engine together
//! with explicit dependency injection: construct one manager per process or
//! per test, hand it a ledger client, and drive everything through it. The
//! event stream from `subscribe` is how dashboards and logs learn about
//! progress; no polling beyond `get` is needed.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::{ManagerConfig, TxOptions};
use crate::error::Result;
use crate::events::TxEvent;
use crate::ledger::LedgerClient;
use crate::monitor::Monitor;
use crate::record::{TxId, TxRecord};
use crate::registry::{TxRegistry, TxStatistics};
use crate::submitter::Submitter;

/// Lifecycle manager for contract transactions
pub struct TxManager {
    registry: Arc<TxRegistry>,
    submitter: Submitter,
}

impl TxManager {
    /// Create a manager with a fresh registry
    pub fn new(config: ManagerConfig, ledger: Arc<dyn LedgerClient>) -> Self {
        Self::with_registry(Arc::new(TxRegistry::new(config)), ledger)
    }

    /// Create a manager around an existing registry (useful for tests that
    /// inject a clock via `TxRegistry::with_time_fn`)
    pub fn with_registry(registry: Arc<TxRegistry>, ledger: Arc<dyn LedgerClient>) -> Self {
        let monitor = Arc::new(Monitor::new(Arc::clone(&registry), Arc::clone(&ledger)));
        let submitter = Submitter::new(Arc::clone(&registry), ledger, monitor);
        Self {
            registry,
            submitter,
        }
    }

    /// Register a new transaction in Pending state
    pub fn create(
        &self,
        description: impl Into<String>,
        target: impl Into<String>,
        method: impl Into<String>,
        params: serde_json::Value,
        options: TxOptions,
    ) -> Result<TxId> {
        self.registry.create(description, target, method, params, options)
    }

    /// Submit a created transaction; monitoring continues independently
    pub async fn submit(&self, id: TxId) -> Result<TxRecord> {
        self.submitter.submit(id).await
    }

    /// Snapshot of one record
    pub fn get(&self, id: TxId) -> Option<TxRecord> {
        self.registry.get(id)
    }

    /// Snapshot of all records, in creation order
    pub fn list_all(&self) -> Vec<TxRecord> {
        self.registry.list_all()
    }

    /// Snapshot of in-flight records
    pub fn list_pending(&self) -> Vec<TxRecord> {
        self.registry.list_pending()
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<TxEvent> {
        self.registry.subscribe()
    }

    /// Aggregate statistics over all tracked transactions
    pub fn statistics(&self) -> TxStatistics {
        self.registry.statistics()
    }

    /// The underlying registry
    pub fn registry(&self) -> &Arc<TxRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::error::FailureKind;
    use crate::ledger::{HandleStatus, TxHandle};
    use crate::record::TxState;
    use crate::testing::{ConfirmScript, MockLedger};

    fn manager(ledger: Arc<MockLedger>) -> TxManager {
        TxManager::new(ManagerConfig::default(), ledger as Arc<dyn LedgerClient>)
    }

    async fn wait_terminal(
        rx: &mut broadcast::Receiver<TxEvent>,
        id: TxId,
    ) -> TxRecord {
        let wait = async {
            loop {
                let event = rx.recv().await.unwrap();
                let record = event.record();
                if record.id == id && record.state.is_terminal() {
                    return record.clone();
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(600), wait)
            .await
            .expect("transaction never reached a terminal state")
    }

    // Full happy path through the facade: create, submit, two
    // confirmations, completed.
    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_completion() {
        let ledger = MockLedger::new();
        let handle = TxHandle::new("0xh1");
        ledger.push_dispatch(Ok(handle.clone()));
        ledger.script(
            &handle,
            ConfirmScript::Confirm {
                step: Duration::from_millis(10),
                success: true,
                block_number: 100,
            },
        );
        let manager = manager(ledger);

        let id = manager
            .create(
                "vote on proposal 12",
                "0x00000000000000000000000000000000000000aa",
                "castVote",
                serde_json::json!([12, true]),
                TxOptions::default(),
            )
            .unwrap();
        let mut rx = manager.subscribe();
        manager.submit(id).await.unwrap();

        let record = wait_terminal(&mut rx, id).await;
        assert_eq!(record.state, TxState::Completed);
        assert_eq!(record.confirmations, 2);
        assert!(manager.list_pending().is_empty());

        let stats = manager.statistics();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.success_rate(), 1.0);
    }

    // Timeout fires, replacement dispatch succeeds with a new handle, and
    // the replacement confirms: final state Completed, replacement link set,
    // identity and original handle untouched.
    #[tokio::test(start_paused = true)]
    async fn test_replacement_then_completion() {
        let ledger = MockLedger::new();
        let h1 = TxHandle::new("0xh1");
        let h2 = TxHandle::new("0xh2");
        ledger.push_dispatch(Ok(h1.clone()));
        ledger.push_dispatch(Ok(h2.clone()));
        ledger.set_status(
            &h1,
            HandleStatus {
                price: 55,
                sequence: 7,
                gas_limit: 120_000,
                mined: None,
            },
        );
        ledger.script(
            &h2,
            ConfirmScript::Confirm {
                step: Duration::from_millis(10),
                success: true,
                block_number: 200,
            },
        );
        let manager = manager(ledger.clone());

        let id = manager
            .create(
                "transfer tokens",
                "0x00000000000000000000000000000000000000aa",
                "transfer",
                serde_json::json!(["0xbb", "1000"]),
                TxOptions {
                    required_confirmations: Some(1),
                    timeout: Some(Duration::from_millis(50)),
                    ..Default::default()
                },
            )
            .unwrap();
        let created = manager.get(id).unwrap();
        let mut rx = manager.subscribe();
        manager.submit(id).await.unwrap();

        let record = wait_terminal(&mut rx, id).await;
        assert_eq!(record.state, TxState::Completed);
        assert_eq!(record.replacement_handle, Some(h2));
        assert_eq!(record.handle, Some(h1));

        // Identity survives replacement untouched.
        assert_eq!(record.id, created.id);
        assert_eq!(record.create_time_ms, created.create_time_ms);
        assert_eq!(record.description, created.description);
        assert_eq!(record.invocation, created.invocation);

        // Replacement outbids the original at the same sequence number.
        let calls = ledger.dispatched();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].sequence, Some(7));
        assert!(calls[1].price >= 66); // ceil(55 x 1.2)
    }

    #[tokio::test]
    async fn test_list_pending_tracks_in_flight() {
        let ledger = MockLedger::new();
        ledger.push_dispatch(Ok(TxHandle::new("0xh1")));
        let manager = manager(ledger);

        let submitted = manager
            .create(
                "transfer",
                "0xaa",
                "transfer",
                serde_json::json!([]),
                TxOptions::default(),
            )
            .unwrap();
        let drafted = manager
            .create(
                "approve",
                "0xaa",
                "approve",
                serde_json::json!([]),
                TxOptions::default(),
            )
            .unwrap();
        manager.submit(submitted).await.unwrap();

        let pending: Vec<TxId> = manager.list_pending().iter().map(|r| r.id).collect();
        assert_eq!(pending, vec![submitted]);
        assert_eq!(manager.get(drafted).unwrap().state, TxState::Pending);
        assert_eq!(manager.list_all().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_record_requires_new_record() {
        let ledger = MockLedger::new();
        ledger.push_dispatch(Err(crate::ledger::LedgerError::new(
            "insufficient funds for transfer",
        )));
        let manager = manager(ledger);

        let id = manager
            .create(
                "transfer",
                "0xaa",
                "transfer",
                serde_json::json!([]),
                TxOptions::default(),
            )
            .unwrap();
        let record = manager.submit(id).await.unwrap();
        assert_eq!(record.state, TxState::Failed);
        assert_eq!(
            record.failure.as_ref().unwrap().kind,
            FailureKind::InsufficientFunds
        );

        // A failed record is never retried in place.
        assert!(manager.submit(id).await.is_err());
    }
}
