//! Transaction registry
//!
//! Owns the record map and is the only place records are created or mutated.
//! `apply` is the single serialized read-modify-write entry point: it runs
//! the caller's closure under the record's entry lock and publishes the
//! updated snapshot before releasing it, which is what makes per-record
//! transitions atomic and their events ordered.

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::{ManagerConfig, TxOptions};
use crate::error::{Error, Result};
use crate::events::{EventBus, TxEvent};
use crate::record::{Invocation, TxId, TxRecord, TxState};

/// Outcome of an `apply` closure: whether the record changed, plus a value
/// handed back to the caller.
pub(crate) enum Applied<R> {
    /// The record was mutated; publish an update
    Changed(R),

    /// Nothing changed; no event
    Unchanged(R),
}

/// Storage and filtered views over all tracked transactions
pub struct TxRegistry {
    /// All records, keyed by id
    records: DashMap<TxId, TxRecord>,

    /// Insertion order, for stable listing
    order: Mutex<Vec<TxId>>,

    /// Lifecycle event fan-out
    events: EventBus,

    /// Registry-wide defaults
    config: ManagerConfig,

    /// Current time provider (for testing)
    now_ms_fn: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl TxRegistry {
    /// Create a new registry
    pub fn new(config: ManagerConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            records: DashMap::new(),
            order: Mutex::new(Vec::new()),
            events,
            config,
            now_ms_fn: Box::new(|| {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u64
            }),
        }
    }

    /// Set the current time function (for testing)
    pub fn with_time_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.now_ms_fn = Box::new(f);
        self
    }

    /// Registry-wide configuration
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub(crate) fn now_ms(&self) -> u64 {
        (self.now_ms_fn)()
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<TxEvent> {
        self.events.subscribe()
    }

    /// Create a new Pending record and publish its `Created` event.
    ///
    /// Rejects an empty method name; everything else is accepted as-is.
    pub fn create(
        &self,
        description: impl Into<String>,
        target: impl Into<String>,
        method: impl Into<String>,
        params: serde_json::Value,
        options: TxOptions,
    ) -> Result<TxId> {
        let method = method.into();
        if method.trim().is_empty() {
            return Err(Error::EmptyMethod);
        }

        let id = TxId::generate();
        let invocation = Invocation {
            target: target.into(),
            method,
            params,
        };
        let settings = self.config.resolve(&options);
        let record = TxRecord::new(id, description.into(), invocation, settings, self.now_ms());

        // The order lock is released before the entry lock is taken;
        // `list_all` holds them in the same sequence. It skips ids whose
        // record is not visible yet.
        self.order.lock().push(id);

        let entry = self.records.entry(id).insert(record);
        debug!(%id, method = %entry.invocation.method, "transaction registered");
        // Publish while still holding the entry lock, as `apply` does, so a
        // concurrent update can never be observed before `Created`.
        self.events.publish(TxEvent::Created(entry.value().clone()));
        drop(entry);

        Ok(id)
    }

    /// Get a snapshot of a record
    pub fn get(&self, id: TxId) -> Option<TxRecord> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    /// Snapshot of all records, in insertion order
    pub fn list_all(&self) -> Vec<TxRecord> {
        let order = self.order.lock();
        order
            .iter()
            .filter_map(|id| self.records.get(id).map(|entry| entry.value().clone()))
            .collect()
    }

    /// Snapshot of in-flight records (submitted, not yet resolved)
    pub fn list_pending(&self) -> Vec<TxRecord> {
        self.list_all()
            .into_iter()
            .filter(|record| record.state.is_in_flight())
            .collect()
    }

    /// Run `f` on the record under its entry lock.
    ///
    /// On `Applied::Changed` the post-mutation snapshot is published while
    /// the lock is still held, so events for one id can never reorder.
    pub(crate) fn apply<R, F>(&self, id: TxId, f: F) -> Result<R>
    where
        F: FnOnce(&mut TxRecord) -> Result<Applied<R>>,
    {
        let mut entry = self.records.get_mut(&id).ok_or(Error::NotFound(id))?;
        match f(entry.value_mut())? {
            Applied::Changed(value) => {
                self.events.publish(TxEvent::Updated(entry.value().clone()));
                Ok(value)
            }
            Applied::Unchanged(value) => Ok(value),
        }
    }

    /// Aggregate counts and latency over all tracked records
    pub fn statistics(&self) -> TxStatistics {
        let mut stats = TxStatistics::default();

        for entry in self.records.iter() {
            let record = entry.value();
            match record.state {
                TxState::Pending => stats.pending += 1,
                TxState::Broadcasting => stats.broadcasting += 1,
                TxState::Mining => stats.mining += 1,
                TxState::Confirming => stats.confirming += 1,
                TxState::Completed => stats.completed += 1,
                TxState::Reverted => stats.reverted += 1,
                TxState::Failed => stats.failed += 1,
            }

            if let Some(latency) = record.total_time_ms() {
                stats.total_latency_ms += latency;
                stats.latency_samples += 1;
            }
        }

        stats.total = self.records.len();
        stats
    }
}

/// Aggregate statistics over tracked transactions
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TxStatistics {
    /// Total number of tracked transactions
    pub total: usize,

    /// Created, not yet submitted
    pub pending: usize,

    /// Submission in progress
    pub broadcasting: usize,

    /// Waiting for inclusion
    pub mining: usize,

    /// Gathering confirmations
    pub confirming: usize,

    /// Confirmed successfully
    pub completed: usize,

    /// Reverted on chain
    pub reverted: usize,

    /// Failed
    pub failed: usize,

    /// Sum of creation-to-resolution latencies (milliseconds)
    pub total_latency_ms: u64,

    /// Number of resolved records contributing to the latency sum
    pub latency_samples: usize,
}

impl TxStatistics {
    /// Average creation-to-resolution latency (milliseconds)
    pub fn average_latency_ms(&self) -> Option<f64> {
        if self.latency_samples > 0 {
            Some(self.total_latency_ms as f64 / self.latency_samples as f64)
        } else {
            None
        }
    }

    /// Fraction of resolved transactions that completed successfully
    pub fn success_rate(&self) -> f64 {
        let resolved = self.completed + self.reverted + self.failed;
        if resolved > 0 {
            self.completed as f64 / resolved as f64
        } else {
            0.0
        }
    }
}
