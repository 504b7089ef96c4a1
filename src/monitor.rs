//! Transaction monitoring
//!
//! One watch task per dispatched transaction. The task counts confirmations
//! one at a time so observers see partial progress, races each wait against
//! the stuck-transaction timer, and on timeout either resolves from the
//! node's view (the watch missed an inclusion event) or hands over to the
//! replacement engine and keeps watching the new handle. The loop is the
//! single owner of the record's confirmation counting; a watcher that finds
//! the record pointing at a different handle stops silently.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::TxSettings;
use crate::error::{FailureKind, TxFailure};
use crate::ledger::{HandleStatus, LedgerClient, LedgerError, TxHandle, TxReceipt};
use crate::record::{TxId, TxState};
use crate::registry::{Applied, TxRegistry};
use crate::replacement::{ReplaceOutcome, ReplacementEngine};

/// What one watch iteration ended with
enum WatchStep {
    /// Terminal state reached, or this watcher was superseded
    Finished,

    /// The timer fired before a terminal status
    TimedOut,

    /// The confirmation wait broke; check the node directly
    Reevaluate,
}

/// What to do after a stalled iteration
enum Stall {
    /// Keep watching, now on the replacement handle
    Continue(TxHandle),

    /// Keep watching the same handle with a fresh timer
    Retry,

    /// The record is resolved or no longer ours
    Done,
}

/// Watches dispatched transactions until they resolve
pub struct Monitor {
    registry: Arc<TxRegistry>,
    ledger: Arc<dyn LedgerClient>,
    replacement: ReplacementEngine,
}

impl Monitor {
    /// Create a new monitor
    pub fn new(registry: Arc<TxRegistry>, ledger: Arc<dyn LedgerClient>) -> Self {
        let replacement = ReplacementEngine::new(Arc::clone(&registry), Arc::clone(&ledger));
        Self {
            registry,
            ledger,
            replacement,
        }
    }

    /// Drive one transaction from dispatch to a terminal state.
    ///
    /// Safe to run concurrently with watchers for other records; watchers
    /// never share mutable state beyond the registry's per-record locks.
    pub async fn watch(&self, id: TxId, handle: TxHandle) {
        let mut handle = handle;
        loop {
            let Some(record) = self.registry.get(id) else {
                return;
            };
            if record.state.is_terminal() {
                return;
            }
            if record.active_handle() != Some(&handle) {
                debug!(%id, %handle, "watcher superseded, stopping");
                return;
            }
            let settings = record.settings.clone();

            let step = {
                let confirmed =
                    self.count_confirmations(id, &handle, settings.required_confirmations);
                tokio::pin!(confirmed);
                tokio::select! {
                    result = &mut confirmed => match result {
                        Ok(Some(receipt)) => {
                            self.resolve(id, &handle, receipt);
                            WatchStep::Finished
                        }
                        // Lost ownership mid-count
                        Ok(None) => WatchStep::Finished,
                        Err(e) => {
                            warn!(%id, %handle, error = %e, "confirmation wait failed");
                            WatchStep::Reevaluate
                        }
                    },
                    _ = tokio::time::sleep(settings.timeout) => WatchStep::TimedOut,
                }
            };

            match step {
                WatchStep::Finished => return,
                WatchStep::TimedOut => {
                    info!(%id, %handle, timeout_ms = settings.timeout.as_millis() as u64,
                        "no terminal status within timeout");
                }
                WatchStep::Reevaluate => {
                    tokio::time::sleep(self.registry.config().reevaluate_backoff).await;
                }
            }

            match self.handle_stall(id, &handle, &settings).await {
                Stall::Continue(next) => handle = next,
                Stall::Retry => {}
                Stall::Done => return,
            }
        }
    }

    /// Await confirmations one increment at a time, publishing each observed
    /// count. Returns `Ok(None)` if the watcher lost ownership of the record.
    async fn count_confirmations(
        &self,
        id: TxId,
        handle: &TxHandle,
        required: u32,
    ) -> Result<Option<TxReceipt>, LedgerError> {
        let required = required.max(1);
        let mut receipt = None;

        for observed in 1..=required {
            let r = self.ledger.await_confirmations(handle, observed).await?;

            let owned = self
                .registry
                .apply(id, |rec| {
                    if rec.state.is_terminal() || rec.active_handle() != Some(handle) {
                        return Ok(Applied::Unchanged(false));
                    }
                    if rec.confirmations < observed {
                        rec.confirmations = observed;
                    }
                    if rec.state == TxState::Mining {
                        rec.transition(TxState::Confirming)?;
                    }
                    Ok(Applied::Changed(true))
                })
                .unwrap_or(false);
            if !owned {
                return Ok(None);
            }

            debug!(%id, %handle, confirmations = observed, "confirmation observed");
            receipt = Some(r);
        }

        Ok(receipt)
    }

    /// Apply a terminal receipt. A record that already resolved, or that has
    /// moved on to a replacement handle, is left untouched.
    fn resolve(&self, id: TxId, handle: &TxHandle, receipt: TxReceipt) {
        let now = self.registry.now_ms();
        let resolved = self.registry.apply(id, move |rec| {
            if rec.state.is_terminal() || rec.active_handle() != Some(handle) {
                return Ok(Applied::Unchanged(None));
            }
            if receipt.success {
                rec.resolve_success(receipt, now)?;
            } else {
                rec.resolve_reverted(receipt, now)?;
            }
            Ok(Applied::Changed(Some(rec.state)))
        });

        match resolved {
            Ok(Some(state)) => info!(%id, %handle, %state, "transaction resolved"),
            Ok(None) => {}
            Err(e) => warn!(%id, %handle, error = %e, "failed to record resolution"),
        }
    }

    /// Timeout/re-evaluation path: ask the node what it knows about the
    /// handle, resolve if it was mined behind our back, otherwise escalate
    /// to replacement or fail.
    async fn handle_stall(&self, id: TxId, handle: &TxHandle, settings: &TxSettings) -> Stall {
        // The record may have resolved while the timer was firing.
        let Some(record) = self.registry.get(id) else {
            return Stall::Done;
        };
        if record.state.is_terminal() || record.active_handle() != Some(handle) {
            return Stall::Done;
        }

        match self.ledger.fetch_by_handle(handle).await {
            Ok(Some(HandleStatus {
                mined: Some(receipt),
                ..
            })) => {
                // Mined, but the confirmation watch missed the event.
                self.resolve(id, handle, receipt);
                Stall::Done
            }
            fetched => {
                if let Err(e) = fetched {
                    warn!(%id, %handle, error = %e, "status fetch failed");
                }

                if !settings.replacement_enabled {
                    self.fail_stalled(
                        id,
                        TxFailure::new(
                            FailureKind::Timeout,
                            format!(
                                "no terminal status within {} ms",
                                settings.timeout.as_millis()
                            ),
                        ),
                    );
                    return Stall::Done;
                }

                if record.replacements >= settings.max_replacements {
                    self.fail_stalled(
                        id,
                        TxFailure::new(
                            FailureKind::ReplacementExhausted,
                            format!(
                                "still unconfirmed after {} replacements",
                                record.replacements
                            ),
                        ),
                    );
                    return Stall::Done;
                }

                match self.replacement.replace(id, handle).await {
                    ReplaceOutcome::Replaced(next) => Stall::Continue(next),
                    ReplaceOutcome::NotNeeded => Stall::Retry,
                    ReplaceOutcome::Failed => Stall::Done,
                }
            }
        }
    }

    /// Fail a stalled record. Idempotent: a record that resolved in the
    /// meantime is left untouched and no event is published.
    fn fail_stalled(&self, id: TxId, failure: TxFailure) {
        let now = self.registry.now_ms();
        let failed = self.registry.apply(id, move |rec| {
            if rec.state.is_terminal() {
                return Ok(Applied::Unchanged(false));
            }
            rec.resolve_failed(failure, now)?;
            Ok(Applied::Changed(true))
        });

        match failed {
            Ok(true) => warn!(%id, "transaction failed after stall"),
            Ok(false) => {}
            Err(e) => warn!(%id, error = %e, "failed to record stall failure"),
        }
    }
}
