//! Stuck-transaction replacement
//!
//! Re-dispatches the same logical invocation at the original's sequence
//! number with a strictly higher price, so the network supersedes the
//! original instead of queueing a duplicate. The bump is a fixed 20% over
//! the price the original was dispatched with, independent of the
//! submitter's configurable multiplier; node ordering rules reject a
//! replacement that does not outbid the original.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::TxFailure;
use crate::ledger::{LedgerClient, TxHandle};
use crate::record::TxId;
use crate::registry::{Applied, TxRegistry};

/// Result of a replacement attempt
pub(crate) enum ReplaceOutcome {
    /// A replacement was dispatched; watch this handle now
    Replaced(TxHandle),

    /// Original unfetchable or already mined; nothing changed
    NotNeeded,

    /// Re-dispatch failed; the record is now Failed
    Failed,
}

/// Re-dispatches stuck transactions at a bumped price
pub struct ReplacementEngine {
    registry: Arc<TxRegistry>,
    ledger: Arc<dyn LedgerClient>,
}

impl ReplacementEngine {
    /// Create a new replacement engine
    pub fn new(registry: Arc<TxRegistry>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self { registry, ledger }
    }

    /// Replace the transaction behind `handle`, invoked from the monitor's
    /// timeout path while the record is still in flight on that handle.
    pub(crate) async fn replace(&self, id: TxId, handle: &TxHandle) -> ReplaceOutcome {
        let status = match self.ledger.fetch_by_handle(handle).await {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(%id, %handle, "original not found on node, leaving record as is");
                return ReplaceOutcome::NotNeeded;
            }
            Err(e) => {
                warn!(%id, %handle, error = %e, "could not fetch original, leaving record as is");
                return ReplaceOutcome::NotNeeded;
            }
        };

        if status.mined.is_some() {
            debug!(%id, %handle, "already mined, replacement not needed");
            return ReplaceOutcome::NotNeeded;
        }

        let Some(record) = self.registry.get(id) else {
            return ReplaceOutcome::NotNeeded;
        };
        if record.state.is_terminal() || record.active_handle() != Some(handle) {
            return ReplaceOutcome::NotNeeded;
        }

        let new_price = bumped_price(status.price);
        info!(
            %id, %handle,
            old_price = status.price,
            new_price,
            sequence = status.sequence,
            "re-dispatching with bumped price"
        );

        match self
            .ledger
            .dispatch(
                &record.invocation,
                new_price,
                status.gas_limit,
                Some(status.sequence),
            )
            .await
        {
            Ok(new_handle) => {
                let attached = self
                    .registry
                    .apply(id, |rec| {
                        if rec.state.is_terminal() || rec.active_handle() != Some(handle) {
                            return Ok(Applied::Unchanged(false));
                        }
                        rec.replacement_handle = Some(new_handle.clone());
                        rec.replacements += 1;
                        Ok(Applied::Changed(true))
                    })
                    .unwrap_or(false);

                if attached {
                    info!(%id, %new_handle, "replacement dispatched");
                    ReplaceOutcome::Replaced(new_handle)
                } else {
                    ReplaceOutcome::NotNeeded
                }
            }
            Err(e) => {
                warn!(%id, %handle, error = %e, "replacement dispatch failed");
                let now = self.registry.now_ms();
                let failure = TxFailure::classify_dispatch(&e);
                let recorded = self.registry.apply(id, move |rec| {
                    if rec.state.is_terminal() {
                        return Ok(Applied::Unchanged(()));
                    }
                    rec.resolve_failed(failure, now)?;
                    Ok(Applied::Changed(()))
                });
                if let Err(e) = recorded {
                    warn!(%id, error = %e, "failed to record replacement failure");
                }
                ReplaceOutcome::Failed
            }
        }
    }
}

/// A 20% bump over the original price, rounded up so the result is always
/// at least 1.2x and never equal on small values.
pub(crate) fn bumped_price(original: u128) -> u128 {
    original.saturating_mul(6).div_ceil(5).max(1)
}
