//! Transaction submission
//!
//! Takes a Pending record through estimation, pricing and dispatch. Pricing
//! is multiplicative (price x multiplier, rounded, never zero) so a retry
//! under volatile network pricing scales with the market, and the gas
//! ceiling carries a 20% buffer over the estimate to absorb estimation
//! error without a resubmission. Dispatch failures are classified and end
//! the record; there is no retry at this layer.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, FailureKind, Result, TxFailure};
use crate::ledger::LedgerClient;
use crate::monitor::Monitor;
use crate::record::{TxId, TxRecord, TxState};
use crate::registry::{Applied, TxRegistry};

/// Turns Pending records into monitored in-flight transactions
pub struct Submitter {
    registry: Arc<TxRegistry>,
    ledger: Arc<dyn LedgerClient>,
    monitor: Arc<Monitor>,
}

impl Submitter {
    /// Create a new submitter
    pub fn new(
        registry: Arc<TxRegistry>,
        ledger: Arc<dyn LedgerClient>,
        monitor: Arc<Monitor>,
    ) -> Self {
        Self {
            registry,
            ledger,
            monitor,
        }
    }

    /// Submit a created transaction.
    ///
    /// Returns once dispatch has succeeded or failed; monitoring continues on
    /// its own task. Only an unknown id or a record that is not Pending error
    /// synchronously. Ledger failures land on the record and are published.
    pub async fn submit(&self, id: TxId) -> Result<TxRecord> {
        let record = self.registry.apply(id, |rec| {
            if rec.state != TxState::Pending {
                return Err(Error::NotSubmittable {
                    id,
                    state: rec.state,
                });
            }
            rec.transition(TxState::Broadcasting)?;
            Ok(Applied::Changed(rec.clone()))
        })?;
        info!(%id, method = %record.invocation.method, "broadcasting transaction");

        if !self.ledger.has_signer() {
            warn!(%id, "no signing capability available");
            return self.fail(
                id,
                TxFailure::new(FailureKind::NoSigner, "no signing capability available"),
            );
        }

        let invocation = record.invocation.clone();
        let settings = record.settings.clone();

        let estimate = match self.ledger.estimate_cost(&invocation).await {
            Ok(gas) => gas,
            Err(e) => {
                warn!(%id, error = %e, "cost estimation failed");
                return self.fail(
                    id,
                    TxFailure::new(FailureKind::EstimationFailed, e.to_string()),
                );
            }
        };

        let price = match self.ledger.current_price().await {
            Ok(price) => price,
            Err(e) => {
                warn!(%id, error = %e, "price fetch failed");
                return self.fail(id, TxFailure::classify_dispatch(&e));
            }
        };

        let adjusted = adjusted_price(price, settings.price_multiplier);
        let gas_limit = gas_ceiling(estimate, settings.gas_limit_fallback);

        match self
            .ledger
            .dispatch(&invocation, adjusted, gas_limit, None)
            .await
        {
            Ok(handle) => {
                let record = self.registry.apply(id, |rec| {
                    rec.handle = Some(handle.clone());
                    rec.transition(TxState::Mining)?;
                    Ok(Applied::Changed(rec.clone()))
                })?;
                info!(%id, %handle, price = adjusted, gas_limit, "transaction dispatched");

                let monitor = Arc::clone(&self.monitor);
                tokio::spawn(async move {
                    monitor.watch(id, handle).await;
                });

                Ok(record)
            }
            Err(e) => {
                warn!(%id, error = %e, "dispatch failed");
                self.fail(id, TxFailure::classify_dispatch(&e))
            }
        }
    }

    fn fail(&self, id: TxId, failure: TxFailure) -> Result<TxRecord> {
        let now = self.registry.now_ms();
        self.registry.apply(id, |rec| {
            rec.resolve_failed(failure, now)?;
            Ok(Applied::Changed(rec.clone()))
        })
    }
}

/// Network price times the configured multiplier, rounded, never zero.
///
/// The multiplier is applied in per-mille steps so prices beyond f64's
/// exact integer range do not lose precision.
pub(crate) fn adjusted_price(price: u128, multiplier: f64) -> u128 {
    let per_mille = (multiplier * 1000.0).round().max(0.0) as u128;
    let scaled = price.saturating_mul(per_mille).saturating_add(500) / 1000;
    scaled.max(1)
}

/// Gas ceiling: the estimate plus a 20% buffer, rounded up. Falls back to
/// the configured limit when the node produced no usable estimate.
pub(crate) fn gas_ceiling(estimate: u64, fallback: u64) -> u64 {
    if estimate == 0 {
        fallback
    } else {
        estimate.saturating_mul(6).div_ceil(5)
    }
}
