//! Manager configuration
//!
//! `ManagerConfig` carries registry-wide defaults; `TxOptions` lets a caller
//! override them for a single transaction at creation time. The two are
//! resolved into a `TxSettings` that is frozen onto the record, so later
//! configuration changes never affect in-flight transactions.

use std::time::Duration;

use serde::Serialize;

/// Registry-wide configuration defaults
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Confirmations required before a transaction is considered final
    pub required_confirmations: u32,

    /// Gas limit used when the node returns no usable estimate
    pub gas_limit_fallback: u64,

    /// Multiplier applied to the current network price at submission
    pub price_multiplier: f64,

    /// How long a dispatched transaction may sit without a terminal status
    pub timeout: Duration,

    /// Whether stuck transactions are re-dispatched with a bumped price
    pub replacement_enabled: bool,

    /// Maximum replacement chain depth before giving up
    pub max_replacements: u32,

    /// Event channel capacity
    pub event_capacity: usize,

    /// Pause before re-checking the node after a broken confirmation wait
    pub reevaluate_backoff: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            required_confirmations: 2,
            gas_limit_fallback: 500_000,
            price_multiplier: 1.1,
            timeout: Duration::from_millis(300_000),
            replacement_enabled: true,
            max_replacements: 3,
            event_capacity: 256,
            reevaluate_backoff: Duration::from_secs(1),
        }
    }
}

impl ManagerConfig {
    /// Resolve per-transaction settings from these defaults and the
    /// caller-supplied overrides.
    pub fn resolve(&self, options: &TxOptions) -> TxSettings {
        TxSettings {
            required_confirmations: options
                .required_confirmations
                .unwrap_or(self.required_confirmations),
            gas_limit_fallback: options.gas_limit.unwrap_or(self.gas_limit_fallback),
            price_multiplier: options.price_multiplier.unwrap_or(self.price_multiplier),
            timeout: options.timeout.unwrap_or(self.timeout),
            replacement_enabled: options
                .replacement_enabled
                .unwrap_or(self.replacement_enabled),
            max_replacements: options.max_replacements.unwrap_or(self.max_replacements),
        }
    }
}

/// Per-transaction overrides, applied at creation
#[derive(Debug, Clone, Default)]
pub struct TxOptions {
    /// Override the required confirmation count
    pub required_confirmations: Option<u32>,

    /// Override the fallback gas limit
    pub gas_limit: Option<u64>,

    /// Override the submission price multiplier
    pub price_multiplier: Option<f64>,

    /// Override the stuck-transaction timeout
    pub timeout: Option<Duration>,

    /// Override whether replacement is attempted on timeout
    pub replacement_enabled: Option<bool>,

    /// Override the replacement depth cap
    pub max_replacements: Option<u32>,
}

/// Settings frozen onto a record when it is created
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TxSettings {
    /// Confirmations required before the transaction is final
    pub required_confirmations: u32,

    /// Gas limit used when no usable estimate is available
    pub gas_limit_fallback: u64,

    /// Multiplier applied to the network price at submission
    pub price_multiplier: f64,

    /// Stuck-transaction timeout
    pub timeout: Duration,

    /// Whether timeout triggers a fee-bumped replacement
    pub replacement_enabled: bool,

    /// Maximum replacement chain depth
    pub max_replacements: u32,
}
