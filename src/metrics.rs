// src/metrics.rs
//! Calculation counters. Compiled to no-ops unless the `metrics` feature is on.
use crate::error::Result;
#[cfg(feature = "metrics")]
use crate::error::RiskError;

#[cfg(feature = "metrics")]
mod counters {
    use once_cell::sync::Lazy;
    use prometheus::{register_int_counter_vec, IntCounterVec};

    // Registration only fails on a duplicate name; the counter is skipped then.
    pub static CALCULATIONS_TOTAL: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
        register_int_counter_vec!(
            "equation_risk_calculations_total", "Calculations completed", &["engine", "variant"] // funding|premium|depth
        ).ok()
    });

    pub static FAILURES_TOTAL: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
        register_int_counter_vec!(
            "equation_risk_failures_total", "Calculations rejected", &["engine", "kind"] // malformed|arithmetic|input|config
        ).ok()
    });
}

#[cfg(feature = "metrics")]
pub use counters::{CALCULATIONS_TOTAL, FAILURES_TOTAL};

/// Counts one finished calculation, successful or not.
#[allow(unused_variables)]
pub(crate) fn observe<T>(engine: &'static str, variant: &'static str, result: &Result<T>) {
    #[cfg(feature = "metrics")]
    record(engine, variant, result.as_ref().err());
}

#[cfg(feature = "metrics")]
fn record(engine: &'static str, variant: &'static str, err: Option<&RiskError>) {
    let (counter, labels) = match err {
        None => (CALCULATIONS_TOTAL.as_ref(), [engine, variant]),
        Some(e) => (FAILURES_TOTAL.as_ref(), [engine, e.kind()]),
    };
    if let Some(c) = counter {
        c.with_label_values(&labels).inc();
    }
}
