//! Optional counters emitted when the `metrics` feature is enabled.
//!
//! Metric names are stable for downstream dashboards:
//!
//! - `detector_waves_total`
//! - `detector_propagations_total`
//! - `detector_verdicts_total` (labelled by `outcome`)
//! - `harness_dirty_messages_total`

#[cfg(feature = "metrics")]
pub(crate) fn record_wave() {
    metrics::counter!("detector_waves_total").increment(1);
}

#[cfg(not(feature = "metrics"))]
pub(crate) const fn record_wave() {}

#[cfg(feature = "metrics")]
pub(crate) fn record_propagations(count: usize) {
    metrics::counter!("detector_propagations_total").increment(count as u64);
}

#[cfg(not(feature = "metrics"))]
pub(crate) const fn record_propagations(_count: usize) {}

#[cfg(feature = "metrics")]
pub(crate) fn record_verdict(outcome: &'static str) {
    metrics::counter!("detector_verdicts_total", "outcome" => outcome).increment(1);
}

#[cfg(not(feature = "metrics"))]
pub(crate) const fn record_verdict(_outcome: &'static str) {}

#[cfg(feature = "metrics")]
pub(crate) fn record_dirty_message() {
    metrics::counter!("harness_dirty_messages_total").increment(1);
}

#[cfg(not(feature = "metrics"))]
pub(crate) const fn record_dirty_message() {}
