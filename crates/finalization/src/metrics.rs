//! # Finalization Metrics
//!
//! Prometheus metrics for monitoring the finalization state machine.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! ffg-finalization = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `finalization_current_epoch` - Gauge of the latest initialized epoch
//! - `finalization_current_dynasty` - Gauge of the latest dynasty
//! - `finalization_last_justified_epoch` - Gauge of the latest justified epoch
//! - `finalization_last_finalized_epoch` - Gauge of the latest finalized epoch
//! - `finalization_commits_processed_total` - Counter of applied commits (by kind)
//! - `finalization_commits_rejected_total` - Counter of rejected commits (by reason)
//! - `finalization_slashings_total` - Counter of slashed validators
//! - `finalization_state_mismatches_total` - Counter of commit/full-block disagreements
//! - `finalization_repository_size` - Gauge of tracked block positions
//!
//! Transitions run once per derivation, so a block derived from its commits
//! and again from the full block is counted twice.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref CURRENT_EPOCH: IntGauge = register_int_gauge!(
        "finalization_current_epoch",
        "Latest initialized epoch"
    )
    .expect("Failed to create CURRENT_EPOCH metric");

    pub static ref CURRENT_DYNASTY: IntGauge = register_int_gauge!(
        "finalization_current_dynasty",
        "Latest dynasty"
    )
    .expect("Failed to create CURRENT_DYNASTY metric");

    pub static ref LAST_JUSTIFIED_EPOCH: IntGauge = register_int_gauge!(
        "finalization_last_justified_epoch",
        "Latest justified epoch"
    )
    .expect("Failed to create LAST_JUSTIFIED_EPOCH metric");

    pub static ref LAST_FINALIZED_EPOCH: IntGauge = register_int_gauge!(
        "finalization_last_finalized_epoch",
        "Latest finalized epoch"
    )
    .expect("Failed to create LAST_FINALIZED_EPOCH metric");

    /// Applied commits, labeled by kind
    pub static ref COMMITS_PROCESSED: IntCounterVec = register_int_counter_vec!(
        "finalization_commits_processed_total",
        "Total number of finalizer commits applied",
        &["kind"]
    )
    .expect("Failed to create COMMITS_PROCESSED metric");

    /// Rejected commits, labeled by reject reason
    pub static ref COMMITS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "finalization_commits_rejected_total",
        "Total number of finalizer commits rejected",
        &["reason"]
    )
    .expect("Failed to create COMMITS_REJECTED metric");

    pub static ref SLASHINGS: IntCounter = register_int_counter!(
        "finalization_slashings_total",
        "Total number of validators slashed"
    )
    .expect("Failed to create SLASHINGS metric");

    pub static ref STATE_MISMATCHES: IntCounter = register_int_counter!(
        "finalization_state_mismatches_total",
        "States derived from commits that differ from the full block"
    )
    .expect("Failed to create STATE_MISMATCHES metric");

    pub static ref REPOSITORY_SIZE: IntGauge = register_int_gauge!(
        "finalization_repository_size",
        "Number of block positions with a finalization state"
    )
    .expect("Failed to create REPOSITORY_SIZE metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_epoch(epoch: u32) {
    CURRENT_EPOCH.set(epoch as i64);
}

#[cfg(feature = "metrics")]
pub fn record_dynasty(dynasty: u32) {
    CURRENT_DYNASTY.set(dynasty as i64);
}

#[cfg(feature = "metrics")]
pub fn record_justified(epoch: u32) {
    LAST_JUSTIFIED_EPOCH.set(epoch as i64);
}

#[cfg(feature = "metrics")]
pub fn record_finalized(epoch: u32) {
    LAST_FINALIZED_EPOCH.set(epoch as i64);
}

/// Record an applied commit of `kind`
#[cfg(feature = "metrics")]
pub fn record_commit_processed(kind: &str) {
    COMMITS_PROCESSED.with_label_values(&[kind]).inc();
}

/// Record a rejected commit with its reject reason
#[cfg(feature = "metrics")]
pub fn record_commit_rejected(reason: &str) {
    COMMITS_REJECTED.with_label_values(&[reason]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_slash() {
    SLASHINGS.inc();
}

#[cfg(feature = "metrics")]
pub fn record_state_mismatch() {
    STATE_MISMATCHES.inc();
}

#[cfg(feature = "metrics")]
pub fn set_repository_size(size: usize) {
    REPOSITORY_SIZE.set(size as i64);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_epoch(_epoch: u32) {}

#[cfg(not(feature = "metrics"))]
pub fn record_dynasty(_dynasty: u32) {}

#[cfg(not(feature = "metrics"))]
pub fn record_justified(_epoch: u32) {}

#[cfg(not(feature = "metrics"))]
pub fn record_finalized(_epoch: u32) {}

#[cfg(not(feature = "metrics"))]
pub fn record_commit_processed(_kind: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_commit_rejected(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_slash() {}

#[cfg(not(feature = "metrics"))]
pub fn record_state_mismatch() {}

#[cfg(not(feature = "metrics"))]
pub fn set_repository_size(_size: usize) {}
