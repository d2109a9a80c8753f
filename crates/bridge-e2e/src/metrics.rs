//! Harness counters, reported through the global `metrics` recorder.

use metrics::{Counter, counter};

/// Harness metrics
#[derive(Clone)]
pub struct HarnessMetrics {
    /// Number of contracts deployed while provisioning
    pub deployments: Counter,

    /// Number of deposits broadcast on a source chain
    pub deposits_submitted: Counter,

    /// Number of proposals observed as executed on a destination chain
    pub proposals_executed: Counter,

    /// Number of finality waits that hit their deadline
    pub finality_timeouts: Counter,

    /// Number of failed post-relay assertions
    pub verification_failures: Counter,
}

impl Default for HarnessMetrics {
    fn default() -> Self {
        Self {
            deployments: counter!("bridge_e2e.deployments"),
            deposits_submitted: counter!("bridge_e2e.deposits_submitted"),
            proposals_executed: counter!("bridge_e2e.proposals_executed"),
            finality_timeouts: counter!("bridge_e2e.finality_timeouts"),
            verification_failures: counter!("bridge_e2e.verification_failures"),
        }
    }
}

impl HarnessMetrics {
    #[inline]
    pub fn record_deployment(&self) {
        self.deployments.increment(1);
    }

    #[inline]
    pub fn record_deposit_submitted(&self) {
        self.deposits_submitted.increment(1);
    }

    #[inline]
    pub fn record_proposal_executed(&self) {
        self.proposals_executed.increment(1);
    }

    #[inline]
    pub fn record_finality_timeout(&self) {
        self.finality_timeouts.increment(1);
    }

    #[inline]
    pub fn record_verification_failure(&self) {
        self.verification_failures.increment(1);
    }
}
