//! Finality watcher: waits until the destination bridge executes a proposal.
//!
//! The check itself is an explicit, side-effect free query
//! ([`check_proposal_executed`]); waiting is that check driven by a
//! [`PollSchedule`] with exponential, jittered and capped delays under a hard
//! deadline.

use std::time::Duration;

use alloy::sol_types::SolEvent;
use alloy_primitives::{Address, B256};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    client::LogSource,
    contracts::Bridge,
    error::{BindingError, Error, Result},
    metrics::HarnessMetrics,
};

/// Longest accepted wait for a single proposal.
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest accepted delay between two polls.
pub const MAX_POLL_DELAY_MS: u64 = 60 * 60 * 1_000;

/// Poll timing for the finality watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSchedule {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            timeout_secs: 120,
        }
    }
}

impl PollSchedule {
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay_ms == 0 || self.timeout_secs == 0 {
            return Err(Error::Configuration(
                "poll delay and timeout must be positive".to_string(),
            ));
        }
        if self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(Error::Configuration(format!(
                "finality timeout {}s exceeds {MAX_TIMEOUT_SECS}s",
                self.timeout_secs
            )));
        }
        if self.max_delay_ms > MAX_POLL_DELAY_MS {
            return Err(Error::Configuration(format!(
                "max poll delay {}ms exceeds {MAX_POLL_DELAY_MS}ms",
                self.max_delay_ms
            )));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(Error::Configuration(format!(
                "max poll delay {}ms is below the initial delay {}ms",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        Ok(())
    }

    /// Wait budget, clamped to [`MAX_TIMEOUT_SECS`] for schedules that skipped validation.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.min(MAX_TIMEOUT_SECS))
    }

    /// Delay before poll `attempt + 1`: doubled per attempt, capped, plus up to 25% jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay_ms.saturating_mul(1 << attempt.min(10));
        let capped_delay = base_delay.min(self.max_delay_ms);
        let jitter = rand::thread_rng().gen_range(0..=capped_delay / 4);
        Duration::from_millis(capped_delay.saturating_add(jitter))
    }
}

/// Identifies the proposal being waited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposalFilter {
    pub origin_domain_id: u8,
    /// Matches any nonce from the origin when `None`.
    pub deposit_nonce: Option<u64>,
}

impl ProposalFilter {
    pub const fn from_origin(origin_domain_id: u8) -> Self {
        Self {
            origin_domain_id,
            deposit_nonce: None,
        }
    }

    pub const fn with_nonce(mut self, deposit_nonce: u64) -> Self {
        self.deposit_nonce = Some(deposit_nonce);
        self
    }

    fn matches(&self, event: &Bridge::ProposalExecution) -> bool {
        event.originDomainID == self.origin_domain_id
            && self.deposit_nonce.is_none_or(|nonce| nonce == event.depositNonce)
    }
}

/// An executed proposal as observed on the destination chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposalExecuted {
    pub origin_domain_id: u8,
    pub deposit_nonce: u64,
    pub data_hash: B256,
    pub block_number: Option<u64>,
    pub tx_hash: Option<B256>,
}

/// Looks for a matching `ProposalExecution` event emitted by `bridge` since `from_block`.
pub async fn check_proposal_executed<L>(
    client: &L,
    bridge: Address,
    filter: ProposalFilter,
    from_block: u64,
) -> Result<Option<ProposalExecuted>>
where
    L: LogSource + ?Sized,
{
    let latest = client.latest_block().await.map_err(Error::Query)?;
    if latest < from_block {
        return Ok(None);
    }

    let logs = client
        .logs(bridge, Bridge::ProposalExecution::SIGNATURE_HASH, from_block, latest)
        .await
        .map_err(Error::Query)?;

    for log in logs {
        let decoded = log
            .log_decode::<Bridge::ProposalExecution>()
            .map_err(|e| Error::Query(BindingError::Decode(e.to_string())))?;
        let event = &decoded.inner.data;
        if filter.matches(event) {
            return Ok(Some(ProposalExecuted {
                origin_domain_id: event.originDomainID,
                deposit_nonce: event.depositNonce,
                data_hash: event.dataHash,
                block_number: decoded.block_number,
                tx_hash: decoded.transaction_hash,
            }));
        }
    }
    Ok(None)
}

/// A watch anchored after the destination block observed before the deposit was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposalWatch {
    bridge: Address,
    filter: ProposalFilter,
    from_block: u64,
}

impl ProposalWatch {
    /// Captures the destination's latest block. Call this before submitting the deposit.
    ///
    /// Only blocks after the captured one are searched, so proposals executed
    /// before the watch started are never matched.
    pub async fn start<L>(client: &L, bridge: Address, filter: ProposalFilter) -> Result<Self>
    where
        L: LogSource + ?Sized,
    {
        let latest = client.latest_block().await.map_err(Error::Query)?;
        let from_block = latest.saturating_add(1);
        Ok(Self {
            bridge,
            filter,
            from_block,
        })
    }

    /// Narrows the watch to the proposal of one deposit.
    pub const fn with_nonce(mut self, deposit_nonce: u64) -> Self {
        self.filter = self.filter.with_nonce(deposit_nonce);
        self
    }

    pub const fn filter(&self) -> ProposalFilter {
        self.filter
    }

    pub const fn from_block(&self) -> u64 {
        self.from_block
    }

    pub async fn check<L>(&self, client: &L) -> Result<Option<ProposalExecuted>>
    where
        L: LogSource + ?Sized,
    {
        check_proposal_executed(client, self.bridge, self.filter, self.from_block).await
    }

    /// Polls until the proposal is executed or the schedule's deadline passes.
    pub async fn wait<L>(&self, client: &L, schedule: &PollSchedule) -> Result<ProposalExecuted>
    where
        L: LogSource + ?Sized,
    {
        let started = Instant::now();
        let deadline = started.checked_add(schedule.timeout()).ok_or_else(|| {
            Error::Configuration(format!("finality timeout {:?} is out of range", schedule.timeout()))
        })?;
        let mut attempt = 0;

        loop {
            if let Some(executed) = self.check(client).await? {
                info!(
                    bridge = %self.bridge,
                    origin_domain_id = executed.origin_domain_id,
                    deposit_nonce = executed.deposit_nonce,
                    attempts = attempt + 1,
                    "proposal executed"
                );
                HarnessMetrics::default().record_proposal_executed();
                return Ok(executed);
            }

            let now = Instant::now();
            if now >= deadline {
                HarnessMetrics::default().record_finality_timeout();
                return Err(Error::FinalityTimeout {
                    bridge: self.bridge,
                    waited: now - started,
                });
            }

            let delay = schedule.delay(attempt).min(deadline - now);
            debug!(
                bridge = %self.bridge,
                attempt = attempt + 1,
                delay_ms = %delay.as_millis(),
                "proposal not executed yet"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Starts a watch at the current destination block and waits on it.
///
/// Proposals executed before this call are not observed; use
/// [`ProposalWatch::start`] before submitting when the relay may be fast.
pub async fn wait_for_proposal_executed<L>(
    client: &L,
    bridge: Address,
    filter: ProposalFilter,
    schedule: &PollSchedule,
) -> Result<ProposalExecuted>
where
    L: LogSource + ?Sized,
{
    ProposalWatch::start(client, bridge, filter)
        .await?
        .wait(client, schedule)
        .await
}
