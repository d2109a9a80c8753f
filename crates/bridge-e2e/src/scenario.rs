//! End-to-end transfer scenarios over a provisioned environment.
//!
//! Each scenario checks the pre-relay state, submits one deposit on the source
//! chain, waits for the destination bridge to execute the proposal and then
//! asserts the asset-specific effect.

use alloy_primitives::{Address, B256, Bytes, U256};
use tracing::info;

use crate::{
    client::{ContractReader, ContractWriter, LogSource, TransactOptions, TransactionLookup},
    config::{ChainEnvironmentConfig, DepositSettings},
    contracts::ContractCall,
    deposit::{DepositIntent, DepositPayload, deposit_nonce, submit_deposit},
    error::{Error, Result},
    finality::{PollSchedule, ProposalExecuted, ProposalFilter, ProposalWatch},
    gas::{GasPricer, Priority},
    verify::{
        FungibleSnapshot, FungibleTransfer, assert_not_stored, assert_token_absent,
        verify_fungible, verify_gas_tier, verify_generic, verify_non_fungible,
    },
};

/// Outcome of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    pub tx_hash: B256,
    /// Gas price of the deposit transaction as recorded by the source chain.
    pub gas_price: Option<u128>,
    pub proposal: ProposalExecuted,
}

/// Source and destination of a relay, with the knobs shared by every transfer.
///
/// The source client signs deposits and must not be used by another scenario
/// concurrently.
pub struct RelayScenario<'a, S: ?Sized, D: ?Sized, G: ?Sized> {
    source: &'a S,
    source_env: &'a ChainEnvironmentConfig,
    destination: &'a D,
    destination_env: &'a ChainEnvironmentConfig,
    pricer: &'a G,
    schedule: PollSchedule,
    settings: DepositSettings,
}

impl<'a, S, D, G> RelayScenario<'a, S, D, G>
where
    S: ContractWriter + ContractReader + TransactionLookup + ?Sized,
    D: ContractReader + LogSource + ?Sized,
    G: GasPricer + ?Sized,
{
    pub fn new(
        source: &'a S,
        source_env: &'a ChainEnvironmentConfig,
        destination: &'a D,
        destination_env: &'a ChainEnvironmentConfig,
        pricer: &'a G,
    ) -> Self {
        Self {
            source,
            source_env,
            destination,
            destination_env,
            pricer,
            schedule: PollSchedule::default(),
            settings: DepositSettings::default(),
        }
    }

    pub const fn with_schedule(mut self, schedule: PollSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_settings(mut self, settings: DepositSettings) -> Self {
        self.settings = settings;
        self
    }

    async fn watch(&self) -> Result<ProposalWatch> {
        ProposalWatch::start(
            self.destination,
            self.destination_env.bridge,
            ProposalFilter::from_origin(self.source_env.domain_id),
        )
        .await
    }

    fn intent(
        &self,
        recipient: Address,
        payload: DepositPayload,
        priority: Priority,
    ) -> Result<DepositIntent> {
        DepositIntent::new(
            self.source_env,
            self.destination_env.domain_id,
            recipient,
            payload,
        )
        .with_settings(&self.settings)
        .with_priority(priority)
        .with_fee_quote(self.source_env.fee_handler.kind, &self.settings)
    }

    /// Submits `intent`, waits for its inclusion on the source and for the
    /// proposal carrying its deposit nonce on the destination.
    async fn relay(&self, watch: ProposalWatch, intent: DepositIntent) -> Result<TransferReport> {
        let tx_hash = submit_deposit(self.source, self.source_env, intent).await?;
        self.source
            .confirm(tx_hash)
            .await
            .map_err(Error::Submission)?;

        let nonce = deposit_nonce(self.source, self.source_env.bridge, tx_hash).await?;
        let proposal = watch
            .with_nonce(nonce)
            .wait(self.destination, &self.schedule)
            .await?;
        let gas_price = self
            .source
            .transaction_gas_price(tx_hash)
            .await
            .map_err(Error::Query)?;

        Ok(TransferReport {
            tx_hash,
            gas_price,
            proposal,
        })
    }

    /// Moves `amount` fungible tokens from the source signer to `recipient`.
    pub async fn fungible_transfer(
        &self,
        amount: U256,
        recipient: Address,
        priority: Priority,
    ) -> Result<TransferReport> {
        let transfer = FungibleTransfer::new(
            self.source_env,
            self.destination_env,
            self.source.sender(),
            recipient,
        );
        let before = FungibleSnapshot::take(self.source, self.destination, &transfer).await?;
        let watch = self.watch().await?;

        let intent = self.intent(recipient, DepositPayload::Fungible { amount }, priority)?;
        let decimals = intent.decimals;
        let report = self.relay(watch, intent).await?;

        verify_fungible(
            self.source,
            self.destination,
            &transfer,
            before,
            amount,
            decimals,
        )
        .await?;
        verify_gas_tier(self.source, self.pricer, report.tx_hash, priority).await?;

        info!(%amount, %recipient, %priority, tx_hash = %report.tx_hash, "fungible transfer verified");
        Ok(report)
    }

    /// Mints `token_id` with `metadata` as its token URI to the source signer
    /// and moves it to `recipient`.
    pub async fn non_fungible_transfer(
        &self,
        token_id: U256,
        metadata: &str,
        recipient: Address,
        priority: Priority,
    ) -> Result<TransferReport> {
        let source_token = self.source_env.non_fungible.contract;
        let destination_token = self.destination_env.non_fungible.contract;

        let mint = ContractCall::Erc721Mint {
            to: self.source.sender(),
            token_id,
            metadata: metadata.to_string(),
        };
        let approve = ContractCall::Erc721Approve {
            to: self.source_env.non_fungible.handler,
            token_id,
        };
        for call in [mint, approve] {
            self.source
                .send_and_confirm(source_token, call, TransactOptions::default())
                .await
                .map_err(Error::Submission)?;
        }

        assert_token_absent(self.destination, destination_token, token_id).await?;
        let watch = self.watch().await?;

        let payload = DepositPayload::NonFungible {
            token_id,
            metadata: Bytes::copy_from_slice(metadata.as_bytes()),
        };
        let intent = self.intent(recipient, payload, priority)?;
        let report = self.relay(watch, intent).await?;

        verify_non_fungible(
            self.source,
            source_token,
            self.destination,
            destination_token,
            token_id,
            recipient,
        )
        .await?;
        verify_gas_tier(self.source, self.pricer, report.tx_hash, priority).await?;

        info!(%token_id, %recipient, %priority, tx_hash = %report.tx_hash, "non-fungible transfer verified");
        Ok(report)
    }

    /// Stores `asset` in the destination asset store through a generic deposit.
    pub async fn generic_transfer(&self, asset: B256, priority: Priority) -> Result<TransferReport> {
        let asset_store = self.destination_env.asset_store();
        assert_not_stored(self.destination, asset_store, asset).await?;
        let watch = self.watch().await?;

        let payload = DepositPayload::Generic {
            payload: Bytes::copy_from_slice(asset.as_slice()),
        };
        let intent = self.intent(self.source.sender(), payload, priority)?;
        let report = self.relay(watch, intent).await?;

        verify_generic(self.destination, asset_store, asset).await?;
        verify_gas_tier(self.source, self.pricer, report.tx_hash, priority).await?;

        info!(%asset, %priority, tx_hash = %report.tx_hash, "generic transfer verified");
        Ok(report)
    }
}
