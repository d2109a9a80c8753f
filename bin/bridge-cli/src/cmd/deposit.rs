use std::{path::PathBuf, sync::Arc};

use alloy_primitives::{Address, B256, Bytes, U256};
use bridge_e2e::{
    BridgeEnvironment, DepositIntent, DepositPayload, HarnessConfig, Priority, StaticGasPricer,
    client::{ContractWriter, TransactionLookup},
    deposit::deposit_nonce,
    evm::ContractArtifacts,
    fixtures::TestKeyRing,
    scenario::{RelayScenario, TransferReport},
    submit_deposit,
};
use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};

use super::{Chain, connect};

#[derive(Parser, Debug)]
pub(crate) struct DepositArgs {
    /// Path to the harness config file
    #[arg(short, long, default_value = "bridge.toml")]
    config: PathBuf,

    /// Environment written by `bridge deploy`
    #[arg(short, long, default_value = "bridge-env.json")]
    env: PathBuf,

    /// Receiving address on the destination chain. Defaults to the development recipient.
    #[arg(long)]
    recipient: Option<Address>,

    /// Gas price tier of the deposit transaction (slow, medium, fast)
    #[arg(long, default_value_t = Priority::Slow)]
    priority: Priority,

    /// Wait for the destination bridge to execute the proposal and verify its effect
    #[arg(long)]
    wait: bool,

    #[command(subcommand)]
    asset: AssetArgs,
}

#[derive(Subcommand, Debug)]
enum AssetArgs {
    /// Fungible tokens, in the token's smallest unit
    Fungible {
        #[arg(long)]
        amount: U256,
    },

    /// One non-fungible token. With `--wait` the token is minted to the sender first.
    NonFungible {
        #[arg(long)]
        token_id: U256,

        #[arg(long, default_value = "")]
        metadata: String,
    },

    /// A 32-byte asset hash recorded by the destination asset store
    Generic {
        #[arg(long)]
        asset: B256,
    },
}

impl AssetArgs {
    fn payload(&self) -> DepositPayload {
        match self {
            Self::Fungible { amount } => DepositPayload::Fungible { amount: *amount },
            Self::NonFungible { token_id, metadata } => DepositPayload::NonFungible {
                token_id: *token_id,
                metadata: Bytes::copy_from_slice(metadata.as_bytes()),
            },
            Self::Generic { asset } => DepositPayload::Generic {
                payload: Bytes::copy_from_slice(asset.as_slice()),
            },
        }
    }
}

impl DepositArgs {
    pub(crate) async fn run(self) -> Result<()> {
        let config = HarnessConfig::load(&self.config)?;
        let environment = BridgeEnvironment::load(&self.env)?;
        let artifacts = Arc::new(
            ContractArtifacts::load(&config.artifacts_dir)
                .wrap_err("failed to load contract artifacts")?,
        );
        let pricer = StaticGasPricer::new(config.gas);
        let recipient = match self.recipient {
            Some(recipient) => recipient,
            None => TestKeyRing::anvil()?.recipient(),
        };

        let (source, destination) = tokio::try_join!(
            connect(&config.source, pricer, artifacts.clone()),
            connect(&config.destination, pricer, artifacts),
        )?;

        if !self.wait {
            return self
                .submit(&config, &environment, &source, &pricer, recipient)
                .await;
        }

        let scenario = RelayScenario::new(
            &source,
            &environment.source,
            &destination,
            &environment.destination,
            &pricer,
        )
        .with_schedule(config.finality)
        .with_settings(config.deposit.clone());

        let report = match self.asset {
            AssetArgs::Fungible { amount } => {
                scenario
                    .fungible_transfer(amount, recipient, self.priority)
                    .await?
            }
            AssetArgs::NonFungible { token_id, metadata } => {
                scenario
                    .non_fungible_transfer(token_id, &metadata, recipient, self.priority)
                    .await?
            }
            AssetArgs::Generic { asset } => scenario.generic_transfer(asset, self.priority).await?,
        };
        print_report(&report);
        Ok(())
    }

    /// Submits the deposit and waits only for its inclusion on the source chain.
    async fn submit(
        &self,
        config: &HarnessConfig,
        environment: &BridgeEnvironment,
        source: &Chain,
        pricer: &StaticGasPricer,
        recipient: Address,
    ) -> Result<()> {
        let intent = DepositIntent::new(
            &environment.source,
            environment.destination.domain_id,
            recipient,
            self.asset.payload(),
        )
        .with_settings(&config.deposit)
        .with_priority(self.priority)
        .with_fee_quote(environment.source.fee_handler.kind, &config.deposit)?;

        let tx_hash = submit_deposit(source, &environment.source, intent).await?;
        source
            .confirm(tx_hash)
            .await
            .wrap_err_with(|| format!("deposit {tx_hash} failed"))?;

        let nonce = deposit_nonce(source, environment.source.bridge, tx_hash).await?;
        let gas_price = source.transaction_gas_price(tx_hash).await?;
        println!("Deposit included: {tx_hash}");
        println!("  Deposit nonce:    {nonce}");
        println!(
            "  Gas price:        {} (expected {} for {})",
            gas_price.map_or_else(|| "unknown".to_string(), |price| price.to_string()),
            pricer.tiers().wei(self.priority),
            self.priority
        );
        Ok(())
    }
}

fn print_report(report: &TransferReport) {
    println!("Deposit relayed: {}", report.tx_hash);
    if let Some(gas_price) = report.gas_price {
        println!("  Gas price:        {gas_price}");
    }
    println!("  Origin domain:    {}", report.proposal.origin_domain_id);
    println!("  Deposit nonce:    {}", report.proposal.deposit_nonce);
    println!("  Data hash:        {}", report.proposal.data_hash);
    if let Some(block) = report.proposal.block_number {
        println!("  Executed in:      block {block}");
    }
}
