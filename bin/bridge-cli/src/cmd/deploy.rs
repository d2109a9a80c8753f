use std::{path::PathBuf, sync::Arc};

use alloy_primitives::U256;
use bridge_e2e::{
    BridgeEnvironment, HarnessConfig, ProvisionOptions, StaticGasPricer, client::ContractWriter,
    evm::ContractArtifacts, provision,
};
use clap::Parser;
use eyre::{Result, WrapErr};
use tracing::info;

use super::connect;

#[derive(Parser, Debug)]
pub(crate) struct DeployArgs {
    /// Path to the harness config file
    #[arg(short, long, default_value = "bridge.toml")]
    config: PathBuf,

    /// Where to write the provisioned environment
    #[arg(short, long, default_value = "bridge-env.json")]
    out: PathBuf,

    /// Flat deposit fee in wei
    #[arg(long, default_value_t = U256::ZERO)]
    fee: U256,

    /// Fungible tokens minted to the deployer on each chain, in wei
    #[arg(long)]
    initial_mint: Option<U256>,
}

impl DeployArgs {
    pub(crate) async fn run(self) -> Result<()> {
        let config = HarnessConfig::load(&self.config)?;
        let artifacts = Arc::new(
            ContractArtifacts::load(&config.artifacts_dir)
                .wrap_err("failed to load contract artifacts")?,
        );
        let pricer = StaticGasPricer::new(config.gas);

        let (source, destination) = tokio::try_join!(
            connect(&config.source, pricer, artifacts.clone()),
            connect(&config.destination, pricer, artifacts),
        )?;

        let mut options = ProvisionOptions {
            fee: self.fee,
            ..Default::default()
        };
        if let Some(initial_mint) = self.initial_mint {
            options.initial_mint = initial_mint;
        }

        let (source_env, destination_env) = tokio::try_join!(
            provision(&source, config.source.domain_id, source.sender(), &options),
            provision(
                &destination,
                config.destination.domain_id,
                destination.sender(),
                &options
            ),
        )?;

        let environment = BridgeEnvironment {
            source: source_env,
            destination: destination_env,
        };
        environment.save(&self.out)?;

        for (name, env) in [
            (&config.source.name, &environment.source),
            (&config.destination.name, &environment.destination),
        ] {
            info!(
                chain = %name,
                domain_id = env.domain_id,
                bridge = %env.bridge,
                fee_handler = %env.fee_handler.address,
                erc20 = %env.fungible.contract,
                erc721 = %env.non_fungible.contract,
                asset_store = %env.generic.contract,
                "environment provisioned"
            );
        }
        println!("{}", serde_json::to_string_pretty(&environment)?);
        println!("Environment written to {}", self.out.display());
        Ok(())
    }
}
