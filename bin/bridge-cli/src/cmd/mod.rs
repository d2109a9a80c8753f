use std::sync::Arc;

use alloy::providers::DynProvider;
use bridge_e2e::{
    StaticGasPricer,
    config::ChainEndpoint,
    evm::{ContractArtifacts, EvmBindings},
    fixtures::TestKeyRing,
};
use eyre::WrapErr;

pub(crate) mod deploy;
pub(crate) mod deposit;

pub(crate) type Chain = EvmBindings<DynProvider, StaticGasPricer>;

/// Connects to `endpoint`, signing with its configured key or the development
/// deployer key when none is set.
pub(crate) async fn connect(
    endpoint: &ChainEndpoint,
    pricer: StaticGasPricer,
    artifacts: Arc<ContractArtifacts>,
) -> eyre::Result<Chain> {
    let signer = match endpoint.signer()? {
        Some(signer) => signer,
        None => TestKeyRing::anvil()?.deployer().clone(),
    };
    EvmBindings::connect(&endpoint.rpc_url, signer, pricer, artifacts)
        .await
        .wrap_err_with(|| format!("failed to connect to {} at {}", endpoint.name, endpoint.rpc_url))
}
