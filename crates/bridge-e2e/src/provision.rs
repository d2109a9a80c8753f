//! Environment provisioner: deploys and wires every contract of one chain.
//!
//! Deployment is strictly ordered by data dependency. The bridge comes first
//! because everything else is bound to its address, the fee handler follows,
//! then the three asset classes are deployed concurrently and registered on the
//! bridge one after another. Any failure aborts immediately; contracts that
//! were already deployed are left in place.

use std::fmt;

use alloy_primitives::{Address, B256, U256, address};
use tracing::debug;

use crate::{
    client::{ContractWriter, TransactOptions},
    config::{AssetDeployment, ChainEnvironmentConfig, FeeHandlerConfig, FeeHandlerKind},
    contracts::{ASSET_STORE_SELECTOR, ContractCall, DeployRequest, minter_role},
    error::{Error, Result},
    metrics::HarnessMetrics,
    resource::{AssetClass, resource_id},
};

/// Gas limit for administrative bridge calls.
pub const ADMIN_GAS_LIMIT: u64 = 2_000_000;

/// Address recorded as the bridge's MPC signer when keygen is ended.
pub const DEFAULT_MPC_ADDRESS: Address = address!("0x1c5541A79AcC662ab2D2647F3B141a3B7Cdb2Ae4");

/// A single provisioning action, reported when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisionStep {
    DeployBridge,
    EndKeygen,
    DeployFeeHandler,
    SetFeeHandler,
    ChangeFee,
    DeployAsset(AssetClass),
    DeployHandler(AssetClass),
    RegisterResource(AssetClass),
    MintInitialSupply,
    ApproveHandler,
    GrantMinterRole(AssetClass),
    SetBurnable(AssetClass),
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeployBridge => f.write_str("deploy bridge"),
            Self::EndKeygen => f.write_str("end keygen"),
            Self::DeployFeeHandler => f.write_str("deploy fee handler"),
            Self::SetFeeHandler => f.write_str("set fee handler"),
            Self::ChangeFee => f.write_str("change fee"),
            Self::DeployAsset(AssetClass::Generic) => f.write_str("deploy asset store"),
            Self::DeployAsset(class) => write!(f, "deploy {class} token"),
            Self::DeployHandler(class) => write!(f, "deploy {class} handler"),
            Self::RegisterResource(class) => write!(f, "register {class} resource"),
            Self::MintInitialSupply => f.write_str("mint initial supply"),
            Self::ApproveHandler => f.write_str("approve fungible handler"),
            Self::GrantMinterRole(class) => write!(f, "grant {class} minter role"),
            Self::SetBurnable(class) => write!(f, "set {class} burnable"),
        }
    }
}

/// Inputs of a provisioning run besides the chain itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOptions {
    pub mpc_address: Address,
    /// Fungible tokens minted to the mint recipient and approved to the handler.
    pub initial_mint: U256,
    /// Flat deposit fee. Left at the handler's default when zero.
    pub fee: U256,
    pub erc20_name: String,
    pub erc20_symbol: String,
    pub erc721_name: String,
    pub erc721_symbol: String,
    pub erc721_base_uri: String,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            mpc_address: DEFAULT_MPC_ADDRESS,
            initial_mint: U256::from(10u64) * U256::from(10u64).pow(U256::from(18u64)),
            fee: U256::ZERO,
            erc20_name: "Test".to_string(),
            erc20_symbol: "TST".to_string(),
            erc721_name: "TestERC721".to_string(),
            erc721_symbol: "TST721".to_string(),
            erc721_base_uri: String::new(),
        }
    }
}

fn admin() -> TransactOptions {
    TransactOptions::default().with_gas_limit(ADMIN_GAS_LIMIT)
}

async fn deploy<W>(client: &W, step: ProvisionStep, request: DeployRequest) -> Result<Address>
where
    W: ContractWriter + ?Sized,
{
    let address = client
        .deploy(request, TransactOptions::default())
        .await
        .map_err(Error::deployment(step))?;
    HarnessMetrics::default().record_deployment();
    Ok(address)
}

async fn transact<W>(
    client: &W,
    step: ProvisionStep,
    to: Address,
    call: ContractCall,
    options: TransactOptions,
) -> Result<B256>
where
    W: ContractWriter + ?Sized,
{
    let tx_hash = client
        .send_and_confirm(to, call, options)
        .await
        .map_err(Error::deployment(step))?;
    debug!(%step, %to, %tx_hash, "provisioning transaction confirmed");
    Ok(tx_hash)
}

/// Deploys the handler of `class`, bound to `bridge`.
///
/// Fails with [`Error::MissingBridgeAddress`] before sending anything when the
/// bridge address is zero.
pub async fn deploy_handler<W>(client: &W, class: AssetClass, bridge: Address) -> Result<Address>
where
    W: ContractWriter + ?Sized,
{
    if bridge.is_zero() {
        return Err(Error::MissingBridgeAddress { class });
    }
    let request = match class {
        AssetClass::Fungible => DeployRequest::Erc20Handler { bridge },
        AssetClass::NonFungible => DeployRequest::Erc721Handler { bridge },
        AssetClass::Generic => DeployRequest::GenericHandler { bridge },
    };
    deploy(client, ProvisionStep::DeployHandler(class), request).await
}

/// Deploys the backing contract of `class` followed by its handler.
async fn deploy_asset<W>(
    client: &W,
    class: AssetClass,
    bridge: Address,
    options: &ProvisionOptions,
) -> Result<AssetDeployment>
where
    W: ContractWriter + ?Sized,
{
    let request = match class {
        AssetClass::Fungible => DeployRequest::Erc20 {
            name: options.erc20_name.clone(),
            symbol: options.erc20_symbol.clone(),
        },
        AssetClass::NonFungible => DeployRequest::Erc721 {
            name: options.erc721_name.clone(),
            symbol: options.erc721_symbol.clone(),
            base_uri: options.erc721_base_uri.clone(),
        },
        AssetClass::Generic => DeployRequest::AssetStore,
    };
    let contract = deploy(client, ProvisionStep::DeployAsset(class), request).await?;
    let handler = deploy_handler(client, class, bridge).await?;

    debug!(%class, %contract, %handler, "asset contracts deployed");
    Ok(AssetDeployment {
        contract,
        handler,
        resource_id: resource_id(class),
    })
}

async fn register_fungible<W>(
    client: &W,
    bridge: Address,
    asset: &AssetDeployment,
    mint_recipient: Address,
    options: &ProvisionOptions,
) -> Result<()>
where
    W: ContractWriter + ?Sized,
{
    let class = AssetClass::Fungible;
    let AssetDeployment {
        contract: token,
        handler,
        resource_id,
    } = *asset;

    transact(
        client,
        ProvisionStep::RegisterResource(class),
        bridge,
        ContractCall::SetResource {
            handler,
            resource_id,
            token,
        },
        admin(),
    )
    .await?;
    transact(
        client,
        ProvisionStep::MintInitialSupply,
        token,
        ContractCall::Erc20Mint {
            to: mint_recipient,
            amount: options.initial_mint,
        },
        TransactOptions::default(),
    )
    .await?;
    transact(
        client,
        ProvisionStep::ApproveHandler,
        token,
        ContractCall::Erc20Approve {
            spender: handler,
            amount: options.initial_mint,
        },
        TransactOptions::default(),
    )
    .await?;
    transact(
        client,
        ProvisionStep::GrantMinterRole(class),
        token,
        ContractCall::GrantRole {
            role: minter_role(),
            account: handler,
        },
        TransactOptions::default(),
    )
    .await?;
    transact(
        client,
        ProvisionStep::SetBurnable(class),
        bridge,
        ContractCall::SetBurnable { handler, token },
        admin(),
    )
    .await?;
    Ok(())
}

async fn register_non_fungible<W>(client: &W, bridge: Address, asset: &AssetDeployment) -> Result<()>
where
    W: ContractWriter + ?Sized,
{
    let class = AssetClass::NonFungible;
    let AssetDeployment {
        contract: token,
        handler,
        resource_id,
    } = *asset;

    transact(
        client,
        ProvisionStep::RegisterResource(class),
        bridge,
        ContractCall::SetResource {
            handler,
            resource_id,
            token,
        },
        admin(),
    )
    .await?;
    transact(
        client,
        ProvisionStep::GrantMinterRole(class),
        token,
        ContractCall::GrantRole {
            role: minter_role(),
            account: handler,
        },
        TransactOptions::default(),
    )
    .await?;
    transact(
        client,
        ProvisionStep::SetBurnable(class),
        bridge,
        ContractCall::SetBurnable { handler, token },
        admin(),
    )
    .await?;
    Ok(())
}

async fn register_generic<W>(client: &W, bridge: Address, asset: &AssetDeployment) -> Result<()>
where
    W: ContractWriter + ?Sized,
{
    transact(
        client,
        ProvisionStep::RegisterResource(AssetClass::Generic),
        bridge,
        ContractCall::SetGenericResource {
            handler: asset.handler,
            resource_id: asset.resource_id,
            asset_store: asset.contract,
            deposit_selector: ASSET_STORE_SELECTOR,
            depositor_offset: U256::ZERO,
            execute_selector: ASSET_STORE_SELECTOR,
        },
        admin(),
    )
    .await?;
    Ok(())
}

/// Provisions one chain and returns its environment.
///
/// `client` signs every transaction; tokens of the initial fungible mint go to
/// `mint_recipient` while the approval to the handler is given by the signer.
pub async fn provision<W>(
    client: &W,
    domain_id: u8,
    mint_recipient: Address,
    options: &ProvisionOptions,
) -> Result<ChainEnvironmentConfig>
where
    W: ContractWriter + ?Sized,
{
    let bridge = deploy(client, ProvisionStep::DeployBridge, DeployRequest::Bridge { domain_id }).await?;
    debug!(domain_id, %bridge, "bridge deployed");

    transact(
        client,
        ProvisionStep::EndKeygen,
        bridge,
        ContractCall::EndKeygen {
            mpc_address: options.mpc_address,
        },
        TransactOptions::default(),
    )
    .await?;

    let fee_handler = deploy(
        client,
        ProvisionStep::DeployFeeHandler,
        DeployRequest::BasicFeeHandler { bridge },
    )
    .await?;
    transact(
        client,
        ProvisionStep::SetFeeHandler,
        bridge,
        ContractCall::ChangeFeeHandler { fee_handler },
        admin(),
    )
    .await?;
    if !options.fee.is_zero() {
        transact(
            client,
            ProvisionStep::ChangeFee,
            fee_handler,
            ContractCall::ChangeFee { fee: options.fee },
            TransactOptions::default(),
        )
        .await?;
    }
    debug!(%fee_handler, fee = %options.fee, "fee handler configured");

    let (fungible, non_fungible, generic) = futures::try_join!(
        deploy_asset(client, AssetClass::Fungible, bridge, options),
        deploy_asset(client, AssetClass::NonFungible, bridge, options),
        deploy_asset(client, AssetClass::Generic, bridge, options),
    )?;

    register_fungible(client, bridge, &fungible, mint_recipient, options).await?;
    register_non_fungible(client, bridge, &non_fungible).await?;
    register_generic(client, bridge, &generic).await?;

    let config = ChainEnvironmentConfig {
        domain_id,
        bridge,
        fee_handler: FeeHandlerConfig {
            address: fee_handler,
            kind: FeeHandlerKind::Basic,
            fee: options.fee,
        },
        fungible,
        non_fungible,
        generic,
    };
    config.validate()?;

    debug!(domain_id, %bridge, "all deployments and registrations done");
    Ok(config)
}
