//! Harness configuration and the per-chain environment produced by provisioning.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    finality::PollSchedule,
    gas::GasTiers,
    resource::{AssetClass, ResourceId, resource_id},
};

/// How the bridge charges for deposits on a chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeeHandlerKind {
    /// Flat fee paid as transaction value, empty fee data.
    #[default]
    Basic,
    /// Fee priced from a signed oracle quote carried in the fee data.
    FeeOracle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeHandlerConfig {
    pub address: Address,
    pub kind: FeeHandlerKind,
    /// Native amount attached to every deposit.
    pub fee: U256,
}

/// Contracts backing one asset class on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDeployment {
    /// Token contract, or the asset store for the generic class.
    pub contract: Address,
    pub handler: Address,
    pub resource_id: ResourceId,
}

/// Everything a scenario needs to know about one provisioned chain.
///
/// Built once by [`crate::provision`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEnvironmentConfig {
    pub domain_id: u8,
    pub bridge: Address,
    pub fee_handler: FeeHandlerConfig,
    pub fungible: AssetDeployment,
    pub non_fungible: AssetDeployment,
    pub generic: AssetDeployment,
}

impl ChainEnvironmentConfig {
    pub const fn asset(&self, class: AssetClass) -> &AssetDeployment {
        match class {
            AssetClass::Fungible => &self.fungible,
            AssetClass::Generic => &self.generic,
            AssetClass::NonFungible => &self.non_fungible,
        }
    }

    pub const fn asset_store(&self) -> Address {
        self.generic.contract
    }

    /// Checks that every registered triple points at contracts of this environment.
    pub fn validate(&self) -> Result<()> {
        let mut addresses = vec![
            ("bridge", self.bridge),
            ("fee handler", self.fee_handler.address),
        ];
        for class in AssetClass::ALL {
            let asset = self.asset(class);
            if asset.resource_id != resource_id(class) {
                return Err(Error::Configuration(format!(
                    "{class} resource id {} does not match the registry",
                    asset.resource_id
                )));
            }
            addresses.push((class.as_str(), asset.contract));
            addresses.push((class.as_str(), asset.handler));
        }

        let mut seen = HashSet::with_capacity(addresses.len());
        for (name, address) in addresses {
            if address.is_zero() {
                return Err(Error::Configuration(format!("{name} address is zero")));
            }
            if !seen.insert(address) {
                return Err(Error::Configuration(format!(
                    "{name} address {address} is used by more than one contract"
                )));
            }
        }
        Ok(())
    }
}

/// Both provisioned chains, as written by `bridge deploy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeEnvironment {
    pub source: ChainEnvironmentConfig,
    pub destination: ChainEnvironmentConfig,
}

impl BridgeEnvironment {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("failed to read {}: {e}", path.display())))?;
        let environment: Self = serde_json::from_str(&contents)
            .map_err(|e| Error::Configuration(format!("invalid environment {}: {e}", path.display())))?;
        environment.source.validate()?;
        environment.destination.validate()?;
        if environment.source.domain_id == environment.destination.domain_id {
            return Err(Error::Configuration(format!(
                "source and destination share domain id {}",
                environment.source.domain_id
            )));
        }
        Ok(environment)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("failed to encode environment: {e}")))?;
        std::fs::write(path, contents)
            .map_err(|e| Error::Configuration(format!("failed to write {}: {e}", path.display())))
    }
}

/// RPC endpoint and identity of one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEndpoint {
    pub name: String,
    pub rpc_url: String,
    pub domain_id: u8,
    /// Hex-encoded deployer key. Falls back to the harness key ring when absent.
    #[serde(default)]
    pub private_key: Option<String>,
}

impl ChainEndpoint {
    pub fn signer(&self) -> Result<Option<PrivateKeySigner>> {
        self.private_key
            .as_deref()
            .map(|key| {
                key.parse::<PrivateKeySigner>().map_err(|e| {
                    Error::Configuration(format!("invalid private key for {}: {e}", self.name))
                })
            })
            .transpose()
    }
}

/// Defaults for deposit intents built from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepositSettings {
    pub destination_gas_price_gwei: u64,
    pub expiry_secs: u64,
    /// Base currency exchange rate as a decimal string, e.g. `"1000.0"`.
    pub base_rate: String,
    /// Token exchange rate as a decimal string, scaled by `source_decimals`.
    pub token_rate: String,
    /// Decimals of the source chain's native currency, used to scale `base_rate`.
    pub base_currency_decimals: u8,
    pub source_decimals: u8,
    pub destination_decimals: u8,
    /// Hex-encoded key signing fee quotes for chains with a fee oracle handler.
    pub fee_oracle_key: Option<String>,
}

impl Default for DepositSettings {
    fn default() -> Self {
        Self {
            destination_gas_price_gwei: 1,
            expiry_secs: 3600,
            base_rate: "1000.0".to_string(),
            token_rate: "1000.0".to_string(),
            base_currency_decimals: 18,
            source_decimals: 18,
            destination_decimals: 18,
            fee_oracle_key: None,
        }
    }
}

impl DepositSettings {
    pub fn fee_oracle_signer(&self) -> Result<Option<PrivateKeySigner>> {
        self.fee_oracle_key
            .as_deref()
            .map(|key| {
                key.parse::<PrivateKeySigner>()
                    .map_err(|e| Error::Configuration(format!("invalid fee oracle key: {e}")))
            })
            .transpose()
    }
}

/// Top-level harness configuration, read from TOML.
///
/// ```toml
/// artifacts_dir = "artifacts"
///
/// [source]
/// name = "evm1"
/// rpc_url = "http://localhost:8545"
/// domain_id = 1
///
/// [destination]
/// name = "evm2"
/// rpc_url = "http://localhost:8547"
/// domain_id = 2
///
/// [gas]
/// slow = 50
/// medium = 90
/// fast = 140
///
/// [deposit]
/// base_rate = "1000.0"
/// token_rate = "1000.0"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub source: ChainEndpoint,
    pub destination: ChainEndpoint,
    pub artifacts_dir: PathBuf,
    #[serde(default)]
    pub gas: GasTiers,
    #[serde(default)]
    pub deposit: DepositSettings,
    #[serde(default)]
    pub finality: PollSchedule,
}

impl HarnessConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::Configuration(format!("invalid config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.domain_id == self.destination.domain_id {
            return Err(Error::Configuration(format!(
                "source and destination share domain id {}",
                self.source.domain_id
            )));
        }
        if self.deposit.expiry_secs == 0 {
            return Err(Error::Configuration("deposit expiry must be positive".to_string()));
        }
        self.deposit.fee_oracle_signer()?;
        self.finality.validate()
    }
}
