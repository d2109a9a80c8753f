//! Contract binding layer over an alloy provider.

use std::{collections::HashMap, path::Path, sync::Arc};

use alloy::{
    consensus::Transaction as _,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, B256, Bytes, U256},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::types::{Filter, Log, TransactionRequest},
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
    transports::{RpcError, TransportErrorKind},
};
use async_trait::async_trait;
use tracing::debug;

use crate::{
    client::{ContractReader, ContractWriter, LogSource, TransactOptions, TransactionLookup},
    contracts::{
        CentrifugeAsset, ContractCall, ContractKind, DeployRequest, ERC20PresetMinterPauser,
        ERC721MinterBurnerPauser,
    },
    error::BindingError,
    gas::GasPricer,
};

fn rpc_error(err: impl std::fmt::Display) -> BindingError {
    BindingError::Rpc(err.to_string())
}

/// Only an error response from the node means the call itself failed; transport
/// and decoding failures stay RPC errors.
fn call_error(err: RpcError<TransportErrorKind>) -> BindingError {
    match err {
        RpcError::ErrorResp(payload) => BindingError::CallReverted(payload.to_string()),
        other => rpc_error(other),
    }
}

/// Creation bytecode for every deployable contract.
#[derive(Debug, Clone, Default)]
pub struct ContractArtifacts {
    bytecode: HashMap<ContractKind, Bytes>,
}

impl ContractArtifacts {
    /// Loads `<ContractName>.bin` hex files from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, BindingError> {
        let dir = dir.as_ref();
        let mut bytecode = HashMap::with_capacity(ContractKind::ALL.len());
        for kind in ContractKind::ALL {
            let path = dir.join(format!("{}.bin", kind.name()));
            let hex = std::fs::read_to_string(&path).map_err(|e| BindingError::Artifact {
                contract: kind.name(),
                reason: format!("{}: {e}", path.display()),
            })?;
            let code = const_hex::decode(hex.trim()).map_err(|e| BindingError::Artifact {
                contract: kind.name(),
                reason: format!("invalid hex in {}: {e}", path.display()),
            })?;
            bytecode.insert(kind, Bytes::from(code));
        }
        Ok(Self { bytecode })
    }

    pub fn with_bytecode(mut self, kind: ContractKind, code: impl Into<Bytes>) -> Self {
        self.bytecode.insert(kind, code.into());
        self
    }

    /// Creation bytecode followed by the encoded constructor arguments.
    pub fn deploy_code(&self, request: &DeployRequest) -> Result<Bytes, BindingError> {
        let kind = request.kind();
        let code = self.bytecode.get(&kind).ok_or(BindingError::Artifact {
            contract: kind.name(),
            reason: "no bytecode loaded".to_string(),
        })?;
        let mut deploy_code = code.to_vec();
        deploy_code.extend(request.constructor_args());
        Ok(deploy_code.into())
    }
}

/// Binds the environment's contracts to one chain through `provider`.
///
/// The provider must sign for `sender`. Each scenario should use its own
/// instance so nonces are never shared between concurrently running flows.
#[derive(Debug, Clone)]
pub struct EvmBindings<P, G> {
    provider: P,
    sender: Address,
    gas_pricer: G,
    artifacts: Arc<ContractArtifacts>,
}

impl<G> EvmBindings<DynProvider, G> {
    /// Connects to `rpc_url` with a wallet holding `signer`.
    ///
    /// Nonces are cached locally so concurrent deployments from the same signer
    /// get consecutive nonces.
    pub async fn connect(
        rpc_url: &str,
        signer: PrivateKeySigner,
        gas_pricer: G,
        artifacts: Arc<ContractArtifacts>,
    ) -> Result<Self, BindingError> {
        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .with_gas_estimation()
            .with_cached_nonce_management()
            .fetch_chain_id()
            .wallet(EthereumWallet::from(signer))
            .connect(rpc_url)
            .await
            .map_err(rpc_error)?
            .erased();
        Ok(Self::new(provider, sender, gas_pricer, artifacts))
    }
}

impl<P, G> EvmBindings<P, G> {
    pub fn new(provider: P, sender: Address, gas_pricer: G, artifacts: Arc<ContractArtifacts>) -> Self {
        Self {
            provider,
            sender,
            gas_pricer,
            artifacts,
        }
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: Provider, G: GasPricer> EvmBindings<P, G> {
    async fn transaction(&self, options: TransactOptions) -> Result<TransactionRequest, BindingError> {
        let gas_price = self.gas_pricer.gas_price(options.priority).await?;
        let mut tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_value(options.value)
            .with_gas_price(gas_price);
        if let Some(gas_limit) = options.gas_limit {
            tx = tx.with_gas_limit(gas_limit);
        }
        Ok(tx)
    }

    async fn read<C>(&self, to: Address, call: C) -> Result<C::Return, BindingError>
    where
        C: SolCall + Send + Sync,
        C::Return: Send,
    {
        let tx = TransactionRequest::default()
            .with_to(to)
            .with_input(call.abi_encode());
        let output = self.provider.call(tx).await.map_err(call_error)?;
        C::abi_decode_returns(&output).map_err(|e| BindingError::Decode(e.to_string()))
    }
}

#[async_trait]
impl<P: Provider, G: GasPricer> ContractWriter for EvmBindings<P, G> {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn deploy(
        &self,
        request: DeployRequest,
        options: TransactOptions,
    ) -> Result<Address, BindingError> {
        let code = self.artifacts.deploy_code(&request)?;
        let tx = self.transaction(options).await?.with_deploy_code(code);

        let receipt = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(rpc_error)?
            .get_receipt()
            .await
            .map_err(rpc_error)?;

        if !receipt.status() {
            return Err(BindingError::Reverted(receipt.transaction_hash));
        }

        let address = receipt
            .contract_address
            .ok_or(BindingError::NoContractAddress(receipt.transaction_hash))?;

        debug!(
            contract = request.kind().name(),
            %address,
            tx_hash = %receipt.transaction_hash,
            "contract deployed"
        );
        Ok(address)
    }

    async fn send(
        &self,
        to: Address,
        call: ContractCall,
        options: TransactOptions,
    ) -> Result<B256, BindingError> {
        let tx = self
            .transaction(options)
            .await?
            .with_to(to)
            .with_input(call.abi_encode());

        let pending = self.provider.send_transaction(tx).await.map_err(rpc_error)?;
        Ok(*pending.tx_hash())
    }

    async fn confirm(&self, tx_hash: B256) -> Result<(), BindingError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .get_receipt()
            .await
            .map_err(rpc_error)?;

        if receipt.status() {
            Ok(())
        } else {
            Err(BindingError::Reverted(tx_hash))
        }
    }
}

#[async_trait]
impl<P: Provider, G: GasPricer> ContractReader for EvmBindings<P, G> {
    async fn erc20_balance(&self, token: Address, holder: Address) -> Result<U256, BindingError> {
        self.read(token, ERC20PresetMinterPauser::balanceOfCall { account: holder })
            .await
    }

    async fn erc721_owner(&self, token: Address, token_id: U256) -> Result<Address, BindingError> {
        self.read(token, ERC721MinterBurnerPauser::ownerOfCall { tokenId: token_id })
            .await
    }

    async fn asset_stored(&self, asset_store: Address, asset: B256) -> Result<bool, BindingError> {
        self.read(asset_store, CentrifugeAsset::_assetsStoredCall { asset })
            .await
    }
}

#[async_trait]
impl<P: Provider, G: GasPricer> LogSource for EvmBindings<P, G> {
    async fn latest_block(&self) -> Result<u64, BindingError> {
        self.provider.get_block_number().await.map_err(rpc_error)
    }

    async fn logs(
        &self,
        address: Address,
        event: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, BindingError> {
        let filter = Filter::new()
            .address(address)
            .event_signature(event)
            .from_block(from_block)
            .to_block(to_block);
        self.provider.get_logs(&filter).await.map_err(rpc_error)
    }
}

#[async_trait]
impl<P: Provider, G: GasPricer> TransactionLookup for EvmBindings<P, G> {
    async fn transaction_gas_price(&self, tx_hash: B256) -> Result<Option<u128>, BindingError> {
        let tx = self
            .provider
            .get_transaction_by_hash(tx_hash)
            .await
            .map_err(rpc_error)?;
        Ok(tx.and_then(|tx| tx.gas_price().or(tx.effective_gas_price)))
    }

    async fn transaction_logs(&self, tx_hash: B256) -> Result<Vec<Log>, BindingError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(rpc_error)?;
        Ok(receipt.map(|receipt| receipt.inner.logs().to_vec()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_code_appends_constructor_args() {
        let artifacts =
            ContractArtifacts::default().with_bytecode(ContractKind::Bridge, vec![0x60, 0x80]);
        let code = artifacts
            .deploy_code(&DeployRequest::Bridge { domain_id: 1 })
            .unwrap();
        assert_eq!(code.len(), 2 + 32);
        assert_eq!(code[..2], [0x60, 0x80]);
        assert_eq!(code[33], 1);
    }

    #[test]
    fn missing_artifact_is_reported() {
        let err = ContractArtifacts::default()
            .deploy_code(&DeployRequest::AssetStore)
            .unwrap_err();
        assert!(matches!(
            err,
            BindingError::Artifact {
                contract: "CentrifugeAsset",
                ..
            }
        ));
    }

    #[test]
    fn load_reads_hex_files() {
        let dir = tempfile::tempdir().unwrap();
        for kind in ContractKind::ALL {
            std::fs::write(dir.path().join(format!("{}.bin", kind.name())), "0x6080\n").unwrap();
        }
        let artifacts = ContractArtifacts::load(dir.path()).unwrap();
        let code = artifacts.deploy_code(&DeployRequest::AssetStore).unwrap();
        assert_eq!(code.as_ref(), &[0x60, 0x80]);
    }

    #[test]
    fn error_response_is_a_reverted_call() {
        let err = call_error(RpcError::ErrorResp(alloy::rpc::json_rpc::ErrorPayload {
            code: 3,
            message: "execution reverted: ERC721: invalid token ID".into(),
            data: None,
        }));
        assert!(matches!(err, BindingError::CallReverted(ref reason) if reason.contains("invalid token ID")));
    }

    #[test]
    fn transport_failure_is_an_rpc_error() {
        let err = call_error(TransportErrorKind::custom_str("connection refused"));
        assert!(matches!(err, BindingError::Rpc(ref reason) if reason.contains("connection refused")));

        let err = call_error(RpcError::NullResp);
        assert!(matches!(err, BindingError::Rpc(_)));
    }

    #[test]
    fn load_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ContractArtifacts::load(dir.path()).is_err());
    }
}
