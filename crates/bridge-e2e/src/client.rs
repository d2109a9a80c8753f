//! Capability traits of the contract binding layer.
//!
//! Each component depends only on the capabilities it uses: provisioning and
//! deposits need [`ContractWriter`], verification needs [`ContractReader`], the
//! finality watcher needs [`LogSource`], and gas tier checks and deposit nonce
//! lookups need [`TransactionLookup`]. [`crate::evm::EvmBindings`] implements
//! all of them over an alloy provider.

use alloy::rpc::types::Log;
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::{
    contracts::{ContractCall, DeployRequest},
    error::BindingError,
    gas::Priority,
};

/// Options attached to every state-changing transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactOptions {
    /// Explicit gas limit; estimated by the node when absent.
    pub gas_limit: Option<u64>,
    /// Native value sent with the transaction.
    pub value: U256,
    /// Tier used to pick the gas price.
    pub priority: Priority,
}

impl TransactOptions {
    pub const fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub const fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Sends transactions through the environment's signer.
#[async_trait]
pub trait ContractWriter: Send + Sync {
    /// Address transactions are sent from.
    fn sender(&self) -> Address;

    /// Deploys a contract and waits until its address is known.
    async fn deploy(
        &self,
        request: DeployRequest,
        options: TransactOptions,
    ) -> Result<Address, BindingError>;

    /// Broadcasts a call and returns its hash without waiting for inclusion.
    async fn send(
        &self,
        to: Address,
        call: ContractCall,
        options: TransactOptions,
    ) -> Result<B256, BindingError>;

    /// Waits for inclusion of a previously sent transaction, failing on revert.
    async fn confirm(&self, tx_hash: B256) -> Result<(), BindingError>;

    /// Sends a call and waits for it to succeed.
    async fn send_and_confirm(
        &self,
        to: Address,
        call: ContractCall,
        options: TransactOptions,
    ) -> Result<B256, BindingError> {
        let tx_hash = self.send(to, call, options).await?;
        self.confirm(tx_hash).await?;
        Ok(tx_hash)
    }
}

/// Read-only contract state queries.
#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn erc20_balance(&self, token: Address, holder: Address) -> Result<U256, BindingError>;

    /// Owner of `token_id`; errors when the token does not exist.
    async fn erc721_owner(&self, token: Address, token_id: U256) -> Result<Address, BindingError>;

    async fn asset_stored(&self, asset_store: Address, asset: B256) -> Result<bool, BindingError>;
}

/// Event log access for the finality watcher.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn latest_block(&self) -> Result<u64, BindingError>;

    /// Logs emitted by `address` with first topic `event`, in `[from_block, to_block]`.
    async fn logs(
        &self,
        address: Address,
        event: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, BindingError>;
}

/// Transaction lookup by hash.
#[async_trait]
pub trait TransactionLookup: Send + Sync {
    /// Gas price of a known transaction, `None` if the node does not know it.
    async fn transaction_gas_price(&self, tx_hash: B256) -> Result<Option<u128>, BindingError>;

    /// Logs of a mined transaction, empty while it has no receipt.
    async fn transaction_logs(&self, tx_hash: B256) -> Result<Vec<Log>, BindingError>;
}
