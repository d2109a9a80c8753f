//! Two-chain bridge test environment.
//!
//! Provisions a full set of bridge, fee-handler, token, handler and asset-store
//! contracts on each chain, then drives deposits from one chain to the other and
//! verifies that exactly one proposal gets executed on the destination with the
//! expected asset-specific effect.
//!
//! The crate is layered leaves-first:
//! - [`resource`] assigns deterministic resource IDs per asset class.
//! - [`client`], [`contracts`] and [`evm`] form the contract binding layer.
//! - [`provision`] deploys and wires one chain into a [`ChainEnvironmentConfig`].
//! - [`deposit`] submits priority-tiered deposits.
//! - [`finality`] waits for the destination proposal to execute.
//! - [`verify`] asserts the cross-chain effect.
//! - [`scenario`] composes the above into end-to-end transfers.

pub mod client;
pub mod config;
pub mod contracts;
pub mod deposit;
pub mod error;
pub mod evm;
pub mod finality;
pub mod fixtures;
pub mod gas;
pub mod metrics;
pub mod provision;
pub mod resource;
pub mod scenario;
pub mod verify;

pub use config::{
    AssetDeployment, BridgeEnvironment, ChainEnvironmentConfig, FeeHandlerKind, HarnessConfig,
};
pub use deposit::{DepositIntent, DepositPayload, submit_deposit};
pub use error::{BindingError, Error, Result};
pub use finality::{PollSchedule, ProposalFilter, ProposalWatch, wait_for_proposal_executed};
pub use gas::{GasPricer, Priority, StaticGasPricer};
pub use provision::{ProvisionOptions, provision};
pub use resource::{AssetClass, ResourceId};

#[cfg(test)]
mod tests;
