//! Error taxonomy for provisioning, submission, finality and verification.

use std::time::Duration;

use alloy_primitives::{Address, B256};

use crate::{provision::ProvisionStep, resource::AssetClass, verify::VerificationMismatch};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure reported by the contract binding layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("transaction {0} reverted")]
    Reverted(B256),

    #[error("deployment transaction {0} produced no contract address")]
    NoContractAddress(B256),

    #[error("call reverted: {0}")]
    CallReverted(String),

    #[error("transaction {tx_hash} emitted no {event} event")]
    MissingEvent { tx_hash: B256, event: &'static str },

    #[error("failed to decode return data: {0}")]
    Decode(String),

    #[error("bytecode artifact for {contract} unavailable: {reason}")]
    Artifact {
        contract: &'static str,
        reason: String,
    },
}

/// Errors surfaced to the scenario caller. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{class} handler deployment requested before the bridge address is known")]
    MissingBridgeAddress { class: AssetClass },

    #[error("provisioning failed at `{step}`: {source}")]
    Deployment {
        step: ProvisionStep,
        #[source]
        source: BindingError,
    },

    #[error("deposit submission failed: {0}")]
    Submission(#[source] BindingError),

    #[error("malformed deposit payload: {0}")]
    MalformedPayload(String),

    #[error("proposal on bridge {bridge} was not executed within {waited:?}")]
    FinalityTimeout { bridge: Address, waited: Duration },

    #[error(transparent)]
    Verification(#[from] VerificationMismatch),

    #[error("chain query failed: {0}")]
    Query(#[source] BindingError),
}

impl Error {
    pub(crate) fn deployment(step: ProvisionStep) -> impl FnOnce(BindingError) -> Self {
        move |source| Self::Deployment { step, source }
    }
}
