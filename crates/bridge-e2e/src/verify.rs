//! Verification harness: read-only assertions on the effect of a relayed deposit.

use std::fmt::Display;

use alloy_primitives::{Address, B256, U256};

use crate::{
    client::{ContractReader, TransactionLookup},
    config::ChainEnvironmentConfig,
    deposit::DecimalNormalization,
    error::{BindingError, Error, Result},
    gas::{GasPricer, Priority},
    metrics::HarnessMetrics,
};

/// An observed chain state that differs from the expected one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("verification `{check}` failed: expected {expected}, got {actual}")]
pub struct VerificationMismatch {
    pub check: &'static str,
    pub expected: String,
    pub actual: String,
}

fn mismatch(check: &'static str, expected: impl Display, actual: impl Display) -> Error {
    HarnessMetrics::default().record_verification_failure();
    Error::Verification(VerificationMismatch {
        check,
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

/// Accounts involved in a fungible transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FungibleTransfer {
    pub source_token: Address,
    pub sender: Address,
    pub destination_token: Address,
    pub recipient: Address,
}

impl FungibleTransfer {
    pub const fn new(
        source: &ChainEnvironmentConfig,
        destination: &ChainEnvironmentConfig,
        sender: Address,
        recipient: Address,
    ) -> Self {
        Self {
            source_token: source.fungible.contract,
            sender,
            destination_token: destination.fungible.contract,
            recipient,
        }
    }
}

/// Balances captured before the deposit is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FungibleSnapshot {
    pub source_balance: U256,
    pub destination_balance: U256,
}

impl FungibleSnapshot {
    pub async fn take<S, D>(source: &S, destination: &D, transfer: &FungibleTransfer) -> Result<Self>
    where
        S: ContractReader + ?Sized,
        D: ContractReader + ?Sized,
    {
        let source_balance = source
            .erc20_balance(transfer.source_token, transfer.sender)
            .await
            .map_err(Error::Query)?;
        let destination_balance = destination
            .erc20_balance(transfer.destination_token, transfer.recipient)
            .await
            .map_err(Error::Query)?;
        Ok(Self {
            source_balance,
            destination_balance,
        })
    }
}

/// The sender lost at least `amount` and the recipient gained exactly the
/// normalised `amount`.
pub async fn verify_fungible<S, D>(
    source: &S,
    destination: &D,
    transfer: &FungibleTransfer,
    before: FungibleSnapshot,
    amount: U256,
    decimals: DecimalNormalization,
) -> Result<()>
where
    S: ContractReader + ?Sized,
    D: ContractReader + ?Sized,
{
    let after = FungibleSnapshot::take(source, destination, transfer).await?;

    let spent = before.source_balance.saturating_sub(after.source_balance);
    if spent < amount {
        return Err(mismatch(
            "source balance decreased",
            format!("at least {amount}"),
            spent,
        ));
    }

    let expected = before.destination_balance + decimals.normalize(amount);
    if after.destination_balance != expected {
        return Err(mismatch(
            "destination balance increased",
            expected,
            after.destination_balance,
        ));
    }
    Ok(())
}

/// `token_id` has no owner on `token`.
pub async fn assert_token_absent<R>(reader: &R, token: Address, token_id: U256) -> Result<()>
where
    R: ContractReader + ?Sized,
{
    match reader.erc721_owner(token, token_id).await {
        Err(BindingError::CallReverted(_)) => Ok(()),
        Err(err) => Err(Error::Query(err)),
        Ok(owner) => Err(mismatch("token absent", "no owner", owner)),
    }
}

/// The token was burned on the source and is owned by `recipient` on the destination.
pub async fn verify_non_fungible<S, D>(
    source: &S,
    source_token: Address,
    destination: &D,
    destination_token: Address,
    token_id: U256,
    recipient: Address,
) -> Result<()>
where
    S: ContractReader + ?Sized,
    D: ContractReader + ?Sized,
{
    assert_token_absent(source, source_token, token_id).await?;

    let owner = destination
        .erc721_owner(destination_token, token_id)
        .await
        .map_err(Error::Query)?;
    if owner != recipient {
        return Err(mismatch("destination owner", recipient, owner));
    }
    Ok(())
}

pub async fn assert_not_stored<R>(reader: &R, asset_store: Address, asset: B256) -> Result<()>
where
    R: ContractReader + ?Sized,
{
    if reader
        .asset_stored(asset_store, asset)
        .await
        .map_err(Error::Query)?
    {
        return Err(mismatch("asset not stored", false, true));
    }
    Ok(())
}

pub async fn verify_generic<R>(reader: &R, asset_store: Address, asset: B256) -> Result<()>
where
    R: ContractReader + ?Sized,
{
    if !reader
        .asset_stored(asset_store, asset)
        .await
        .map_err(Error::Query)?
    {
        return Err(mismatch("asset stored", true, false));
    }
    Ok(())
}

/// The transaction was priced at the tier's gas price.
pub async fn verify_gas_tier<L, G>(
    lookup: &L,
    pricer: &G,
    tx_hash: B256,
    priority: Priority,
) -> Result<()>
where
    L: TransactionLookup + ?Sized,
    G: GasPricer + ?Sized,
{
    let expected = pricer.gas_price(priority).await.map_err(Error::Query)?;
    let actual = lookup
        .transaction_gas_price(tx_hash)
        .await
        .map_err(Error::Query)?;
    match actual {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(mismatch("gas price tier", expected, actual)),
        None => Err(mismatch("gas price tier", expected, "unknown transaction")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_message_names_the_check() {
        let err = mismatch("destination owner", Address::ZERO, Address::repeat_byte(1));
        let message = err.to_string();
        assert!(message.contains("destination owner"), "{message}");
        assert!(message.contains("0x0000000000000000000000000000000000000000"), "{message}");
    }
}
