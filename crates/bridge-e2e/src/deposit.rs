//! Deposit-relay driver: builds deposit and fee data and submits deposits.

use alloy::{
    primitives::utils::parse_units,
    signers::{SignerSync, local::PrivateKeySigner},
    sol_types::{SolEvent, SolValue},
};
use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use tracing::{debug, info};

use crate::{
    client::{ContractWriter, TransactOptions, TransactionLookup},
    config::{ChainEnvironmentConfig, DepositSettings, FeeHandlerKind},
    contracts::{Bridge, ContractCall, FeeDataMessage},
    error::{BindingError, Error, Result},
    gas::Priority,
    metrics::HarnessMetrics,
    resource::{AssetClass, ResourceId, resource_id},
};

const WORD: usize = 32;
const GWEI: u64 = 1_000_000_000;

/// Asset-specific part of a deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositPayload {
    Fungible { amount: U256 },
    NonFungible { token_id: U256, metadata: Bytes },
    Generic { payload: Bytes },
}

impl DepositPayload {
    pub const fn class(&self) -> AssetClass {
        match self {
            Self::Fungible { .. } => AssetClass::Fungible,
            Self::NonFungible { .. } => AssetClass::NonFungible,
            Self::Generic { .. } => AssetClass::Generic,
        }
    }

    /// Handler-specific deposit data for `recipient`.
    ///
    /// Every length prefix is a 32-byte big-endian word. The generic layout
    /// carries no recipient.
    pub fn encode(&self, recipient: Address) -> Bytes {
        let mut data = Vec::new();
        match self {
            Self::Fungible { amount } => {
                push_word(&mut data, *amount);
                push_prefixed(&mut data, recipient.as_slice());
            }
            Self::NonFungible { token_id, metadata } => {
                push_word(&mut data, *token_id);
                push_prefixed(&mut data, recipient.as_slice());
                push_prefixed(&mut data, metadata);
            }
            Self::Generic { payload } => push_prefixed(&mut data, payload),
        }
        data.into()
    }
}

fn push_word(data: &mut Vec<u8>, word: U256) {
    data.extend_from_slice(&word.to_be_bytes::<WORD>());
}

fn push_prefixed(data: &mut Vec<u8>, bytes: &[u8]) {
    push_word(data, U256::from(bytes.len()));
    data.extend_from_slice(bytes);
}

/// Deposit data decoded back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDeposit {
    pub payload: DepositPayload,
    pub recipient: Option<Address>,
}

struct Reader<'a> {
    data: &'a [u8],
    class: AssetClass,
}

impl<'a> Reader<'a> {
    fn malformed(&self, reason: impl std::fmt::Display) -> Error {
        Error::MalformedPayload(format!("{} deposit data: {reason}", self.class))
    }

    fn word(&mut self) -> Result<U256> {
        let Some((word, rest)) = self.data.split_first_chunk::<WORD>() else {
            return Err(self.malformed("truncated word"));
        };
        self.data = rest;
        Ok(U256::from_be_bytes(*word))
    }

    fn prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.word()?;
        let len = u64::try_from(len)
            .ok()
            .and_then(|len| usize::try_from(len).ok())
            .filter(|len| *len <= self.data.len())
            .ok_or_else(|| self.malformed(format!("length {len} exceeds remaining data")))?;
        let (bytes, rest) = self.data.split_at(len);
        self.data = rest;
        Ok(bytes)
    }

    fn recipient(&mut self) -> Result<Address> {
        let bytes = self.prefixed()?;
        if bytes.len() != Address::ZERO.len() {
            return Err(self.malformed(format!("recipient of {} bytes", bytes.len())));
        }
        Ok(Address::from_slice(bytes))
    }

    fn finish(self) -> Result<()> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(self.malformed(format!("{} trailing bytes", self.data.len())))
        }
    }
}

/// Parses `data` with the layout of `class`. Trailing bytes are rejected.
pub fn decode_deposit_data(class: AssetClass, data: &[u8]) -> Result<DecodedDeposit> {
    let mut reader = Reader { data, class };
    let decoded = match class {
        AssetClass::Fungible => {
            let amount = reader.word()?;
            let recipient = reader.recipient()?;
            DecodedDeposit {
                payload: DepositPayload::Fungible { amount },
                recipient: Some(recipient),
            }
        }
        AssetClass::NonFungible => {
            let token_id = reader.word()?;
            let recipient = reader.recipient()?;
            let metadata = Bytes::copy_from_slice(reader.prefixed()?);
            DecodedDeposit {
                payload: DepositPayload::NonFungible { token_id, metadata },
                recipient: Some(recipient),
            }
        }
        AssetClass::Generic => DecodedDeposit {
            payload: DepositPayload::Generic {
                payload: Bytes::copy_from_slice(reader.prefixed()?),
            },
            recipient: None,
        },
    };
    reader.finish()?;
    Ok(decoded)
}

/// Source and destination token decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalNormalization {
    pub source: u8,
    pub destination: u8,
}

impl Default for DecimalNormalization {
    fn default() -> Self {
        Self {
            source: 18,
            destination: 18,
        }
    }
}

impl DecimalNormalization {
    /// Converts a source-chain amount into destination-chain units, rounding down.
    pub fn normalize(&self, amount: U256) -> U256 {
        if self.source == self.destination {
            return amount;
        }
        let ten = U256::from(10);
        amount.saturating_mul(ten.pow(U256::from(self.destination)))
            / ten.pow(U256::from(self.source))
    }
}

/// Oracle-signed exchange rates for chains using a [`FeeHandlerKind::FeeOracle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeOracleQuote {
    pub base_rate: U256,
    pub token_rate: U256,
    pub signature: Bytes,
}

impl FeeOracleQuote {
    /// Builds a quote from decimal rates such as `"1000.0"`. The base rate is
    /// scaled by the native currency's decimals, the token rate by the token's.
    pub fn from_rates(
        base_rate: &str,
        base_decimals: u8,
        token_rate: &str,
        token_decimals: u8,
        signature: Bytes,
    ) -> Result<Self> {
        Ok(Self {
            base_rate: parse_rate(base_rate, base_decimals)?,
            token_rate: parse_rate(token_rate, token_decimals)?,
            signature,
        })
    }
}

fn parse_rate(rate: &str, decimals: u8) -> Result<U256> {
    parse_units(rate, decimals)
        .map(|units| units.get_absolute())
        .map_err(|e| Error::Configuration(format!("invalid exchange rate `{rate}`: {e}")))
}

/// One deposit, built right before submission and consumed by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositIntent {
    pub resource_id: ResourceId,
    pub recipient: Address,
    pub payload: DepositPayload,
    pub destination_gas_price: U256,
    /// Unix timestamp after which the fee quote is no longer valid.
    pub expires_at: u64,
    pub source_domain_id: u8,
    pub destination_domain_id: u8,
    pub decimals: DecimalNormalization,
    /// Native value attached to the deposit transaction.
    pub fee: U256,
    pub priority: Priority,
    /// Replaces the generated deposit data. Must still parse as the payload's class.
    pub override_data: Option<Bytes>,
    pub oracle_quote: Option<FeeOracleQuote>,
}

impl DepositIntent {
    /// Intent for `payload` from the `source` chain, paying the source's configured fee.
    pub fn new(
        source: &ChainEnvironmentConfig,
        destination_domain_id: u8,
        recipient: Address,
        payload: DepositPayload,
    ) -> Self {
        Self {
            resource_id: resource_id(payload.class()),
            recipient,
            payload,
            destination_gas_price: U256::from(GWEI),
            expires_at: expiry_after(3600),
            source_domain_id: source.domain_id,
            destination_domain_id,
            decimals: DecimalNormalization::default(),
            fee: source.fee_handler.fee,
            priority: Priority::default(),
            override_data: None,
            oracle_quote: None,
        }
    }

    /// Applies gas price, expiry and decimals from configuration.
    pub fn with_settings(mut self, settings: &DepositSettings) -> Self {
        self.destination_gas_price =
            U256::from(settings.destination_gas_price_gwei) * U256::from(GWEI);
        self.expires_at = expiry_after(settings.expiry_secs);
        self.decimals = DecimalNormalization {
            source: settings.source_decimals,
            destination: settings.destination_decimals,
        };
        self
    }

    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_override_data(mut self, data: impl Into<Bytes>) -> Self {
        self.override_data = Some(data.into());
        self
    }

    pub fn with_oracle_quote(mut self, quote: FeeOracleQuote) -> Self {
        self.oracle_quote = Some(quote);
        self
    }

    /// Attaches the quote a fee handler of `kind` needs.
    ///
    /// Basic handlers need none. Fee oracle handlers get the configured rates,
    /// signed over [`Self::fee_message`] with the configured oracle key. Call
    /// after [`Self::with_settings`] since the message covers gas price and expiry.
    pub fn with_fee_quote(self, kind: FeeHandlerKind, settings: &DepositSettings) -> Result<Self> {
        match kind {
            FeeHandlerKind::Basic => Ok(self),
            FeeHandlerKind::FeeOracle => {
                let oracle = settings.fee_oracle_signer()?.ok_or_else(|| {
                    Error::Configuration("fee oracle handler requires `fee_oracle_key`".to_string())
                })?;
                self.with_signed_quote(settings, &oracle)
            }
        }
    }

    /// Prices the deposit with the rates in `settings` and signs the quote with `oracle`.
    pub fn with_signed_quote(self, settings: &DepositSettings, oracle: &PrivateKeySigner) -> Result<Self> {
        let base_rate = parse_rate(&settings.base_rate, settings.base_currency_decimals)?;
        let token_rate = parse_rate(&settings.token_rate, settings.source_decimals)?;
        let digest = keccak256(self.fee_message(base_rate, token_rate).abi_encode());
        let signature = oracle
            .sign_hash_sync(&digest)
            .map_err(|e| Error::Configuration(format!("failed to sign fee quote: {e}")))?;
        debug!(oracle = %oracle.address(), %digest, "fee quote signed");

        Ok(self.with_oracle_quote(FeeOracleQuote {
            base_rate,
            token_rate,
            signature: Bytes::copy_from_slice(&signature.as_bytes()),
        }))
    }

    /// Message covered by the oracle signature.
    pub fn fee_message(&self, base_rate: U256, token_rate: U256) -> FeeDataMessage {
        FeeDataMessage {
            ber: base_rate,
            ter: token_rate,
            dstGasPrice: self.destination_gas_price,
            expiresAt: U256::from(self.expires_at),
            fromDomainID: self.source_domain_id,
            toDomainID: self.destination_domain_id,
            resourceID: self.resource_id.as_b256(),
            msgGasLimit: U256::ZERO,
        }
    }

    pub const fn class(&self) -> AssetClass {
        self.payload.class()
    }

    /// Deposit data sent to the bridge: the override when present, else generated.
    pub fn deposit_data(&self) -> Result<Bytes> {
        match &self.override_data {
            Some(data) => {
                decode_deposit_data(self.class(), data)?;
                Ok(data.clone())
            }
            None => Ok(self.payload.encode(self.recipient)),
        }
    }

    /// Fee data expected by the source chain's fee handler.
    pub fn fee_data(&self, kind: FeeHandlerKind) -> Result<Bytes> {
        match kind {
            FeeHandlerKind::Basic => Ok(Bytes::new()),
            FeeHandlerKind::FeeOracle => {
                let quote = self.oracle_quote.as_ref().ok_or_else(|| {
                    Error::Configuration("fee oracle handler requires a signed quote".to_string())
                })?;
                let message = self.fee_message(quote.base_rate, quote.token_rate);
                let amount = match &self.payload {
                    DepositPayload::Fungible { amount } => *amount,
                    _ => U256::ZERO,
                };
                let mut data = message.abi_encode();
                data.extend_from_slice(&quote.signature);
                push_word(&mut data, amount);
                Ok(data.into())
            }
        }
    }
}

fn expiry_after(secs: u64) -> u64 {
    u64::try_from(jiff::Timestamp::now().as_second())
        .unwrap_or_default()
        .saturating_add(secs)
}

/// Submits `intent` to the source bridge and returns the transaction hash
/// without waiting for inclusion.
pub async fn submit_deposit<W>(
    client: &W,
    source: &ChainEnvironmentConfig,
    intent: DepositIntent,
) -> Result<B256>
where
    W: ContractWriter + ?Sized,
{
    let class = intent.class();
    let registered = source.asset(class).resource_id;
    if intent.resource_id != registered {
        return Err(Error::Configuration(format!(
            "{class} deposit uses resource id {} but the source registered {registered}",
            intent.resource_id
        )));
    }

    let deposit_data = intent.deposit_data()?;
    let fee_data = intent.fee_data(source.fee_handler.kind)?;

    let call = ContractCall::Deposit {
        destination_domain_id: intent.destination_domain_id,
        resource_id: intent.resource_id,
        deposit_data,
        fee_data,
    };
    let options = TransactOptions::default()
        .with_value(intent.fee)
        .with_priority(intent.priority);

    let tx_hash = client
        .send(source.bridge, call, options)
        .await
        .map_err(Error::Submission)?;

    info!(
        %class,
        bridge = %source.bridge,
        destination_domain_id = intent.destination_domain_id,
        priority = %intent.priority,
        %tx_hash,
        "deposit submitted"
    );
    HarnessMetrics::default().record_deposit_submitted();
    Ok(tx_hash)
}

/// Nonce the source bridge assigned to the deposit mined in `tx_hash`.
pub async fn deposit_nonce<L>(lookup: &L, bridge: Address, tx_hash: B256) -> Result<u64>
where
    L: TransactionLookup + ?Sized,
{
    let logs = lookup.transaction_logs(tx_hash).await.map_err(Error::Query)?;
    for log in logs {
        if log.address() != bridge || log.topic0() != Some(&Bridge::Deposit::SIGNATURE_HASH) {
            continue;
        }
        let decoded = log
            .log_decode::<Bridge::Deposit>()
            .map_err(|e| Error::Query(BindingError::Decode(e.to_string())))?;
        return Ok(decoded.inner.data.depositNonce);
    }
    Err(Error::Query(BindingError::MissingEvent {
        tx_hash,
        event: "Deposit",
    }))
}
