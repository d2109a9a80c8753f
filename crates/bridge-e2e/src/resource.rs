//! Resource registry: deterministic 32-byte identifiers per asset class.
//!
//! Both chains of an environment must agree on these IDs because the deposit on
//! the source and the registration on the destination reference the same value.

use std::{fmt, str::FromStr};

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Asset classes known to the environment. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetClass {
    /// ERC20-style token, burned on the source and minted on the destination.
    Fungible,
    /// Opaque payload persisted by an asset store.
    Generic,
    /// ERC721-style token, burned on the source and minted on the destination.
    NonFungible,
}

impl AssetClass {
    pub const ALL: [Self; 3] = [Self::Fungible, Self::Generic, Self::NonFungible];

    /// Discriminator byte encoded into the resource ID.
    pub const fn discriminator(self) -> u8 {
        match self {
            Self::Fungible => 0,
            Self::Generic => 1,
            Self::NonFungible => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fungible => "fungible",
            Self::Generic => "generic",
            Self::NonFungible => "non-fungible",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for AssetClass {
    type Error = Error;

    fn try_from(discriminator: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|class| class.discriminator() == discriminator)
            .ok_or_else(|| {
                Error::Configuration(format!("unknown asset class discriminator {discriminator}"))
            })
    }
}

impl FromStr for AssetClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fungible" | "erc20" => Ok(Self::Fungible),
            "generic" => Ok(Self::Generic),
            "non-fungible" | "nonfungible" | "erc721" => Ok(Self::NonFungible),
            other => Err(Error::Configuration(format!("unknown asset class `{other}`"))),
        }
    }
}

/// 32-byte identifier binding an asset class to its handler on every chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(B256);

impl ResourceId {
    pub const fn as_b256(&self) -> B256 {
        self.0
    }
}

impl From<ResourceId> for B256 {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Resource ID for `class`: its discriminator left-padded with zeros to 32 bytes.
///
/// The discriminator occupies the last byte (index 31), so the generic ID is
/// `0x00..0001`. Sygma's deployed networks pad to 31 bytes and append a zero,
/// which puts the discriminator in byte 30 (`0x00..0100`). IDs from this
/// registry are therefore only meaningful on environments it provisioned.
pub const fn resource_id(class: AssetClass) -> ResourceId {
    let mut bytes = [0u8; 32];
    bytes[31] = class.discriminator();
    ResourceId(B256::new(bytes))
}

/// Resource ID for a raw discriminator, rejecting classes outside the registry.
pub fn resource_id_for_discriminator(discriminator: u8) -> Result<ResourceId, Error> {
    AssetClass::try_from(discriminator).map(resource_id)
}
