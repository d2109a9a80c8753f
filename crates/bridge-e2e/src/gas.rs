//! Priority tiers and gas price strategies.

use std::{fmt, str::FromStr};

use alloy::providers::Provider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BindingError, Error};

const GWEI: u128 = 1_000_000_000;

/// Discrete gas price tier attached to a submitted transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Slow,
    Medium,
    Fast,
}

impl Priority {
    pub const ALL: [Self; 3] = [Self::Slow, Self::Medium, Self::Fast];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Medium => "medium",
            Self::Fast => "fast",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for Priority {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Slow),
            1 => Ok(Self::Medium),
            2 => Ok(Self::Fast),
            other => Err(Error::Configuration(format!("unknown priority tier {other}"))),
        }
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slow" | "low" => Ok(Self::Slow),
            "medium" => Ok(Self::Medium),
            "fast" | "high" => Ok(Self::Fast),
            other => Err(Error::Configuration(format!("unknown priority tier `{other}`"))),
        }
    }
}

/// Resolves a priority tier to a gas price in wei.
#[async_trait]
pub trait GasPricer: Send + Sync {
    async fn gas_price(&self, priority: Priority) -> Result<u128, BindingError>;
}

/// Gas price per tier, in gwei.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasTiers {
    pub slow: u64,
    pub medium: u64,
    pub fast: u64,
}

impl GasTiers {
    /// Price for `priority` in wei.
    pub const fn wei(&self, priority: Priority) -> u128 {
        let gwei = match priority {
            Priority::Slow => self.slow,
            Priority::Medium => self.medium,
            Priority::Fast => self.fast,
        };
        gwei as u128 * GWEI
    }
}

impl Default for GasTiers {
    fn default() -> Self {
        Self {
            slow: 50,
            medium: 90,
            fast: 140,
        }
    }
}

/// Fixed price table; the same tier always yields the same price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticGasPricer {
    tiers: GasTiers,
}

impl StaticGasPricer {
    pub const fn new(tiers: GasTiers) -> Self {
        Self { tiers }
    }

    pub const fn tiers(&self) -> GasTiers {
        self.tiers
    }
}

#[async_trait]
impl GasPricer for StaticGasPricer {
    async fn gas_price(&self, priority: Priority) -> Result<u128, BindingError> {
        Ok(self.tiers.wei(priority))
    }
}

/// Scales the node's suggested gas price by a per-tier percentage, optionally capped.
#[derive(Debug, Clone)]
pub struct SuggestedGasPricer<P> {
    provider: P,
    upper_limit: Option<u128>,
}

impl<P> SuggestedGasPricer<P> {
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            upper_limit: None,
        }
    }

    pub const fn with_upper_limit(mut self, limit: u128) -> Self {
        self.upper_limit = Some(limit);
        self
    }

    const fn percentage(priority: Priority) -> u128 {
        match priority {
            Priority::Slow => 100,
            Priority::Medium => 125,
            Priority::Fast => 150,
        }
    }

    fn scale(&self, suggested: u128, priority: Priority) -> u128 {
        let scaled = suggested.saturating_mul(Self::percentage(priority)) / 100;
        match self.upper_limit {
            Some(limit) => scaled.min(limit),
            None => scaled,
        }
    }
}

#[async_trait]
impl<P: Provider> GasPricer for SuggestedGasPricer<P> {
    async fn gas_price(&self, priority: Priority) -> Result<u128, BindingError> {
        let suggested = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| BindingError::Rpc(e.to_string()))?;
        Ok(self.scale(suggested, priority))
    }
}
