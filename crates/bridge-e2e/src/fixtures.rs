//! Named test accounts for scenario setup.

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::Address;

use crate::{
    error::{Error, Result},
    provision::DEFAULT_MPC_ADDRESS,
};

/// First three default anvil/hardhat development keys.
pub const ANVIL_KEYS: [&str; 3] = [
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
];

/// Accounts used by the transfer scenarios.
///
/// `eve` deploys the environment and sends deposits, `bob` receives them and
/// `alice` is left untouched for callers that need a third party.
#[derive(Debug, Clone)]
pub struct TestKeyRing {
    pub alice: PrivateKeySigner,
    pub bob: PrivateKeySigner,
    pub eve: PrivateKeySigner,
    pub mpc_address: Address,
}

impl TestKeyRing {
    pub const fn new(
        alice: PrivateKeySigner,
        bob: PrivateKeySigner,
        eve: PrivateKeySigner,
        mpc_address: Address,
    ) -> Self {
        Self {
            alice,
            bob,
            eve,
            mpc_address,
        }
    }

    /// Key ring over [`ANVIL_KEYS`], in alice, bob, eve order.
    pub fn anvil() -> Result<Self> {
        let parse = |key: &str| {
            key.parse::<PrivateKeySigner>()
                .map_err(|e| Error::Configuration(format!("invalid development key: {e}")))
        };
        Ok(Self::new(
            parse(ANVIL_KEYS[0])?,
            parse(ANVIL_KEYS[1])?,
            parse(ANVIL_KEYS[2])?,
            DEFAULT_MPC_ADDRESS,
        ))
    }

    pub fn deployer(&self) -> &PrivateKeySigner {
        &self.eve
    }

    pub fn recipient(&self) -> Address {
        self.bob.address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn anvil_key_ring_addresses() {
        let keys = TestKeyRing::anvil().unwrap();
        assert_eq!(
            keys.alice.address(),
            address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
        assert_eq!(
            keys.recipient(),
            address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8")
        );
        assert_eq!(
            keys.deployer().address(),
            address!("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC")
        );
    }
}
