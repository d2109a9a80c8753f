//! Provisioning and relay tests against the in-memory chain.

mod relay;

use alloy_primitives::Address;

use self::mock::MockChain;
use crate::{ChainEnvironmentConfig, ProvisionOptions, fixtures::TestKeyRing};

pub(crate) const SOURCE_DOMAIN: u8 = 1;
pub(crate) const DESTINATION_DOMAIN: u8 = 2;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Two provisioned chains with deposits on the source relayed to the destination.
pub(crate) struct Environment {
    pub(crate) keys: TestKeyRing,
    pub(crate) source: MockChain,
    pub(crate) destination: MockChain,
    pub(crate) source_env: ChainEnvironmentConfig,
    pub(crate) destination_env: ChainEnvironmentConfig,
}

impl Environment {
    pub(crate) async fn provisioned(relay_latency: std::time::Duration) -> Self {
        init_tracing();
        let keys = TestKeyRing::anvil().unwrap();
        let deployer: Address = keys.deployer().address();
        let options = ProvisionOptions {
            mpc_address: keys.mpc_address,
            ..Default::default()
        };

        let source = MockChain::new(deployer);
        let destination = MockChain::new(deployer);
        source.link(&destination, relay_latency);

        let (source_env, destination_env) = tokio::try_join!(
            crate::provision(&source, SOURCE_DOMAIN, deployer, &options),
            crate::provision(&destination, DESTINATION_DOMAIN, deployer, &options),
        )
        .unwrap();

        Self {
            keys,
            source,
            destination,
            source_env,
            destination_env,
        }
    }
}
