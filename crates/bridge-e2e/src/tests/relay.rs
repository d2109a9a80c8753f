use std::time::Duration;

use alloy::primitives::Signature;
use alloy_primitives::{Address, B256, Bytes, U256, keccak256};

use super::{DESTINATION_DOMAIN, Environment, SOURCE_DOMAIN};
use crate::{
    BindingError, DepositIntent, DepositPayload, Error, FeeHandlerKind, PollSchedule, Priority,
    ProposalFilter, ProposalWatch, StaticGasPricer,
    client::{ContractReader, ContractWriter, TransactOptions},
    config::DepositSettings,
    contracts::ContractCall,
    deposit::deposit_nonce,
    finality::check_proposal_executed,
    fixtures::ANVIL_KEYS,
    scenario::RelayScenario,
    submit_deposit,
    verify::assert_token_absent,
    wait_for_proposal_executed,
};

const RELAY_LATENCY: Duration = Duration::from_secs(3);
const GWEI: u128 = 1_000_000_000;

fn schedule() -> PollSchedule {
    PollSchedule {
        initial_delay_ms: 100,
        max_delay_ms: 1_000,
        timeout_secs: 30,
    }
}

#[tokio::test(start_paused = true)]
async fn fungible_transfer_with_fast_tier() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let pricer = StaticGasPricer::default();
    let recipient = env.keys.recipient();
    let amount = U256::from(1_000_000);

    let sender_before = env
        .source
        .erc20_balance(env.source_env.fungible.contract, env.source.sender())
        .await
        .unwrap();

    let report = RelayScenario::new(
        &env.source,
        &env.source_env,
        &env.destination,
        &env.destination_env,
        &pricer,
    )
    .with_schedule(schedule())
    .fungible_transfer(amount, recipient, Priority::Fast)
    .await
    .unwrap();

    assert_eq!(report.gas_price, Some(140 * GWEI));
    assert_eq!(report.proposal.origin_domain_id, SOURCE_DOMAIN);
    assert_eq!(report.proposal.deposit_nonce, 1);

    let received = env
        .destination
        .erc20_balance(env.destination_env.fungible.contract, recipient)
        .await
        .unwrap();
    assert_eq!(received, amount);

    let sender_after = env
        .source
        .erc20_balance(env.source_env.fungible.contract, env.source.sender())
        .await
        .unwrap();
    assert!(sender_before - sender_after >= amount);
}

#[tokio::test(start_paused = true)]
async fn non_fungible_transfer_moves_token() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let pricer = StaticGasPricer::default();
    let recipient = env.keys.recipient();
    let token_id = U256::from(1);

    let report = RelayScenario::new(
        &env.source,
        &env.source_env,
        &env.destination,
        &env.destination_env,
        &pricer,
    )
    .with_schedule(schedule())
    .non_fungible_transfer(token_id, "metadata.url", recipient, Priority::Slow)
    .await
    .unwrap();

    assert_eq!(report.gas_price, Some(50 * GWEI));
    assert_eq!(report.proposal.deposit_nonce, 1);

    assert!(
        env.source
            .erc721_owner(env.source_env.non_fungible.contract, token_id)
            .await
            .is_err(),
        "token must be burned on the source"
    );
    assert_eq!(
        env.destination
            .erc721_owner(env.destination_env.non_fungible.contract, token_id)
            .await
            .unwrap(),
        recipient
    );
}

#[tokio::test(start_paused = true)]
async fn generic_transfer_stores_payload_hash() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let pricer = StaticGasPricer::default();
    let asset = keccak256("generic payload");

    let report = RelayScenario::new(
        &env.source,
        &env.source_env,
        &env.destination,
        &env.destination_env,
        &pricer,
    )
    .with_schedule(schedule())
    .generic_transfer(asset, Priority::Slow)
    .await
    .unwrap();

    assert_eq!(report.gas_price, Some(50 * GWEI));

    let store = env.destination_env.asset_store();
    assert!(env.destination.asset_stored(store, asset).await.unwrap());
    assert!(
        !env.destination
            .asset_stored(store, keccak256("never deposited"))
            .await
            .unwrap()
    );
}

#[tokio::test(start_paused = true)]
async fn transfers_run_back_to_back() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let pricer = StaticGasPricer::default();
    let scenario = RelayScenario::new(
        &env.source,
        &env.source_env,
        &env.destination,
        &env.destination_env,
        &pricer,
    )
    .with_schedule(schedule());

    let first = scenario
        .fungible_transfer(U256::from(5), env.keys.recipient(), Priority::Slow)
        .await
        .unwrap();
    let second = scenario
        .fungible_transfer(U256::from(7), env.keys.recipient(), Priority::Medium)
        .await
        .unwrap();

    assert_eq!(first.gas_price, Some(50 * GWEI));
    assert_eq!(second.gas_price, Some(90 * GWEI));
    assert_eq!(second.proposal.deposit_nonce, 2);
}

#[tokio::test(start_paused = true)]
async fn overlapping_deposits_wait_for_their_own_proposal() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let pricer = StaticGasPricer::default();

    // Still in flight when the generic transfer starts; executes first.
    let earlier = DepositIntent::new(
        &env.source_env,
        DESTINATION_DOMAIN,
        env.keys.recipient(),
        DepositPayload::Fungible {
            amount: U256::from(11),
        },
    );
    let tx_hash = submit_deposit(&env.source, &env.source_env, earlier)
        .await
        .unwrap();
    env.source.confirm(tx_hash).await.unwrap();
    assert_eq!(
        deposit_nonce(&env.source, env.source_env.bridge, tx_hash)
            .await
            .unwrap(),
        1
    );
    tokio::time::advance(Duration::from_secs(1)).await;

    let asset = keccak256("second deposit");
    let report = RelayScenario::new(
        &env.source,
        &env.source_env,
        &env.destination,
        &env.destination_env,
        &pricer,
    )
    .with_schedule(schedule())
    .generic_transfer(asset, Priority::Medium)
    .await
    .unwrap();

    assert_eq!(report.proposal.deposit_nonce, 2);
    assert_eq!(report.gas_price, Some(90 * GWEI));
    assert!(
        env.destination
            .asset_stored(env.destination_env.asset_store(), asset)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn deposit_nonce_requires_a_deposit_event() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let tx_hash = env
        .source
        .send_and_confirm(
            env.source_env.fungible.contract,
            ContractCall::Erc20Approve {
                spender: env.source_env.fungible.handler,
                amount: U256::from(1),
            },
            TransactOptions::default(),
        )
        .await
        .unwrap();

    let err = deposit_nonce(&env.source, env.source_env.bridge, tx_hash)
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::Query(BindingError::MissingEvent { event: "Deposit", .. })),
        "{err}"
    );
}

#[tokio::test(start_paused = true)]
async fn fee_oracle_deposit_carries_signed_quote() {
    let mut env = Environment::provisioned(RELAY_LATENCY).await;
    env.source_env.fee_handler.kind = FeeHandlerKind::FeeOracle;
    let pricer = StaticGasPricer::default();
    let amount = U256::from(250);
    let settings = DepositSettings {
        token_rate: "2.5".to_string(),
        source_decimals: 6,
        destination_decimals: 6,
        fee_oracle_key: Some(ANVIL_KEYS[1].to_string()),
        ..Default::default()
    };

    RelayScenario::new(
        &env.source,
        &env.source_env,
        &env.destination,
        &env.destination_env,
        &pricer,
    )
    .with_schedule(schedule())
    .with_settings(settings)
    .fungible_transfer(amount, env.keys.recipient(), Priority::Slow)
    .await
    .unwrap();

    let fee_data = env.source.fee_data().pop().unwrap();
    assert_eq!(fee_data.len(), 8 * 32 + 65 + 32);
    let (message, rest) = fee_data.split_at(8 * 32);
    let (signature, amount_word) = rest.split_at(65);

    assert_eq!(
        U256::from_be_slice(&message[..32]),
        U256::from(1000u64) * U256::from(10u64.pow(18))
    );
    assert_eq!(U256::from_be_slice(&message[32..64]), U256::from(2_500_000));
    assert_eq!(U256::from_be_slice(amount_word), amount);

    let oracle = Signature::from_raw(signature)
        .unwrap()
        .recover_address_from_prehash(&keccak256(message))
        .unwrap();
    assert_eq!(oracle, env.keys.bob.address());
}

#[tokio::test]
async fn fee_oracle_without_key_is_rejected_before_sending() {
    let mut env = Environment::provisioned(RELAY_LATENCY).await;
    env.source_env.fee_handler.kind = FeeHandlerKind::FeeOracle;
    let pricer = StaticGasPricer::default();
    let sent_before = env.source.history().len();

    let err = RelayScenario::new(
        &env.source,
        &env.source_env,
        &env.destination,
        &env.destination_env,
        &pricer,
    )
    .generic_transfer(keccak256("unpriced"), Priority::Slow)
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Configuration(_)), "{err}");
    assert_eq!(env.source.history().len(), sent_before);
}

#[tokio::test]
async fn non_fungible_deposit_requires_owner_and_approval() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let token = env.source_env.non_fungible.contract;
    let stranger = env.source.as_sender(env.keys.alice.address());

    for token_id in [7u64, 8] {
        env.source
            .send_and_confirm(
                token,
                ContractCall::Erc721Mint {
                    to: env.source.sender(),
                    token_id: U256::from(token_id),
                    metadata: String::new(),
                },
                TransactOptions::default(),
            )
            .await
            .unwrap();
    }
    env.source
        .send_and_confirm(
            token,
            ContractCall::Erc721Approve {
                to: env.source_env.non_fungible.handler,
                token_id: U256::from(8),
            },
            TransactOptions::default(),
        )
        .await
        .unwrap();

    let deposit = |token_id: u64| {
        DepositIntent::new(
            &env.source_env,
            DESTINATION_DOMAIN,
            env.keys.recipient(),
            DepositPayload::NonFungible {
                token_id: U256::from(token_id),
                metadata: Bytes::new(),
            },
        )
    };

    // Owned by the deployer, approved, but deposited by someone else.
    let tx_hash = submit_deposit(&stranger, &env.source_env, deposit(8))
        .await
        .unwrap();
    assert!(matches!(
        stranger.confirm(tx_hash).await,
        Err(BindingError::Reverted(_))
    ));

    // Owned by the depositor, but the handler was never approved.
    let tx_hash = submit_deposit(&env.source, &env.source_env, deposit(7))
        .await
        .unwrap();
    assert!(matches!(
        env.source.confirm(tx_hash).await,
        Err(BindingError::Reverted(_))
    ));

    assert_eq!(
        env.source.erc721_owner(token, U256::from(7)).await.unwrap(),
        env.source.sender()
    );
    let tx_hash = submit_deposit(&env.source, &env.source_env, deposit(8))
        .await
        .unwrap();
    env.source.confirm(tx_hash).await.unwrap();
}

#[tokio::test]
async fn token_absence_check_surfaces_rpc_errors() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let token = env.destination_env.non_fungible.contract;
    assert_token_absent(&env.destination, token, U256::from(42))
        .await
        .unwrap();

    env.destination.set_rpc_down(true);
    let err = assert_token_absent(&env.destination, token, U256::from(42))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Query(BindingError::Rpc(_))), "{err}");
}

#[tokio::test(start_paused = true)]
async fn watcher_times_out_without_relay() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let schedule = PollSchedule {
        timeout_secs: 5,
        ..schedule()
    };

    let err = wait_for_proposal_executed(
        &env.destination,
        env.destination_env.bridge,
        ProposalFilter::from_origin(SOURCE_DOMAIN),
        &schedule,
    )
    .await
    .unwrap_err();

    match err {
        Error::FinalityTimeout { bridge, waited } => {
            assert_eq!(bridge, env.destination_env.bridge);
            assert!(waited >= Duration::from_secs(5), "{waited:?}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn watcher_observes_delayed_execution() {
    let env = Environment::provisioned(Duration::from_secs(10)).await;
    let watch = ProposalWatch::start(
        &env.destination,
        env.destination_env.bridge,
        ProposalFilter::from_origin(SOURCE_DOMAIN).with_nonce(1),
    )
    .await
    .unwrap();

    let intent = DepositIntent::new(
        &env.source_env,
        DESTINATION_DOMAIN,
        env.keys.recipient(),
        DepositPayload::Fungible {
            amount: U256::from(1),
        },
    );
    let tx_hash = submit_deposit(&env.source, &env.source_env, intent)
        .await
        .unwrap();
    env.source.confirm(tx_hash).await.unwrap();

    assert!(watch.check(&env.destination).await.unwrap().is_none());

    let started = tokio::time::Instant::now();
    let executed = watch.wait(&env.destination, &schedule()).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(executed.deposit_nonce, 1);
    assert!(executed.tx_hash.is_some());
}

#[tokio::test(start_paused = true)]
async fn watcher_ignores_other_origins_and_earlier_blocks() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let bridge = env.destination_env.bridge;
    env.destination.emit_proposal_execution(bridge, SOURCE_DOMAIN, 1);

    let watch = ProposalWatch::start(
        &env.destination,
        bridge,
        ProposalFilter::from_origin(SOURCE_DOMAIN),
    )
    .await
    .unwrap();
    assert!(watch.check(&env.destination).await.unwrap().is_none());

    env.destination.emit_proposal_execution(bridge, 9, 1);
    assert!(watch.check(&env.destination).await.unwrap().is_none());

    // Emitted by a different contract.
    env.destination
        .emit_proposal_execution(Address::repeat_byte(0x99), SOURCE_DOMAIN, 2);
    assert!(watch.check(&env.destination).await.unwrap().is_none());

    env.destination.emit_proposal_execution(bridge, SOURCE_DOMAIN, 2);
    let found = check_proposal_executed(
        &env.destination,
        bridge,
        ProposalFilter::from_origin(SOURCE_DOMAIN),
        watch.from_block(),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(found.deposit_nonce, 2);
}

#[tokio::test(start_paused = true)]
async fn watcher_accepts_out_of_range_timeout() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let bridge = env.destination_env.bridge;
    let watch = ProposalWatch::start(
        &env.destination,
        bridge,
        ProposalFilter::from_origin(SOURCE_DOMAIN),
    )
    .await
    .unwrap();
    env.destination.emit_proposal_execution(bridge, SOURCE_DOMAIN, 4);

    let schedule = PollSchedule {
        initial_delay_ms: u64::MAX,
        max_delay_ms: u64::MAX,
        timeout_secs: u64::MAX,
    };
    let executed = watch.wait(&env.destination, &schedule).await.unwrap();
    assert_eq!(executed.deposit_nonce, 4);
}

#[tokio::test(start_paused = true)]
async fn watcher_surfaces_rpc_errors() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    env.destination.set_rpc_down(true);

    let err = wait_for_proposal_executed(
        &env.destination,
        env.destination_env.bridge,
        ProposalFilter::from_origin(SOURCE_DOMAIN),
        &schedule(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Query(_)), "{err}");
}

#[tokio::test]
async fn malformed_override_is_rejected_before_sending() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let sent_before = env.source.history().len();

    let intent = DepositIntent::new(
        &env.source_env,
        DESTINATION_DOMAIN,
        env.keys.recipient(),
        DepositPayload::Fungible {
            amount: U256::from(1),
        },
    )
    .with_override_data(vec![0u8; 40]);

    let err = submit_deposit(&env.source, &env.source_env, intent)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedPayload(_)), "{err}");
    assert_eq!(env.source.history().len(), sent_before);
}

#[tokio::test]
async fn well_formed_override_replaces_generated_data() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let other = Address::repeat_byte(0x77);
    let data = DepositPayload::Fungible {
        amount: U256::from(3),
    }
    .encode(other);

    let intent = DepositIntent::new(
        &env.source_env,
        DESTINATION_DOMAIN,
        env.keys.recipient(),
        DepositPayload::Fungible {
            amount: U256::from(3),
        },
    )
    .with_override_data(data);
    let tx_hash = submit_deposit(&env.source, &env.source_env, intent)
        .await
        .unwrap();
    env.source.confirm(tx_hash).await.unwrap();
}

#[tokio::test]
async fn reverted_deposit_is_surfaced() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    // Holds no tokens and gave no allowance.
    let stranger = env.source.as_sender(env.keys.alice.address());

    let intent = DepositIntent::new(
        &env.source_env,
        DESTINATION_DOMAIN,
        env.keys.recipient(),
        DepositPayload::Fungible {
            amount: U256::from(1_000_000),
        },
    );
    let tx_hash = submit_deposit(&stranger, &env.source_env, intent)
        .await
        .unwrap();
    assert!(stranger.confirm(tx_hash).await.is_err());
}

#[tokio::test]
async fn deposit_with_mismatched_resource_id_is_rejected() {
    let env = Environment::provisioned(RELAY_LATENCY).await;
    let mut intent = DepositIntent::new(
        &env.source_env,
        DESTINATION_DOMAIN,
        env.keys.recipient(),
        DepositPayload::Generic {
            payload: Bytes::from(B256::ZERO.to_vec()),
        },
    );
    intent.resource_id = crate::resource::resource_id(crate::AssetClass::Fungible);

    let err = submit_deposit(&env.source, &env.source_env, intent)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{err}");
}
