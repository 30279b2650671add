use std::sync::Arc;

use alloy_primitives::{address, b256, Address, Bytes, B256, U256};
use contractmind::config::ServiceConfig;
use contractmind::domain::types::{LogEntry, TransactionReceipt, TransactionStatus};
use contractmind::features::rpc::MockLedgerRpc;
use contractmind::intent::abi::AbiType;
use contractmind::intent::catalog::{InterfaceCatalog, KnownEvent};
use contractmind::intent::codec::{decode, encode, AbiValue};
use contractmind::service::{ContractMind, RegistrationRequest};
use contractmind::storage::{AgentStore, SqliteAgentStore};
use contractmind::AgentId;

const OWNER: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
const TARGET: Address = address!("00000000000000000000000000000000000000c0");
const HUB: Address = address!("00000000000000000000000000000000000000b0");
const REGISTRY: Address = address!("00000000000000000000000000000000000000d0");
const IMPOSTOR: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");
const REGISTER_TX: B256 =
    b256!("4444444444444444444444444444444444444444444444444444444444444444");
const EMPTY_TX: B256 = b256!("5555555555555555555555555555555555555555555555555555555555555555");
const MISSING_TX: B256 =
    b256!("6666666666666666666666666666666666666666666666666666666666666666");
const EXECUTE_TX: B256 =
    b256!("7777777777777777777777777777777777777777777777777777777777777777");

fn config() -> ServiceConfig {
    ServiceConfig {
        hub_address: Some(HUB),
        registry_address: Some(REGISTRY),
        receipt_wait_ceiling_ms: 30,
        receipt_poll_interval_ms: 10,
        ..ServiceConfig::default()
    }
}

fn agent_id() -> AgentId {
    AgentId::normalize("0x9f2c000000000000000000000000000000000000000000000000000000000001")
        .expect("hash agent id")
}

fn registration_log(catalog: &InterfaceCatalog) -> LogEntry {
    let registered = catalog
        .event(KnownEvent::AgentRegistered)
        .expect("registration event");
    LogEntry {
        address: REGISTRY,
        topics: vec![registered.topic0, agent_id().as_b256(), OWNER.into_word()],
        data: Bytes::from(
            encode(
                &[AbiType::Address, AbiType::String],
                &[
                    AbiValue::Address(TARGET),
                    AbiValue::String("staking-helper".to_string()),
                ],
            )
            .expect("event data encodes"),
        ),
        log_index: 1,
        transaction_hash: REGISTER_TX,
    }
}

fn unrelated_log() -> LogEntry {
    LogEntry {
        address: TARGET,
        topics: vec![B256::repeat_byte(0x99)],
        data: Bytes::new(),
        log_index: 0,
        transaction_hash: REGISTER_TX,
    }
}

fn receipt(tx_hash: B256, logs: Vec<LogEntry>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: tx_hash,
        status: 1,
        block_number: 1_024,
        gas_used: 210_000,
        logs,
    }
}

fn agent_tuple(catalog: &InterfaceCatalog) -> Vec<u8> {
    agent_tuple_owned_by(catalog, OWNER)
}

fn agent_tuple_owned_by(catalog: &InterfaceCatalog, owner: Address) -> Vec<u8> {
    encode(
        std::slice::from_ref(&catalog.registry().agent_record),
        &[AbiValue::Tuple(vec![
            AbiValue::Address(owner),
            AbiValue::Address(TARGET),
            AbiValue::String("staking-helper".to_string()),
            AbiValue::String("ipfs://helper".to_string()),
            AbiValue::Bool(true),
            AbiValue::Uint(U256::from(1_710_000_000u64)),
            AbiValue::Uint(U256::from(1_710_000_000u64)),
        ])],
    )
    .expect("agent tuple encodes")
}

fn build_service(rpc: MockLedgerRpc) -> (tempfile::TempDir, Arc<SqliteAgentStore>, ContractMind) {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let store = Arc::new(
        SqliteAgentStore::open(&dir.path().join("agents.db")).expect("sqlite store should open"),
    );
    let service = ContractMind::new(config(), Arc::new(rpc), store.clone());
    (dir, store, service)
}

#[tokio::test]
async fn prepared_registration_targets_the_registry() {
    let catalog = InterfaceCatalog::global();
    let (_dir, _store, service) = build_service(MockLedgerRpc::new().with_gas_estimate(180_000));
    let prepared = service
        .prepare_registration(RegistrationRequest {
            owner_address: OWNER,
            target_contract: TARGET,
            name: "staking-helper".to_string(),
            config_ref: "ipfs://helper".to_string(),
        })
        .await
        .expect("registration should compile");

    let transaction = prepared.transaction;
    assert_eq!(transaction.to, REGISTRY);
    assert_eq!(transaction.function_name, "registerAgent");
    assert_eq!(transaction.explanation, "Register agent 'staking-helper'");
    assert_eq!(transaction.gas_estimate, "180000");
    assert!(transaction
        .warnings
        .contains(&"You will grant your agent configuration on-chain".to_string()));
    let register = &catalog.registry().register_agent;
    assert_eq!(&transaction.data[..4], &register.selector());
    let arguments = decode(register.inputs(), &transaction.data[4..]).expect("arguments decode");
    assert_eq!(arguments[0], AbiValue::Address(TARGET));
    assert_eq!(arguments[2], AbiValue::String("ipfs://helper".to_string()));
}

#[tokio::test]
async fn confirmed_registration_is_cached_once() {
    let catalog = InterfaceCatalog::global();
    let rpc = MockLedgerRpc::new()
        .with_call_result(
            REGISTRY,
            catalog.registry().get_agent.selector(),
            agent_tuple(catalog),
        )
        .with_receipt(receipt(
            REGISTER_TX,
            vec![unrelated_log(), registration_log(catalog)],
        ));
    let (_dir, store, service) = build_service(rpc);

    for _ in 0..2 {
        let confirmation = service
            .confirm_registration(REGISTER_TX)
            .await
            .expect("confirmation should succeed");
        assert!(confirmation.success);
        assert_eq!(confirmation.agent_id, Some(agent_id()));
        let agent = confirmation.agent.expect("agent record");
        assert_eq!(agent.owner, OWNER);
        assert_eq!(agent.target_contract, TARGET);
    }

    let listed = service.list_agents(0, 10).expect("list agents");
    assert_eq!(listed.total, 1);
    let cached = store
        .get_agent(&agent_id())
        .expect("cache read")
        .expect("agent should be cached");
    assert_eq!(cached.config_ref, "ipfs://helper");
    assert_eq!(cached.created_at, Some(1_710_000_000));
    assert_eq!(
        service
            .get_agent(&agent_id().to_hex())
            .await
            .expect("cached agent"),
        cached
    );
}

#[tokio::test]
async fn empty_and_missing_receipts_are_reported_distinctly() {
    let rpc = MockLedgerRpc::new().with_receipt(receipt(EMPTY_TX, Vec::new()));
    let (_dir, store, service) = build_service(rpc);

    let empty = service
        .confirm_registration(EMPTY_TX)
        .await
        .expect("empty receipt is not an error");
    assert!(!empty.success);
    assert_eq!(empty.error.as_deref(), Some("AgentRegistered event not found"));

    let missing = service
        .confirm_registration(MISSING_TX)
        .await
        .expect("pending is not an error");
    assert!(!missing.success);
    assert_eq!(missing.error.as_deref(), Some("Transaction not found or pending"));

    assert!(store.list_active(0, 10).expect("list").is_empty());
}

#[tokio::test]
async fn transaction_status_decodes_function_executed_events() {
    let catalog = InterfaceCatalog::global();
    let executed = catalog
        .event(KnownEvent::FunctionExecuted)
        .expect("execution event");
    let log = LogEntry {
        address: HUB,
        topics: vec![
            executed.topic0,
            agent_id().as_b256(),
            OWNER.into_word(),
            TARGET.into_word(),
        ],
        data: Bytes::from(
            encode(
                &[AbiType::FixedBytes(4), AbiType::Bool],
                &[
                    AbiValue::FixedBytes(vec![0xa6, 0x94, 0xfc, 0x3a]),
                    AbiValue::Bool(true),
                ],
            )
            .expect("event data encodes"),
        ),
        log_index: 2,
        transaction_hash: EXECUTE_TX,
    };
    let (_dir, _store, service) =
        build_service(MockLedgerRpc::new().with_receipt(receipt(EXECUTE_TX, vec![log])));

    let report = service
        .transaction_status(EXECUTE_TX)
        .await
        .expect("status should succeed");
    assert_eq!(report.status, TransactionStatus::Confirmed);
    assert_eq!(report.block_number, Some(1_024));
    assert_eq!(report.events.len(), 1);
    let event = &report.events[0];
    assert_eq!(event.name, "FunctionExecuted");
    assert_eq!(event.args["target"], AbiValue::Address(TARGET));
    assert_eq!(event.args["success"], AbiValue::Bool(true));

    let pending = service
        .transaction_status(MISSING_TX)
        .await
        .expect("status should succeed");
    assert_eq!(pending.status, TransactionStatus::Pending);
    assert!(pending.events.is_empty());
}

#[tokio::test]
async fn registration_event_from_another_contract_is_not_cached() {
    let catalog = InterfaceCatalog::global();
    let mut spoofed = registration_log(catalog);
    spoofed.address = IMPOSTOR;
    let rpc = MockLedgerRpc::new()
        .with_call_result(
            REGISTRY,
            catalog.registry().get_agent.selector(),
            agent_tuple(catalog),
        )
        .with_receipt(receipt(REGISTER_TX, vec![spoofed]));
    let (_dir, store, service) = build_service(rpc);

    let confirmation = service
        .confirm_registration(REGISTER_TX)
        .await
        .expect("confirmation should complete");
    assert!(!confirmation.success);
    assert_eq!(
        confirmation.error.as_deref(),
        Some("AgentRegistered event not found")
    );
    assert_eq!(store.get_agent(&agent_id()).expect("cache read"), None);
}

#[tokio::test]
async fn registration_the_registry_does_not_know_is_not_cached() {
    let catalog = InterfaceCatalog::global();
    let rpc = MockLedgerRpc::new()
        .with_call_result(
            REGISTRY,
            catalog.registry().get_agent.selector(),
            agent_tuple_owned_by(catalog, Address::ZERO),
        )
        .with_receipt(receipt(REGISTER_TX, vec![registration_log(catalog)]));
    let (_dir, store, service) = build_service(rpc);

    let confirmation = service
        .confirm_registration(REGISTER_TX)
        .await
        .expect("confirmation should complete");
    assert!(!confirmation.success);
    assert_eq!(confirmation.agent_id, Some(agent_id()));
    assert_eq!(confirmation.agent, None);
    assert_eq!(
        confirmation.error.as_deref(),
        Some("Agent not found in registry")
    );
    assert_eq!(store.get_agent(&agent_id()).expect("cache read"), None);
    assert_eq!(service.list_agents(0, 10).expect("list agents").total, 0);
}

#[tokio::test]
async fn reverted_registration_is_reported_as_failed() {
    let catalog = InterfaceCatalog::global();
    let reverted = TransactionReceipt {
        status: 0,
        ..receipt(REGISTER_TX, vec![registration_log(catalog)])
    };
    let (_dir, store, service) = build_service(MockLedgerRpc::new().with_receipt(reverted));

    let confirmation = service
        .confirm_registration(REGISTER_TX)
        .await
        .expect("confirmation should complete");
    assert!(!confirmation.success);
    assert_eq!(confirmation.error.as_deref(), Some("Transaction failed"));
    assert!(store.list_active(0, 10).expect("list").is_empty());
}
