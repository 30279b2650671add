use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::{address, Address, U256};
use contractmind::config::{RoutePolicy, ServiceConfig};
use contractmind::domain::types::Route;
use contractmind::features::rpc::MockLedgerRpc;
use contractmind::intent::abi::{selector, AbiType};
use contractmind::intent::catalog::InterfaceCatalog;
use contractmind::intent::classifier::{classify, Classification, Intent, IntentContext};
use contractmind::intent::codec::{decode, encode, AbiValue};
use contractmind::service::{ChatRequest, ContractMind};
use contractmind::storage::{AgentStore, SqliteAgentStore};
use contractmind::AgentId;

const USER: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
const OWNER: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
const TARGET: Address = address!("00000000000000000000000000000000000000c0");
const HUB: Address = address!("00000000000000000000000000000000000000b0");
const REGISTRY: Address = address!("00000000000000000000000000000000000000d0");

fn config(route_policy: RoutePolicy) -> ServiceConfig {
    ServiceConfig {
        hub_address: Some(HUB),
        registry_address: Some(REGISTRY),
        route_policy,
        ..ServiceConfig::default()
    }
}

fn agent_tuple(catalog: &InterfaceCatalog) -> Vec<u8> {
    encode(
        std::slice::from_ref(&catalog.registry().agent_record),
        &[AbiValue::Tuple(vec![
            AbiValue::Address(OWNER),
            AbiValue::Address(TARGET),
            AbiValue::String("erc20-2".to_string()),
            AbiValue::String("ipfs://erc20-2".to_string()),
            AbiValue::Bool(true),
            AbiValue::Uint(U256::from(1_700_000_000u64)),
            AbiValue::Uint(U256::from(1_700_000_000u64)),
        ])],
    )
    .expect("agent tuple should encode")
}

fn registered_ledger(catalog: &InterfaceCatalog) -> MockLedgerRpc {
    MockLedgerRpc::new().with_call_result(
        REGISTRY,
        catalog.registry().get_agent.selector(),
        agent_tuple(catalog),
    )
}

fn sqlite_store() -> (tempfile::TempDir, Arc<SqliteAgentStore>) {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let store = SqliteAgentStore::open(&dir.path().join("contractmind.db"))
        .expect("sqlite store should open");
    (dir, Arc::new(store))
}

fn chat(action: &str, message: &str) -> ChatRequest {
    ChatRequest {
        message: message.to_string(),
        user_address: USER,
        action: Some(action.to_string()),
        protocol: None,
        amount: None,
        token: None,
        params: BTreeMap::new(),
    }
}

#[test]
fn balance_action_and_balance_text_resolve_to_the_same_function() {
    let catalog = InterfaceCatalog::builtin();
    let context = IntentContext {
        caller: USER,
        target: TARGET,
        route: Route::Direct,
        token_decimals: 18,
    };
    let by_action = Intent {
        action: "balanceof".to_string(),
        ..Intent::default()
    };
    let by_text = Intent {
        message: "how much is my Balance right now".to_string(),
        ..Intent::default()
    };
    let function = |intent: &Intent| match classify(&catalog, intent, &context)
        .expect("classification should succeed")
    {
        Classification::Resolved(operation) => operation.function.canonical().to_string(),
        Classification::Unknown(unknown) => panic!("unexpected clarification: {}", unknown.clarification),
    };
    assert_eq!(function(&by_action), "balanceOf(address)");
    assert_eq!(function(&by_text), "balanceOf(address)");
    assert_eq!(selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
}

#[test]
fn stake_action_is_a_write_whatever_the_message_says() {
    let catalog = InterfaceCatalog::builtin();
    let intent = Intent {
        action: "stake".to_string(),
        message: "what is my balance".to_string(),
        amount: Some("1000".to_string()),
        ..Intent::default()
    };
    let context = IntentContext {
        caller: USER,
        target: TARGET,
        route: Route::Direct,
        token_decimals: 18,
    };
    let Classification::Resolved(operation) =
        classify(&catalog, &intent, &context).expect("classification should succeed")
    else {
        panic!("stake should resolve");
    };
    assert_eq!(operation.function.canonical(), "stake(uint256)");
}

#[tokio::test]
async fn hub_routed_balance_query_decodes_a_decimal_string() {
    let catalog = InterfaceCatalog::global();
    let balance = U256::from(10u64).pow(U256::from(21u64)) + U256::from(7u64);
    let inner_output =
        encode(&[AbiType::Uint(256)], &[AbiValue::Uint(balance)]).expect("balance encodes");
    let hub_output = encode(&[AbiType::Bytes], &[AbiValue::Bytes(inner_output)])
        .expect("hub output encodes");
    let rpc = Arc::new(registered_ledger(catalog).with_call_result(
        HUB,
        catalog.hub().query_target.selector(),
        hub_output,
    ));
    let (_dir, store) = sqlite_store();
    let service = ContractMind::new(config(RoutePolicy::Hub), rpc.clone(), store.clone());

    let response = service
        .process_message("erc20-2", chat("balance", "what's my balance"))
        .await
        .expect("balance query should succeed");

    assert!(response.success);
    assert!(!response.requires_transaction);
    let data = response.data.expect("query returns data");
    assert_eq!(data["balance"], "1000000000000000000007");
    assert_eq!(response.response, "Fetched balance from contract.");

    let hub_call = rpc
        .recorded_calls()
        .into_iter()
        .find(|call| call.to == HUB)
        .expect("query should go through the hub");
    assert_eq!(hub_call.from, Some(USER));
    let query_target = &catalog.hub().query_target;
    assert_eq!(&hub_call.data[..4], &query_target.selector());
    let forwarded = decode(query_target.inputs(), &hub_call.data[4..]).expect("wrapper decodes");
    let agent_id = AgentId::normalize("erc20-2").expect("agent id");
    assert_eq!(forwarded[0], AbiValue::FixedBytes(agent_id.as_bytes().to_vec()));
    assert_eq!(forwarded[1], AbiValue::Address(TARGET));
    let inner = forwarded[2].as_bytes().expect("inner calldata");
    assert_eq!(&inner[..4], &[0x70, 0xa0, 0x82, 0x31]);
    assert_eq!(
        decode(&[AbiType::Address], &inner[4..]).expect("argument decodes"),
        vec![AbiValue::Address(USER)]
    );

    assert_eq!(
        store
            .get_agent(&agent_id)
            .expect("cache read")
            .map(|record| record.target_contract),
        Some(TARGET),
        "registry hit should backfill the cache"
    );
}

#[tokio::test]
async fn stake_intent_compiles_a_direct_preview() {
    let catalog = InterfaceCatalog::global();
    let rpc = Arc::new(
        registered_ledger(catalog)
            .with_gas_estimate(120_000)
            .with_gas_price(U256::from(6_000_000_000u64))
            .with_nonce(4),
    );
    let (_dir, store) = sqlite_store();
    let service = ContractMind::new(config(RoutePolicy::Direct), rpc, store);

    let mut request = chat("stake", "");
    request.amount = Some("1000".to_string());
    request.token = Some("SOMI".to_string());
    let response = service
        .process_message("erc20-2", request)
        .await
        .expect("stake should compile");

    assert!(response.requires_transaction);
    let preview = response.transaction.expect("stake returns a preview");
    assert_eq!(preview.to, TARGET);
    assert_eq!(&preview.data[..4], &selector("stake(uint256)"));
    let amount = decode(&[AbiType::Uint(256)], &preview.data[4..]).expect("amount decodes");
    assert_eq!(
        amount,
        vec![AbiValue::Uint(U256::from(1000u64) * U256::from(10u64).pow(U256::from(18u64)))]
    );
    assert!(preview.warnings.iter().any(|warning| warning == "Gas fees will apply"));
    assert_eq!(preview.gas_estimate, "120000");
    assert_eq!(preview.gas_price.as_deref(), Some("6000000000"));
    assert_eq!(preview.nonce, Some(4));
    assert_eq!(preview.explanation, "Stake 1000 SOMI");
    assert_eq!(preview.route, "direct");
}

#[tokio::test]
async fn hub_routed_stake_wraps_calldata_and_falls_back_to_default_gas() {
    let catalog = InterfaceCatalog::global();
    let rpc = Arc::new(registered_ledger(catalog));
    let (_dir, store) = sqlite_store();
    let service = ContractMind::new(config(RoutePolicy::Hub), rpc, store);

    let mut request = chat("", "stake 1000 SOMI");
    request.action = None;
    let response = service
        .process_message("erc20-2", request)
        .await
        .expect("stake should compile");

    let preview = response.transaction.expect("stake returns a preview");
    assert_eq!(preview.to, HUB);
    let execute = &catalog.hub().execute_function;
    assert_eq!(&preview.data[..4], &execute.selector());
    let forwarded = decode(execute.inputs(), &preview.data[4..]).expect("wrapper decodes");
    let inner = forwarded[2].as_bytes().expect("inner calldata");
    assert_eq!(&inner[..4], &selector("stake(uint256)"));
    assert_eq!(preview.gas_estimate, "500000");
    assert_eq!(preview.gas_price, None);
    assert!(preview
        .warnings
        .iter()
        .any(|warning| warning.contains("using default limit of 500000")));
}

#[tokio::test]
async fn node_revert_reason_reaches_the_caller_unmodified() {
    let catalog = InterfaceCatalog::global();
    let rpc = Arc::new(registered_ledger(catalog).with_call_error(
        TARGET,
        selector("getTVL()"),
        contractmind::features::rpc::RpcError::Reverted {
            reason: "execution reverted: paused".to_string(),
        },
    ));
    let (_dir, store) = sqlite_store();
    let service = ContractMind::new(config(RoutePolicy::Direct), rpc, store);

    let error = service
        .process_message("erc20-2", chat("tvl", "show tvl"))
        .await
        .expect_err("reverted read must fail");
    assert_eq!(
        error,
        contractmind::CoreError::QueryExecution {
            reason: "execution reverted: paused".to_string()
        }
    );
}

#[tokio::test]
async fn questions_mentioning_write_verbs_stay_reads() {
    let catalog = InterfaceCatalog::global();
    let word = |value: u64| {
        encode(&[AbiType::Uint(256)], &[AbiValue::Uint(U256::from(value))]).expect("word encodes")
    };
    let stake_info = encode(
        &[
            AbiType::Uint(256),
            AbiType::Uint(256),
            AbiType::Uint(256),
            AbiType::Uint(256),
        ],
        &[
            AbiValue::Uint(U256::from(500u64)),
            AbiValue::Uint(U256::from(12u64)),
            AbiValue::Uint(U256::from(86_400u64)),
            AbiValue::Uint(U256::from(750u64)),
        ],
    )
    .expect("stake info encodes");
    let rpc = Arc::new(
        registered_ledger(catalog)
            .with_call_result(TARGET, selector("getStakeInfo(address)"), stake_info)
            .with_call_result(TARGET, selector("pendingRewards(address)"), word(42)),
    );
    let (_dir, store) = sqlite_store();
    let service = ContractMind::new(config(RoutePolicy::Direct), rpc.clone(), store);
    let ask = |message: &str| {
        let mut request = chat("", message);
        request.action = None;
        request
    };

    let info = service
        .process_message("erc20-2", ask("what is my stake info"))
        .await
        .expect("stake info is a read");
    assert!(!info.requires_transaction);
    assert_eq!(info.data.expect("read data")["stakedAmount"], "500");

    let rewards = service
        .process_message("erc20-2", ask("can I claim rewards yet?"))
        .await
        .expect("rewards is a read");
    assert!(!rewards.requires_transaction);
    assert!(rewards.transaction.is_none());
    assert_eq!(rewards.data.expect("read data")["rewards"], "42");

    let withdraw = service
        .process_message("erc20-2", ask("how much can I withdraw?"))
        .await
        .expect("an unmatched question asks for clarification");
    assert!(withdraw.success);
    assert!(!withdraw.requires_transaction);
    assert!(withdraw.response.contains("'stake info'"));

    assert!(rpc.recorded_estimates().is_empty(), "no write was compiled");
}
