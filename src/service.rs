/// `ContractMind` service façade.
///
/// Owns the long-lived collaborators (ledger RPC, store, catalog) and exposes
/// one async method per external operation. Request and response types mirror
/// the JSON bodies of the chat, agent and transaction surfaces.
///
/// # Chat pipeline (`process_message`)
///
/// 1. **Agent**: normalise the path identifier and resolve it through the
///    directory (cache, then registry).
/// 2. **Route**: hub or direct per the configured policy.
/// 3. **Classify**: write actions compile to a transaction preview; reads
///    execute as simulated calls; anything else returns a clarification.
use crate::config::ServiceConfig;
use crate::domain::types::{
    AgentRecord, CompiledCall, DecodedEvent, GasEstimateSource, OperationKind, TransactionFilter,
    TransactionPage, TransactionRecord, TransactionStatus,
};
use crate::domain::AgentId;
use crate::error::CoreError;
use crate::features::directory::{AgentDirectory, Reconciliation};
use crate::features::query::QueryExecutor;
use crate::features::receipts::{
    decode_receipt_logs, status_report, wait_for_receipt, ReceiptExtractor,
    TransactionStatusReport,
};
use crate::features::route::resolve_route;
use crate::features::rpc::{HttpLedgerRpc, LedgerRpc};
use crate::intent::abi::selector;
use crate::intent::catalog::InterfaceCatalog;
use crate::intent::classifier::{classify, Classification, Intent, IntentContext};
use crate::intent::compiler::CallCompiler;
use crate::storage::{AgentStore, MemoryAgentStore, SqliteAgentStore};
use crate::timing::now_ns;
use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub const DEFAULT_TRANSACTION_PAGE: usize = 50;
pub const MAX_TRANSACTION_PAGE: usize = 100;
pub const MAX_AGENT_PAGE: usize = 100;

// ── Request / response bodies ───────────────────────────────────────────────

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub user_address: Address,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Wallet-facing view of a [`CompiledCall`]. Integers are decimal strings.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPreview {
    pub to: Address,
    pub data: Bytes,
    pub value: String,
    pub gas_estimate: String,
    pub gas_estimate_source: GasEstimateSource,
    pub gas_price: Option<String>,
    pub nonce: Option<u64>,
    pub explanation: String,
    pub function_name: String,
    pub route: String,
    pub warnings: Vec<String>,
}

impl From<CompiledCall> for TransactionPreview {
    fn from(call: CompiledCall) -> Self {
        Self {
            to: call.to,
            data: call.data,
            value: call.value.to_string(),
            gas_estimate: call.gas_estimate.to_string(),
            gas_estimate_source: call.gas_estimate_source,
            gas_price: call.gas_price.map(|price| price.to_string()),
            nonce: call.nonce,
            explanation: call.description,
            function_name: call.function_name,
            route: call.route,
            warnings: call.warnings,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub requires_transaction: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionPreview>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub owner_address: Address,
    pub target_contract: Address,
    pub name: String,
    #[serde(alias = "configIPFS")]
    pub config_ref: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PreparedTransaction {
    pub success: bool,
    pub requires_transaction: bool,
    pub transaction: TransactionPreview,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationConfirmation {
    pub success: bool,
    pub tx_hash: B256,
    pub agent_id: Option<AgentId>,
    pub agent: Option<AgentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmTransactionRequest {
    pub tx_hash: B256,
    pub user_address: Address,
    #[serde(default)]
    pub function_name: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionConfirmation {
    pub success: bool,
    pub response: String,
    pub tx_hash: B256,
    pub status: TransactionStatus,
    pub block_number: Option<String>,
    pub gas_used: Option<String>,
    pub events: Vec<DecodedEvent>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub agent_id: String,
    pub target: Address,
    /// `0x`-prefixed 4-byte selector or a canonical signature.
    pub function_selector: String,
    pub user_address: Address,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub valid: bool,
    pub agent_id: AgentId,
    pub target: Address,
    pub function: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentList {
    pub agents: Vec<AgentRecord>,
    pub total: usize,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub user_address: Option<Address>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

// ── Service ─────────────────────────────────────────────────────────────────

pub struct ContractMind {
    config: ServiceConfig,
    rpc: Arc<dyn LedgerRpc>,
    store: Arc<dyn AgentStore>,
    catalog: &'static InterfaceCatalog,
}

impl ContractMind {
    pub fn new(config: ServiceConfig, rpc: Arc<dyn LedgerRpc>, store: Arc<dyn AgentStore>) -> Self {
        Self {
            config,
            rpc,
            store,
            catalog: InterfaceCatalog::global(),
        }
    }

    /// HTTP ledger plus SQLite when `database_path` is set, memory otherwise.
    pub fn from_config(config: ServiceConfig) -> Result<Self, CoreError> {
        let rpc: Arc<dyn LedgerRpc> = Arc::new(HttpLedgerRpc::from_config(&config)?);
        let store: Arc<dyn AgentStore> = match &config.database_path {
            Some(path) => Arc::new(SqliteAgentStore::open(path)?),
            None => {
                warn!("no database_path configured, using in-memory store");
                Arc::new(MemoryAgentStore::new())
            }
        };
        info!(
            "contractmind ready chain_id={} route_policy={} catalog={}",
            config.chain_id,
            config.route_policy,
            InterfaceCatalog::global().version()
        );
        Ok(Self::new(config, rpc, store))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn catalog(&self) -> &'static InterfaceCatalog {
        self.catalog
    }

    fn directory(&self) -> AgentDirectory<'_> {
        AgentDirectory::new(
            self.rpc.as_ref(),
            self.store.as_ref(),
            self.catalog,
            self.config.registry_address,
        )
    }

    fn compiler(&self) -> CallCompiler<'_> {
        CallCompiler::new(self.rpc.as_ref(), self.catalog, self.config.default_gas_limit)
    }

    fn receipt_wait(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.config.receipt_wait_ceiling_ms),
            Duration::from_millis(self.config.receipt_poll_interval_ms),
        )
    }

    pub async fn process_message(
        &self,
        agent_id: &str,
        request: ChatRequest,
    ) -> Result<ChatResponse, CoreError> {
        let id = AgentId::normalize(agent_id)?;
        let agent = self
            .directory()
            .resolve(id)
            .await?
            .ok_or_else(|| CoreError::AgentNotFound(agent_id.to_string()))?;
        let route = resolve_route(
            self.rpc.as_ref(),
            self.catalog,
            self.config.route_policy,
            self.config.hub_address,
            id,
            agent.target_contract,
        )
        .await;

        let intent = Intent {
            action: request.action.unwrap_or_default(),
            protocol: request.protocol.or_else(|| Some(agent.name.clone())),
            message: request.message,
            amount: request.amount,
            token: request.token,
            params: request.params,
        }
        .with_message_hints(self.catalog);
        let context = IntentContext {
            caller: request.user_address,
            target: agent.target_contract,
            route,
            token_decimals: self.config.token_decimals,
        };

        let operation = match classify(self.catalog, &intent, &context)? {
            Classification::Unknown(unknown) => {
                info!("intent not recognised agent_id={id} action={}", intent.action);
                return Ok(ChatResponse {
                    success: true,
                    response: unknown.clarification,
                    requires_transaction: false,
                    data: None,
                    transaction: None,
                });
            }
            Classification::Resolved(operation) => operation,
        };
        info!(
            "intent resolved agent_id={id} action={} function={} route={}",
            operation.action,
            operation.function.canonical(),
            operation.route.label()
        );

        match operation.kind {
            OperationKind::Write => {
                let call = self.compiler().compile(&operation, request.user_address).await?;
                Ok(ChatResponse {
                    success: true,
                    response: format!("Transaction prepared: {}", call.description),
                    requires_transaction: true,
                    data: None,
                    transaction: Some(call.into()),
                })
            }
            OperationKind::Read => {
                let result = QueryExecutor::new(self.rpc.as_ref(), self.catalog)
                    .execute(&operation, request.user_address)
                    .await?;
                Ok(ChatResponse {
                    success: true,
                    response: result.message,
                    requires_transaction: false,
                    data: Some(result.data),
                    transaction: None,
                })
            }
        }
    }

    pub async fn prepare_registration(
        &self,
        request: RegistrationRequest,
    ) -> Result<PreparedTransaction, CoreError> {
        let registry = self.registry()?;
        let call = self
            .compiler()
            .compile_registration(
                registry,
                request.owner_address,
                request.target_contract,
                &request.name,
                &request.config_ref,
            )
            .await?;
        Ok(PreparedTransaction {
            success: true,
            requires_transaction: true,
            transaction: call.into(),
        })
    }

    /// Waits (bounded) for the registration receipt, then reconciles the
    /// agent into the cache.
    pub async fn confirm_registration(
        &self,
        tx_hash: B256,
    ) -> Result<RegistrationConfirmation, CoreError> {
        self.registry()?;
        let (ceiling, poll_interval) = self.receipt_wait();
        let Some(receipt) = wait_for_receipt(self.rpc.as_ref(), tx_hash, ceiling, poll_interval).await?
        else {
            return Ok(RegistrationConfirmation {
                success: false,
                tx_hash,
                agent_id: None,
                agent: None,
                error: Some("Transaction not found or pending".to_string()),
            });
        };

        Ok(match self.directory().reconcile_from_receipt(receipt).await? {
            Reconciliation::TransactionFailed { .. } => RegistrationConfirmation {
                success: false,
                tx_hash,
                agent_id: None,
                agent: None,
                error: Some("Transaction failed".to_string()),
            },
            Reconciliation::EventNotFound { .. } => RegistrationConfirmation {
                success: false,
                tx_hash,
                agent_id: None,
                agent: None,
                error: Some("AgentRegistered event not found".to_string()),
            },
            Reconciliation::NotRegistered { registration, .. } => RegistrationConfirmation {
                success: false,
                tx_hash,
                agent_id: Some(registration.agent_id),
                agent: None,
                error: Some("Agent not found in registry".to_string()),
            },
            Reconciliation::Reconciled {
                registration,
                record,
                ..
            } => RegistrationConfirmation {
                success: true,
                tx_hash,
                agent_id: Some(registration.agent_id),
                agent: Some(record),
                error: None,
            },
        })
    }

    /// Waits (bounded) for a receipt and records the outcome. A receipt that
    /// does not arrive in time yields a pending confirmation, not an error.
    pub async fn confirm_transaction(
        &self,
        agent_id: &str,
        request: ConfirmTransactionRequest,
    ) -> Result<TransactionConfirmation, CoreError> {
        let id = AgentId::normalize(agent_id)?;
        let (ceiling, poll_interval) = self.receipt_wait();
        let receipt =
            wait_for_receipt(self.rpc.as_ref(), request.tx_hash, ceiling, poll_interval).await?;
        let now = now_ns();
        let mut record = TransactionRecord {
            tx_hash: request.tx_hash,
            agent_id: Some(id),
            user_address: request.user_address,
            function_name: request.function_name,
            status: TransactionStatus::Pending,
            block_number: None,
            gas_used: None,
            created_at_ns: now,
            updated_at_ns: now,
        };

        let Some(receipt) = receipt else {
            self.record_transaction(&record);
            return Ok(TransactionConfirmation {
                success: false,
                response: "Transaction pending...".to_string(),
                tx_hash: request.tx_hash,
                status: TransactionStatus::Pending,
                block_number: None,
                gas_used: None,
                events: Vec::new(),
            });
        };

        let events = decode_receipt_logs(self.catalog, &receipt);
        let report = status_report(&receipt, events);
        record.status = report.status;
        record.block_number = report.block_number;
        record.gas_used = report.gas_used;
        self.record_transaction(&record);

        let success = receipt.succeeded();
        info!(
            "transaction confirmed tx_hash={:#x} agent_id={id} success={success} gas_used={}",
            request.tx_hash, receipt.gas_used
        );
        Ok(TransactionConfirmation {
            success,
            response: if success {
                "Transaction succeeded".to_string()
            } else {
                "Transaction failed".to_string()
            },
            tx_hash: request.tx_hash,
            status: report.status,
            block_number: report.block_number.map(|block| block.to_string()),
            gas_used: report.gas_used.map(|gas| gas.to_string()),
            events: report.events,
        })
    }

    pub async fn transaction_status(
        &self,
        tx_hash: B256,
    ) -> Result<TransactionStatusReport, CoreError> {
        ReceiptExtractor::new(self.rpc.as_ref(), self.catalog)
            .transaction_status(tx_hash)
            .await
    }

    pub async fn validate_transaction(
        &self,
        request: ValidationRequest,
    ) -> Result<ValidationResponse, CoreError> {
        let hub = self.config.hub_address.ok_or_else(|| {
            CoreError::InvalidInput("hub_address must be configured".to_string())
        })?;
        let id = AgentId::normalize(&request.agent_id)?;
        let function_selector = parse_selector(&request.function_selector)?;
        let valid = QueryExecutor::new(self.rpc.as_ref(), self.catalog)
            .validate_transaction(hub, id, request.target, function_selector, request.user_address)
            .await?;
        Ok(ValidationResponse {
            valid,
            agent_id: id,
            target: request.target,
            function: format!("0x{}", hex::encode(function_selector)),
        })
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<AgentRecord, CoreError> {
        let id = AgentId::normalize(agent_id)?;
        self.directory()
            .resolve(id)
            .await?
            .ok_or_else(|| CoreError::AgentNotFound(agent_id.to_string()))
    }

    pub async fn is_agent_active(&self, agent_id: &str) -> Result<bool, CoreError> {
        let id = AgentId::normalize(agent_id)?;
        self.directory().is_agent_active(id).await
    }

    /// One page of cached active agents; `total` counts every active agent.
    pub fn list_agents(&self, offset: usize, limit: usize) -> Result<AgentList, CoreError> {
        let directory = self.directory();
        let agents = directory.list_active(offset, limit.clamp(1, MAX_AGENT_PAGE))?;
        Ok(AgentList {
            total: directory.count_active()?,
            agents,
        })
    }

    pub fn transactions(&self, query: TransactionQuery) -> Result<TransactionPage, CoreError> {
        let agent_id = query
            .agent_id
            .as_deref()
            .map(AgentId::normalize)
            .transpose()?;
        let status = query
            .status
            .as_deref()
            .map(|raw| {
                TransactionStatus::parse(raw).ok_or_else(|| {
                    CoreError::InvalidInput(format!(
                        "status must be pending, confirmed or failed, got {raw}"
                    ))
                })
            })
            .transpose()?;
        let filter = TransactionFilter {
            agent_id,
            user_address: query.user_address,
            status,
            limit: query
                .limit
                .unwrap_or(DEFAULT_TRANSACTION_PAGE)
                .clamp(1, MAX_TRANSACTION_PAGE),
            offset: query.offset.unwrap_or(0),
        };
        Ok(self.store.list_transactions(&filter)?)
    }

    fn registry(&self) -> Result<Address, CoreError> {
        self.config.registry_address.ok_or_else(|| {
            CoreError::InvalidInput("registry_address must be configured".to_string())
        })
    }

    fn record_transaction(&self, record: &TransactionRecord) {
        if let Err(error) = self.store.upsert_transaction(record) {
            error!(
                "transaction history write failed tx_hash={:#x} error={error}",
                record.tx_hash
            );
        }
    }
}

/// `0x` + 8 hex digits, or a canonical signature such as `stake(uint256)`.
pub fn parse_selector(raw: &str) -> Result<[u8; 4], CoreError> {
    let raw = raw.trim();
    if let Some(digits) = raw.strip_prefix("0x") {
        let mut out = [0u8; 4];
        return hex::decode_to_slice(digits, &mut out)
            .map(|()| out)
            .map_err(|_error| {
                CoreError::InvalidInput(
                    "function_selector must be 0x followed by 8 hex digits".to_string(),
                )
            });
    }
    if raw.contains('(') && raw.ends_with(')') && !raw.contains(' ') {
        return Ok(selector(raw));
    }
    Err(CoreError::InvalidInput(
        "function_selector must be a 4-byte hex selector or a canonical signature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::{
        parse_selector, ChatRequest, ConfirmTransactionRequest, ContractMind, TransactionQuery,
        ValidationRequest,
    };
    use crate::config::{RoutePolicy, ServiceConfig};
    use crate::domain::types::{AgentRecord, TransactionReceipt, TransactionStatus};
    use crate::domain::AgentId;
    use crate::error::CoreError;
    use crate::features::rpc::MockLedgerRpc;
    use crate::intent::abi::AbiType;
    use crate::intent::catalog::InterfaceCatalog;
    use crate::intent::codec::{encode, AbiValue};
    use crate::storage::{AgentStore, MemoryAgentStore};
    use alloy_primitives::{address, b256, Address, B256, U256};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const USER: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const TARGET: Address = address!("00000000000000000000000000000000000000c0");
    const HUB: Address = address!("00000000000000000000000000000000000000b0");
    const TX: B256 = b256!("3333333333333333333333333333333333333333333333333333333333333333");

    fn config() -> ServiceConfig {
        ServiceConfig {
            hub_address: Some(HUB),
            route_policy: RoutePolicy::Direct,
            receipt_wait_ceiling_ms: 20,
            receipt_poll_interval_ms: 5,
            ..ServiceConfig::default()
        }
    }

    fn seeded_store() -> Arc<MemoryAgentStore> {
        let store = Arc::new(MemoryAgentStore::new());
        store
            .upsert_agent(&AgentRecord {
                id: AgentId::normalize("staking").expect("agent id"),
                owner: USER,
                target_contract: TARGET,
                name: "staking".to_string(),
                config_ref: "ipfs://config".to_string(),
                active: true,
                created_at: None,
            })
            .expect("seed agent");
        store
    }

    fn chat(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            user_address: USER,
            action: None,
            protocol: None,
            amount: None,
            token: None,
            params: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn unrecognised_read_returns_clarification() {
        let service = ContractMind::new(config(), Arc::new(MockLedgerRpc::new()), seeded_store());
        let response = service
            .process_message("staking", chat("tell me something"))
            .await
            .expect("message should process");
        assert!(response.success);
        assert!(!response.requires_transaction);
        assert!(response.response.contains("Interpreted as a query on staking"));
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn read_executes_and_returns_decimal_strings() {
        let catalog = InterfaceCatalog::builtin();
        let apy = catalog
            .match_read("apy", "")
            .expect("apy read")
            .function
            .selector();
        let rpc = MockLedgerRpc::new().with_call_result(
            TARGET,
            apy,
            encode(&[AbiType::Uint(256)], &[AbiValue::Uint(U256::from(1250u64))])
                .expect("uint encodes"),
        );
        let service = ContractMind::new(config(), Arc::new(rpc), seeded_store());
        let response = service
            .process_message("staking", chat("what is the APY?"))
            .await
            .expect("message should process");
        let data = response.data.expect("read returns data");
        assert_eq!(data["apy"], "1250");
        assert_eq!(response.response, "Fetched apy from contract.");
    }

    #[tokio::test]
    async fn unknown_agent_is_not_found() {
        let service = ContractMind::new(
            config(),
            Arc::new(MockLedgerRpc::new()),
            Arc::new(MemoryAgentStore::new()),
        );
        let error = service
            .process_message("ghost", chat("balance"))
            .await
            .expect_err("unknown agent");
        assert_eq!(error, CoreError::AgentNotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn write_message_hints_compile_a_preview() {
        let service = ContractMind::new(
            config(),
            Arc::new(MockLedgerRpc::new().with_gas_estimate(90_000)),
            seeded_store(),
        );
        let response = service
            .process_message("staking", chat("stake 1.5 SOMI"))
            .await
            .expect("message should process");
        assert!(response.requires_transaction);
        let preview = response.transaction.expect("write returns a preview");
        assert_eq!(preview.function_name, "stake");
        assert_eq!(preview.gas_estimate, "90000");
        assert_eq!(preview.gas_price, None);
        assert_eq!(preview.explanation, "Stake 1.5 SOMI");
    }

    #[tokio::test]
    async fn pending_confirmation_is_recorded_and_later_confirmed() {
        let rpc = Arc::new(MockLedgerRpc::new());
        let store = seeded_store();
        let service = ContractMind::new(config(), rpc.clone(), store.clone());
        let request = ConfirmTransactionRequest {
            tx_hash: TX,
            user_address: USER,
            function_name: Some("stake".to_string()),
        };

        let pending = service
            .confirm_transaction("staking", request.clone())
            .await
            .expect("pending is not an error");
        assert!(!pending.success);
        assert_eq!(pending.response, "Transaction pending...");
        assert_eq!(
            store.get_transaction(&TX).expect("get").map(|record| record.status),
            Some(TransactionStatus::Pending)
        );

        rpc.insert_receipt(TransactionReceipt {
            transaction_hash: TX,
            status: 1,
            block_number: 12,
            gas_used: 64_000,
            logs: Vec::new(),
        });
        let confirmed = service
            .confirm_transaction(
                "staking",
                ConfirmTransactionRequest {
                    function_name: None,
                    ..request
                },
            )
            .await
            .expect("confirmation");
        assert!(confirmed.success);
        assert_eq!(confirmed.response, "Transaction succeeded");
        assert_eq!(confirmed.block_number.as_deref(), Some("12"));
        assert_eq!(confirmed.gas_used.as_deref(), Some("64000"));

        let page = service
            .transactions(TransactionQuery {
                status: Some("success".to_string()),
                ..TransactionQuery::default()
            })
            .expect("history");
        assert_eq!(page.total, 1);
        assert_eq!(page.limit, 50);
        assert_eq!(page.transactions[0].function_name.as_deref(), Some("stake"));
    }

    #[tokio::test]
    async fn validate_requires_hub_and_reports_revert_as_invalid() {
        let service = ContractMind::new(config(), Arc::new(MockLedgerRpc::new()), seeded_store());
        let response = service
            .validate_transaction(ValidationRequest {
                agent_id: "staking".to_string(),
                target: TARGET,
                function_selector: "stake(uint256)".to_string(),
                user_address: USER,
            })
            .await
            .expect("validation");
        assert!(!response.valid);
        assert_eq!(response.function, "0xa694fc3a");

        let unhubbed = ContractMind::new(
            ServiceConfig {
                hub_address: None,
                ..config()
            },
            Arc::new(MockLedgerRpc::new()),
            seeded_store(),
        );
        let error = unhubbed
            .validate_transaction(ValidationRequest {
                agent_id: "staking".to_string(),
                target: TARGET,
                function_selector: "0xa694fc3a".to_string(),
                user_address: USER,
            })
            .await
            .expect_err("hub is required");
        assert!(error.to_string().contains("hub_address"));
    }

    #[test]
    fn selector_accepts_hex_or_signature() {
        assert_eq!(
            parse_selector("0x70a08231").expect("hex"),
            parse_selector("balanceOf(address)").expect("signature")
        );
        assert!(parse_selector("0x70a0").is_err());
        assert!(parse_selector("balance").is_err());
    }

    #[test]
    fn invalid_status_filter_is_rejected() {
        let service = ContractMind::new(config(), Arc::new(MockLedgerRpc::new()), seeded_store());
        let error = service
            .transactions(TransactionQuery {
                status: Some("mined".to_string()),
                ..TransactionQuery::default()
            })
            .expect_err("unknown status");
        assert!(error.to_string().contains("status must be"));
    }

    #[test]
    fn agent_list_total_counts_beyond_the_page() {
        let store = seeded_store();
        for name in ["lending", "swapper", "vault"] {
            store
                .upsert_agent(&AgentRecord {
                    id: AgentId::normalize(name).expect("agent id"),
                    owner: USER,
                    target_contract: TARGET,
                    name: name.to_string(),
                    config_ref: String::new(),
                    active: true,
                    created_at: None,
                })
                .expect("seed agent");
        }
        let service = ContractMind::new(config(), Arc::new(MockLedgerRpc::new()), store);

        let page = service.list_agents(1, 2).expect("list agents");
        assert_eq!(page.agents.len(), 2);
        assert_eq!(page.total, 4);
    }
}
