/// Remote ledger JSON-RPC boundary.
///
/// [`LedgerRpc`] is the only seam through which the service touches the
/// chain: simulated calls, gas estimation, gas price, receipts and nonces.
/// [`HttpLedgerRpc`] speaks JSON-RPC over HTTP with a primary→fallback URL
/// retry, a response-size cap and a wall-clock timeout per attempt.
/// [`MockLedgerRpc`] is a scripted in-process ledger for tests.
use crate::config::ServiceConfig;
use crate::domain::types::{CallRequest, LogEntry, TransactionReceipt};
use crate::timing::MAX_RESPONSE_BYTES_CEILING;
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::io::Read;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// JSON-RPC error code nodes use for EVM execution reverts.
const EXECUTION_REVERTED_CODE: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("execution reverted: {reason}")]
    Reverted { reason: String },
    #[error("{method} timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },
    #[error("rpc transport failed: {0}")]
    Transport(String),
    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Simulated call against latest state; returns the raw return bytes.
    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, RpcError>;
    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcError>;
    async fn gas_price(&self) -> Result<U256, RpcError>;
    /// `Ok(None)` while the transaction is not yet included.
    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcError>;
    /// Pending-block nonce for `address`.
    async fn transaction_count(&self, address: Address) -> Result<u64, RpcError>;
}

// ── HTTP client ─────────────────────────────────────────────────────────────

/// Runs `attempt` against `primary`, then against `fallback` if the primary
/// fails for any reason, including its timeout. Each attempt gets the full
/// `timeout`.
async fn post_with_fallback<F, Fut>(
    method: &str,
    primary: &str,
    fallback: Option<&str>,
    timeout: Duration,
    attempt: F,
) -> Result<Vec<u8>, RpcError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<u8>, RpcError>>,
{
    let primary_error = match within(method, timeout, attempt(primary.to_string())).await {
        Ok(raw) => return Ok(raw),
        Err(error) => error,
    };
    let Some(fallback) = fallback else {
        return Err(primary_error);
    };
    warn!("rpc primary failed, trying fallback method={method} error={primary_error}");
    within(method, timeout, attempt(fallback.to_string()))
        .await
        .map_err(|fallback_error| {
            RpcError::Transport(format!(
                "primary rpc failed: {primary_error}; fallback rpc failed: {fallback_error}"
            ))
        })
}

async fn within<Fut>(method: &str, timeout: Duration, attempt: Fut) -> Result<Vec<u8>, RpcError>
where
    Fut: Future<Output = Result<Vec<u8>, RpcError>>,
{
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_elapsed| RpcError::Timeout {
            method: method.to_string(),
            timeout_ms,
        })?
}

#[derive(Clone, Debug)]
pub struct HttpLedgerRpc {
    rpc_url: String,
    fallback_rpc_url: Option<String>,
    max_response_bytes: u64,
    timeout: Duration,
}

impl HttpLedgerRpc {
    pub fn from_config(config: &ServiceConfig) -> Result<Self, RpcError> {
        let rpc_url = config.rpc_url.trim();
        if rpc_url.is_empty() {
            return Err(RpcError::Transport("rpc url is not configured".to_string()));
        }
        Ok(Self {
            rpc_url: rpc_url.to_string(),
            fallback_rpc_url: config
                .rpc_fallback_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string),
            max_response_bytes: clamp_response_bytes(config.max_response_bytes),
            timeout: Duration::from_millis(config.rpc_timeout_ms),
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let body = serde_json::to_vec(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .map_err(|error| {
            RpcError::InvalidResponse(format!("failed to serialize {method} request: {error}"))
        })?;

        let raw = post_with_fallback(
            method,
            &self.rpc_url,
            self.fallback_rpc_url.as_deref(),
            self.timeout,
            |url| self.try_http_post(url, body.clone()),
        )
        .await?;

        let mut value: Value = serde_json::from_slice(&raw).map_err(|error| {
            RpcError::InvalidResponse(format!("failed to parse {method} response JSON: {error}"))
        })?;
        if let Some(error) = value.get("error") {
            return Err(classify_node_error(method, error));
        }
        value
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method} result was missing")))
    }

    async fn try_http_post(&self, url: String, body: Vec<u8>) -> Result<Vec<u8>, RpcError> {
        let max_response_bytes = self.max_response_bytes;
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || blocking_post(&url, &body, max_response_bytes, timeout))
            .await
            .map_err(|error| RpcError::Transport(format!("rpc worker failed: {error}")))?
    }

    fn quantity(result: &Value, method: &str) -> Result<String, RpcError> {
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method} result must be a string")))
    }
}

#[async_trait]
impl LedgerRpc for HttpLedgerRpc {
    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, RpcError> {
        let result = self
            .rpc_call("eth_call", json!([call_object(request), "latest"]))
            .await?;
        parse_hex_blob(&Self::quantity(&result, "eth_call")?, "eth_call result")
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcError> {
        let result = self
            .rpc_call("eth_estimateGas", json!([call_object(request)]))
            .await?;
        parse_hex_u64(&Self::quantity(&result, "eth_estimateGas")?, "eth_estimateGas")
    }

    async fn gas_price(&self) -> Result<U256, RpcError> {
        let result = self.rpc_call("eth_gasPrice", json!([])).await?;
        parse_hex_u256(&Self::quantity(&result, "eth_gasPrice")?, "eth_gasPrice")
    }

    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        let result = self
            .rpc_call("eth_getTransactionReceipt", json!([format!("{tx_hash:#x}")]))
            .await?;
        if result.is_null() {
            debug!("receipt not yet available tx_hash={tx_hash:#x}");
            return Ok(None);
        }
        let raw: RpcReceipt = serde_json::from_value(result).map_err(|error| {
            RpcError::InvalidResponse(format!("failed to decode receipt: {error}"))
        })?;
        raw.into_receipt().map(Some)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, RpcError> {
        let result = self
            .rpc_call(
                "eth_getTransactionCount",
                json!([format!("{address:#x}"), "pending"]),
            )
            .await?;
        parse_hex_u64(
            &Self::quantity(&result, "eth_getTransactionCount")?,
            "eth_getTransactionCount",
        )
    }
}

fn blocking_post(
    url: &str,
    body: &[u8],
    max_response_bytes: u64,
    timeout: Duration,
) -> Result<Vec<u8>, RpcError> {
    let response = ureq::AgentBuilder::new()
        .timeout(timeout)
        .build()
        .post(url)
        .set("content-type", "application/json")
        .send_bytes(body)
        .map_err(|error| match error {
            ureq::Error::Status(status, _) => {
                RpcError::Transport(format!("rpc returned status {status}"))
            }
            ureq::Error::Transport(transport) => {
                RpcError::Transport(format!("rpc transport failed: {transport}"))
            }
        })?;

    let mut raw = Vec::new();
    response
        .into_reader()
        .take(max_response_bytes.saturating_add(1))
        .read_to_end(&mut raw)
        .map_err(|error| RpcError::Transport(format!("failed to read rpc response body: {error}")))?;
    if u64::try_from(raw.len()).unwrap_or(u64::MAX) > max_response_bytes {
        return Err(RpcError::InvalidResponse(format!(
            "rpc response exceeded max_response_bytes={max_response_bytes}"
        )));
    }
    Ok(raw)
}

fn call_object(request: &CallRequest) -> Value {
    let mut object = serde_json::Map::new();
    if let Some(from) = request.from {
        object.insert("from".to_string(), Value::String(format!("{from:#x}")));
    }
    object.insert(
        "to".to_string(),
        Value::String(format!("{:#x}", request.to)),
    );
    object.insert(
        "data".to_string(),
        Value::String(format!("0x{}", hex::encode(&request.data))),
    );
    if !request.value.is_zero() {
        object.insert(
            "value".to_string(),
            Value::String(format!("0x{:x}", request.value)),
        );
    }
    Value::Object(object)
}

/// Reverts keep the node's message verbatim; anything else is a transport
/// level failure.
fn classify_node_error(method: &str, error: &Value) -> RpcError {
    let code = error.get("code").and_then(Value::as_i64);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    if code == Some(EXECUTION_REVERTED_CODE) || message.to_ascii_lowercase().contains("revert") {
        return RpcError::Reverted { reason: message };
    }
    RpcError::Transport(format!("rpc returned error for {method}: {message}"))
}

fn clamp_response_bytes(max_response_bytes: u64) -> u64 {
    max_response_bytes.clamp(1, MAX_RESPONSE_BYTES_CEILING)
}

fn strip_hex_prefix<'a>(raw: &'a str, field: &str) -> Result<&'a str, RpcError> {
    let value = raw.trim();
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| RpcError::InvalidResponse(format!("{field} must be 0x-prefixed hex")))
}

fn parse_hex_u64(raw: &str, field: &str) -> Result<u64, RpcError> {
    let digits = strip_hex_prefix(raw, field)?;
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|error| {
        RpcError::InvalidResponse(format!("failed to parse {field} as hex u64: {error}"))
    })
}

fn parse_hex_u256(raw: &str, field: &str) -> Result<U256, RpcError> {
    let digits = strip_hex_prefix(raw, field)?;
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|error| {
        RpcError::InvalidResponse(format!("failed to parse {field} as hex u256: {error}"))
    })
}

fn parse_hex_blob(raw: &str, field: &str) -> Result<Vec<u8>, RpcError> {
    let digits = strip_hex_prefix(raw, field)?;
    hex::decode(digits)
        .map_err(|error| RpcError::InvalidResponse(format!("{field} must be valid hex: {error}")))
}

fn parse_hex_b256(raw: &str, field: &str) -> Result<B256, RpcError> {
    let bytes = parse_hex_blob(raw, field)?;
    if bytes.len() != 32 {
        return Err(RpcError::InvalidResponse(format!(
            "{field} must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    status: Option<String>,
    block_number: Option<String>,
    gas_used: Option<String>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    data: String,
    log_index: Option<String>,
    transaction_hash: Option<String>,
}

impl RpcReceipt {
    fn into_receipt(self) -> Result<TransactionReceipt, RpcError> {
        let transaction_hash = parse_hex_b256(&self.transaction_hash, "receipt.transactionHash")?;
        let status = match self.status.as_deref() {
            Some(raw) => u8::from(parse_hex_u64(raw, "receipt.status")? == 1),
            None => 0,
        };
        let block_number = self
            .block_number
            .as_deref()
            .map(|raw| parse_hex_u64(raw, "receipt.blockNumber"))
            .transpose()?
            .unwrap_or_default();
        let gas_used = self
            .gas_used
            .as_deref()
            .map(|raw| parse_hex_u64(raw, "receipt.gasUsed"))
            .transpose()?
            .unwrap_or_default();
        let logs = self
            .logs
            .into_iter()
            .map(|log| log.into_entry(transaction_hash))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TransactionReceipt {
            transaction_hash,
            status,
            block_number,
            gas_used,
            logs,
        })
    }
}

impl RpcLog {
    fn into_entry(self, receipt_hash: B256) -> Result<LogEntry, RpcError> {
        let address = self.address.trim().parse::<Address>().map_err(|error| {
            RpcError::InvalidResponse(format!("log.address must be an address: {error}"))
        })?;
        let topics = self
            .topics
            .iter()
            .map(|topic| parse_hex_b256(topic, "log.topics"))
            .collect::<Result<Vec<_>, _>>()?;
        let data = parse_hex_blob(&self.data, "log.data")?;
        let log_index = self
            .log_index
            .as_deref()
            .map(|raw| parse_hex_u64(raw, "log.logIndex"))
            .transpose()?
            .unwrap_or_default();
        let transaction_hash = self
            .transaction_hash
            .as_deref()
            .map(|raw| parse_hex_b256(raw, "log.transactionHash"))
            .transpose()?
            .unwrap_or(receipt_hash);
        Ok(LogEntry {
            address,
            topics,
            data: Bytes::from(data),
            log_index,
            transaction_hash,
        })
    }
}

// ── Scripted ledger ─────────────────────────────────────────────────────────

#[derive(Default)]
struct MockLedgerState {
    call_results: HashMap<(Address, [u8; 4]), Result<Vec<u8>, RpcError>>,
    gas_estimate: Option<Result<u64, RpcError>>,
    gas_price: Option<U256>,
    nonce: Option<u64>,
    receipts: HashMap<B256, TransactionReceipt>,
    calls: Vec<CallRequest>,
    estimates: Vec<CallRequest>,
}

/// In-process ledger that answers from scripted results keyed by
/// `(to, selector)` and records every simulated call it receives.
///
/// Unscripted calls revert, unscripted gas estimates and prices fail, and
/// unknown receipts are reported as not yet included.
#[derive(Default)]
pub struct MockLedgerRpc {
    state: Mutex<MockLedgerState>,
}

impl MockLedgerRpc {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockLedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut MockLedgerState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_call_result(mut self, to: Address, selector: [u8; 4], output: Vec<u8>) -> Self {
        self.state_mut()
            .call_results
            .insert((to, selector), Ok(output));
        self
    }

    pub fn with_call_error(mut self, to: Address, selector: [u8; 4], error: RpcError) -> Self {
        self.state_mut()
            .call_results
            .insert((to, selector), Err(error));
        self
    }

    pub fn with_gas_estimate(mut self, gas: u64) -> Self {
        self.state_mut().gas_estimate = Some(Ok(gas));
        self
    }

    pub fn with_gas_estimate_error(mut self, error: RpcError) -> Self {
        self.state_mut().gas_estimate = Some(Err(error));
        self
    }

    pub fn with_gas_price(mut self, price: U256) -> Self {
        self.state_mut().gas_price = Some(price);
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.state_mut().nonce = Some(nonce);
        self
    }

    pub fn with_receipt(mut self, receipt: TransactionReceipt) -> Self {
        self.state_mut()
            .receipts
            .insert(receipt.transaction_hash, receipt);
        self
    }

    /// Makes a receipt available after construction, e.g. while a waiter polls.
    pub fn insert_receipt(&self, receipt: TransactionReceipt) {
        self.state()
            .receipts
            .insert(receipt.transaction_hash, receipt);
    }

    pub fn recorded_calls(&self) -> Vec<CallRequest> {
        self.state().calls.clone()
    }

    pub fn recorded_estimates(&self) -> Vec<CallRequest> {
        self.state().estimates.clone()
    }
}

fn selector_of(data: &[u8]) -> [u8; 4] {
    let mut selector = [0u8; 4];
    let len = data.len().min(4);
    selector[..len].copy_from_slice(&data[..len]);
    selector
}

#[async_trait]
impl LedgerRpc for MockLedgerRpc {
    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, RpcError> {
        let mut state = self.state();
        state.calls.push(request.clone());
        state
            .call_results
            .get(&(request.to, selector_of(&request.data)))
            .cloned()
            .unwrap_or_else(|| {
                Err(RpcError::Reverted {
                    reason: "execution reverted".to_string(),
                })
            })
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcError> {
        let mut state = self.state();
        state.estimates.push(request.clone());
        state.gas_estimate.clone().unwrap_or_else(|| {
            Err(RpcError::Transport(
                "gas estimate not available".to_string(),
            ))
        })
    }

    async fn gas_price(&self) -> Result<U256, RpcError> {
        self.state()
            .gas_price
            .ok_or_else(|| RpcError::Transport("gas price not available".to_string()))
    }

    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        Ok(self.state().receipts.get(&tx_hash).cloned())
    }

    async fn transaction_count(&self, _address: Address) -> Result<u64, RpcError> {
        self.state()
            .nonce
            .ok_or_else(|| RpcError::Transport("nonce not available".to_string()))
    }
}
