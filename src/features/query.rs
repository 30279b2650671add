/// Read-only execution against the ledger.
///
/// Calldata is built exactly as the write path builds it. Hub-routed reads
/// go through `queryTarget(agentId, target, calldata)` as a simulated call
/// from the caller, and the hub's `bytes` result is unwrapped before the
/// declared return types are decoded. A node rejection and a decode failure
/// stay distinct errors.
use crate::domain::types::{CallRequest, ResolvedOperation, Route};
use crate::domain::AgentId;
use crate::error::CoreError;
use crate::features::rpc::{LedgerRpc, RpcError};
use crate::intent::abi::AbiType;
use crate::intent::catalog::InterfaceCatalog;
use crate::intent::codec::{decode, encode_call, AbiValue};
use alloy_primitives::{Address, U256};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub function_name: String,
    /// Return field → JSON value; integers are decimal strings.
    pub data: Map<String, Value>,
    pub message: String,
}

pub struct QueryExecutor<'a> {
    rpc: &'a dyn LedgerRpc,
    catalog: &'a InterfaceCatalog,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(rpc: &'a dyn LedgerRpc, catalog: &'a InterfaceCatalog) -> Self {
        Self { rpc, catalog }
    }

    pub async fn execute(
        &self,
        operation: &ResolvedOperation,
        caller: Address,
    ) -> Result<QueryResult, CoreError> {
        let inner = encode_call(&operation.function, &operation.arguments)?;
        let function = operation.function.canonical();

        let raw = match &operation.route {
            Route::Direct => {
                self.simulate(caller, operation.target, inner, function)
                    .await?
            }
            Route::Hub { hub, agent_id } => {
                let query_target = &self.catalog.hub().query_target;
                let wrapped = encode_call(
                    query_target,
                    &[
                        AbiValue::FixedBytes(agent_id.as_bytes().to_vec()),
                        AbiValue::Address(operation.target),
                        AbiValue::Bytes(inner),
                    ],
                )?;
                let outer = self.simulate(caller, *hub, wrapped, function).await?;
                let unwrapped = decode(&self.catalog.hub().query_target_returns, &outer)
                    .map_err(|decode_error| {
                        error!("hub queryTarget result did not decode function={function} error={decode_error}");
                        CoreError::from(decode_error)
                    })?;
                unwrapped
                    .into_iter()
                    .next()
                    .and_then(|value| value.as_bytes().map(<[u8]>::to_vec))
                    .unwrap_or_default()
            }
        };

        let types = operation
            .returns
            .iter()
            .map(|field| field.kind.clone())
            .collect::<Vec<AbiType>>();
        let values = decode(&types, &raw).map_err(|decode_error| {
            warn!(
                "query result did not match catalog function={function} bytes={} error={decode_error}",
                raw.len()
            );
            CoreError::from(decode_error)
        })?;

        let data = operation
            .returns
            .iter()
            .zip(values.iter())
            .map(|(field, value)| (field.key.clone(), value.to_json()))
            .collect::<Map<String, Value>>();
        let message = if operation.returns.is_empty() {
            "Query completed.".to_string()
        } else {
            let keys = operation
                .returns
                .iter()
                .map(|field| field.key.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            format!("Fetched {keys} from contract.")
        };
        Ok(QueryResult {
            function_name: operation.function.name().to_string(),
            data,
            message,
        })
    }

    /// Simulates `validateTransaction(agentId, target, selector)` on the hub
    /// from `user`. A revert means "not authorized", not a failure.
    pub async fn validate_transaction(
        &self,
        hub: Address,
        agent_id: AgentId,
        target: Address,
        selector: [u8; 4],
        user: Address,
    ) -> Result<bool, CoreError> {
        let validate = &self.catalog.hub().validate_transaction;
        let data = encode_call(
            validate,
            &[
                AbiValue::FixedBytes(agent_id.as_bytes().to_vec()),
                AbiValue::Address(target),
                AbiValue::FixedBytes(selector.to_vec()),
            ],
        )?;
        let request = CallRequest {
            from: Some(user),
            to: hub,
            data,
            value: U256::ZERO,
        };
        match self.rpc.call(&request).await {
            Ok(raw) => {
                let values = decode(&[AbiType::Bool], &raw)?;
                Ok(values.first().and_then(AbiValue::as_bool).unwrap_or(false))
            }
            Err(RpcError::Reverted { reason }) => {
                debug!("validateTransaction reverted agent_id={agent_id} reason={reason}");
                Ok(false)
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn simulate(
        &self,
        caller: Address,
        to: Address,
        data: Vec<u8>,
        function: &str,
    ) -> Result<Vec<u8>, CoreError> {
        debug!("query function={function} to={to:#x} from={caller:#x}");
        let request = CallRequest {
            from: Some(caller),
            to,
            data,
            value: U256::ZERO,
        };
        self.rpc.call(&request).await.map_err(|rpc_error| {
            warn!("query failed function={function} error={rpc_error}");
            CoreError::from(rpc_error)
        })
    }
}
