/// Resolved operation → signer-ready [`CompiledCall`].
///
/// # Compilation pipeline (`compile`)
///
/// 1. **Calldata**: selector of the resolved function followed by the
///    ABI-encoded bound arguments.
/// 2. **Routing**: a hub route sends the call to the hub, wrapping the inner
///    calldata in `executeFunction(agentId, target, calldata)`; a direct route
///    sends the inner calldata to the target unchanged.
/// 3. **Gas estimate**: asked of the node from the caller's address; on any
///    failure the configured default ceiling is used and a warning is added.
/// 4. **Gas price and nonce**: advisory only; `None` when the node cannot
///    answer.
/// 5. **Assembly**: description, function name, route label and the static
///    risk warnings.
///
/// Nothing here signs or broadcasts.
use crate::domain::types::{
    CallRequest, CompiledCall, GasEstimateSource, OperationKind, ResolvedOperation, Route,
};
use crate::error::CoreError;
use crate::features::rpc::LedgerRpc;
use crate::intent::catalog::InterfaceCatalog;
use crate::intent::codec::{encode_call, AbiValue};
use alloy_primitives::{Address, Bytes, U256};
use tracing::{debug, warn};

pub const GAS_FEES_WARNING: &str = "Gas fees will apply";
pub const ALLOWANCE_WARNING: &str = "Ensure you have sufficient balance and allowance";
pub const HUB_ROUTE_WARNING: &str = "Call is forwarded by the agent hub and subject to its authorization checks";
pub const REGISTRATION_WARNING: &str = "You will grant your agent configuration on-chain";

/// Destination and calldata of an operation once its route is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutedCall {
    pub to: Address,
    pub data: Vec<u8>,
}

pub fn route_call(
    catalog: &InterfaceCatalog,
    operation: &ResolvedOperation,
) -> Result<RoutedCall, CoreError> {
    let inner = encode_call(&operation.function, &operation.arguments)?;
    match &operation.route {
        Route::Direct => Ok(RoutedCall {
            to: operation.target,
            data: inner,
        }),
        Route::Hub { hub, agent_id } => {
            let data = encode_call(
                &catalog.hub().execute_function,
                &[
                    AbiValue::FixedBytes(agent_id.as_bytes().to_vec()),
                    AbiValue::Address(operation.target),
                    AbiValue::Bytes(inner),
                ],
            )?;
            Ok(RoutedCall { to: *hub, data })
        }
    }
}

pub struct CallCompiler<'a> {
    rpc: &'a dyn LedgerRpc,
    catalog: &'a InterfaceCatalog,
    default_gas_limit: u64,
}

impl<'a> CallCompiler<'a> {
    pub fn new(rpc: &'a dyn LedgerRpc, catalog: &'a InterfaceCatalog, default_gas_limit: u64) -> Self {
        Self {
            rpc,
            catalog,
            default_gas_limit,
        }
    }

    pub async fn compile(
        &self,
        operation: &ResolvedOperation,
        caller: Address,
    ) -> Result<CompiledCall, CoreError> {
        let routed = route_call(self.catalog, operation)?;
        let mut warnings = vec![GAS_FEES_WARNING.to_string()];
        if operation.kind == OperationKind::Write {
            warnings.push(ALLOWANCE_WARNING.to_string());
        }
        if matches!(operation.route, Route::Hub { .. }) {
            warnings.push(HUB_ROUTE_WARNING.to_string());
        }
        debug!(
            "compile function={} route={} to={:#x} calldata_len={}",
            operation.function.canonical(),
            operation.route.label(),
            routed.to,
            routed.data.len()
        );
        Ok(self
            .assemble(
                routed,
                operation.value,
                caller,
                operation.function.name().to_string(),
                operation.route.label().to_string(),
                operation.description.clone(),
                warnings,
            )
            .await)
    }

    /// `registerAgent(target, name, configRef)` sent straight to the registry.
    pub async fn compile_registration(
        &self,
        registry: Address,
        owner: Address,
        target: Address,
        name: &str,
        config_ref: &str,
    ) -> Result<CompiledCall, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidInput("agent name must be non-empty".to_string()));
        }
        let function = &self.catalog.registry().register_agent;
        let data = encode_call(
            function,
            &[
                AbiValue::Address(target),
                AbiValue::String(name.to_string()),
                AbiValue::String(config_ref.trim().to_string()),
            ],
        )?;
        Ok(self
            .assemble(
                RoutedCall { to: registry, data },
                U256::ZERO,
                owner,
                function.name().to_string(),
                Route::Direct.label().to_string(),
                format!("Register agent '{name}'"),
                vec![
                    GAS_FEES_WARNING.to_string(),
                    REGISTRATION_WARNING.to_string(),
                ],
            )
            .await)
    }

    #[allow(clippy::too_many_arguments)]
    async fn assemble(
        &self,
        routed: RoutedCall,
        value: U256,
        caller: Address,
        function_name: String,
        route: String,
        description: String,
        mut warnings: Vec<String>,
    ) -> CompiledCall {
        let request = CallRequest {
            from: Some(caller),
            to: routed.to,
            data: routed.data,
            value,
        };

        let (gas_estimate, gas_estimate_source) = match self.rpc.estimate_gas(&request).await {
            Ok(gas) => (gas, GasEstimateSource::Node),
            Err(error) => {
                warn!(
                    "gas estimate failed, using default function={function_name} default_gas_limit={} error={error}",
                    self.default_gas_limit
                );
                warnings.push(format!(
                    "Gas estimate unavailable; using default limit of {}",
                    self.default_gas_limit
                ));
                (self.default_gas_limit, GasEstimateSource::Default)
            }
        };
        let gas_price = match self.rpc.gas_price().await {
            Ok(price) => Some(price),
            Err(error) => {
                warn!("gas price unavailable function={function_name} error={error}");
                None
            }
        };
        let nonce = match self.rpc.transaction_count(caller).await {
            Ok(nonce) => Some(nonce),
            Err(error) => {
                debug!("nonce unavailable caller={caller:#x} error={error}");
                None
            }
        };

        CompiledCall {
            to: request.to,
            data: Bytes::from(request.data),
            value,
            gas_estimate,
            gas_estimate_source,
            gas_price,
            nonce,
            function_name,
            route,
            description,
            warnings,
        }
    }
}
