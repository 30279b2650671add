use crate::config::RoutePolicy;
use crate::domain::types::{CallRequest, Route};
use crate::domain::AgentId;
use crate::features::rpc::LedgerRpc;
use crate::intent::abi::AbiType;
use crate::intent::catalog::InterfaceCatalog;
use crate::intent::codec::{decode, encode_call};
use alloy_primitives::{Address, U256};
use tracing::{debug, info};

/// Decides whether calls for `agent_id` on `target` go through the hub.
///
/// Without a configured hub every policy degrades to a direct route.
pub async fn resolve_route(
    rpc: &dyn LedgerRpc,
    catalog: &InterfaceCatalog,
    policy: RoutePolicy,
    hub: Option<Address>,
    agent_id: AgentId,
    target: Address,
) -> Route {
    let Some(hub) = hub else {
        debug!("no hub configured, routing direct target={target:#x}");
        return Route::Direct;
    };
    match policy {
        RoutePolicy::Direct => Route::Direct,
        RoutePolicy::Hub => Route::Hub { hub, agent_id },
        RoutePolicy::Detect => match probe_trusted_hub(rpc, catalog, target).await {
            Some(trusted) if trusted == hub => {
                info!("target is hub-aware target={target:#x} hub={hub:#x}");
                Route::Hub { hub, agent_id }
            }
            Some(other) => {
                info!(
                    "target trusts a different hub, routing direct target={target:#x} trusted_hub={other:#x}"
                );
                Route::Direct
            }
            None => Route::Direct,
        },
    }
}

/// `trustedHub()` on `target`; `None` when the call reverts, does not decode,
/// or returns the zero address.
pub async fn probe_trusted_hub(
    rpc: &dyn LedgerRpc,
    catalog: &InterfaceCatalog,
    target: Address,
) -> Option<Address> {
    let probe = &catalog.hub().trusted_hub;
    let data = encode_call(probe, &[]).ok()?;
    let raw = match rpc
        .call(&CallRequest {
            from: None,
            to: target,
            data,
            value: U256::ZERO,
        })
        .await
    {
        Ok(raw) => raw,
        Err(error) => {
            debug!("trustedHub probe failed target={target:#x} error={error}");
            return None;
        }
    };
    let values = decode(&[AbiType::Address], &raw).ok()?;
    values
        .first()
        .and_then(|value| value.as_address())
        .filter(|address| !address.is_zero())
}
