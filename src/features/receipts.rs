/// Receipt retrieval and event extraction.
///
/// Each log is routed by `topics[0]` to at most one catalog event; the
/// candidate then has to decode cleanly (indexed params from the remaining
/// topics, the rest from `data`) to count as a match. Logs with unknown
/// topics are skipped silently; a known topic that fails to decode is logged
/// loudly because it means catalog/contract skew.
use crate::domain::types::{DecodedEvent, LogEntry, TransactionReceipt, TransactionStatus};
use crate::domain::AgentId;
use crate::error::CoreError;
use crate::features::rpc::LedgerRpc;
use crate::intent::catalog::{EventEntry, InterfaceCatalog, KnownEvent};
use crate::intent::codec::{decode, AbiValue};
use alloy_primitives::{Address, B256};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceiptScan {
    /// The node has no receipt yet. Not a failure.
    Pending,
    Scanned {
        receipt: TransactionReceipt,
        events: Vec<DecodedEvent>,
    },
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub agent_id: AgentId,
    pub owner: Address,
    pub target_contract: Address,
    pub name: String,
    pub event: DecodedEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Pending,
    /// The receipt exists but no log decoded as `AgentRegistered`.
    EventNotFound {
        receipt: TransactionReceipt,
    },
    Registered {
        receipt: TransactionReceipt,
        registration: Registration,
    },
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatusReport {
    pub tx_hash: B256,
    pub status: TransactionStatus,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub events: Vec<DecodedEvent>,
}

pub fn decode_log(catalog: &InterfaceCatalog, log: &LogEntry) -> Option<DecodedEvent> {
    let topic0 = log.topics.first()?;
    let entry = catalog.event_by_topic(topic0)?;
    match decode_event_args(entry, log) {
        Ok(args) => Some(DecodedEvent {
            name: entry.name.to_string(),
            args,
            log_index: log.log_index,
            transaction_hash: log.transaction_hash,
            catalog_version: catalog.version().to_string(),
        }),
        Err(reason) => {
            warn!(
                "log matched event topic but did not decode event={} log_index={} tx_hash={:#x} reason={reason}",
                entry.name, log.log_index, log.transaction_hash
            );
            None
        }
    }
}

fn decode_event_args(
    entry: &EventEntry,
    log: &LogEntry,
) -> Result<BTreeMap<String, AbiValue>, String> {
    let indexed_topics = &log.topics[1..];
    if indexed_topics.len() != entry.indexed_count() {
        return Err(format!(
            "expected {} indexed topics, got {}",
            entry.indexed_count(),
            indexed_topics.len()
        ));
    }

    let data_params = entry
        .params
        .iter()
        .filter(|param| !param.indexed)
        .collect::<Vec<_>>();
    let data_types = data_params
        .iter()
        .map(|param| param.kind.clone())
        .collect::<Vec<_>>();
    let mut data_values = decode(&data_types, &log.data)
        .map_err(|error| error.to_string())?
        .into_iter();

    let mut topics = indexed_topics.iter();
    let mut args = BTreeMap::new();
    for param in &entry.params {
        let value = if param.indexed {
            let topic = topics
                .next()
                .ok_or_else(|| format!("missing topic for {}", param.name))?;
            if param.kind.is_dynamic() {
                // Dynamic indexed values are only present as their hash.
                AbiValue::FixedBytes(topic.to_vec())
            } else {
                decode(std::slice::from_ref(&param.kind), topic.as_slice())
                    .map_err(|error| error.to_string())?
                    .into_iter()
                    .next()
                    .ok_or_else(|| format!("empty decode for {}", param.name))?
            }
        } else {
            data_values
                .next()
                .ok_or_else(|| format!("missing data value for {}", param.name))?
        };
        args.insert(param.name.to_string(), value);
    }
    Ok(args)
}

/// Decoded events of every recognised log, in log order.
pub fn decode_receipt_logs(
    catalog: &InterfaceCatalog,
    receipt: &TransactionReceipt,
) -> Vec<DecodedEvent> {
    receipt
        .logs
        .iter()
        .filter_map(|log| decode_log(catalog, log))
        .collect()
}

/// First `AgentRegistered` event emitted by `registry`, with its identifier
/// pulled out. Logs with the same signature from any other contract are
/// ignored.
pub fn registration_from_receipt(
    catalog: &InterfaceCatalog,
    receipt: &TransactionReceipt,
    registry: Address,
) -> Option<Registration> {
    let registered = catalog.event(KnownEvent::AgentRegistered)?;
    receipt
        .logs
        .iter()
        .filter(|log| log.address == registry)
        .filter(|log| log.topics.first() == Some(&registered.topic0))
        .find_map(|log| decode_log(catalog, log))
        .and_then(|event| {
            let agent_id = event
                .args
                .get("agentId")
                .and_then(AbiValue::as_bytes)
                .filter(|bytes| bytes.len() == 32)
                .map(|bytes| AgentId::from_b256(B256::from_slice(bytes)))?;
            let owner = event.args.get("owner").and_then(AbiValue::as_address)?;
            let target_contract = event
                .args
                .get("targetContract")
                .and_then(AbiValue::as_address)?;
            let name = event
                .args
                .get("name")
                .and_then(AbiValue::as_str)
                .unwrap_or_default()
                .to_string();
            Some(Registration {
                agent_id,
                owner,
                target_contract,
                name,
                event,
            })
        })
}

pub struct ReceiptExtractor<'a> {
    rpc: &'a dyn LedgerRpc,
    catalog: &'a InterfaceCatalog,
}

impl<'a> ReceiptExtractor<'a> {
    pub fn new(rpc: &'a dyn LedgerRpc, catalog: &'a InterfaceCatalog) -> Self {
        Self { rpc, catalog }
    }

    pub async fn scan(&self, tx_hash: B256) -> Result<ReceiptScan, CoreError> {
        let Some(receipt) = self.rpc.transaction_receipt(tx_hash).await? else {
            return Ok(ReceiptScan::Pending);
        };
        let events = decode_receipt_logs(self.catalog, &receipt);
        debug!(
            "receipt scanned tx_hash={tx_hash:#x} logs={} events={}",
            receipt.logs.len(),
            events.len()
        );
        Ok(ReceiptScan::Scanned { receipt, events })
    }

    pub async fn registration(
        &self,
        tx_hash: B256,
        registry: Address,
    ) -> Result<RegistrationOutcome, CoreError> {
        let Some(receipt) = self.rpc.transaction_receipt(tx_hash).await? else {
            return Ok(RegistrationOutcome::Pending);
        };
        Ok(registration_outcome(self.catalog, receipt, registry))
    }

    pub async fn transaction_status(
        &self,
        tx_hash: B256,
    ) -> Result<TransactionStatusReport, CoreError> {
        Ok(match self.scan(tx_hash).await? {
            ReceiptScan::Pending => TransactionStatusReport {
                tx_hash,
                status: TransactionStatus::Pending,
                block_number: None,
                gas_used: None,
                events: Vec::new(),
            },
            ReceiptScan::Scanned { receipt, events } => status_report(&receipt, events),
        })
    }
}

pub fn registration_outcome(
    catalog: &InterfaceCatalog,
    receipt: TransactionReceipt,
    registry: Address,
) -> RegistrationOutcome {
    match registration_from_receipt(catalog, &receipt, registry) {
        Some(registration) => {
            info!(
                "agent registration found tx_hash={:#x} agent_id={} owner={:#x}",
                receipt.transaction_hash, registration.agent_id, registration.owner
            );
            RegistrationOutcome::Registered {
                receipt,
                registration,
            }
        }
        None => {
            info!(
                "no registration event in receipt tx_hash={:#x} logs={}",
                receipt.transaction_hash,
                receipt.logs.len()
            );
            RegistrationOutcome::EventNotFound { receipt }
        }
    }
}

pub fn status_report(receipt: &TransactionReceipt, events: Vec<DecodedEvent>) -> TransactionStatusReport {
    TransactionStatusReport {
        tx_hash: receipt.transaction_hash,
        status: if receipt.succeeded() {
            TransactionStatus::Confirmed
        } else {
            TransactionStatus::Failed
        },
        block_number: Some(receipt.block_number),
        gas_used: Some(receipt.gas_used),
        events,
    }
}

/// Polls for a receipt until `ceiling` elapses; `Ok(None)` means still
/// pending. Node errors abort the wait.
pub async fn wait_for_receipt(
    rpc: &dyn LedgerRpc,
    tx_hash: B256,
    ceiling: Duration,
    poll_interval: Duration,
) -> Result<Option<TransactionReceipt>, CoreError> {
    let deadline = tokio::time::Instant::now() + ceiling;
    loop {
        if let Some(receipt) = rpc.transaction_receipt(tx_hash).await? {
            return Ok(Some(receipt));
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            debug!(
                "receipt wait ceiling reached tx_hash={tx_hash:#x} ceiling_ms={}",
                ceiling.as_millis()
            );
            return Ok(None);
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}
