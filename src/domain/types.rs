use crate::domain::agent_id::AgentId;
use crate::intent::abi::{AbiType, FunctionSignature};
use crate::intent::codec::AbiValue;
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub id: AgentId,
    pub owner: Address,
    pub target_contract: Address,
    pub name: String,
    pub config_ref: String,
    pub active: bool,
    /// Unix seconds reported by the registry, when it reports one.
    pub created_at: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Direct,
    Hub { hub: Address, agent_id: AgentId },
}

impl Route {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Hub { .. } => "hub",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReturnField {
    pub key: String,
    pub kind: AbiType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOperation {
    pub kind: OperationKind,
    pub action: String,
    pub target: Address,
    pub function: FunctionSignature,
    pub arguments: Vec<AbiValue>,
    pub returns: Vec<ReturnField>,
    pub route: Route,
    pub value: U256,
    pub description: String,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GasEstimateSource {
    Node,
    Default,
}

/// Signer-ready call preview. Never carries key material.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_estimate: u64,
    pub gas_estimate_source: GasEstimateSource,
    pub gas_price: Option<U256>,
    pub nonce: Option<u64>,
    pub function_name: String,
    pub route: String,
    pub description: String,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Vec<u8>,
    pub value: U256,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub log_index: u64,
    pub transaction_hash: B256,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    /// 1 = success, 0 = reverted.
    pub status: u8,
    pub block_number: u64,
    pub gas_used: u64,
    pub logs: Vec<LogEntry>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEvent {
    pub name: String,
    pub args: BTreeMap<String, AbiValue>,
    pub log_index: u64,
    pub transaction_hash: B256,
    pub catalog_version: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" | "success" => Some(Self::Confirmed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub tx_hash: B256,
    pub agent_id: Option<AgentId>,
    pub user_address: Address,
    pub function_name: Option<String>,
    pub status: TransactionStatus,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub created_at_ns: u64,
    pub updated_at_ns: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub agent_id: Option<AgentId>,
    pub user_address: Option<Address>,
    pub status: Option<TransactionStatus>,
    pub limit: usize,
    pub offset: usize,
}

impl TransactionFilter {
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.agent_id
            .map_or(true, |agent_id| record.agent_id == Some(agent_id))
            && self
                .user_address
                .map_or(true, |user| record.user_address == user)
            && self.status.map_or(true, |status| record.status == status)
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub transactions: Vec<TransactionRecord>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}
