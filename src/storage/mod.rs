//! Local projection of on-chain state.
//!
//! The store is a read-through cache of agent records plus the transaction
//! history the service has observed. The chain stays authoritative: rows are
//! only written after a confirmation or an explicit chain read, and every
//! write is a single-row last-writer-wins upsert, so concurrent writers for
//! the same key converge.

pub mod memory;
pub mod sqlite;

use crate::domain::types::{AgentRecord, TransactionFilter, TransactionPage, TransactionRecord};
use crate::domain::AgentId;
use alloy_primitives::B256;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub use memory::MemoryAgentStore;
pub use sqlite::SqliteAgentStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store backend failed: {0}")]
    Backend(String),
    #[error("store row could not be (de)serialized: {0}")]
    Serialization(String),
}

pub trait AgentStore: Send + Sync {
    fn upsert_agent(&self, record: &AgentRecord) -> Result<(), StoreError>;
    fn get_agent(&self, id: &AgentId) -> Result<Option<AgentRecord>, StoreError>;
    /// Active agents ordered by identifier.
    fn list_active(&self, offset: usize, limit: usize) -> Result<Vec<AgentRecord>, StoreError>;
    fn count_active(&self) -> Result<usize, StoreError>;

    /// Keeps the first `created_at_ns` and any previously known agent id or
    /// function name the new record leaves empty.
    fn upsert_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError>;
    fn get_transaction(&self, tx_hash: &B256) -> Result<Option<TransactionRecord>, StoreError>;
    /// Newest first.
    fn list_transactions(&self, filter: &TransactionFilter) -> Result<TransactionPage, StoreError>;
}

pub(crate) fn agent_key(id: &AgentId) -> String {
    id.to_hex()
}

pub(crate) fn tx_key(tx_hash: &B256) -> String {
    format!("{tx_hash:#x}")
}

pub(crate) fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|error| StoreError::Serialization(error.to_string()))
}

pub(crate) fn read_json<T: DeserializeOwned>(payload: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(payload).map_err(|error| StoreError::Serialization(error.to_string()))
}

/// Merge rule shared by both backends.
pub(crate) fn merge_transaction(
    existing: Option<TransactionRecord>,
    incoming: &TransactionRecord,
) -> TransactionRecord {
    let mut merged = incoming.clone();
    if let Some(existing) = existing {
        merged.created_at_ns = existing.created_at_ns;
        merged.agent_id = merged.agent_id.or(existing.agent_id);
        merged.function_name = merged.function_name.or(existing.function_name);
    }
    merged
}
