use crate::domain::types::{AgentRecord, TransactionFilter, TransactionPage, TransactionRecord};
use crate::domain::AgentId;
use crate::storage::{
    agent_key, encode_json, merge_transaction, read_json, tx_key, AgentStore, StoreError,
};
use alloy_primitives::B256;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

type JsonRows = RwLock<BTreeMap<String, Vec<u8>>>;

/// Process-local store of JSON-encoded rows. Used when no database path is
/// configured and in tests.
#[derive(Default)]
pub struct MemoryAgentStore {
    agents: JsonRows,
    transactions: JsonRows,
}

impl MemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows<T: serde::de::DeserializeOwned>(map: &JsonRows) -> Result<Vec<T>, StoreError> {
        map.read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|payload| read_json(payload))
            .collect()
    }
}

impl AgentStore for MemoryAgentStore {
    fn upsert_agent(&self, record: &AgentRecord) -> Result<(), StoreError> {
        let payload = encode_json(record)?;
        self.agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(agent_key(&record.id), payload);
        Ok(())
    }

    fn get_agent(&self, id: &AgentId) -> Result<Option<AgentRecord>, StoreError> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&agent_key(id))
            .map(|payload| read_json(payload))
            .transpose()
    }

    fn list_active(&self, offset: usize, limit: usize) -> Result<Vec<AgentRecord>, StoreError> {
        Ok(Self::rows::<AgentRecord>(&self.agents)?
            .into_iter()
            .filter(|record| record.active)
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn count_active(&self) -> Result<usize, StoreError> {
        Ok(Self::rows::<AgentRecord>(&self.agents)?
            .iter()
            .filter(|record| record.active)
            .count())
    }

    fn upsert_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        let key = tx_key(&record.tx_hash);
        let mut rows = self
            .transactions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let existing = rows
            .get(&key)
            .map(|payload| read_json::<TransactionRecord>(payload))
            .transpose()?;
        let merged = merge_transaction(existing, record);
        rows.insert(key, encode_json(&merged)?);
        Ok(())
    }

    fn get_transaction(&self, tx_hash: &B256) -> Result<Option<TransactionRecord>, StoreError> {
        self.transactions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tx_key(tx_hash))
            .map(|payload| read_json(payload))
            .transpose()
    }

    fn list_transactions(&self, filter: &TransactionFilter) -> Result<TransactionPage, StoreError> {
        let mut matching = Self::rows::<TransactionRecord>(&self.transactions)?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| {
            right
                .created_at_ns
                .cmp(&left.created_at_ns)
                .then_with(|| left.tx_hash.cmp(&right.tx_hash))
        });
        let total = matching.len();
        let transactions = matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect();
        Ok(TransactionPage {
            transactions,
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }
}
