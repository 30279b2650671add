/// Agent lookup and cache reconciliation.
///
/// The on-chain registry is authoritative. The store is a read-through
/// projection: it is consulted first, backfilled after a successful chain
/// read, and written after a confirmed registration receipt. Cache writes are
/// best-effort; a failed write is logged and never fails the caller.
use crate::domain::types::{AgentRecord, CallRequest, TransactionReceipt};
use crate::domain::AgentId;
use crate::error::CoreError;
use crate::features::receipts::{registration_outcome, Registration, RegistrationOutcome};
use crate::features::rpc::{LedgerRpc, RpcError};
use crate::intent::abi::{AbiType, DecodeError};
use crate::intent::catalog::InterfaceCatalog;
use crate::intent::codec::{decode, encode_call, AbiValue};
use crate::storage::AgentStore;
use alloy_primitives::{Address, U256};
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// The receipt reports a reverted transaction; nothing is read or cached.
    TransactionFailed {
        receipt: TransactionReceipt,
    },
    EventNotFound {
        receipt: TransactionReceipt,
    },
    /// The registry emitted the event but `getAgent` reports no such agent.
    NotRegistered {
        receipt: TransactionReceipt,
        registration: Registration,
    },
    Reconciled {
        receipt: TransactionReceipt,
        registration: Registration,
        record: AgentRecord,
        /// `false` when the cache write failed; the chain state stands.
        cached: bool,
    },
}

pub struct AgentDirectory<'a> {
    rpc: &'a dyn LedgerRpc,
    store: &'a dyn AgentStore,
    catalog: &'a InterfaceCatalog,
    registry: Option<Address>,
}

impl<'a> AgentDirectory<'a> {
    pub fn new(
        rpc: &'a dyn LedgerRpc,
        store: &'a dyn AgentStore,
        catalog: &'a InterfaceCatalog,
        registry: Option<Address>,
    ) -> Self {
        Self {
            rpc,
            store,
            catalog,
            registry,
        }
    }

    /// Cache first, then `getAgent` on the registry. A chain hit is written
    /// back to the cache.
    pub async fn resolve(&self, id: AgentId) -> Result<Option<AgentRecord>, CoreError> {
        match self.store.get_agent(&id) {
            Ok(Some(record)) => {
                debug!("agent cache hit agent_id={id}");
                return Ok(Some(record));
            }
            Ok(None) => {}
            Err(error) => warn!("agent cache read failed, asking registry agent_id={id} error={error}"),
        }

        let Some(record) = self.fetch_on_chain(id).await? else {
            return Ok(None);
        };
        self.cache(&record);
        Ok(Some(record))
    }

    /// `getAgent(id)` on the registry. An unset registry, a revert and a
    /// record with a zero owner all mean "not registered".
    pub async fn fetch_on_chain(&self, id: AgentId) -> Result<Option<AgentRecord>, CoreError> {
        let Some(registry) = self.registry else {
            debug!("no registry configured, skipping chain lookup agent_id={id}");
            return Ok(None);
        };
        let data = encode_call(
            &self.catalog.registry().get_agent,
            &[AbiValue::FixedBytes(id.as_bytes().to_vec())],
        )?;
        let raw = match self
            .rpc
            .call(&CallRequest {
                from: None,
                to: registry,
                data,
                value: U256::ZERO,
            })
            .await
        {
            Ok(raw) => raw,
            Err(RpcError::Reverted { reason }) => {
                debug!("getAgent reverted agent_id={id} reason={reason}");
                return Ok(None);
            }
            Err(other) => return Err(other.into()),
        };
        decode_agent_record(self.catalog, id, &raw).map_err(|decode_error| {
            error!("getAgent result did not match registry layout agent_id={id} error={decode_error}");
            CoreError::from(decode_error)
        })
    }

    /// Extracts the registration emitted by the registry in `receipt`,
    /// fetches the authoritative record and upserts it. Re-running with the
    /// same receipt stores the same row.
    ///
    /// Only a record the registry confirms is cached. When the registry
    /// cannot be reached the event fields stand in for it; when it answers
    /// that the agent does not exist nothing is written.
    pub async fn reconcile_from_receipt(
        &self,
        receipt: TransactionReceipt,
    ) -> Result<Reconciliation, CoreError> {
        let registry = self.registry.ok_or_else(|| {
            CoreError::InvalidInput("registry_address must be configured".to_string())
        })?;
        if !receipt.succeeded() {
            info!(
                "registration transaction failed tx_hash={:#x} status={}",
                receipt.transaction_hash, receipt.status
            );
            return Ok(Reconciliation::TransactionFailed { receipt });
        }
        let (receipt, registration) = match registration_outcome(self.catalog, receipt, registry) {
            RegistrationOutcome::Registered {
                receipt,
                registration,
            } => (receipt, registration),
            RegistrationOutcome::EventNotFound { receipt } => {
                return Ok(Reconciliation::EventNotFound { receipt })
            }
            RegistrationOutcome::Pending => {
                return Err(CoreError::Internal(
                    "registration outcome cannot be pending for a fetched receipt".to_string(),
                ))
            }
        };

        let record = match self.fetch_on_chain(registration.agent_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(
                    "registry reports no such agent, not caching agent_id={} tx_hash={:#x}",
                    registration.agent_id, receipt.transaction_hash
                );
                return Ok(Reconciliation::NotRegistered {
                    receipt,
                    registration,
                });
            }
            Err(error) => {
                warn!(
                    "registry read failed, using event fields agent_id={} error={error}",
                    registration.agent_id
                );
                record_from_event(&registration)
            }
        };
        let cached = self.cache(&record);
        info!(
            "agent reconciled agent_id={} owner={:#x} target={:#x} cached={cached}",
            record.id, record.owner, record.target_contract
        );
        Ok(Reconciliation::Reconciled {
            receipt,
            registration,
            record,
            cached,
        })
    }

    /// `isAgentActive(id)`; a revert reads as inactive.
    pub async fn is_agent_active(&self, id: AgentId) -> Result<bool, CoreError> {
        let registry = self.registry.ok_or_else(|| {
            CoreError::InvalidInput("registry_address must be configured".to_string())
        })?;
        let data = encode_call(
            &self.catalog.registry().is_agent_active,
            &[AbiValue::FixedBytes(id.as_bytes().to_vec())],
        )?;
        match self
            .rpc
            .call(&CallRequest {
                from: None,
                to: registry,
                data,
                value: U256::ZERO,
            })
            .await
        {
            Ok(raw) => Ok(decode(&[AbiType::Bool], &raw)?
                .first()
                .and_then(AbiValue::as_bool)
                .unwrap_or(false)),
            Err(RpcError::Reverted { reason }) => {
                debug!("isAgentActive reverted agent_id={id} reason={reason}");
                Ok(false)
            }
            Err(other) => Err(other.into()),
        }
    }

    pub fn list_active(&self, offset: usize, limit: usize) -> Result<Vec<AgentRecord>, CoreError> {
        Ok(self.store.list_active(offset, limit)?)
    }

    pub fn count_active(&self) -> Result<usize, CoreError> {
        Ok(self.store.count_active()?)
    }

    fn cache(&self, record: &AgentRecord) -> bool {
        match self.store.upsert_agent(record) {
            Ok(()) => true,
            Err(error) => {
                error!("agent cache write failed agent_id={} error={error}", record.id);
                false
            }
        }
    }
}

/// Decodes the `getAgent` tuple
/// `(owner, targetContract, name, configRef, active, createdAt, updatedAt)`.
pub fn decode_agent_record(
    catalog: &InterfaceCatalog,
    id: AgentId,
    raw: &[u8],
) -> Result<Option<AgentRecord>, DecodeError> {
    let values = decode(std::slice::from_ref(&catalog.registry().agent_record), raw)?;
    let fields = values
        .first()
        .and_then(AbiValue::as_tuple)
        .ok_or(DecodeError::InvalidWord {
            field: "agent".to_string(),
            kind: "tuple".to_string(),
        })?;
    let field = |index: usize, name: &str, kind: &str| {
        fields.get(index).ok_or(DecodeError::InvalidWord {
            field: name.to_string(),
            kind: kind.to_string(),
        })
    };

    let owner = field(0, "owner", "address")?.as_address().unwrap_or_default();
    if owner.is_zero() {
        return Ok(None);
    }
    let created_at = field(5, "createdAt", "uint256")?
        .as_uint()
        .and_then(|value| u64::try_from(value).ok())
        .filter(|value| *value > 0);
    Ok(Some(AgentRecord {
        id,
        owner,
        target_contract: field(1, "targetContract", "address")?
            .as_address()
            .unwrap_or_default(),
        name: field(2, "name", "string")?.as_str().unwrap_or_default().to_string(),
        config_ref: field(3, "configRef", "string")?
            .as_str()
            .unwrap_or_default()
            .to_string(),
        active: field(4, "active", "bool")?.as_bool().unwrap_or(false),
        created_at,
    }))
}

fn record_from_event(registration: &Registration) -> AgentRecord {
    AgentRecord {
        id: registration.agent_id,
        owner: registration.owner,
        target_contract: registration.target_contract,
        name: registration.name.clone(),
        config_ref: String::new(),
        active: true,
        created_at: None,
    }
}
