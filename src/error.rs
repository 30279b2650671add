use crate::domain::AgentIdError;
use crate::features::rpc::RpcError;
use crate::intent::abi::{AbiError, DecodeError};
use crate::storage::StoreError;
use thiserror::Error;

/// Boundary error for every fallible service operation.
///
/// Outcomes that are not faults (unknown intent, pending receipt, missing
/// registration event) are reported through their own enums and never
/// appear here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("abi encoding failed: {0}")]
    Abi(#[from] AbiError),
    #[error("query execution failed: {reason}")]
    QueryExecution { reason: String },
    #[error("{method} timed out after {timeout_ms}ms")]
    NodeTimeout { method: String, timeout_ms: u64 },
    #[error("ledger rpc failed: {0}")]
    Rpc(RpcError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("agent {0} not found")]
    AgentNotFound(String),
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RpcError> for CoreError {
    fn from(error: RpcError) -> Self {
        match error {
            RpcError::Reverted { reason } => Self::QueryExecution { reason },
            RpcError::Timeout { method, timeout_ms } => Self::NodeTimeout { method, timeout_ms },
            other => Self::Rpc(other),
        }
    }
}

impl From<AgentIdError> for CoreError {
    fn from(error: AgentIdError) -> Self {
        Self::InvalidInput(error.to_string())
    }
}

impl CoreError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NodeTimeout { .. } | Self::Rpc(RpcError::Transport(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::CoreError;
    use crate::features::rpc::RpcError;

    #[test]
    fn node_revert_reason_is_carried_unmodified() {
        let error = CoreError::from(RpcError::Reverted {
            reason: "execution reverted: Agent not active".to_string(),
        });
        assert_eq!(
            error,
            CoreError::QueryExecution {
                reason: "execution reverted: Agent not active".to_string()
            }
        );
        assert!(!error.is_retryable());
    }

    #[test]
    fn rpc_timeout_maps_to_retryable_node_timeout() {
        let error = CoreError::from(RpcError::Timeout {
            method: "eth_call".to_string(),
            timeout_ms: 10_000,
        });
        assert!(matches!(error, CoreError::NodeTimeout { ref method, timeout_ms: 10_000 } if method == "eth_call"));
        assert!(error.is_retryable());
        assert_eq!(error.to_string(), "eth_call timed out after 10000ms");
    }
}
