//! Default timing and sizing constants for ledger interaction.
//!
//! Every value here is only a default; [`crate::config::ServiceConfig`] can
//! override each of them.
//!
//! | Constant                          | Default |
//! |-----------------------------------|---------|
//! | `DEFAULT_RPC_TIMEOUT_MS`          | 10 s    |
//! | `DEFAULT_RECEIPT_WAIT_CEILING_MS` | 30 s    |
//! | `DEFAULT_RECEIPT_POLL_INTERVAL_MS`| 1 s     |
//! | `DEFAULT_GAS_LIMIT`               | 500 000 |

// ── RPC ─────────────────────────────────────────────────────────────────────

/// Wall-clock cap for one JSON-RPC round trip, fallback URL included.
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 2 * 1024 * 1024;

/// Responses larger than this are rejected regardless of configuration.
pub const MAX_RESPONSE_BYTES_CEILING: u64 = 16 * 1024 * 1024;

// ── Receipts ────────────────────────────────────────────────────────────────

/// Longest a confirmation request waits for inclusion before answering
/// "pending".
pub const DEFAULT_RECEIPT_WAIT_CEILING_MS: u64 = 30_000;

pub const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 1_000;

// ── Gas ─────────────────────────────────────────────────────────────────────

/// Ceiling used when the node cannot estimate gas. Conservative, not tuned to
/// any particular contract.
pub const DEFAULT_GAS_LIMIT: u64 = 500_000;

pub fn now_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
