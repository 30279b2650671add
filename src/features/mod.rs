pub mod directory;
pub mod query;
pub mod receipts;
pub mod route;
pub mod rpc;

pub use directory::{AgentDirectory, Reconciliation};
pub use query::{QueryExecutor, QueryResult};
pub use receipts::{wait_for_receipt, ReceiptExtractor, ReceiptScan, RegistrationOutcome};
pub use rpc::{HttpLedgerRpc, LedgerRpc, MockLedgerRpc, RpcError};
