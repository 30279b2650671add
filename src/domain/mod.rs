pub mod agent_id;
pub mod types;

pub use agent_id::{AgentId, AgentIdError};
