//! Intent-to-call compiler and receipt event extraction for hub-mediated
//! EVM agents.
//!
//! A chat intent is classified against a static interface catalog, compiled
//! into signer-ready calldata (optionally wrapped for the agent hub) or
//! executed as a simulated read, and transaction receipts are decoded back
//! into catalog events. [`service::ContractMind`] ties the pieces together.

pub mod config;
pub mod domain;
pub mod error;
pub mod features;
pub mod intent;
pub mod logging;
pub mod service;
pub mod storage;
pub mod timing;

#[cfg(test)]
mod test_support;

pub use config::{RoutePolicy, ServiceConfig};
pub use domain::AgentId;
pub use error::CoreError;
pub use service::ContractMind;
