/// Service configuration: an optional TOML file, then `CONTRACTMIND_*`
/// environment overrides, then validation.
///
/// Every field has a default so an empty file (or no file at all) yields a
/// usable local-node configuration.
use crate::timing::{
    DEFAULT_GAS_LIMIT, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_RECEIPT_POLL_INTERVAL_MS,
    DEFAULT_RECEIPT_WAIT_CEILING_MS, DEFAULT_RPC_TIMEOUT_MS, MAX_RESPONSE_BYTES_CEILING,
};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const ENV_PREFIX: &str = "CONTRACTMIND_";

/// `U256` holds at most 77 decimal digits.
const MAX_TOKEN_DECIMALS: u8 = 77;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("failed to parse config file: {0}")]
    Parse(String),
    #[error("environment variable {name} is invalid: {reason}")]
    InvalidEnv { name: String, reason: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// When a resolved operation is sent through the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePolicy {
    /// Through the hub whenever an agent id and hub address are known.
    #[default]
    Hub,
    Direct,
    /// Probe `trustedHub()` on the target and route through the hub only when
    /// it names the configured hub.
    Detect,
}

impl fmt::Display for RoutePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hub => "hub",
            Self::Direct => "direct",
            Self::Detect => "detect",
        })
    }
}

impl FromStr for RoutePolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hub" => Ok(Self::Hub),
            "direct" => Ok(Self::Direct),
            "detect" => Ok(Self::Detect),
            other => Err(format!("route policy must be hub, direct or detect, got {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub rpc_url: String,
    pub rpc_fallback_url: Option<String>,
    pub chain_id: u64,
    pub hub_address: Option<Address>,
    pub registry_address: Option<Address>,
    pub route_policy: RoutePolicy,
    pub default_gas_limit: u64,
    pub rpc_timeout_ms: u64,
    pub receipt_wait_ceiling_ms: u64,
    pub receipt_poll_interval_ms: u64,
    pub token_decimals: u8,
    /// Absent means the in-memory store.
    pub database_path: Option<PathBuf>,
    pub max_response_bytes: u64,
    pub log_filter: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            rpc_fallback_url: None,
            chain_id: 50312,
            hub_address: None,
            registry_address: None,
            route_policy: RoutePolicy::default(),
            default_gas_limit: DEFAULT_GAS_LIMIT,
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
            receipt_wait_ceiling_ms: DEFAULT_RECEIPT_WAIT_CEILING_MS,
            receipt_poll_interval_ms: DEFAULT_RECEIPT_POLL_INTERVAL_MS,
            token_decimals: 18,
            database_path: None,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            log_filter: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
                    path: path.display().to_string(),
                    reason: error.to_string(),
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|error| ConfigError::Parse(error.to_string()))
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = env_value("RPC_URL") {
            self.rpc_url = value;
        }
        if let Some(value) = env_value("RPC_FALLBACK_URL") {
            self.rpc_fallback_url = Some(value);
        }
        if let Some(value) = env_parsed::<u64>("CHAIN_ID")? {
            self.chain_id = value;
        }
        if let Some(value) = env_parsed::<Address>("HUB_ADDRESS")? {
            self.hub_address = Some(value);
        }
        if let Some(value) = env_parsed::<Address>("REGISTRY_ADDRESS")? {
            self.registry_address = Some(value);
        }
        if let Some(value) = env_parsed::<RoutePolicy>("ROUTE_POLICY")? {
            self.route_policy = value;
        }
        if let Some(value) = env_parsed::<u64>("DEFAULT_GAS_LIMIT")? {
            self.default_gas_limit = value;
        }
        if let Some(value) = env_parsed::<u64>("RPC_TIMEOUT_MS")? {
            self.rpc_timeout_ms = value;
        }
        if let Some(value) = env_parsed::<u64>("RECEIPT_WAIT_CEILING_MS")? {
            self.receipt_wait_ceiling_ms = value;
        }
        if let Some(value) = env_parsed::<u64>("RECEIPT_POLL_INTERVAL_MS")? {
            self.receipt_poll_interval_ms = value;
        }
        if let Some(value) = env_parsed::<u8>("TOKEN_DECIMALS")? {
            self.token_decimals = value;
        }
        if let Some(value) = env_value("DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(value));
        }
        if let Some(value) = env_parsed::<u64>("MAX_RESPONSE_BYTES")? {
            self.max_response_bytes = value;
        }
        if let Some(value) = env_value("LOG_FILTER") {
            self.log_filter = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Invalid(message.to_string()));
        let rpc_url = self.rpc_url.trim();
        if rpc_url.is_empty() {
            return invalid("rpc_url must be non-empty");
        }
        if !(rpc_url.starts_with("http://") || rpc_url.starts_with("https://")) {
            return invalid("rpc_url must be an http(s) url");
        }
        if self
            .rpc_fallback_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            return invalid("rpc_fallback_url must be non-empty when set");
        }
        if self.default_gas_limit == 0 {
            return invalid("default_gas_limit must be greater than zero");
        }
        if self.rpc_timeout_ms == 0 {
            return invalid("rpc_timeout_ms must be greater than zero");
        }
        if self.receipt_wait_ceiling_ms == 0 {
            return invalid("receipt_wait_ceiling_ms must be greater than zero");
        }
        if self.receipt_poll_interval_ms == 0
            || self.receipt_poll_interval_ms > self.receipt_wait_ceiling_ms
        {
            return invalid(
                "receipt_poll_interval_ms must be between 1 and receipt_wait_ceiling_ms",
            );
        }
        if self.token_decimals > MAX_TOKEN_DECIMALS {
            return invalid("token_decimals must be at most 77");
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES_CEILING {
            return invalid("max_response_bytes must be between 1 and 16 MiB");
        }
        Ok(())
    }
}

fn env_value(suffix: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{suffix}"))
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parsed<T>(suffix: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env_value(suffix)
        .map(|raw| {
            raw.parse::<T>().map_err(|error| ConfigError::InvalidEnv {
                name: format!("{ENV_PREFIX}{suffix}"),
                reason: error.to_string(),
            })
        })
        .transpose()
}
