use alloy_primitives::B256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentIdError {
    #[error("agent id must be non-empty")]
    Empty,
    #[error("0x-prefixed agent id must be exactly 32 bytes of hex: {0}")]
    InvalidHash(String),
}

/// 32-byte agent identifier as stored by the on-chain registry.
///
/// A `0x`-prefixed input is taken verbatim as the hash; anything else is a
/// plain name, right-padded with zero bytes and truncated to 32. Every lookup
/// goes through [`AgentId::normalize`] so the two spellings never diverge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(B256);

impl AgentId {
    /// Surrounding whitespace is dropped before anything else, and the hash
    /// prefix may be written `0x` or `0X`, so `" 0XAB.."` and `"0xab.."` are
    /// the same id. Whitespace inside a name is kept.
    pub fn normalize(raw: &str) -> Result<Self, AgentIdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AgentIdError::Empty);
        }
        if let Some(hex_digits) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            if hex_digits.len() != 64 {
                return Err(AgentIdError::InvalidHash(trimmed.to_string()));
            }
            let mut bytes = [0u8; 32];
            hex::decode_to_slice(hex_digits, &mut bytes)
                .map_err(|_error| AgentIdError::InvalidHash(trimmed.to_string()))?;
            return Ok(Self(B256::from(bytes)));
        }
        let mut bytes = [0u8; 32];
        let name = trimmed.as_bytes();
        let len = name.len().min(32);
        bytes[..len].copy_from_slice(&name[..len]);
        Ok(Self(B256::from(bytes)))
    }

    pub fn from_b256(value: B256) -> Self {
        Self(value)
    }

    pub fn as_b256(&self) -> B256 {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0.as_slice()))
    }

    /// The original name when the id is a zero-padded printable ASCII label.
    pub fn label(&self) -> Option<String> {
        let bytes = self.0.as_slice();
        let end = bytes.iter().position(|byte| *byte == 0).unwrap_or(bytes.len());
        let (name, padding) = bytes.split_at(end);
        let printable = !name.is_empty()
            && name.iter().all(|byte| byte.is_ascii_graphic() || *byte == b' ')
            && padding.iter().all(|byte| *byte == 0);
        printable.then(|| String::from_utf8_lossy(name).into_owned())
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for AgentId {
    type Err = AgentIdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::normalize(raw)
    }
}

impl Serialize for AgentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AgentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::normalize(&raw).map_err(serde::de::Error::custom)
    }
}
