/// ABI type grammar, canonical signatures, and 4-byte selectors.
///
/// Type strings are normalised the same way everywhere: whitespace is dropped,
/// `uint` widens to `uint256`, and array suffixes are validated before the
/// element type is parsed. A [`FunctionSignature`] recomputes its canonical
/// form from the parsed types and caches its selector at construction, so the
/// selector handed to the codec always matches the types it encodes.
use alloy_primitives::{keccak256, B256};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("invalid abi type: {0}")]
    InvalidType(String),
    #[error("invalid function signature: {0}")]
    InvalidSignature(String),
    #[error("abi encode arity mismatch: expected {expected} values, got {got}")]
    Arity { expected: usize, got: usize },
    #[error("{field} must be a {expected} value")]
    TypeMismatch { field: String, expected: String },
    #[error("{field} does not fit in {kind}")]
    OutOfRange { field: String, kind: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{field}: need {needed} bytes at offset {offset}, only {available} available")]
    OutOfBounds {
        field: String,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("{field}: malformed {kind} word")]
    InvalidWord { field: String, kind: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbiType {
    Address,
    Bool,
    Uint(usize),
    String,
    Bytes,
    FixedBytes(usize),
    Array(Box<AbiType>),
    FixedArray(Box<AbiType>, usize),
    Tuple(Vec<AbiType>),
}

impl AbiType {
    pub fn parse(raw: &str) -> Result<Self, AbiError> {
        let compact = raw
            .chars()
            .filter(|char| !char.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        if compact.is_empty() {
            return Err(AbiError::InvalidType("abi type must be non-empty".to_string()));
        }
        parse_compact(&compact).ok_or_else(|| AbiError::InvalidType(raw.trim().to_string()))
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::String | Self::Bytes | Self::Array(_) => true,
            Self::FixedArray(element, _) => element.is_dynamic(),
            Self::Tuple(components) => components.iter().any(Self::is_dynamic),
            Self::Address | Self::Bool | Self::Uint(_) | Self::FixedBytes(_) => false,
        }
    }

    /// Bytes this type occupies in the head section of an enclosing encoding.
    /// Dynamic types reserve exactly one offset word.
    pub fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return 32;
        }
        match self {
            Self::FixedArray(element, len) => element.head_size().saturating_mul(*len),
            Self::Tuple(components) => components.iter().map(Self::head_size).sum(),
            _ => 32,
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => f.write_str("address"),
            Self::Bool => f.write_str("bool"),
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::String => f.write_str("string"),
            Self::Bytes => f.write_str("bytes"),
            Self::FixedBytes(width) => write!(f, "bytes{width}"),
            Self::Array(element) => write!(f, "{element}[]"),
            Self::FixedArray(element, len) => write!(f, "{element}[{len}]"),
            Self::Tuple(components) => {
                let parts = components
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>();
                write!(f, "({})", parts.join(","))
            }
        }
    }
}

fn parse_compact(kind: &str) -> Option<AbiType> {
    if kind.ends_with(']') {
        let start = kind.rfind('[')?;
        let element = parse_compact(&kind[..start])?;
        let len_raw = &kind[start + 1..kind.len() - 1];
        if len_raw.is_empty() {
            return Some(AbiType::Array(Box::new(element)));
        }
        if !len_raw.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        let len = len_raw.parse::<usize>().ok().filter(|len| *len > 0)?;
        return Some(AbiType::FixedArray(Box::new(element), len));
    }

    if let Some(inner) = kind.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        let components = split_top_level(inner)?
            .into_iter()
            .map(parse_compact)
            .collect::<Option<Vec<_>>>()?;
        return Some(AbiType::Tuple(components));
    }

    match kind {
        "address" => Some(AbiType::Address),
        "bool" => Some(AbiType::Bool),
        "string" => Some(AbiType::String),
        "bytes" => Some(AbiType::Bytes),
        "uint" => Some(AbiType::Uint(256)),
        _ => {
            if let Some(bits) = kind.strip_prefix("uint") {
                let bits = parse_width(bits)?;
                return (bits % 8 == 0 && (8..=256).contains(&bits)).then_some(AbiType::Uint(bits));
            }
            if let Some(width) = kind.strip_prefix("bytes") {
                let width = parse_width(width)?;
                return (1..=32).contains(&width).then_some(AbiType::FixedBytes(width));
            }
            None
        }
    }
}

fn parse_width(raw: &str) -> Option<usize> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse::<usize>().ok()
}

/// Splits a comma-separated list at parenthesis depth zero. An empty input is
/// an empty list; unbalanced parentheses yield `None`.
pub(crate) fn split_top_level(raw: &str) -> Option<Vec<&str>> {
    if raw.is_empty() {
        return Some(Vec::new());
    }
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (index, char) in raw.char_indices() {
        match char {
            '(' => depth = depth.saturating_add(1),
            ')' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                parts.push(&raw[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(&raw[start..]);
    if parts.iter().any(|part| part.is_empty()) {
        return None;
    }
    Some(parts)
}

/// First four bytes of `keccak256(signature)`. The string is hashed as given.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_slice()[..4]);
    out
}

pub fn selector_hex(signature: &str) -> String {
    format!("0x{}", hex::encode(selector(signature)))
}

/// Full 32-byte hash of an event signature, as it appears in `topics[0]`.
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    name: String,
    inputs: Vec<AbiType>,
    canonical: String,
    selector: [u8; 4],
}

impl FunctionSignature {
    pub fn parse(raw: &str) -> Result<Self, AbiError> {
        let compact = raw
            .chars()
            .filter(|char| !char.is_whitespace())
            .collect::<String>();
        let invalid = || AbiError::InvalidSignature(raw.trim().to_string());
        let open = compact.find('(').ok_or_else(invalid)?;
        let name = &compact[..open];
        let args = compact[open + 1..].strip_suffix(')').ok_or_else(invalid)?;
        let valid_name = !name.is_empty()
            && !name.starts_with(|char: char| char.is_ascii_digit())
            && name
                .chars()
                .all(|char| char.is_ascii_alphanumeric() || char == '_' || char == '$');
        if !valid_name {
            return Err(invalid());
        }
        let inputs = split_top_level(args)
            .ok_or_else(invalid)?
            .into_iter()
            .map(AbiType::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(name, inputs))
    }

    pub fn new(name: &str, inputs: Vec<AbiType>) -> Self {
        let args = inputs
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let canonical = format!("{name}({args})");
        let selector = selector(&canonical);
        Self {
            name: name.to_string(),
            inputs,
            canonical,
            selector,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[AbiType] {
        &self.inputs
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn selector(&self) -> [u8; 4] {
        self.selector
    }

    pub fn selector_hex(&self) -> String {
        format!("0x{}", hex::encode(self.selector))
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}
