/// Typed ABI values and the head/tail calling-convention codec.
///
/// Encoding follows the Solidity layout: static values are written in place,
/// dynamic values (`string`, `bytes`, `T[]`, and any composite containing
/// them) reserve one offset word in the head and append their payload to the
/// tail. Offsets are relative to the start of the enclosing encoding.
/// [`decode`] is the exact inverse and never trusts an offset or length it has
/// not bounds-checked against the input.
use crate::intent::abi::{AbiError, AbiType, DecodeError, FunctionSignature};
use alloy_primitives::{Address, U256};
use serde::{Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Bool(bool),
    Uint(U256),
    String(String),
    Bytes(Vec<u8>),
    FixedBytes(Vec<u8>),
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(address) => Some(*address),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Self::Uint(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) | Self::FixedBytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[AbiValue]> {
        match self {
            Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// JSON projection handed to callers. Integers become decimal strings so
    /// values above 2^53 survive every JSON consumer.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Address(address) => Value::String(address.to_checksum(None)),
            Self::Bool(value) => Value::Bool(*value),
            Self::Uint(value) => Value::String(value.to_string()),
            Self::String(value) => Value::String(value.clone()),
            Self::Bytes(value) | Self::FixedBytes(value) => {
                Value::String(format!("0x{}", hex::encode(value)))
            }
            Self::Array(items) | Self::Tuple(items) => {
                Value::Array(items.iter().map(Self::to_json).collect())
            }
        }
    }
}

impl Serialize for AbiValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

pub fn encode(types: &[AbiType], values: &[AbiValue]) -> Result<Vec<u8>, AbiError> {
    encode_params(types, values, "arg")
}

pub fn decode(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>, DecodeError> {
    decode_params(types, data, 0, "ret")
}

/// Calldata = 4-byte selector || ABI-encoded arguments (no length prefix).
pub fn encode_call(function: &FunctionSignature, args: &[AbiValue]) -> Result<Vec<u8>, AbiError> {
    let encoded = encode(function.inputs(), args)?;
    let mut out = Vec::with_capacity(4 + encoded.len());
    out.extend_from_slice(&function.selector());
    out.extend_from_slice(&encoded);
    Ok(out)
}

// ── Encoding ─────────────────────────────────────────────────────────────────

fn encode_params(types: &[AbiType], values: &[AbiValue], field: &str) -> Result<Vec<u8>, AbiError> {
    if types.len() != values.len() {
        return Err(AbiError::Arity {
            expected: types.len(),
            got: values.len(),
        });
    }

    let head_size = types.iter().map(AbiType::head_size).sum::<usize>();
    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();
    for (index, (kind, value)) in types.iter().zip(values.iter()).enumerate() {
        let field = format!("{field}[{index}]");
        let encoded = encode_value(kind, value, &field)?;
        if kind.is_dynamic() {
            let offset = head_size.saturating_add(tail.len());
            head.extend_from_slice(&encode_u256_word(U256::from(offset)));
            tail.extend_from_slice(&encoded);
        } else {
            head.extend_from_slice(&encoded);
        }
    }
    head.extend_from_slice(&tail);
    Ok(head)
}

fn encode_value(kind: &AbiType, value: &AbiValue, field: &str) -> Result<Vec<u8>, AbiError> {
    match (kind, value) {
        (AbiType::Address, AbiValue::Address(address)) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(address.as_slice());
            Ok(word.to_vec())
        }
        (AbiType::Bool, AbiValue::Bool(flag)) => Ok(encode_u256_word(U256::from(u8::from(*flag)))),
        (AbiType::Uint(bits), AbiValue::Uint(number)) => {
            if number.bit_len() > *bits {
                return Err(AbiError::OutOfRange {
                    field: field.to_string(),
                    kind: kind.to_string(),
                });
            }
            Ok(encode_u256_word(*number))
        }
        (AbiType::FixedBytes(width), AbiValue::FixedBytes(bytes)) => {
            if bytes.len() != *width {
                return Err(AbiError::OutOfRange {
                    field: field.to_string(),
                    kind: kind.to_string(),
                });
            }
            let mut word = [0u8; 32];
            word[..bytes.len()].copy_from_slice(bytes);
            Ok(word.to_vec())
        }
        (AbiType::String, AbiValue::String(text)) => Ok(encode_dynamic_bytes(text.as_bytes())),
        (AbiType::Bytes, AbiValue::Bytes(bytes)) => Ok(encode_dynamic_bytes(bytes)),
        (AbiType::Array(element), AbiValue::Array(items)) => {
            let repeated = vec![element.as_ref().clone(); items.len()];
            let mut out = encode_u256_word(U256::from(items.len()));
            out.extend_from_slice(&encode_params(&repeated, items, field)?);
            Ok(out)
        }
        (AbiType::FixedArray(element, len), AbiValue::Array(items)) => {
            if items.len() != *len {
                return Err(AbiError::Arity {
                    expected: *len,
                    got: items.len(),
                });
            }
            let repeated = vec![element.as_ref().clone(); *len];
            encode_params(&repeated, items, field)
        }
        (AbiType::Tuple(components), AbiValue::Tuple(items)) => {
            encode_params(components, items, field)
        }
        _ => Err(AbiError::TypeMismatch {
            field: field.to_string(),
            expected: kind.to_string(),
        }),
    }
}

/// Length word followed by the payload zero-padded to the next 32-byte boundary.
fn encode_dynamic_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = encode_u256_word(U256::from(bytes.len()));
    out.extend_from_slice(bytes);
    let padding = (32usize.saturating_sub(bytes.len() % 32)) % 32;
    out.extend(std::iter::repeat(0u8).take(padding));
    out
}

fn encode_u256_word(value: U256) -> Vec<u8> {
    value.to_be_bytes::<32>().to_vec()
}

// ── Decoding ─────────────────────────────────────────────────────────────────

fn decode_params(
    types: &[AbiType],
    data: &[u8],
    base: usize,
    field: &str,
) -> Result<Vec<AbiValue>, DecodeError> {
    let mut cursor = base;
    let mut out = Vec::with_capacity(types.len());
    for (index, kind) in types.iter().enumerate() {
        let field = format!("{field}[{index}]");
        if kind.is_dynamic() {
            let offset = read_usize(data, cursor, &field)?;
            let start = base.checked_add(offset).ok_or_else(|| DecodeError::OutOfBounds {
                field: field.clone(),
                offset,
                needed: 32,
                available: data.len(),
            })?;
            out.push(decode_value(kind, data, start, &field)?);
        } else {
            out.push(decode_value(kind, data, cursor, &field)?);
        }
        cursor = cursor.saturating_add(kind.head_size());
    }
    Ok(out)
}

fn decode_value(kind: &AbiType, data: &[u8], at: usize, field: &str) -> Result<AbiValue, DecodeError> {
    match kind {
        AbiType::Address => {
            let word = read_word(data, at, field)?;
            if word[..12].iter().any(|byte| *byte != 0) {
                return Err(invalid_word(field, kind));
            }
            Ok(AbiValue::Address(Address::from_slice(&word[12..])))
        }
        AbiType::Bool => {
            let value = U256::from_be_slice(read_word(data, at, field)?);
            if value > U256::from(1u8) {
                return Err(invalid_word(field, kind));
            }
            Ok(AbiValue::Bool(value == U256::from(1u8)))
        }
        AbiType::Uint(bits) => {
            let value = U256::from_be_slice(read_word(data, at, field)?);
            if value.bit_len() > *bits {
                return Err(invalid_word(field, kind));
            }
            Ok(AbiValue::Uint(value))
        }
        AbiType::FixedBytes(width) => {
            let word = read_word(data, at, field)?;
            if word[*width..].iter().any(|byte| *byte != 0) {
                return Err(invalid_word(field, kind));
            }
            Ok(AbiValue::FixedBytes(word[..*width].to_vec()))
        }
        AbiType::String => {
            let bytes = read_dynamic_bytes(data, at, field)?;
            String::from_utf8(bytes.to_vec())
                .map(AbiValue::String)
                .map_err(|_error| invalid_word(field, kind))
        }
        AbiType::Bytes => Ok(AbiValue::Bytes(read_dynamic_bytes(data, at, field)?.to_vec())),
        AbiType::Array(element) => {
            let len = read_usize(data, at, field)?;
            let items_start = at.saturating_add(32);
            let available = data.len().saturating_sub(items_start);
            // Every element occupies at least one head word.
            if len.saturating_mul(32) > available {
                return Err(DecodeError::OutOfBounds {
                    field: field.to_string(),
                    offset: items_start,
                    needed: len.saturating_mul(32),
                    available,
                });
            }
            let repeated = vec![element.as_ref().clone(); len];
            decode_params(&repeated, data, items_start, field).map(AbiValue::Array)
        }
        AbiType::FixedArray(element, len) => {
            let repeated = vec![element.as_ref().clone(); *len];
            decode_params(&repeated, data, at, field).map(AbiValue::Array)
        }
        AbiType::Tuple(components) => decode_params(components, data, at, field).map(AbiValue::Tuple),
    }
}

fn read_word<'a>(data: &'a [u8], at: usize, field: &str) -> Result<&'a [u8], DecodeError> {
    read_slice(data, at, 32, field)
}

fn read_slice<'a>(data: &'a [u8], at: usize, len: usize, field: &str) -> Result<&'a [u8], DecodeError> {
    let end = at.checked_add(len).filter(|end| *end <= data.len());
    match end {
        Some(end) => Ok(&data[at..end]),
        None => Err(DecodeError::OutOfBounds {
            field: field.to_string(),
            offset: at,
            needed: len,
            available: data.len(),
        }),
    }
}

/// Reads an offset or length word; anything that cannot index into memory is
/// reported as out of bounds rather than truncated.
fn read_usize(data: &[u8], at: usize, field: &str) -> Result<usize, DecodeError> {
    let word = read_word(data, at, field)?;
    let out_of_bounds = || DecodeError::OutOfBounds {
        field: field.to_string(),
        offset: at,
        needed: 32,
        available: data.len(),
    };
    if word[..24].iter().any(|byte| *byte != 0) {
        return Err(out_of_bounds());
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(low)).map_err(|_error| out_of_bounds())
}

fn read_dynamic_bytes<'a>(data: &'a [u8], at: usize, field: &str) -> Result<&'a [u8], DecodeError> {
    let len = read_usize(data, at, field)?;
    read_slice(data, at.saturating_add(32), len, field)
}

fn invalid_word(field: &str, kind: &AbiType) -> DecodeError {
    DecodeError::InvalidWord {
        field: field.to_string(),
        kind: kind.to_string(),
    }
}
