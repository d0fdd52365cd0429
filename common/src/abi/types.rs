use std::{fmt, str::FromStr};

use primitive_types::U256;
use serde::{Serialize, Serializer};

use super::{Address, AbiError, CodecError};

// Solidity types supported by the command synthesizer and the codec
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbiType {
    Uint(usize),
    Int(usize),
    Bool,
    Address,
    FixedBytes(usize),
    Bytes,
    String,
}

fn parse_bits(bits: &str) -> Option<usize> {
    let bits: usize = bits.parse().ok()?;
    (bits > 0 && bits <= 256 && bits % 8 == 0).then_some(bits)
}

impl AbiType {
    // Dynamic types are encoded in the tail with an offset in the head
    pub fn is_dynamic(&self) -> bool {
        matches!(self, AbiType::Bytes | AbiType::String)
    }

    // Parse a value typed by an operator on the command line
    pub fn parse_value(&self, raw: &str) -> Result<AbiValue, CodecError> {
        let invalid = || CodecError::InvalidValue {
            value: raw.to_owned(),
            kind: self.clone(),
        };

        let value = match self {
            AbiType::Uint(_) => AbiValue::Uint(parse_u256(raw).ok_or_else(invalid)?),
            AbiType::Int(_) => AbiValue::Int(raw.parse().map_err(|_| invalid())?),
            AbiType::Bool => {
                let value = raw.to_lowercase();
                if ["true", "yes", "y", "1"].contains(&value.as_str()) {
                    AbiValue::Bool(true)
                } else if ["false", "no", "n", "0"].contains(&value.as_str()) {
                    AbiValue::Bool(false)
                } else {
                    return Err(invalid());
                }
            }
            AbiType::Address => AbiValue::Address(raw.parse().map_err(|_| invalid())?),
            AbiType::FixedBytes(_) => AbiValue::FixedBytes(decode_hex(raw).ok_or_else(invalid)?),
            AbiType::Bytes => AbiValue::Bytes(decode_hex(raw).ok_or_else(invalid)?),
            AbiType::String => AbiValue::String(raw.to_owned()),
        };

        if !self.accepts(&value) {
            return Err(CodecError::Overflow(self.clone()));
        }

        Ok(value)
    }

    // Check that a value can be encoded as this type
    pub fn accepts(&self, value: &AbiValue) -> bool {
        match (self, value) {
            (AbiType::Uint(bits), AbiValue::Uint(v)) => v.bits() <= *bits,
            (AbiType::Int(bits), AbiValue::Int(v)) => {
                if *bits >= 128 {
                    true
                } else {
                    let bound = 1i128 << (bits - 1);
                    *v >= -bound && *v < bound
                }
            }
            (AbiType::Bool, AbiValue::Bool(_)) => true,
            (AbiType::Address, AbiValue::Address(_)) => true,
            (AbiType::FixedBytes(size), AbiValue::FixedBytes(bytes)) => bytes.len() <= *size,
            (AbiType::Bytes, AbiValue::Bytes(_)) => true,
            (AbiType::String, AbiValue::String(_)) => true,
            _ => false,
        }
    }
}

impl FromStr for AbiType {
    type Err = AbiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || AbiError::UnsupportedType(s.to_owned());
        Ok(match s {
            "bool" => AbiType::Bool,
            "address" => AbiType::Address,
            "string" => AbiType::String,
            "bytes" => AbiType::Bytes,
            "uint" => AbiType::Uint(256),
            "int" => AbiType::Int(256),
            _ => {
                if let Some(bits) = s.strip_prefix("uint") {
                    AbiType::Uint(parse_bits(bits).ok_or_else(unsupported)?)
                } else if let Some(bits) = s.strip_prefix("int") {
                    AbiType::Int(parse_bits(bits).ok_or_else(unsupported)?)
                } else if let Some(size) = s.strip_prefix("bytes") {
                    let size: usize = size.parse().map_err(|_| unsupported())?;
                    if size == 0 || size > 32 {
                        return Err(unsupported());
                    }
                    AbiType::FixedBytes(size)
                } else {
                    return Err(unsupported());
                }
            }
        })
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiType::Uint(bits) => write!(f, "uint{}", bits),
            AbiType::Int(bits) => write!(f, "int{}", bits),
            AbiType::Bool => write!(f, "bool"),
            AbiType::Address => write!(f, "address"),
            AbiType::FixedBytes(size) => write!(f, "bytes{}", size),
            AbiType::Bytes => write!(f, "bytes"),
            AbiType::String => write!(f, "string"),
        }
    }
}

// A typed argument or return value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(U256),
    // Signed integers are limited to the i128 range
    Int(i128),
    Bool(bool),
    Address(Address),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
}

impl AbiValue {
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            AbiValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<U256> for AbiValue {
    fn from(value: U256) -> Self {
        AbiValue::Uint(value)
    }
}

impl From<u64> for AbiValue {
    fn from(value: u64) -> Self {
        AbiValue::Uint(U256::from(value))
    }
}

impl From<bool> for AbiValue {
    fn from(value: bool) -> Self {
        AbiValue::Bool(value)
    }
}

impl From<Address> for AbiValue {
    fn from(value: Address) -> Self {
        AbiValue::Address(value)
    }
}

impl fmt::Display for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiValue::Uint(v) => write!(f, "{}", v),
            AbiValue::Int(v) => write!(f, "{}", v),
            AbiValue::Bool(v) => write!(f, "{}", v),
            AbiValue::Address(v) => write!(f, "{}", v),
            AbiValue::FixedBytes(v) | AbiValue::Bytes(v) => write!(f, "0x{}", hex::encode(v)),
            AbiValue::String(v) => write!(f, "{}", v),
        }
    }
}

// Numbers are rendered as decimal strings so large values survive JSON
impl Serialize for AbiValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AbiValue::Bool(v) => serializer.serialize_bool(*v),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

// Decimal, or hexadecimal when prefixed by 0x
pub fn parse_u256(raw: &str) -> Option<U256> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if hex.is_empty() || hex.len() > 64 {
            return None;
        }
        U256::from_str_radix(hex, 16).ok()
    } else {
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        U256::from_dec_str(raw).ok()
    }
}

fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    let hex = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    hex::decode(hex).ok()
}
