use primitive_types::U256;
use thiserror::Error;

use super::{Address, AbiType, AbiValue};
use crate::config::{ADDRESS_SIZE, WORD_SIZE};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Expected {} arguments, got {}", expected, got)]
    ArityMismatch { expected: usize, got: usize },
    #[error("Argument '{}' expects a value of type {}", name, expected)]
    TypeMismatch { name: String, expected: AbiType },
    #[error("Invalid value '{}' for type {}", value, kind)]
    InvalidValue { value: String, kind: AbiType },
    #[error("Value does not fit in {}", _0)]
    Overflow(AbiType),
    #[error("Return data is too short")]
    ShortData,
    #[error("Invalid boolean in return data")]
    InvalidBool,
    #[error("Invalid UTF-8 string in return data")]
    InvalidString,
}

fn u256_word(value: U256) -> [u8; WORD_SIZE] {
    let mut word = [0u8; WORD_SIZE];
    for i in 0..WORD_SIZE {
        word[WORD_SIZE - 1 - i] = value.byte(i);
    }
    word
}

fn int_word(value: i128) -> [u8; WORD_SIZE] {
    let fill = if value < 0 { 0xff } else { 0x00 };
    let mut word = [fill; WORD_SIZE];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn padded(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    let rem = out.len() % WORD_SIZE;
    if rem != 0 {
        out.resize(out.len() + WORD_SIZE - rem, 0);
    }
    out
}

fn static_word(value: &AbiValue) -> [u8; WORD_SIZE] {
    match value {
        AbiValue::Uint(v) => u256_word(*v),
        AbiValue::Int(v) => int_word(*v),
        AbiValue::Bool(v) => u256_word(U256::from(*v as u8)),
        AbiValue::Address(address) => {
            let mut word = [0u8; WORD_SIZE];
            word[WORD_SIZE - ADDRESS_SIZE..].copy_from_slice(address.as_bytes());
            word
        }
        AbiValue::FixedBytes(bytes) => {
            let mut word = [0u8; WORD_SIZE];
            word[..bytes.len()].copy_from_slice(bytes);
            word
        }
        // dynamic values never reach the head
        AbiValue::Bytes(_) | AbiValue::String(_) => [0u8; WORD_SIZE],
    }
}

// Head/tail encoding of a list of arguments
pub fn encode_arguments(types: &[AbiType], values: &[AbiValue]) -> Result<Vec<u8>, CodecError> {
    if types.len() != values.len() {
        return Err(CodecError::ArityMismatch {
            expected: types.len(),
            got: values.len(),
        });
    }

    let mut head = Vec::with_capacity(types.len() * WORD_SIZE);
    let mut tail = Vec::new();
    let head_size = types.len() * WORD_SIZE;

    for (i, (kind, value)) in types.iter().zip(values).enumerate() {
        if !kind.accepts(value) {
            return Err(CodecError::TypeMismatch {
                name: format!("#{}", i),
                expected: kind.clone(),
            });
        }

        if kind.is_dynamic() {
            let offset = head_size + tail.len();
            head.extend_from_slice(&u256_word(U256::from(offset)));

            let bytes = match value {
                AbiValue::Bytes(bytes) => bytes.as_slice(),
                AbiValue::String(s) => s.as_bytes(),
                _ => unreachable!("dynamic type accepted a static value"),
            };
            tail.extend_from_slice(&u256_word(U256::from(bytes.len())));
            tail.extend_from_slice(&padded(bytes));
        } else {
            head.extend_from_slice(&static_word(value));
        }
    }

    head.extend_from_slice(&tail);
    Ok(head)
}

fn read_word(data: &[u8], offset: usize) -> Result<&[u8], CodecError> {
    data.get(offset..offset + WORD_SIZE).ok_or(CodecError::ShortData)
}

fn read_usize(data: &[u8], offset: usize) -> Result<usize, CodecError> {
    let value = U256::from_big_endian(read_word(data, offset)?);
    if value > U256::from(data.len()) {
        return Err(CodecError::ShortData);
    }
    Ok(value.as_usize())
}

fn decode_static(kind: &AbiType, word: &[u8]) -> Result<AbiValue, CodecError> {
    Ok(match kind {
        AbiType::Uint(_) => AbiValue::Uint(U256::from_big_endian(word)),
        AbiType::Int(_) => {
            let negative = word[16] & 0x80 != 0;
            let fill = if negative { 0xff } else { 0x00 };
            if word[..16].iter().any(|b| *b != fill) {
                return Err(CodecError::Overflow(kind.clone()));
            }
            let mut low = [0u8; 16];
            low.copy_from_slice(&word[16..]);
            AbiValue::Int(i128::from_be_bytes(low))
        }
        AbiType::Bool => match U256::from_big_endian(word) {
            v if v.is_zero() => AbiValue::Bool(false),
            v if v == U256::one() => AbiValue::Bool(true),
            _ => return Err(CodecError::InvalidBool),
        },
        AbiType::Address => {
            let mut bytes = [0u8; ADDRESS_SIZE];
            bytes.copy_from_slice(&word[WORD_SIZE - ADDRESS_SIZE..]);
            AbiValue::Address(Address::new(bytes))
        }
        AbiType::FixedBytes(size) => AbiValue::FixedBytes(word[..*size].to_vec()),
        AbiType::Bytes | AbiType::String => unreachable!("dynamic type decoded as static"),
    })
}

// Decode the return data of a call
pub fn decode_values(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>, CodecError> {
    let mut values = Vec::with_capacity(types.len());
    for (i, kind) in types.iter().enumerate() {
        let offset = i * WORD_SIZE;
        if kind.is_dynamic() {
            let start = read_usize(data, offset)?;
            let len = read_usize(data, start)?;
            let bytes = data
                .get(start + WORD_SIZE..start + WORD_SIZE + len)
                .ok_or(CodecError::ShortData)?
                .to_vec();

            values.push(match kind {
                AbiType::String => {
                    AbiValue::String(String::from_utf8(bytes).map_err(|_| CodecError::InvalidString)?)
                }
                _ => AbiValue::Bytes(bytes),
            });
        } else {
            values.push(decode_static(kind, read_word(data, offset)?)?);
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(last: u8) -> Vec<u8> {
        let mut w = vec![0u8; WORD_SIZE];
        w[WORD_SIZE - 1] = last;
        w
    }

    #[test]
    fn test_encode_static_arguments() {
        let types = vec![AbiType::Uint(256), AbiType::Bool];
        let encoded =
            encode_arguments(&types, &[AbiValue::from(5u64), AbiValue::Bool(true)]).unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(&encoded[..32], word(5).as_slice());
        assert_eq!(&encoded[32..], word(1).as_slice());
    }

    #[test]
    fn test_encode_negative_int() {
        let encoded = encode_arguments(&[AbiType::Int(256)], &[AbiValue::Int(-1)]).unwrap();
        assert!(encoded.iter().all(|b| *b == 0xff));
    }

    #[test]
    fn test_encode_string_uses_tail() {
        let encoded = encode_arguments(
            &[AbiType::String, AbiType::Uint(8)],
            &[AbiValue::String("abc".into()), AbiValue::from(1u64)],
        )
        .unwrap();
        // head (2 words) + length word + one padded data word
        assert_eq!(encoded.len(), 4 * WORD_SIZE);
        assert_eq!(&encoded[..32], word(64).as_slice());
        assert_eq!(&encoded[64..96], word(3).as_slice());
        assert_eq!(&encoded[96..99], b"abc");
    }

    #[test]
    fn test_encode_rejects_mismatch() {
        assert!(matches!(
            encode_arguments(&[AbiType::Bool], &[]),
            Err(CodecError::ArityMismatch { expected: 1, got: 0 })
        ));
        assert!(matches!(
            encode_arguments(&[AbiType::Bool], &[AbiValue::from(1u64)]),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_product_tuple() {
        let mut data = Vec::new();
        for v in [100u8, 20, 50, 0, 1] {
            data.extend(word(v));
        }
        let types = vec![
            AbiType::Uint(256),
            AbiType::Uint(256),
            AbiType::Uint(256),
            AbiType::Uint(256),
            AbiType::Bool,
        ];
        let values = decode_values(&types, &data).unwrap();
        assert_eq!(values[0], AbiValue::from(100u64));
        assert_eq!(values[3], AbiValue::from(0u64));
        assert_eq!(values[4], AbiValue::Bool(true));
    }

    #[test]
    fn test_decode_string_and_address() {
        let mut address_word = vec![0u8; 12];
        address_word.extend([0xaa; 20]);
        let mut data = address_word.clone();
        data.extend(word(64));
        data.extend(word(5));
        let mut text = b"hello".to_vec();
        text.resize(32, 0);
        data.extend(text);

        let values = decode_values(&[AbiType::Address, AbiType::String], &data).unwrap();
        assert_eq!(values[0], AbiValue::Address(Address::new([0xaa; 20])));
        assert_eq!(values[1], AbiValue::String("hello".into()));
    }

    #[test]
    fn test_decode_short_data() {
        assert!(matches!(
            decode_values(&[AbiType::Uint(256)], &[0u8; 10]),
            Err(CodecError::ShortData)
        ));
        assert!(matches!(
            decode_values(&[AbiType::Bool], &word(2)),
            Err(CodecError::InvalidBool)
        ));
    }
}
