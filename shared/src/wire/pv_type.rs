use super::{error::WireError, pv_data::PvData, wire_type::MAX_STRING_SIZE, WireType};

/// A host type that carries exactly one wire type.
///
/// The mapping is one-to-one, so a value never gets coerced between wire
/// types on its way in or out.
pub trait PvType: Sized + Clone + Send + Sync + 'static {
    const WIRE_TYPE: WireType;

    fn encode(values: &[Self]) -> Result<Vec<u8>, WireError>;
    fn decode(bytes: &[u8], count: usize) -> Result<Vec<Self>, WireError>;

    fn into_data(values: Vec<Self>) -> PvData;
    fn from_data(data: PvData) -> Option<Vec<Self>>;
}

/// Decodes a payload that must hold a single element
pub fn decode_scalar<T: PvType>(bytes: &[u8], count: usize) -> Result<T, WireError> {
    T::decode(bytes, count)?
        .into_iter()
        .next()
        .ok_or(WireError::EmptyPayload {
            wire_type: T::WIRE_TYPE,
        })
}

pub fn decode_array<T: PvType>(bytes: &[u8], count: usize) -> Result<Vec<T>, WireError> {
    T::decode(bytes, count)
}

/// Splits a text payload into the raw bytes of each element, up to its
/// first NUL. Unlike decoding into `String` this accepts any byte sequence.
pub fn decode_text_bytes(bytes: &[u8], count: usize) -> Result<Vec<Vec<u8>>, WireError> {
    check_payload(WireType::String, bytes, count)?;
    Ok(bytes
        .chunks_exact(MAX_STRING_SIZE)
        .map(|chunk| {
            let end = chunk.iter().position(|b| *b == 0).unwrap_or(chunk.len());
            chunk[..end].to_vec()
        })
        .collect())
}

fn check_payload(wire_type: WireType, bytes: &[u8], count: usize) -> Result<(), WireError> {
    let expected = wire_type.payload_size(count);
    if bytes.len() != expected {
        return Err(WireError::PayloadSize {
            wire_type,
            count,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

macro_rules! impl_numeric_pv_type {
    ($host:ty, $wire:ident) => {
        impl PvType for $host {
            const WIRE_TYPE: WireType = WireType::$wire;

            fn encode(values: &[Self]) -> Result<Vec<u8>, WireError> {
                let mut out = Vec::with_capacity(values.len() * std::mem::size_of::<$host>());
                for value in values {
                    out.extend_from_slice(&value.to_be_bytes());
                }
                Ok(out)
            }

            fn decode(bytes: &[u8], count: usize) -> Result<Vec<Self>, WireError> {
                check_payload(Self::WIRE_TYPE, bytes, count)?;
                let values = bytes
                    .chunks_exact(std::mem::size_of::<$host>())
                    .map(|chunk| {
                        let mut raw = [0u8; std::mem::size_of::<$host>()];
                        raw.copy_from_slice(chunk);
                        <$host>::from_be_bytes(raw)
                    })
                    .collect();
                Ok(values)
            }

            fn into_data(values: Vec<Self>) -> PvData {
                PvData::$wire(values)
            }

            fn from_data(data: PvData) -> Option<Vec<Self>> {
                match data {
                    PvData::$wire(values) => Some(values),
                    _ => None,
                }
            }
        }
    };
}

impl_numeric_pv_type!(f64, Double);
impl_numeric_pv_type!(f32, Float);
impl_numeric_pv_type!(u16, Enum);
impl_numeric_pv_type!(i16, Short);
impl_numeric_pv_type!(u8, Char);
impl_numeric_pv_type!(i32, Long);
impl_numeric_pv_type!(u32, ULong);

// Text travels as a NUL padded buffer of MAX_STRING_SIZE bytes per element.
// Decoding requires UTF-8; `decode_text_bytes` is the lossless path.
impl PvType for String {
    const WIRE_TYPE: WireType = WireType::String;

    fn encode(values: &[Self]) -> Result<Vec<u8>, WireError> {
        let mut out = Vec::with_capacity(values.len() * MAX_STRING_SIZE);
        for value in values {
            let bytes = value.as_bytes();
            if bytes.len() >= MAX_STRING_SIZE {
                return Err(WireError::TextTooLong {
                    len: bytes.len(),
                    max: MAX_STRING_SIZE - 1,
                });
            }
            if bytes.contains(&0) {
                return Err(WireError::InvalidText {
                    reason: "interior NUL byte",
                });
            }
            out.extend_from_slice(bytes);
            out.resize(out.len() + MAX_STRING_SIZE - bytes.len(), 0);
        }
        Ok(out)
    }

    fn decode(bytes: &[u8], count: usize) -> Result<Vec<Self>, WireError> {
        decode_text_bytes(bytes, count)?
            .into_iter()
            .map(|raw| {
                String::from_utf8(raw).map_err(|_| WireError::InvalidText {
                    reason: "not valid UTF-8",
                })
            })
            .collect()
    }

    fn into_data(values: Vec<Self>) -> PvData {
        PvData::String(values)
    }

    fn from_data(data: PvData) -> Option<Vec<Self>> {
        match data {
            PvData::String(values) => Some(values),
            _ => None,
        }
    }
}
