use std::fmt;

use super::{error::WireError, pv_type::PvType, WireType};

/// A decoded value whose wire type is only known at runtime
#[derive(Clone, Debug, PartialEq)]
pub enum PvData {
    String(Vec<String>),
    Short(Vec<i16>),
    Float(Vec<f32>),
    Enum(Vec<u16>),
    Char(Vec<u8>),
    Long(Vec<i32>),
    Double(Vec<f64>),
    ULong(Vec<u32>),
}

impl PvData {
    /// Decodes `count` elements of `wire_type`. Every table entry has its
    /// own arm; there is no fallback.
    pub fn decode(wire_type: WireType, bytes: &[u8], count: usize) -> Result<Self, WireError> {
        let data = match wire_type {
            WireType::String => PvData::String(String::decode(bytes, count)?),
            WireType::Short => PvData::Short(i16::decode(bytes, count)?),
            WireType::Float => PvData::Float(f32::decode(bytes, count)?),
            WireType::Enum => PvData::Enum(u16::decode(bytes, count)?),
            WireType::Char => PvData::Char(u8::decode(bytes, count)?),
            WireType::Long => PvData::Long(i32::decode(bytes, count)?),
            WireType::Double => PvData::Double(f64::decode(bytes, count)?),
            WireType::ULong => PvData::ULong(u32::decode(bytes, count)?),
        };
        Ok(data)
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        match self {
            PvData::String(values) => String::encode(values),
            PvData::Short(values) => i16::encode(values),
            PvData::Float(values) => f32::encode(values),
            PvData::Enum(values) => u16::encode(values),
            PvData::Char(values) => u8::encode(values),
            PvData::Long(values) => i32::encode(values),
            PvData::Double(values) => f64::encode(values),
            PvData::ULong(values) => u32::encode(values),
        }
    }

    pub fn scalar<T: PvType>(value: T) -> Self {
        T::into_data(vec![value])
    }

    pub fn array<T: PvType>(values: Vec<T>) -> Self {
        T::into_data(values)
    }

    pub fn wire_type(&self) -> WireType {
        match self {
            PvData::String(_) => WireType::String,
            PvData::Short(_) => WireType::Short,
            PvData::Float(_) => WireType::Float,
            PvData::Enum(_) => WireType::Enum,
            PvData::Char(_) => WireType::Char,
            PvData::Long(_) => WireType::Long,
            PvData::Double(_) => WireType::Double,
            PvData::ULong(_) => WireType::ULong,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PvData::String(values) => values.len(),
            PvData::Short(values) => values.len(),
            PvData::Float(values) => values.len(),
            PvData::Enum(values) => values.len(),
            PvData::Char(values) => values.len(),
            PvData::Long(values) => values.len(),
            PvData::Double(values) => values.len(),
            PvData::ULong(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extracts the values if they are of host type `T`
    pub fn into_values<T: PvType>(self) -> Option<Vec<T>> {
        T::from_data(self)
    }

    /// First element widened to f64, for numeric wire types
    pub fn first_f64(&self) -> Option<f64> {
        match self {
            PvData::String(_) => None,
            PvData::Short(values) => values.first().map(|v| f64::from(*v)),
            PvData::Float(values) => values.first().map(|v| f64::from(*v)),
            PvData::Enum(values) => values.first().map(|v| f64::from(*v)),
            PvData::Char(values) => values.first().map(|v| f64::from(*v)),
            PvData::Long(values) => values.first().map(|v| f64::from(*v)),
            PvData::Double(values) => values.first().copied(),
            PvData::ULong(values) => values.first().map(|v| f64::from(*v)),
        }
    }
}

impl fmt::Display for PvData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
            if values.len() == 1 {
                return write!(f, "{}", values[0]);
            }
            f.write_str("[")?;
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", value)?;
            }
            f.write_str("]")
        }

        match self {
            PvData::String(values) => join(f, values),
            PvData::Short(values) => join(f, values),
            PvData::Float(values) => join(f, values),
            PvData::Enum(values) => join(f, values),
            PvData::Char(values) => join(f, values),
            PvData::Long(values) => join(f, values),
            PvData::Double(values) => join(f, values),
            PvData::ULong(values) => join(f, values),
        }
    }
}
