use std::fmt;

use super::error::WireError;

/// Capacity of the fixed-length text buffer, terminator included
pub const MAX_STRING_SIZE: usize = 40;

/// The closed set of wire types a process variable may negotiate.
///
/// Discriminants are the Channel Access DBR tags. `ULong` has no official
/// tag; transports speaking to this crate use 7 for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WireType {
    String,
    Short,
    Float,
    Enum,
    Char,
    Long,
    Double,
    ULong,
}

/// One row of the type table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeEntry {
    pub wire_type: WireType,
    pub tag: i16,
    /// Short type code, as used by the original proxy interface
    pub code: &'static str,
    /// Name of the host type carrying the value
    pub host: &'static str,
    /// Bytes per element on the wire
    pub element_size: usize,
    pub array_capable: bool,
    /// False for accepted extensions outside the seven standard types
    pub official: bool,
}

pub static TYPE_TABLE: [TypeEntry; 8] = [
    TypeEntry {
        wire_type: WireType::String,
        tag: 0,
        code: "A40_c",
        host: "String",
        element_size: MAX_STRING_SIZE,
        array_capable: true,
        official: true,
    },
    TypeEntry {
        wire_type: WireType::Short,
        tag: 1,
        code: "s",
        host: "i16",
        element_size: 2,
        array_capable: true,
        official: true,
    },
    TypeEntry {
        wire_type: WireType::Float,
        tag: 2,
        code: "f",
        host: "f32",
        element_size: 4,
        array_capable: true,
        official: true,
    },
    TypeEntry {
        wire_type: WireType::Enum,
        tag: 3,
        code: "t",
        host: "u16",
        element_size: 2,
        array_capable: true,
        official: true,
    },
    TypeEntry {
        wire_type: WireType::Char,
        tag: 4,
        code: "h",
        host: "u8",
        element_size: 1,
        array_capable: true,
        official: true,
    },
    TypeEntry {
        wire_type: WireType::Long,
        tag: 5,
        code: "l",
        host: "i32",
        element_size: 4,
        array_capable: true,
        official: true,
    },
    TypeEntry {
        wire_type: WireType::Double,
        tag: 6,
        code: "d",
        host: "f64",
        element_size: 8,
        array_capable: true,
        official: true,
    },
    TypeEntry {
        wire_type: WireType::ULong,
        tag: 7,
        code: "ul",
        host: "u32",
        element_size: 4,
        array_capable: false,
        official: false,
    },
];

impl WireType {
    pub const ALL: [WireType; 8] = [
        WireType::String,
        WireType::Short,
        WireType::Float,
        WireType::Enum,
        WireType::Char,
        WireType::Long,
        WireType::Double,
        WireType::ULong,
    ];

    /// Resolves a negotiated tag. Anything outside the table is an error.
    pub fn from_tag(tag: i16) -> Result<Self, WireError> {
        match tag {
            0 => Ok(WireType::String),
            1 => Ok(WireType::Short),
            2 => Ok(WireType::Float),
            3 => Ok(WireType::Enum),
            4 => Ok(WireType::Char),
            5 => Ok(WireType::Long),
            6 => Ok(WireType::Double),
            7 => Ok(WireType::ULong),
            _ => Err(WireError::UnsupportedType { tag }),
        }
    }

    pub fn from_code(code: &str) -> Result<Self, WireError> {
        TYPE_TABLE
            .iter()
            .find(|entry| entry.code == code)
            .map(|entry| entry.wire_type)
            .ok_or_else(|| WireError::UnsupportedCode {
                code: code.to_string(),
            })
    }

    pub fn entry(self) -> &'static TypeEntry {
        match self {
            WireType::String => &TYPE_TABLE[0],
            WireType::Short => &TYPE_TABLE[1],
            WireType::Float => &TYPE_TABLE[2],
            WireType::Enum => &TYPE_TABLE[3],
            WireType::Char => &TYPE_TABLE[4],
            WireType::Long => &TYPE_TABLE[5],
            WireType::Double => &TYPE_TABLE[6],
            WireType::ULong => &TYPE_TABLE[7],
        }
    }

    pub fn tag(self) -> i16 {
        self.entry().tag
    }

    pub fn code(self) -> &'static str {
        self.entry().code
    }

    pub fn element_size(self) -> usize {
        self.entry().element_size
    }

    pub fn is_array_capable(self) -> bool {
        self.entry().array_capable
    }

    pub fn is_official(self) -> bool {
        self.entry().official
    }

    /// Byte length of a payload holding `count` elements
    pub fn payload_size(self, count: usize) -> usize {
        self.element_size() * count
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::String => "DBR_STRING",
            WireType::Short => "DBR_SHORT",
            WireType::Float => "DBR_FLOAT",
            WireType::Enum => "DBR_ENUM",
            WireType::Char => "DBR_CHAR",
            WireType::Long => "DBR_LONG",
            WireType::Double => "DBR_DOUBLE",
            WireType::ULong => "DBR_ULONG",
        };
        f.write_str(name)
    }
}
