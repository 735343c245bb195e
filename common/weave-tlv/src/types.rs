// Licensed under the Apache-2.0 license

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Low five bits of a control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ElementType {
    Int8 = 0x00,
    Int16 = 0x01,
    Int32 = 0x02,
    Int64 = 0x03,
    UInt8 = 0x04,
    UInt16 = 0x05,
    UInt32 = 0x06,
    UInt64 = 0x07,
    BooleanFalse = 0x08,
    BooleanTrue = 0x09,
    Float32 = 0x0A,
    Float64 = 0x0B,
    Utf8String1 = 0x0C,
    Utf8String2 = 0x0D,
    Utf8String4 = 0x0E,
    Utf8String8 = 0x0F,
    ByteString1 = 0x10,
    ByteString2 = 0x11,
    ByteString4 = 0x12,
    ByteString8 = 0x13,
    Null = 0x14,
    Structure = 0x15,
    Array = 0x16,
    Path = 0x17,
    EndOfContainer = 0x18,
}

/// Logical type of an element, independent of its encoded width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvType {
    SignedInteger,
    UnsignedInteger,
    Boolean,
    FloatingPoint,
    Utf8String,
    ByteString,
    Null,
    Structure,
    Array,
    Path,
}

impl TlvType {
    pub fn is_container(self) -> bool {
        matches!(self, TlvType::Structure | TlvType::Array | TlvType::Path)
    }
}

impl ElementType {
    pub fn tlv_type(self) -> Option<TlvType> {
        use ElementType::*;
        Some(match self {
            Int8 | Int16 | Int32 | Int64 => TlvType::SignedInteger,
            UInt8 | UInt16 | UInt32 | UInt64 => TlvType::UnsignedInteger,
            BooleanFalse | BooleanTrue => TlvType::Boolean,
            Float32 | Float64 => TlvType::FloatingPoint,
            Utf8String1 | Utf8String2 | Utf8String4 | Utf8String8 => TlvType::Utf8String,
            ByteString1 | ByteString2 | ByteString4 | ByteString8 => TlvType::ByteString,
            Null => TlvType::Null,
            Structure => TlvType::Structure,
            Array => TlvType::Array,
            Path => TlvType::Path,
            EndOfContainer => return None,
        })
    }

    /// Width in bytes of the fixed-size value (integers and floats) or of the
    /// length prefix (strings). Zero for everything else.
    pub fn field_size(self) -> usize {
        use ElementType::*;
        match self {
            Int8 | UInt8 | Utf8String1 | ByteString1 => 1,
            Int16 | UInt16 | Utf8String2 | ByteString2 => 2,
            Int32 | UInt32 | Float32 | Utf8String4 | ByteString4 => 4,
            Int64 | UInt64 | Float64 | Utf8String8 | ByteString8 => 8,
            _ => 0,
        }
    }

    pub fn has_length_prefix(self) -> bool {
        matches!(
            self.tlv_type(),
            Some(TlvType::Utf8String) | Some(TlvType::ByteString)
        )
    }

    pub fn is_container(self) -> bool {
        self.tlv_type().is_some_and(TlvType::is_container)
    }

    pub(crate) fn from_control(control: u8) -> Result<Self, crate::TlvError> {
        let raw = control & CONTROL_TYPE_MASK;
        ElementType::try_from(raw).map_err(|_| crate::TlvError::InvalidElementType(raw))
    }

    /// Smallest unsigned encoding able to hold `value`.
    pub(crate) fn for_unsigned(value: u64) -> Self {
        if value <= u8::MAX as u64 {
            ElementType::UInt8
        } else if value <= u16::MAX as u64 {
            ElementType::UInt16
        } else if value <= u32::MAX as u64 {
            ElementType::UInt32
        } else {
            ElementType::UInt64
        }
    }

    /// Smallest signed encoding able to hold `value`.
    pub(crate) fn for_signed(value: i64) -> Self {
        if i8::try_from(value).is_ok() {
            ElementType::Int8
        } else if i16::try_from(value).is_ok() {
            ElementType::Int16
        } else if i32::try_from(value).is_ok() {
            ElementType::Int32
        } else {
            ElementType::Int64
        }
    }

    pub(crate) fn for_length(base: ElementType, len: usize) -> Self {
        let offset = if len <= u8::MAX as usize {
            0
        } else if len <= u16::MAX as usize {
            1
        } else if len <= u32::MAX as usize {
            2
        } else {
            3
        };
        // Length variants are laid out consecutively after the 1-byte form.
        ElementType::try_from(u8::from(base) + offset).unwrap_or(base)
    }
}

pub(crate) const CONTROL_TYPE_MASK: u8 = 0x1F;
pub(crate) const CONTROL_TAG_MASK: u8 = 0xE0;
