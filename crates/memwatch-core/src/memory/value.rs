//! Conversion between raw storage bits, typed values and user text.
//!
//! Writes use "rounding wrapping" semantics: text is parsed to the widest
//! numeric form, rounded to the nearest integer (ties to even) for integer
//! targets, then truncated to the storage width with two's-complement
//! wrapping. Out-of-range input never saturates.

use std::fmt;

use crate::error::{Error, Result};
use crate::memory::PrimitiveType;

/// A decoded primitive read from memory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Byte(u8),
    SByte(i8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
}

impl Value {
    pub fn ty(&self) -> PrimitiveType {
        match self {
            Self::Byte(_) => PrimitiveType::Byte,
            Self::SByte(_) => PrimitiveType::SByte,
            Self::Short(_) => PrimitiveType::Short,
            Self::UShort(_) => PrimitiveType::UShort,
            Self::Int(_) => PrimitiveType::Int,
            Self::UInt(_) => PrimitiveType::UInt,
            Self::Long(_) => PrimitiveType::Long,
            Self::ULong(_) => PrimitiveType::ULong,
            Self::Float(_) => PrimitiveType::Float,
            Self::Double(_) => PrimitiveType::Double,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Byte(v) => v as f64,
            Self::SByte(v) => v as f64,
            Self::Short(v) => v as f64,
            Self::UShort(v) => v as f64,
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Long(v) => v as f64,
            Self::ULong(v) => v as f64,
            Self::Float(v) => v as f64,
            Self::Double(v) => v,
        }
    }

    /// Integer view, `None` for floating point values.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Byte(v) => Some(v as i128),
            Self::SByte(v) => Some(v as i128),
            Self::Short(v) => Some(v as i128),
            Self::UShort(v) => Some(v as i128),
            Self::Int(v) => Some(v as i128),
            Self::UInt(v) => Some(v as i128),
            Self::Long(v) => Some(v as i128),
            Self::ULong(v) => Some(v as i128),
            Self::Float(_) | Self::Double(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Short(v) => write!(f, "{}", v),
            Self::UShort(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}", v),
            Self::ULong(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
        }
    }
}

/// A number parsed from user input before it is fitted to a storage type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i128),
    Real(f64),
}

impl Number {
    /// Parse decimal, `0x` hex (optionally negative) or floating point text.
    pub fn parse(input: &str) -> Option<Self> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }

        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        if let Some(digits) = unsigned
            .strip_prefix("0x")
            .or_else(|| unsigned.strip_prefix("0X"))
        {
            if digits.starts_with(['+', '-']) {
                return None;
            }
            let magnitude = i128::from_str_radix(digits, 16).ok()?;
            return Some(Self::Integer(if negative { -magnitude } else { magnitude }));
        }

        if let Ok(value) = text.parse::<i128>() {
            return Some(Self::Integer(value));
        }

        text.parse::<f64>().ok().map(Self::Real)
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Integer(v) => v as f64,
            Self::Real(v) => v,
        }
    }
}

impl PrimitiveType {
    /// Interpret the low `byte_count` bytes of `bits` as this type.
    pub fn decode(&self, bits: u64) -> Value {
        match self {
            Self::Byte => Value::Byte(bits as u8),
            Self::SByte => Value::SByte(bits as u8 as i8),
            Self::Short => Value::Short(bits as u16 as i16),
            Self::UShort => Value::UShort(bits as u16),
            Self::Int => Value::Int(bits as u32 as i32),
            Self::UInt => Value::UInt(bits as u32),
            Self::Long => Value::Long(bits as i64),
            Self::ULong => Value::ULong(bits),
            Self::Float => Value::Float(f32::from_bits(bits as u32)),
            Self::Double => Value::Double(f64::from_bits(bits)),
        }
    }

    /// Fit a parsed number into this type's storage bits.
    pub fn encode_number(&self, number: Number) -> Option<u64> {
        match self {
            Self::Float => Some((number.as_f64() as f32).to_bits() as u64),
            Self::Double => Some(number.as_f64().to_bits()),
            _ => {
                let integer = match number {
                    Number::Integer(v) => v,
                    Number::Real(v) => round_to_integer(v)?,
                };
                Some((integer as u64) & self.width_mask())
            }
        }
    }

    /// Parse user text and fit it into this type with rounding and wrapping.
    pub fn encode_rounding_wrapping(&self, input: &str) -> Result<u64> {
        Number::parse(input)
            .and_then(|number| self.encode_number(number))
            .ok_or_else(|| Error::InvalidNumber {
                input: input.to_string(),
                ty: self.name().to_string(),
            })
    }
}

/// Round half to even; `None` for values no integer can hold.
fn round_to_integer(value: f64) -> Option<i128> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round_ties_even();
    if rounded < i128::MIN as f64 || rounded >= i128::MAX as f64 {
        return None;
    }
    Some(rounded as i128)
}

/// Replace the bits selected by `mask` in `old` with those of `new`.
pub fn apply_mask(old: u64, new: u64, mask: u64) -> u64 {
    (old & !mask) | (new & mask)
}
