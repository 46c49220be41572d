//! Serde helpers for addresses, offsets and masks.
//!
//! Profiles are hand-edited, so every numeric address field accepts either a
//! plain JSON integer or a `"0x…"` string. Values are written back as hex
//! strings.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serializer};
use std::fmt;

/// Parse a hex string (with or without 0x prefix).
pub fn parse_hex(s: &str) -> Option<u64> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).ok()
}

struct HexVisitor;

impl Visitor<'_> for HexVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an unsigned integer or a hex string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom(format!("negative address: {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        parse_hex(v).ok_or_else(|| E::custom(format!("invalid hex value: {}", v)))
    }
}

fn deserialize_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    deserializer.deserialize_any(HexVisitor)
}

#[derive(Deserialize)]
struct Wrapped(#[serde(deserialize_with = "deserialize_u64")] u64);

pub mod addr {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:X}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let value = deserialize_u64(deserializer)?;
        u32::try_from(value)
            .map_err(|_| de::Error::custom(format!("value 0x{:X} exceeds 32 bits", value)))
    }
}

pub mod opt_addr {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&format!("0x{:X}", v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u32>, D::Error> {
        let value: Option<Wrapped> = Option::deserialize(deserializer)?;
        value
            .map(|Wrapped(v)| {
                u32::try_from(v)
                    .map_err(|_| de::Error::custom(format!("value 0x{:X} exceeds 32 bits", v)))
            })
            .transpose()
    }
}

pub mod opt_u64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&format!("0x{:X}", v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        let value: Option<Wrapped> = Option::deserialize(deserializer)?;
        Ok(value.map(|Wrapped(v)| v))
    }
}

pub mod addr_list {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[u32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| format!("0x{:X}", v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u32>, D::Error> {
        let values: Vec<Wrapped> = Vec::deserialize(deserializer)?;
        values
            .into_iter()
            .map(|Wrapped(v)| {
                u32::try_from(v)
                    .map_err(|_| de::Error::custom(format!("value 0x{:X} exceeds 32 bits", v)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        #[serde(with = "super::addr")]
        address: u32,
        #[serde(default, with = "super::opt_u64")]
        mask: Option<u64>,
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("0x1000"), Some(0x1000));
        assert_eq!(parse_hex("0X1000"), Some(0x1000));
        assert_eq!(parse_hex("DEADBEEF"), Some(0xDEADBEEF));
        assert_eq!(parse_hex("0xZZZ"), None);
    }

    #[test]
    fn test_accepts_integer_and_hex_string() {
        let a: Sample = serde_json::from_str(r#"{"address": 4096}"#).unwrap();
        let b: Sample = serde_json::from_str(r#"{"address": "0x1000", "mask": "0x0F"}"#).unwrap();
        assert_eq!(a.address, 0x1000);
        assert_eq!(a.mask, None);
        assert_eq!(b.address, 0x1000);
        assert_eq!(b.mask, Some(0x0F));
    }

    #[test]
    fn test_rejects_out_of_range_u32() {
        let result: Result<Sample, _> = serde_json::from_str(r#"{"address": "0x100000000"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serializes_as_hex_string() {
        let sample = Sample {
            address: 0x8033_B170,
            mask: Some(0x04),
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(json, r#"{"address":"0x8033B170","mask":"0x4"}"#);
    }
}
