//! Game revisions and version-dependent address tables.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::hex;

/// Shipped game revision. Each revision lays out memory differently, so
/// every offset lookup is keyed by the active version.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GameVersion {
    #[default]
    Us,
    Jp,
    Pal,
}

/// Per-version 32-bit values plus a version-independent default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTable {
    #[serde(default, with = "hex::opt_addr", skip_serializing_if = "Option::is_none")]
    pub us: Option<u32>,
    #[serde(default, with = "hex::opt_addr", skip_serializing_if = "Option::is_none")]
    pub jp: Option<u32>,
    #[serde(default, with = "hex::opt_addr", skip_serializing_if = "Option::is_none")]
    pub pal: Option<u32>,
    #[serde(default, with = "hex::opt_addr", skip_serializing_if = "Option::is_none")]
    pub default: Option<u32>,
}

impl VersionTable {
    /// Table with only a version-independent value.
    pub fn uniform(value: u32) -> Self {
        Self {
            default: Some(value),
            ..Self::default()
        }
    }

    /// Table with one entry per version and no default.
    pub fn per_version(us: u32, jp: u32, pal: u32) -> Self {
        Self {
            us: Some(us),
            jp: Some(jp),
            pal: Some(pal),
            default: None,
        }
    }

    /// Version-specific entry if present, otherwise the default.
    pub fn lookup(&self, version: GameVersion) -> Option<u32> {
        let specific = match version {
            GameVersion::Us => self.us,
            GameVersion::Jp => self.jp,
            GameVersion::Pal => self.pal,
        };
        specific.or(self.default)
    }

    pub fn is_empty(&self) -> bool {
        self.us.is_none() && self.jp.is_none() && self.pal.is_none() && self.default.is_none()
    }
}

/// Offsets of a watch variable relative to its base address.
///
/// A missing version entry silently falls back to the default, and an empty
/// table resolves to offset 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OffsetTable(pub VersionTable);

impl OffsetTable {
    pub fn uniform(offset: u32) -> Self {
        Self(VersionTable::uniform(offset))
    }

    pub fn offset(&self, version: GameVersion) -> u32 {
        self.0.lookup(version).unwrap_or(0)
    }

    pub fn table(&self) -> &VersionTable {
        &self.0
    }
}

impl From<VersionTable> for OffsetTable {
    fn from(table: VersionTable) -> Self {
        Self(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_version_parse_case_insensitive() {
        assert_eq!(GameVersion::from_str("us").unwrap(), GameVersion::Us);
        assert_eq!(GameVersion::from_str("JP").unwrap(), GameVersion::Jp);
        assert_eq!(GameVersion::from_str("Pal").unwrap(), GameVersion::Pal);
        assert!(GameVersion::from_str("eu").is_err());
        assert_eq!(GameVersion::Pal.to_string(), "pal");
    }

    #[test]
    fn test_offset_precedence_falls_back_to_default() {
        let offsets = OffsetTable(VersionTable {
            us: Some(0x20),
            jp: None,
            pal: Some(0x28),
            default: Some(0x10),
        });

        assert_eq!(offsets.offset(GameVersion::Us), 0x20);
        assert_eq!(offsets.offset(GameVersion::Jp), 0x10);
        assert_eq!(offsets.offset(GameVersion::Pal), 0x28);
    }

    #[test]
    fn test_empty_offset_table_resolves_to_zero() {
        let offsets = OffsetTable::default();
        for version in GameVersion::iter() {
            assert_eq!(offsets.offset(version), 0);
        }
        assert!(offsets.table().is_empty());
    }

    #[test]
    fn test_lookup_without_default_is_none() {
        let table = VersionTable {
            us: Some(0x8033_C618),
            jp: Some(0x8033_B2A8),
            ..VersionTable::default()
        };
        assert_eq!(table.lookup(GameVersion::Jp), Some(0x8033_B2A8));
        assert_eq!(table.lookup(GameVersion::Pal), None);
    }

    #[test]
    fn test_offset_table_json_shape() {
        let offsets: OffsetTable =
            serde_json::from_str(r#"{"us": "0xA0", "default": 160}"#).unwrap();
        assert_eq!(offsets.offset(GameVersion::Us), 0xA0);
        assert_eq!(offsets.offset(GameVersion::Pal), 160);
    }
}
