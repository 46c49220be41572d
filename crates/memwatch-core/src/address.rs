//! Address resolution for watch variables.
//!
//! A variable's addresses are always `base + offset`, where the offset comes
//! from its [`OffsetTable`] for the active [`GameVersion`] and the bases come
//! from its [`BaseAddressKind`]:
//!
//! - `Absolute`: one base at process address 0 (offset is a process address)
//! - `Relative`: one base at RAM address 0 (offset is a RAM address)
//! - `Static(tag)`: one base per game version, e.g. the camera struct
//! - `Dynamic(tag)`: a base list recomputed on every call, e.g. live object slots

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hex;
use crate::memory::{Addressing, MemoryStream, PrimitiveType};
use crate::version::{GameVersion, OffsetTable, VersionTable};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tag", rename_all = "lowercase")]
pub enum BaseAddressKind {
    Absolute,
    Relative,
    Static(String),
    Dynamic(String),
}

impl BaseAddressKind {
    pub fn addressing(&self) -> Addressing {
        match self {
            Self::Absolute => Addressing::Absolute,
            _ => Addressing::Ram,
        }
    }
}

impl fmt::Display for BaseAddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute => f.write_str("Absolute"),
            Self::Relative => f.write_str("Relative"),
            Self::Static(tag) | Self::Dynamic(tag) => f.write_str(tag),
        }
    }
}

/// Supplies base addresses for `Static` and `Dynamic` kinds.
///
/// Called fresh on every resolution; implementations must not assume the
/// resolver caches anything.
pub trait BaseAddressProvider {
    fn static_address(&self, tag: &str, version: GameVersion) -> Option<u32>;

    fn dynamic_addresses(
        &self,
        tag: &str,
        version: GameVersion,
        stream: &dyn MemoryStream,
    ) -> Vec<u32>;
}

/// Everything a resolution or access needs: the active version, the process
/// memory and the base address provider.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub version: GameVersion,
    pub stream: &'a dyn MemoryStream,
    pub bases: &'a dyn BaseAddressProvider,
}

impl<'a> Context<'a> {
    pub fn new(
        version: GameVersion,
        stream: &'a dyn MemoryStream,
        bases: &'a dyn BaseAddressProvider,
    ) -> Self {
        Self {
            version,
            stream,
            bases,
        }
    }

    /// Same process and bases under another game version.
    pub fn with_version(self, version: GameVersion) -> Self {
        Self { version, ..self }
    }
}

/// Base address list for `kind` under the context's version.
pub fn base_addresses(kind: &BaseAddressKind, ctx: &Context<'_>) -> Vec<u32> {
    match kind {
        BaseAddressKind::Absolute | BaseAddressKind::Relative => vec![0],
        BaseAddressKind::Static(tag) => match ctx.bases.static_address(tag, ctx.version) {
            Some(address) => vec![address],
            None => {
                debug!("No {} base address for version {}", tag, ctx.version);
                Vec::new()
            }
        },
        BaseAddressKind::Dynamic(tag) => ctx.bases.dynamic_addresses(tag, ctx.version, ctx.stream),
    }
}

/// Concrete addresses of a variable: every base plus the version's offset.
pub fn resolve(kind: &BaseAddressKind, offsets: &OffsetTable, ctx: &Context<'_>) -> Vec<u32> {
    let offset = offsets.offset(ctx.version);
    base_addresses(kind, ctx)
        .into_iter()
        .map(|base| base.wrapping_add(offset))
        .collect()
}

/// A fixed-size pool of structs, e.g. the object slot array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPool {
    pub start: VersionTable,
    #[serde(with = "hex::addr")]
    pub stride: u32,
    pub count: u32,
    /// Offset of a u16 activity word inside each slot. Slots whose word has
    /// no bit of `active_mask` set are skipped. `None` keeps every slot.
    #[serde(default, with = "hex::opt_addr", skip_serializing_if = "Option::is_none")]
    pub active_offset: Option<u32>,
    #[serde(default = "default_active_mask", with = "hex::addr")]
    pub active_mask: u32,
}

fn default_active_mask() -> u32 {
    0x0001
}

impl SlotPool {
    pub fn slot_addresses(&self, version: GameVersion) -> Vec<u32> {
        let Some(start) = self.start.lookup(version) else {
            return Vec::new();
        };
        (0..self.count)
            .map(|i| start.wrapping_add(i.wrapping_mul(self.stride)))
            .collect()
    }

    /// Slots currently marked active. Unreadable slots count as inactive.
    pub fn live_addresses(&self, version: GameVersion, stream: &dyn MemoryStream) -> Vec<u32> {
        let slots = self.slot_addresses(version);
        let Some(active_offset) = self.active_offset else {
            return slots;
        };

        slots
            .into_iter()
            .filter(|&slot| {
                stream
                    .read_raw(
                        PrimitiveType::UShort,
                        slot.wrapping_add(active_offset),
                        Addressing::Ram,
                    )
                    .map(|word| word as u32 & self.active_mask != 0)
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DynamicBase {
    Fixed(#[serde(with = "hex::addr_list")] Vec<u32>),
    Slots(SlotPool),
}

/// Data-driven [`BaseAddressProvider`] loaded from a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAddressTable {
    #[serde(default)]
    pub statics: HashMap<String, VersionTable>,
    #[serde(default)]
    pub dynamics: HashMap<String, DynamicBase>,
}

impl BaseAddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_static(mut self, tag: impl Into<String>, table: VersionTable) -> Self {
        self.statics.insert(tag.into(), table);
        self
    }

    pub fn with_dynamic(mut self, tag: impl Into<String>, base: DynamicBase) -> Self {
        self.dynamics.insert(tag.into(), base);
        self
    }
}

impl BaseAddressProvider for BaseAddressTable {
    fn static_address(&self, tag: &str, version: GameVersion) -> Option<u32> {
        self.statics.get(tag)?.lookup(version)
    }

    fn dynamic_addresses(
        &self,
        tag: &str,
        version: GameVersion,
        stream: &dyn MemoryStream,
    ) -> Vec<u32> {
        match self.dynamics.get(tag) {
            Some(DynamicBase::Fixed(list)) => list.clone(),
            Some(DynamicBase::Slots(pool)) => pool.live_addresses(version, stream),
            None => {
                debug!("Unknown dynamic base: {}", tag);
                Vec::new()
            }
        }
    }
}
