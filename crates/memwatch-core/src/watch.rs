//! Watch variables: immutable definitions of how to find and interpret a value
//! in game memory.
//!
//! A [`WatchVariable`] is built once from a [`VariableDefinition`] when a
//! profile is loaded and is then shared read-only. It holds no runtime state;
//! every operation takes a [`Context`] and an optional fixed address list that
//! overrides the resolved addresses.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accessor::{Accessor, SpecialAccessor, TypedAccessor, UNREADABLE};
use crate::address::{self, BaseAddressKind, Context};
use crate::error::{Error, Result};
use crate::hex;
use crate::lock::{LockTarget, VariableLock};
use crate::memory::{
    Addressing, BatchGuard, Number, PrimitiveType, RAM_ADDRESS_AREA, RAM_ADDRESS_MASK,
};
use crate::special::SpecialRegistry;
use crate::version::{GameVersion, OffsetTable};

/// Text shown in place of an address that does not exist.
pub const NO_ADDRESS: &str = "(none)";

/// Integer deltas at or beyond this magnitude are added in floating point.
const INTEGER_DELTA_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Declarative record a watch variable is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special: Option<String>,
    pub base: BaseAddressKind,
    #[serde(default)]
    pub offsets: OffsetTable,
    #[serde(default, with = "hex::opt_u64", skip_serializing_if = "Option::is_none")]
    pub mask: Option<u64>,
}

/// How a variable's values are read and written.
#[derive(Debug, Clone)]
pub enum VariableKind {
    Normal(TypedAccessor),
    Special(SpecialAccessor),
}

impl Accessor for VariableKind {
    fn get(&self, ctx: &Context<'_>, address: u32) -> Option<String> {
        match self {
            Self::Normal(accessor) => accessor.get(ctx, address),
            Self::Special(accessor) => accessor.get(ctx, address),
        }
    }

    fn set(&self, ctx: &Context<'_>, value: &str, address: u32) -> bool {
        match self {
            Self::Normal(accessor) => accessor.set(ctx, value, address),
            Self::Special(accessor) => accessor.set(ctx, value, address),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchVariable {
    name: String,
    memory_type: Option<PrimitiveType>,
    kind: VariableKind,
    base: BaseAddressKind,
    offsets: OffsetTable,
}

impl WatchVariable {
    /// A typed memory cell.
    pub fn normal(
        name: impl Into<String>,
        ty: PrimitiveType,
        mask: Option<u64>,
        base: BaseAddressKind,
        offsets: OffsetTable,
    ) -> Self {
        let accessor = TypedAccessor::new(ty, mask, base.addressing());
        Self {
            name: name.into(),
            memory_type: Some(ty),
            kind: VariableKind::Normal(accessor),
            base,
            offsets,
        }
    }

    /// A computed quantity backed by a registered handler.
    pub fn special(
        name: impl Into<String>,
        id: &str,
        memory_type: Option<PrimitiveType>,
        registry: &SpecialRegistry,
        base: BaseAddressKind,
        offsets: OffsetTable,
    ) -> Result<Self> {
        let handler = registry.lookup(id)?;
        Ok(Self {
            name: name.into(),
            memory_type,
            kind: VariableKind::Special(SpecialAccessor {
                id: id.to_string(),
                handler,
            }),
            base,
            offsets,
        })
    }

    pub fn from_definition(def: &VariableDefinition, registry: &SpecialRegistry) -> Result<Self> {
        let memory_type = def
            .type_name
            .as_deref()
            .map(|name| {
                name.parse::<PrimitiveType>()
                    .map_err(|_| Error::UnknownType(name.to_string()))
            })
            .transpose()?;

        match (&def.special, memory_type) {
            (Some(id), ty) => Self::special(
                def.name.clone(),
                id,
                ty,
                registry,
                def.base.clone(),
                def.offsets,
            ),
            (None, Some(ty)) => Ok(Self::normal(
                def.name.clone(),
                ty,
                def.mask,
                def.base.clone(),
                def.offsets,
            )),
            (None, None) => Err(Error::InvalidDefinition {
                name: def.name.clone(),
                message: "either a type or a special handler is required".to_string(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }

    pub fn is_special(&self) -> bool {
        matches!(self.kind, VariableKind::Special(_))
    }

    pub fn memory_type(&self) -> Option<PrimitiveType> {
        self.memory_type
    }

    pub fn mask(&self) -> Option<u64> {
        match &self.kind {
            VariableKind::Normal(accessor) => accessor.mask,
            VariableKind::Special(_) => None,
        }
    }

    pub fn base(&self) -> &BaseAddressKind {
        &self.base
    }

    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    pub fn offset(&self, version: GameVersion) -> u32 {
        self.offsets.offset(version)
    }

    /// The override list if given, otherwise the freshly resolved addresses.
    pub fn addresses(&self, ctx: &Context<'_>, fixed: Option<&[u32]>) -> Vec<u32> {
        match fixed {
            Some(addresses) => addresses.to_vec(),
            None => address::resolve(&self.base, &self.offsets, ctx),
        }
    }

    /// One value per address, in address order. Unreadable addresses yield
    /// [`UNREADABLE`].
    pub fn get_values(&self, ctx: &Context<'_>, fixed: Option<&[u32]>) -> Vec<String> {
        self.addresses(ctx, fixed)
            .into_iter()
            .map(|address| {
                self.kind
                    .get(ctx, address)
                    .unwrap_or_else(|| UNREADABLE.to_string())
            })
            .collect()
    }

    /// Write `value` to every address inside one suspend/resume batch.
    ///
    /// Returns `false` if there is nothing to write or any single write
    /// failed; every address is still attempted.
    pub fn set_value(&self, ctx: &Context<'_>, value: &str, fixed: Option<&[u32]>) -> bool {
        let addresses = self.addresses(ctx, fixed);
        if addresses.is_empty() {
            return false;
        }

        let _batch = BatchGuard::begin(ctx.stream);
        addresses
            .iter()
            .map(|&address| self.kind.set(ctx, value, address))
            .fold(true, |all, ok| all && ok)
    }

    /// Add `delta` to the current value at every address.
    pub fn add_value(&self, ctx: &Context<'_>, delta: f64, fixed: Option<&[u32]>) -> bool {
        let addresses = self.addresses(ctx, fixed);
        if addresses.is_empty() {
            return false;
        }

        let _batch = BatchGuard::begin(ctx.stream);
        addresses
            .iter()
            .map(|&address| {
                let Some(current) = self.kind.get(ctx, address).as_deref().and_then(Number::parse)
                else {
                    return false;
                };
                let updated = match current {
                    Number::Integer(v) if delta.fract() == 0.0 && delta.abs() < INTEGER_DELTA_LIMIT => {
                        match v.checked_add(delta as i128) {
                            Some(sum) => sum.to_string(),
                            None => return false,
                        }
                    }
                    other => (other.as_f64() + delta).to_string(),
                };
                self.kind.set(ctx, &updated, address)
            })
            .fold(true, |all, ok| all && ok)
    }

    /// Snapshot the current value at every address as a lock.
    ///
    /// All-or-nothing: if any address cannot be captured no locks are
    /// returned, so callers must check the result rather than assume success.
    pub fn get_locks(&self, ctx: &Context<'_>, fixed: Option<&[u32]>) -> Vec<VariableLock> {
        let addresses = self.addresses(ctx, fixed);
        let locks: Option<Vec<VariableLock>> = addresses
            .iter()
            .map(|&address| self.capture_lock(ctx, address))
            .collect();

        locks.unwrap_or_else(|| {
            debug!("Could not capture every address of {} for locking", self.name);
            Vec::new()
        })
    }

    fn capture_lock(&self, ctx: &Context<'_>, address: u32) -> Option<VariableLock> {
        match &self.kind {
            VariableKind::Normal(accessor) => {
                let bits = accessor.get_bits(ctx, address)?;
                let value = accessor.ty.decode(bits).to_string();
                Some(VariableLock::new(
                    &self.name,
                    address,
                    value,
                    LockTarget::Memory {
                        accessor: *accessor,
                        bits,
                    },
                ))
            }
            VariableKind::Special(accessor) => {
                let value = accessor.get(ctx, address)?;
                Some(VariableLock::new(
                    &self.name,
                    address,
                    value,
                    LockTarget::Special(accessor.clone()),
                ))
            }
        }
    }

    /// e.g. `ushort with mask 0x000F`, `special (float)`.
    pub fn type_description(&self) -> String {
        match &self.kind {
            VariableKind::Special(_) => match self.memory_type {
                Some(ty) => format!("special ({})", ty),
                None => "special".to_string(),
            },
            VariableKind::Normal(accessor) => match accessor.mask {
                Some(mask) => format!(
                    "{} with mask 0x{:0width$X}",
                    accessor.ty,
                    mask,
                    width = accessor.ty.nibble_count()
                ),
                None => accessor.ty.to_string(),
            },
        }
    }

    /// e.g. `Camera + 0x8C`, `Object + PuIndex`.
    pub fn base_offset_description(&self, version: GameVersion) -> String {
        match &self.kind {
            VariableKind::Special(accessor) => format!("{} + {}", self.base, accessor.id),
            VariableKind::Normal(_) => format!("{} + 0x{:X}", self.base, self.offset(version)),
        }
    }

    fn byte_count(&self) -> usize {
        self.memory_type.map(|ty| ty.byte_count()).unwrap_or(4)
    }

    /// Game RAM address of the first resolved address. With `address_area`
    /// the segment bit is set (`0x80xxxxxx`), otherwise it is the physical
    /// offset.
    pub fn ram_address(
        &self,
        ctx: &Context<'_>,
        address_area: bool,
        fixed: Option<&[u32]>,
    ) -> Option<u32> {
        let first = *self.addresses(ctx, fixed).first()?;
        let address = match self.base.addressing() {
            Addressing::Absolute => {
                ctx.stream.process_to_ram(first as u64, self.byte_count())
            }
            Addressing::Ram => first,
        };

        Some(if address_area {
            address | RAM_ADDRESS_AREA
        } else {
            address & RAM_ADDRESS_MASK
        })
    }

    pub fn ram_address_string(
        &self,
        ctx: &Context<'_>,
        address_area: bool,
        fixed: Option<&[u32]>,
    ) -> String {
        if self.is_special() {
            return NO_ADDRESS.to_string();
        }
        match self.ram_address(ctx, address_area, fixed) {
            Some(address) => format!("0x{:08X}", address),
            None => NO_ADDRESS.to_string(),
        }
    }

    /// Process address backing the first resolved address.
    pub fn process_address(&self, ctx: &Context<'_>, fixed: Option<&[u32]>) -> Option<u64> {
        let ram = self.ram_address(ctx, false, fixed)?;
        Some(ctx.stream.ram_to_process(ram, self.byte_count()))
    }

    pub fn process_address_string(&self, ctx: &Context<'_>, fixed: Option<&[u32]>) -> String {
        if self.is_special() {
            return NO_ADDRESS.to_string();
        }
        match self.process_address(ctx, fixed) {
            Some(address) => format!("0x{:08X}", address),
            None => NO_ADDRESS.to_string(),
        }
    }
}

/// Build every variable of a definition list.
pub fn build_variables(
    definitions: &[VariableDefinition],
    registry: &SpecialRegistry,
) -> Result<Vec<WatchVariable>> {
    definitions
        .iter()
        .map(|def| WatchVariable::from_definition(def, registry))
        .collect()
}
