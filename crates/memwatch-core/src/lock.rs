//! Value locks: captured values re-written on every tick until released.

use std::collections::BTreeMap;

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, info};

use crate::accessor::{Accessor, SpecialAccessor, TypedAccessor};
use crate::address::Context;
use crate::memory::BatchGuard;
use crate::watch::WatchVariable;

/// What a lock writes back.
#[derive(Debug, Clone)]
pub enum LockTarget {
    /// Exact storage bits of a typed cell.
    Memory { accessor: TypedAccessor, bits: u64 },
    /// Text value handed back to a special handler.
    Special(SpecialAccessor),
}

/// One locked (variable, address) pair.
#[derive(Debug, Clone)]
pub struct VariableLock {
    variable: String,
    address: u32,
    value: String,
    target: LockTarget,
}

impl VariableLock {
    pub(crate) fn new(variable: &str, address: u32, value: String, target: LockTarget) -> Self {
        Self {
            variable: variable.to_string(),
            address,
            value,
            target,
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    /// Captured value as displayed text.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_special(&self) -> bool {
        matches!(self.target, LockTarget::Special(_))
    }

    /// Write the captured value back.
    pub fn reapply(&self, ctx: &Context<'_>) -> bool {
        match &self.target {
            LockTarget::Memory { accessor, bits } => accessor.set_bits(ctx, *bits, self.address),
            LockTarget::Special(accessor) => accessor.set(ctx, &self.value, self.address),
        }
    }

    /// Same lock holding a new value. `None` if the text does not encode.
    pub fn with_value(&self, value: &str) -> Option<Self> {
        let target = match &self.target {
            LockTarget::Memory { accessor, .. } => {
                let bits = accessor
                    .ty
                    .encode_rounding_wrapping(value)
                    .map_err(|e| debug!("Lock value {:?} rejected: {}", value, e))
                    .ok()?;
                let bits = bits & accessor.mask.unwrap_or(u64::MAX);
                LockTarget::Memory {
                    accessor: *accessor,
                    bits,
                }
            }
            LockTarget::Special(accessor) => LockTarget::Special(accessor.clone()),
        };
        let value = match &target {
            LockTarget::Memory { accessor, bits } => accessor.ty.decode(*bits).to_string(),
            LockTarget::Special(_) => value.to_string(),
        };
        Some(Self {
            variable: self.variable.clone(),
            address: self.address,
            value,
            target,
        })
    }
}

/// Lock status of a variable across its addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LockState {
    Unlocked,
    /// Some but not all current addresses are locked.
    Partial,
    Locked,
}

/// Outcome of one [`LockRegistry::reapply_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LockReport {
    pub applied: usize,
    pub failed: usize,
    pub dropped: usize,
}

/// Active locks keyed by (variable name, address), reapplied in key order.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: BTreeMap<(String, u32), VariableLock>,
    drop_failed: bool,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that forgets locks whose reapply fails.
    pub fn dropping_failed(drop_failed: bool) -> Self {
        Self {
            locks: BTreeMap::new(),
            drop_failed,
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Lock every current address of `variable`. Returns how many locks were
    /// added; zero when capture failed.
    pub fn lock(
        &mut self,
        ctx: &Context<'_>,
        variable: &WatchVariable,
        fixed: Option<&[u32]>,
    ) -> usize {
        let locks = variable.get_locks(ctx, fixed);
        let count = locks.len();
        for lock in locks {
            self.locks
                .insert((lock.variable.clone(), lock.address), lock);
        }
        if count > 0 {
            info!("Locked {} at {} address(es)", variable.name(), count);
        }
        count
    }

    /// Release the locks on the current addresses of `variable`.
    pub fn unlock(
        &mut self,
        ctx: &Context<'_>,
        variable: &WatchVariable,
        fixed: Option<&[u32]>,
    ) -> usize {
        let before = self.locks.len();
        for address in variable.addresses(ctx, fixed) {
            self.locks.remove(&(variable.name().to_string(), address));
        }
        before - self.locks.len()
    }

    /// Unlock if any current address is locked, otherwise lock.
    /// Returns the resulting state.
    pub fn toggle(
        &mut self,
        ctx: &Context<'_>,
        variable: &WatchVariable,
        fixed: Option<&[u32]>,
    ) -> LockState {
        if self.lock_state(ctx, variable, fixed) == LockState::Unlocked {
            self.lock(ctx, variable, fixed);
        } else {
            self.unlock(ctx, variable, fixed);
            info!("Unlocked {}", variable.name());
        }
        self.lock_state(ctx, variable, fixed)
    }

    pub fn is_locked(&self, variable: &str, address: u32) -> bool {
        self.locks.contains_key(&(variable.to_string(), address))
    }

    pub fn lock_state(
        &self,
        ctx: &Context<'_>,
        variable: &WatchVariable,
        fixed: Option<&[u32]>,
    ) -> LockState {
        let addresses = variable.addresses(ctx, fixed);
        let locked = addresses
            .iter()
            .filter(|&&address| self.is_locked(variable.name(), address))
            .count();
        match locked {
            0 => LockState::Unlocked,
            n if n == addresses.len() => LockState::Locked,
            _ => LockState::Partial,
        }
    }

    /// Replace the held value of any lock on `variable` at `addresses`.
    pub fn update_value(&mut self, variable: &str, addresses: &[u32], value: &str) -> usize {
        let mut updated = 0;
        for &address in addresses {
            let key = (variable.to_string(), address);
            let replacement = self.locks.get(&key).and_then(|lock| lock.with_value(value));
            if let Some(replacement) = replacement {
                self.locks.insert(key, replacement);
                updated += 1;
            }
        }
        updated
    }

    /// Forget every lock on `variable`.
    pub fn remove_variable(&mut self, variable: &str) -> usize {
        let before = self.locks.len();
        self.locks.retain(|(name, _), _| name != variable);
        before - self.locks.len()
    }

    pub fn clear(&mut self) {
        self.locks.clear();
    }

    pub fn locks(&self) -> impl Iterator<Item = &VariableLock> {
        self.locks.values()
    }

    /// Re-write every held value inside one suspend/resume batch.
    pub fn reapply_all(&mut self, ctx: &Context<'_>) -> LockReport {
        let mut report = LockReport::default();
        if self.locks.is_empty() {
            return report;
        }

        let _batch = BatchGuard::begin(ctx.stream);
        let mut failed_keys = Vec::new();
        for (key, lock) in &self.locks {
            if lock.reapply(ctx) {
                report.applied += 1;
            } else {
                report.failed += 1;
                failed_keys.push(key.clone());
            }
        }

        if self.drop_failed {
            for key in failed_keys {
                debug!("Dropping lock on {} at 0x{:08X}", key.0, key.1);
                self.locks.remove(&key);
                report.dropped += 1;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{BaseAddressKind, BaseAddressTable, DynamicBase};
    use crate::memory::{Addressing, BufferStream, MemoryStream, PrimitiveType};
    use crate::special::SpecialRegistry;
    use crate::version::{GameVersion, OffsetTable};

    fn bases() -> BaseAddressTable {
        BaseAddressTable::new().with_dynamic(
            "Object",
            DynamicBase::Fixed(vec![0x8000_0100, 0x8000_0200]),
        )
    }

    fn hp_var() -> WatchVariable {
        WatchVariable::normal(
            "HP",
            PrimitiveType::Short,
            None,
            BaseAddressKind::Dynamic("Object".into()),
            OffsetTable::uniform(0x2E),
        )
    }

    #[test]
    fn test_lock_reasserts_after_external_write() {
        let stream = BufferStream::new(0x400);
        let bases = bases();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        let var = hp_var();
        var.set_value(&ctx, "8", None);

        let mut registry = LockRegistry::new();
        assert_eq!(registry.lock(&ctx, &var, None), 2);

        stream
            .write_raw(PrimitiveType::Short, 3, 0x8000_012E, Addressing::Ram)
            .unwrap();
        assert_eq!(var.get_values(&ctx, None), vec!["3", "8"]);

        let report = registry.reapply_all(&ctx);
        assert_eq!(report.applied, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(var.get_values(&ctx, None), vec!["8", "8"]);
        assert_eq!(stream.suspend_calls(), 2);
    }

    #[test]
    fn test_overlapping_locks_reapply_in_key_order() {
        let stream = BufferStream::new(0x400);
        let bases = bases();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        let whole = WatchVariable::normal(
            "A Flags",
            PrimitiveType::Byte,
            None,
            BaseAddressKind::Relative,
            OffsetTable::uniform(0x8000_0040),
        );
        let low = WatchVariable::normal(
            "B Flags Low",
            PrimitiveType::Byte,
            Some(0x0F),
            BaseAddressKind::Relative,
            OffsetTable::uniform(0x8000_0040),
        );

        let mut registry = LockRegistry::new();
        assert!(whole.set_value(&ctx, "0x12", None));
        assert_eq!(registry.lock(&ctx, &whole, None), 1);
        assert!(low.set_value(&ctx, "0x5", None));
        assert_eq!(registry.lock(&ctx, &low, None), 1);

        for _ in 0..8 {
            stream
                .write_raw(PrimitiveType::Byte, 0xFF, 0x8000_0040, Addressing::Ram)
                .unwrap();
            assert_eq!(registry.reapply_all(&ctx).applied, 2);
            assert_eq!(whole.get_values(&ctx, None), vec!["21"]);
        }
    }

    #[test]
    fn test_toggle_and_state() {
        let stream = BufferStream::new(0x400);
        let bases = bases();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        let var = hp_var();
        let mut registry = LockRegistry::new();

        assert_eq!(registry.lock_state(&ctx, &var, None), LockState::Unlocked);
        assert_eq!(registry.toggle(&ctx, &var, None), LockState::Locked);

        registry.unlock(&ctx, &var, Some(&[0x8000_012E]));
        assert_eq!(registry.lock_state(&ctx, &var, None), LockState::Partial);

        assert_eq!(registry.toggle(&ctx, &var, None), LockState::Unlocked);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_value_changes_held_value() {
        let stream = BufferStream::new(0x400);
        let bases = bases();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        let var = hp_var();
        let mut registry = LockRegistry::new();
        registry.lock(&ctx, &var, None);

        let addresses = var.addresses(&ctx, None);
        assert_eq!(registry.update_value("HP", &addresses, "70000"), 2);
        // 70000 wraps to 4464 in a signed short
        assert!(registry.locks().all(|lock| lock.value() == "4464"));

        registry.reapply_all(&ctx);
        assert_eq!(var.get_values(&ctx, None), vec!["4464", "4464"]);
        assert_eq!(registry.update_value("HP", &addresses, "abc"), 0);
    }

    #[test]
    fn test_failed_locks_dropped_when_configured() {
        let stream = BufferStream::new(0x400);
        let bases = bases();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        let var = hp_var();

        let mut keep = LockRegistry::new();
        let mut drop = LockRegistry::dropping_failed(true);
        keep.lock(&ctx, &var, None);
        drop.lock(&ctx, &var, None);

        stream.set_writes_fail(true);
        let report = keep.reapply_all(&ctx);
        assert_eq!(report.failed, 2);
        assert_eq!(report.dropped, 0);
        assert_eq!(keep.len(), 2);

        let report = drop.reapply_all(&ctx);
        assert_eq!(report.dropped, 2);
        assert!(drop.is_empty());
    }

    #[test]
    fn test_special_lock() {
        let stream = BufferStream::new(0x400);
        let bases = bases();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        let registry = SpecialRegistry::with_builtins();
        let var = WatchVariable::special(
            "PU",
            "PuIndex",
            Some(PrimitiveType::Float),
            &registry,
            BaseAddressKind::Relative,
            OffsetTable::uniform(0x8000_0040),
        )
        .unwrap();
        assert!(var.set_value(&ctx, "3", None));

        let mut locks = LockRegistry::new();
        assert_eq!(locks.lock(&ctx, &var, None), 1);
        assert!(locks.locks().all(VariableLock::is_special));

        stream
            .write_raw(
                PrimitiveType::Float,
                0f32.to_bits() as u64,
                0x8000_0040,
                Addressing::Ram,
            )
            .unwrap();
        locks.reapply_all(&ctx);
        assert_eq!(var.get_values(&ctx, None), vec!["3"]);

        assert_eq!(locks.remove_variable("PU"), 1);
        locks.clear();
        assert!(locks.is_empty());
    }
}
