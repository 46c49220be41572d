//! A running watch list: variables, their fixed-address overrides and the
//! locks held on them.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::address::Context;
use crate::error::{Error, Result};
use crate::lock::{LockRegistry, LockReport, LockState};
use crate::watch::WatchVariable;

/// One watched variable.
#[derive(Debug, Clone)]
pub struct WatchEntry {
    pub variable: Arc<WatchVariable>,
    /// Addresses pinned by the user; `None` resolves fresh each time.
    pub fixed_addresses: Option<Vec<u32>>,
}

impl WatchEntry {
    fn fixed(&self) -> Option<&[u32]> {
        self.fixed_addresses.as_deref()
    }
}

/// Values of one entry after a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchRow {
    pub name: String,
    pub values: Vec<String>,
    pub lock: LockState,
    pub fixed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub locks: LockReport,
    pub rows: Vec<WatchRow>,
}

#[derive(Debug, Default)]
pub struct WatchSession {
    entries: Vec<WatchEntry>,
    locks: LockRegistry,
}

impl WatchSession {
    pub fn new(variables: impl IntoIterator<Item = WatchVariable>, drop_failed_locks: bool) -> Self {
        Self {
            entries: variables
                .into_iter()
                .map(|variable| WatchEntry {
                    variable: Arc::new(variable),
                    fixed_addresses: None,
                })
                .collect(),
            locks: LockRegistry::dropping_failed(drop_failed_locks),
        }
    }

    pub fn entries(&self) -> &[WatchEntry] {
        &self.entries
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub fn entry(&self, name: &str) -> Result<&WatchEntry> {
        self.entries
            .iter()
            .find(|entry| entry.variable.name() == name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut WatchEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.variable.name() == name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    /// Reassert every lock, then read every variable.
    pub fn tick(&mut self, ctx: &Context<'_>) -> TickReport {
        let locks = self.locks.reapply_all(ctx);
        if locks.failed > 0 {
            debug!("{} lock(s) failed to reapply", locks.failed);
        }

        let rows = self
            .entries
            .iter()
            .map(|entry| WatchRow {
                name: entry.variable.name().to_string(),
                values: entry.variable.get_values(ctx, entry.fixed()),
                lock: self.locks.lock_state(ctx, &entry.variable, entry.fixed()),
                fixed: entry.fixed_addresses.is_some(),
            })
            .collect();

        TickReport { locks, rows }
    }

    /// Write `value` and move any lock on the variable to the new value.
    pub fn set_value(&mut self, ctx: &Context<'_>, name: &str, value: &str) -> Result<bool> {
        let entry = self.entry(name)?.clone();
        let written = entry.variable.set_value(ctx, value, entry.fixed());
        if written {
            let addresses = entry.variable.addresses(ctx, entry.fixed());
            self.locks.update_value(name, &addresses, value);
        }
        Ok(written)
    }

    pub fn add_value(&mut self, ctx: &Context<'_>, name: &str, delta: f64) -> Result<bool> {
        let entry = self.entry(name)?.clone();
        let written = entry.variable.add_value(ctx, delta, entry.fixed());
        if written {
            // Re-capture so locks hold the value actually stored
            let addresses = entry.variable.addresses(ctx, entry.fixed());
            let values = entry.variable.get_values(ctx, Some(&addresses));
            for (address, value) in addresses.iter().zip(values) {
                self.locks.update_value(name, &[*address], &value);
            }
        }
        Ok(written)
    }

    pub fn toggle_lock(&mut self, ctx: &Context<'_>, name: &str) -> Result<LockState> {
        let entry = self.entry(name)?.clone();
        Ok(self.locks.toggle(ctx, &entry.variable, entry.fixed()))
    }

    /// Pin the variable to its currently resolved addresses, or release a pin.
    /// Returns whether the variable is now pinned.
    pub fn toggle_fixed_addresses(&mut self, ctx: &Context<'_>, name: &str) -> Result<bool> {
        let entry = self.entry_mut(name)?;
        entry.fixed_addresses = match entry.fixed_addresses.take() {
            Some(_) => None,
            None => Some(entry.variable.addresses(ctx, None)),
        };
        Ok(entry.fixed_addresses.is_some())
    }

    /// Replace the variable list. Pins survive for names that still exist;
    /// locks on removed variables are released.
    pub fn reload(&mut self, variables: impl IntoIterator<Item = WatchVariable>) {
        let previous = std::mem::take(&mut self.entries);
        self.entries = variables
            .into_iter()
            .map(|variable| {
                let fixed_addresses = previous
                    .iter()
                    .find(|old| old.variable.name() == variable.name())
                    .and_then(|old| old.fixed_addresses.clone());
                WatchEntry {
                    variable: Arc::new(variable),
                    fixed_addresses,
                }
            })
            .collect();

        for old in &previous {
            let name = old.variable.name();
            if self.entry(name).is_err() {
                let released = self.locks.remove_variable(name);
                if released > 0 {
                    info!("Released {} lock(s) on removed variable {}", released, name);
                }
            }
        }
    }

    pub fn clear_locks(&mut self) {
        self.locks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{BaseAddressKind, BaseAddressTable, SlotPool, DynamicBase};
    use crate::memory::{Addressing, BufferStream, MemoryStream, PrimitiveType};
    use crate::version::{GameVersion, OffsetTable, VersionTable};

    fn bases() -> BaseAddressTable {
        BaseAddressTable::new()
            .with_static("Mario", VersionTable::uniform(0x8000_0100))
            .with_dynamic(
                "Object",
                DynamicBase::Slots(SlotPool {
                    start: VersionTable::uniform(0x8000_0200),
                    stride: 0x40,
                    count: 4,
                    active_offset: Some(0x00),
                    active_mask: 0x0001,
                }),
            )
    }

    fn variables() -> Vec<WatchVariable> {
        vec![
            WatchVariable::normal(
                "MarioHP",
                PrimitiveType::Short,
                None,
                BaseAddressKind::Static("Mario".into()),
                OffsetTable::uniform(0x2E),
            ),
            WatchVariable::normal(
                "ObjY",
                PrimitiveType::Float,
                None,
                BaseAddressKind::Dynamic("Object".into()),
                OffsetTable::uniform(0x10),
            ),
        ]
    }

    fn activate(stream: &BufferStream, slot: u32) {
        stream
            .write_raw(
                PrimitiveType::UShort,
                1,
                0x8000_0200 + slot * 0x40,
                Addressing::Ram,
            )
            .unwrap();
    }

    #[test]
    fn test_tick_reads_all_variables() {
        let stream = BufferStream::new(0x400);
        let bases = bases();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        activate(&stream, 0);
        activate(&stream, 2);

        let mut session = WatchSession::new(variables(), false);
        assert!(session.set_value(&ctx, "ObjY", "-12.5").unwrap());

        let report = session.tick(&ctx);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].values, vec!["0"]);
        assert_eq!(report.rows[1].values, vec!["-12.5", "-12.5"]);
        assert_eq!(report.rows[1].lock, LockState::Unlocked);
    }

    #[test]
    fn test_locked_value_survives_game_writes() {
        let stream = BufferStream::new(0x400);
        let bases = bases();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        let mut session = WatchSession::new(variables(), false);

        session.set_value(&ctx, "MarioHP", "2176").unwrap();
        assert_eq!(session.toggle_lock(&ctx, "MarioHP").unwrap(), LockState::Locked);

        // Game takes damage
        stream
            .write_raw(PrimitiveType::Short, 1000, 0x8000_012E, Addressing::Ram)
            .unwrap();
        let report = session.tick(&ctx);
        assert_eq!(report.locks.applied, 1);
        assert_eq!(report.rows[0].values, vec!["2176"]);
        assert_eq!(report.rows[0].lock, LockState::Locked);

        // Writing through the session moves the lock
        session.set_value(&ctx, "MarioHP", "255").unwrap();
        stream
            .write_raw(PrimitiveType::Short, 7, 0x8000_012E, Addressing::Ram)
            .unwrap();
        assert_eq!(session.tick(&ctx).rows[0].values, vec!["255"]);

        session.add_value(&ctx, "MarioHP", 1.0).unwrap();
        assert_eq!(session.tick(&ctx).rows[0].values, vec!["256"]);
    }

    #[test]
    fn test_fixed_addresses_pin_resolution() {
        let stream = BufferStream::new(0x400);
        let bases = bases();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        activate(&stream, 1);
        let mut session = WatchSession::new(variables(), false);

        assert!(session.toggle_fixed_addresses(&ctx, "ObjY").unwrap());
        assert_eq!(
            session.entry("ObjY").unwrap().fixed_addresses,
            Some(vec![0x8000_0250])
        );

        // A new object spawning does not change a pinned variable
        activate(&stream, 3);
        assert_eq!(session.tick(&ctx).rows[1].values.len(), 1);

        assert!(!session.toggle_fixed_addresses(&ctx, "ObjY").unwrap());
        assert_eq!(session.tick(&ctx).rows[1].values.len(), 2);
    }

    #[test]
    fn test_unknown_variable() {
        let stream = BufferStream::new(0x400);
        let bases = bases();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        let mut session = WatchSession::new(variables(), false);
        assert!(matches!(
            session.set_value(&ctx, "Luigi", "1"),
            Err(Error::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_reload_releases_removed_locks() {
        let stream = BufferStream::new(0x400);
        let bases = bases();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        activate(&stream, 0);
        let mut session = WatchSession::new(variables(), false);
        session.toggle_lock(&ctx, "MarioHP").unwrap();
        session.toggle_lock(&ctx, "ObjY").unwrap();
        session.toggle_fixed_addresses(&ctx, "ObjY").unwrap();
        assert_eq!(session.locks().len(), 2);

        let kept: Vec<_> = variables().into_iter().skip(1).collect();
        session.reload(kept);

        assert_eq!(session.entries().len(), 1);
        assert_eq!(session.locks().len(), 1);
        assert!(session.entry("ObjY").unwrap().fixed_addresses.is_some());

        session.clear_locks();
        assert!(session.locks().is_empty());
    }
}
