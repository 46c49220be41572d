//! Special variables: quantities computed from memory rather than stored in
//! a single typed cell.
//!
//! Handlers are registered by id in a [`SpecialRegistry`] and looked up once
//! when a watch variable is built.

mod pu;

use std::collections::HashMap;
use std::sync::Arc;

use crate::address::Context;
use crate::error::{Error, Result};

pub use pu::{PU_OFFSET, PU_SIZE, PuAxis, pu_from_coord, qpu_from_coord, relative_pu_position};

/// Custom getter/setter pair for a special variable.
pub trait SpecialVariable: Send + Sync {
    fn get(&self, ctx: &Context<'_>, address: u32) -> Option<String>;

    /// Apply `value` at `address`. Read-only handlers return `false`.
    fn set(&self, ctx: &Context<'_>, value: &str, address: u32) -> bool;
}

type Getter = dyn Fn(&Context<'_>, u32) -> Option<String> + Send + Sync;
type Setter = dyn Fn(&Context<'_>, &str, u32) -> bool + Send + Sync;

/// [`SpecialVariable`] built from a pair of closures.
pub struct FnSpecial {
    getter: Box<Getter>,
    setter: Option<Box<Setter>>,
}

impl FnSpecial {
    pub fn new<G, S>(getter: G, setter: S) -> Self
    where
        G: Fn(&Context<'_>, u32) -> Option<String> + Send + Sync + 'static,
        S: Fn(&Context<'_>, &str, u32) -> bool + Send + Sync + 'static,
    {
        Self {
            getter: Box::new(getter),
            setter: Some(Box::new(setter)),
        }
    }

    pub fn read_only<G>(getter: G) -> Self
    where
        G: Fn(&Context<'_>, u32) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            getter: Box::new(getter),
            setter: None,
        }
    }
}

impl SpecialVariable for FnSpecial {
    fn get(&self, ctx: &Context<'_>, address: u32) -> Option<String> {
        (self.getter)(ctx, address)
    }

    fn set(&self, ctx: &Context<'_>, value: &str, address: u32) -> bool {
        match &self.setter {
            Some(setter) => setter(ctx, value, address),
            None => false,
        }
    }
}

/// Lookup table from special id to handler.
#[derive(Clone, Default)]
pub struct SpecialRegistry {
    handlers: HashMap<String, Arc<dyn SpecialVariable>>,
}

impl SpecialRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in parallel universe handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for axis in [PuAxis::Index, PuAxis::Relative, PuAxis::QuarterIndex] {
            registry.register(axis.id(), axis);
        }
        registry
    }

    pub fn register<H>(&mut self, id: impl Into<String>, handler: H)
    where
        H: SpecialVariable + 'static,
    {
        self.handlers.insert(id.into(), Arc::new(handler));
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<dyn SpecialVariable>> {
        self.handlers
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownSpecial(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::BaseAddressTable;
    use crate::memory::BufferStream;
    use crate::version::GameVersion;

    #[test]
    fn test_closure_handler() {
        let mut registry = SpecialRegistry::new();
        registry.register(
            "Version",
            FnSpecial::read_only(|ctx: &Context<'_>, _| Some(ctx.version.to_string())),
        );

        let stream = BufferStream::new(4);
        let bases = BaseAddressTable::new();
        let ctx = Context::new(GameVersion::Jp, &stream, &bases);

        let handler = registry.lookup("Version").unwrap();
        assert_eq!(handler.get(&ctx, 0).as_deref(), Some("jp"));
        assert!(!handler.set(&ctx, "us", 0));
    }

    #[test]
    fn test_unknown_id_is_error() {
        let registry = SpecialRegistry::with_builtins();
        assert!(matches!(
            registry.lookup("CurrentAreaIndex"),
            Err(Error::UnknownSpecial(_))
        ));
        assert!(registry.contains("PuIndex"));
        assert!(registry.contains("PuRelative"));
        assert!(registry.contains("QpuIndex"));
    }
}
