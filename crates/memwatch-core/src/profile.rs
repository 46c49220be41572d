//! Watch profiles: base address tables plus variable definitions, stored as
//! JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::address::BaseAddressTable;
use crate::error::{Error, Result};
use crate::special::SpecialRegistry;
use crate::watch::{VariableDefinition, WatchVariable, build_variables};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub bases: BaseAddressTable,
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
}

impl Profile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_profile(path)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_profile(path, self)
    }

    pub fn definition(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|def| def.name == name)
    }

    /// Build every variable, rejecting duplicate names.
    pub fn build(&self, registry: &SpecialRegistry) -> Result<Vec<WatchVariable>> {
        for (i, def) in self.variables.iter().enumerate() {
            if self.variables[..i].iter().any(|other| other.name == def.name) {
                return Err(Error::InvalidDefinition {
                    name: def.name.clone(),
                    message: "duplicate variable name".to_string(),
                });
            }
        }
        build_variables(&self.variables, registry)
    }
}

pub fn load_profile<P: AsRef<Path>>(path: P) -> Result<Profile> {
    let content = fs::read_to_string(&path)?;
    let profile: Profile = serde_json::from_str(&content)?;
    info!(
        "Loaded profile {} ({} variables)",
        path.as_ref().display(),
        profile.variables.len()
    );
    Ok(profile)
}

pub fn save_profile<P: AsRef<Path>>(path: P, profile: &Profile) -> Result<()> {
    let content = serde_json::to_string_pretty(profile)?;
    fs::write(path, content)?;
    Ok(())
}
