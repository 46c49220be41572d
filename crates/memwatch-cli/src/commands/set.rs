//! Set command implementation.

use anyhow::{Result, bail};
use tracing::info;

use crate::workspace::Workspace;

pub fn run(workspace: &Workspace, name: &str, value: &str) -> Result<()> {
    let variable = workspace.variable(name)?;
    let ctx = workspace.context();

    let addresses = variable.addresses(&ctx, None);
    if !variable.set_value(&ctx, value, Some(&addresses)) {
        if addresses.is_empty() {
            bail!("{} resolves to no addresses", name);
        }
        bail!("Failed to write '{}' to {}", value, name);
    }

    info!("Wrote {} to {} address(es) of {}", value, addresses.len(), name);
    for (address, current) in addresses
        .iter()
        .zip(variable.get_values(&ctx, Some(&addresses)))
    {
        println!("{} @ 0x{:08X}: {}", name, address, current);
    }

    Ok(())
}
