//! Get command implementation.

use anyhow::Result;

use crate::workspace::Workspace;

pub fn run(workspace: &Workspace, name: &str) -> Result<()> {
    let variable = workspace.variable(name)?;
    let ctx = workspace.context();

    let addresses = variable.addresses(&ctx, None);
    if addresses.is_empty() {
        println!("{}: no addresses", variable.name());
        return Ok(());
    }

    let values = variable.get_values(&ctx, Some(&addresses));
    for (address, value) in addresses.iter().zip(values) {
        println!("{} @ 0x{:08X}: {}", variable.name(), address, value);
    }

    Ok(())
}
