//! List command implementation.

use anyhow::Result;
use memwatch_core::{Context, WatchVariable};

use crate::workspace::Workspace;

pub fn run(workspace: &Workspace) -> Result<()> {
    let variables = workspace.variables()?;
    let ctx = workspace.context();

    println!(
        "{} variables (version {}):",
        variables.len(),
        workspace.version
    );
    println!();
    for variable in &variables {
        println!("{}", describe(variable, &ctx));
    }

    Ok(())
}

fn describe(variable: &WatchVariable, ctx: &Context<'_>) -> String {
    let addresses = variable.addresses(ctx, None);
    let location = match addresses.len() {
        0 => variable.ram_address_string(ctx, true, None),
        1 => variable.ram_address_string(ctx, true, Some(&addresses)),
        n => format!(
            "{} (+{} more)",
            variable.ram_address_string(ctx, true, Some(&addresses)),
            n - 1
        ),
    };

    format!(
        "{:<24} {:<24} {:<24} {}",
        variable.name(),
        variable.type_description(),
        variable.base_offset_description(ctx.version),
        location
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use memwatch_core::{
        BaseAddressKind, BaseAddressTable, BufferStream, DynamicBase, GameVersion, OffsetTable,
        PrimitiveType, VersionTable,
    };

    #[test]
    fn test_describe_static_and_dynamic() {
        let stream = BufferStream::new(0x100);
        let bases = BaseAddressTable::new()
            .with_static("Mario", VersionTable::uniform(0x8033_B170))
            .with_dynamic("Object", DynamicBase::Fixed(vec![0x8034_0000, 0x8034_0260]));
        let ctx = Context::new(GameVersion::Us, &stream, &bases);

        let mario = WatchVariable::normal(
            "Mario X",
            PrimitiveType::Float,
            None,
            BaseAddressKind::Static("Mario".into()),
            OffsetTable::uniform(0x3C),
        );
        let line = describe(&mario, &ctx);
        assert!(line.starts_with("Mario X"));
        assert!(line.contains("Mario + 0x3C"));
        assert!(line.ends_with("0x8033B1AC"));

        let obj = WatchVariable::normal(
            "Obj Y",
            PrimitiveType::Float,
            None,
            BaseAddressKind::Dynamic("Object".into()),
            OffsetTable::uniform(0xA4),
        );
        assert!(describe(&obj, &ctx).ends_with("0x803400A4 (+1 more)"));
    }
}
