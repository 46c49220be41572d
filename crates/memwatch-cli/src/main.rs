mod cli;
mod commands;
mod config;
mod input;
mod shutdown;
mod workspace;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::watch::WatchOptions;
use config::Config;
use workspace::Workspace;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("memwatch=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)?;
    let workspace = Workspace::open(&cli, config)?;

    match cli.command {
        Commands::List => commands::list::run(&workspace)?,
        Commands::Get { ref name } => commands::get::run(&workspace, name)?,
        Commands::Set {
            ref name,
            ref value,
        } => commands::set::run(&workspace, name, value)?,
        Commands::Watch {
            ref lock,
            interval,
            ticks,
        } => commands::watch::run(
            &workspace,
            WatchOptions {
                locks: lock.clone(),
                interval,
                ticks,
            },
        )?,
        Commands::Disasm { ref address, lines } => {
            commands::disasm::run(&workspace, address, lines)?
        }
        Commands::Hexdump {
            ref address,
            size,
            no_ascii,
        } => commands::hexdump::run(&workspace, address, size, !no_ascii)?,
    }

    Ok(())
}
