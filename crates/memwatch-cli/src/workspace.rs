//! Everything a command needs: the memory target, the loaded profile and the
//! active game version.

use anyhow::{Context as _, Result, bail};
use memwatch_core::{
    BufferStream, Context, GameVersion, MemoryStream, ProcessHandle, ProcessStream, Profile,
    SpecialRegistry, WatchVariable,
};
use tracing::info;

use crate::cli::{Cli, TargetArgs};
use crate::commands::hex_utils::parse_hex_address;
use crate::config::Config;

pub struct Workspace {
    pub config: Config,
    pub version: GameVersion,
    pub stream: Box<dyn MemoryStream>,
    /// Empty when no profile is configured.
    pub profile: Profile,
    pub registry: SpecialRegistry,
}

impl Workspace {
    /// Apply command-line overrides to `config` and open the target.
    pub fn open(cli: &Cli, mut config: Config) -> Result<Self> {
        if let Some(version) = cli.game_version {
            config.version = version;
        }
        if let Some(profile) = &cli.profile {
            config.profile = Some(profile.clone());
        }

        let stream = open_target(&cli.target, &config)?;
        let profile = match &config.profile {
            Some(path) => Profile::load(path)
                .with_context(|| format!("Failed to load profile {}", path.display()))?,
            None => Profile::default(),
        };

        Ok(Self {
            version: config.version,
            config,
            stream,
            profile,
            registry: SpecialRegistry::with_builtins(),
        })
    }

    pub fn context(&self) -> Context<'_> {
        Context::new(self.version, self.stream.as_ref(), &self.profile.bases)
    }

    /// Build the profile's variables.
    pub fn variables(&self) -> Result<Vec<WatchVariable>> {
        if self.config.profile.is_none() {
            bail!("No profile configured; pass --profile or set `profile` in the config");
        }
        self.profile
            .build(&self.registry)
            .context("Invalid variable definition in profile")
    }

    pub fn variable(&self, name: &str) -> Result<WatchVariable> {
        self.variables()?
            .into_iter()
            .find(|variable| variable.name() == name)
            .with_context(|| format!("No variable named '{}' in the profile", name))
    }
}

fn open_target(target: &TargetArgs, config: &Config) -> Result<Box<dyn MemoryStream>> {
    if let Some(path) = &target.dump {
        let stream = BufferStream::load(path)
            .with_context(|| format!("Failed to read RAM image {}", path.display()))?;
        info!("Loaded RAM image {} ({} bytes)", path.display(), stream.len());
        return Ok(Box::new(stream));
    }

    let ram_start = match &target.ram_start {
        Some(text) => parse_hex_address(text)?,
        None => config
            .ram_start
            .context("RAM start unknown; pass --ram-start or set `ram_start` in the config")?,
    };

    let process = match target.pid {
        Some(pid) => ProcessHandle::open(pid)?,
        None => {
            let name = target.process.as_deref().unwrap_or(&config.process);
            ProcessHandle::find_and_open(name)
                .with_context(|| format!("Could not attach to {}", name))?
        }
    };
    info!("Attached to pid {} (RAM at {:#x})", process.pid, ram_start);

    Ok(Box::new(ProcessStream::new(process, ram_start)))
}
