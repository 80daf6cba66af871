//! Command implementations
//!
//! Every command builds the same controller: the machine config is loaded
//! into an in-memory store, the kernel command line is read once, and
//! published links live in the state file.

pub mod apply;
pub mod diff;
pub mod plan;
pub mod watch;

use anyhow::{Context as AnyhowContext, Result};
use declarative::MemoryStore;
use linkconfig::{Cmdline, LinkConfigController, MachineConfig};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::config::Settings;
use crate::state::FileStore;

pub type Controller = LinkConfigController<MemoryStore<MachineConfig>, FileStore>;

/// Settings with command-line overrides applied
pub struct Inputs {
    pub settings: Settings,
    pub machine_config: PathBuf,
    pub state_file: PathBuf,
    pub cmdline: Option<Cmdline>,
}

impl Inputs {
    pub fn load(ctx: &Context) -> Result<Self> {
        let settings = Settings::load(ctx.settings.as_deref())?;

        let machine_config = match &ctx.inputs.config {
            Some(path) => path.clone(),
            None => settings.machine_config_path(),
        };
        let state_file = match &ctx.inputs.state {
            Some(path) => path.clone(),
            None => settings.state_file_path()?,
        };
        let cmdline = match &ctx.inputs.cmdline {
            Some(raw) => Some(Cmdline::parse(raw)),
            None => read_cmdline(&settings.cmdline_path())?,
        };

        Ok(Self {
            settings,
            machine_config,
            state_file,
            cmdline,
        })
    }

    /// Controller over these inputs with the machine config already loaded
    pub fn controller(&self, dry_run: bool, jobs: Option<usize>) -> Result<Controller> {
        let configs = MemoryStore::new();
        if let Some(config) = read_machine_config(&self.machine_config)? {
            configs.put(config)?;
        }

        let mut options = self.settings.execute_options(dry_run);
        if let Some(jobs) = jobs {
            options.jobs = jobs.max(1);
        }

        Ok(LinkConfigController::new(
            self.cmdline.clone(),
            configs,
            FileStore::new(&self.state_file),
        )
        .with_options(options))
    }
}

/// Read the kernel command line; a missing file means no boot parameters.
pub fn read_cmdline(path: &Path) -> Result<Option<Cmdline>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(Cmdline::parse(raw.trim()))),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("No kernel command line at {}", path.display());
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Read the machine config; a missing file means no machine configuration.
pub fn read_machine_config(path: &Path) -> Result<Option<MachineConfig>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("No machine config at {}", path.display());
            return Ok(None);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let config: MachineConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse machine config: {}", path.display()))?;
    log::debug!(
        "Loaded {} device(s) from {}",
        config.devices().len(),
        path.display()
    );
    Ok(Some(config))
}
