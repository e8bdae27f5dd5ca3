use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use agikit_core::{InstallScope, KitConfig, MemorySettings, PackId};
use agikit_installer::{HomeDirs, InstallLayout, TemplatesLayout};
use anyhow::{anyhow, Context, Result};

use crate::Cli;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunCommand {
    Init,
    Update,
}

/// Everything a run needs after flags, environment and config file have
/// been merged. Flows never look at `Cli` directly.
#[derive(Debug, Clone)]
pub(crate) struct RunOptions {
    pub(crate) command: RunCommand,
    pub(crate) scope: InstallScope,
    pub(crate) layout: InstallLayout,
    pub(crate) homes: HomeDirs,
    pub(crate) templates: TemplatesLayout,
    pub(crate) pack: Option<PackId>,
    pub(crate) domains: Option<String>,
    pub(crate) symlinks: bool,
    pub(crate) non_interactive: bool,
    pub(crate) memory: MemorySettings,
    pub(crate) skip_setup: bool,
}

/// Ambient inputs captured once so resolution stays testable.
#[derive(Debug, Clone)]
pub(crate) struct RunEnvironment {
    pub(crate) current_dir: PathBuf,
    pub(crate) homes: HomeDirs,
    pub(crate) exe_dir: Option<PathBuf>,
    pub(crate) stdin_is_tty: bool,
}

impl RunEnvironment {
    pub(crate) fn capture() -> Result<Self> {
        let current_dir = std::env::current_dir().context("failed to read current directory")?;
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Ok(Self {
            current_dir,
            homes: HomeDirs::from_env()?,
            exe_dir,
            stdin_is_tty: std::io::stdin().is_terminal(),
        })
    }
}

pub(crate) fn resolve_run_options(
    cli: &Cli,
    command: RunCommand,
    env: &RunEnvironment,
) -> Result<RunOptions> {
    let scope = InstallScope::from_global_flag(cli.global);
    let root = match scope {
        InstallScope::Global => env.homes.global_install_root(),
        InstallScope::Project => match &cli.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => env.current_dir.join(path),
            None => env.current_dir.clone(),
        },
    };
    let layout = InstallLayout::new(root);

    let config = match &cli.config {
        Some(path) => KitConfig::load(path)?,
        None => KitConfig::load_optional(&layout.config_path())?,
    };

    let pack = cli
        .pack
        .as_deref()
        .or(config.install.pack.as_deref())
        .map(parse_pack_flag)
        .transpose()?;

    let non_interactive = cli.non_interactive
        || config.install.non_interactive.unwrap_or(false)
        || !env.stdin_is_tty;
    let symlinks = !cli.no_symlinks && config.install.symlinks.unwrap_or(true);

    let mut memory = config.memory_settings();
    if cli.no_memory {
        memory.enabled = false;
    }
    if let Some(url) = &cli.qdrant_url {
        memory.qdrant_url = url.clone();
    }
    if let Some(url) = &cli.ollama_url {
        memory.ollama_url = url.clone();
    }
    if let Some(key) = &cli.qdrant_api_key {
        memory.api_key = Some(key.clone());
    }

    let templates = match &cli.templates {
        Some(path) => TemplatesLayout::new(path.clone()),
        None => default_templates(env.exe_dir.as_deref()),
    };

    Ok(RunOptions {
        command,
        scope,
        layout,
        homes: env.homes.clone(),
        templates,
        pack,
        domains: cli.domains.clone().or(config.install.domains),
        symlinks,
        non_interactive,
        memory,
        skip_setup: cli.skip_setup,
    })
}

pub(crate) fn parse_pack_flag(raw: &str) -> Result<PackId> {
    PackId::parse(raw).ok_or_else(|| {
        anyhow!("unknown pack: {raw} (expected one of: core, medium, full, custom)")
    })
}

/// `templates/` beside the binary, then the shared data dir of an installed
/// prefix. The first candidate is returned when neither exists so the error
/// names a concrete path.
fn default_templates(exe_dir: Option<&Path>) -> TemplatesLayout {
    let Some(exe_dir) = exe_dir else {
        return TemplatesLayout::new("templates");
    };
    let candidates = [
        exe_dir.join("templates"),
        exe_dir.join("..").join("share").join("agikit").join("templates"),
    ];
    let found = candidates.iter().find(|path| path.is_dir()).cloned();
    TemplatesLayout::new(found.unwrap_or_else(|| candidates[0].clone()))
}
