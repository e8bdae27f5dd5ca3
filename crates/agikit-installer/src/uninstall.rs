use std::fs;
use std::path::{Path, PathBuf};

use agikit_core::InstallScope;
use anyhow::{Context, Result};

use crate::layout::{
    HomeDirs, InstallLayout, INSTRUCTIONS_FILE, INSTRUCTION_ALIASES, MANAGED_DIRS,
    UNINSTALL_SCRIPT, VERSION_STAMP_FILE,
};
use crate::symlinks::platform_links_for;

/// Shell script that undoes a global install: platform links, aliases and
/// managed paths go; `.env` and backups stay.
pub fn render_uninstall_script(layout: &InstallLayout, homes: &HomeDirs) -> String {
    let root = escape_single_quote_shell(&layout.root().display().to_string());
    let mut script = String::new();
    script.push_str("#!/bin/sh\n");
    script.push_str("# Removes the global agi-agent-kit installation.\n");
    script.push_str("# Keeps .env and any backup directories.\n");
    script.push_str("set -u\n\n");
    script.push_str(&format!("ROOT='{root}'\n\n"));

    script.push_str("# platform skill links\n");
    for planned in platform_links_for(layout, InstallScope::Global, homes) {
        let link = escape_single_quote_shell(&planned.link.display().to_string());
        script.push_str(&format!("[ -L '{link}' ] && rm -f '{link}'\n"));
    }

    script.push_str("\n# instruction aliases and managed files\n");
    for alias in INSTRUCTION_ALIASES {
        script.push_str(&format!("[ -L \"$ROOT/{alias}\" ] && rm -f \"$ROOT/{alias}\"\n"));
    }
    for file in [INSTRUCTIONS_FILE, VERSION_STAMP_FILE, "requirements.txt", ".gitignore"] {
        script.push_str(&format!("rm -f \"$ROOT/{file}\"\n"));
    }
    for dir in MANAGED_DIRS.iter().chain([".tmp", ".venv"].iter()) {
        script.push_str(&format!("rm -rf \"$ROOT/{dir}\"\n"));
    }

    script.push_str(&format!("rm -f \"$ROOT/{UNINSTALL_SCRIPT}\"\n"));
    script.push_str(
        "\nrmdir \"$ROOT\" 2>/dev/null || echo \"kept $ROOT (contains .env or other files)\"\n",
    );
    script.push_str("echo \"agi-agent-kit removed\"\n");
    script
}

pub fn write_uninstall_script(layout: &InstallLayout, homes: &HomeDirs) -> Result<PathBuf> {
    let path = layout.uninstall_script_path();
    fs::write(&path, render_uninstall_script(layout, homes))
        .with_context(|| format!("failed to write uninstall script: {}", path.display()))?;
    make_executable(&path)?;
    Ok(path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn escape_single_quote_shell(value: &str) -> String {
    value.replace('\'', "'\"'\"'")
}
