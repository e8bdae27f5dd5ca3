use std::path::{Path, PathBuf};

use agikit_core::InstallScope;
use anyhow::{Context, Result};

pub const MANIFEST_MARKER: &str = "SKILL.md";
pub const INSTRUCTIONS_FILE: &str = "AGENTS.md";
pub const INSTRUCTION_ALIASES: [&str; 4] = ["GEMINI.md", "CLAUDE.md", "OPENCODE.md", "COPILOT.md"];
pub const VERSION_STAMP_FILE: &str = ".agi-version";
pub const ENV_FILE: &str = ".env";
pub const ENV_TEMPLATE_FILE: &str = ".env.example";
pub const CONFIG_FILE: &str = "agikit.toml";
pub const UNINSTALL_SCRIPT: &str = "uninstall.sh";
pub const GLOBAL_ROOT_DIR: &str = ".agi-agent-kit";

/// Subtrees the installation owns at the target root.
pub const MANAGED_DIRS: [&str; 5] = [
    "skills",
    "directives",
    "execution",
    "skill-creator",
    ".agent",
];
pub const BASE_FILES: [&str; 3] = [INSTRUCTIONS_FILE, ".gitignore", "requirements.txt"];
pub const BASE_TREES: [&str; 3] = ["execution", "directives", "skill-creator"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformLink {
    pub id: &'static str,
    pub display_name: &'static str,
    /// Path of the skills link relative to the target root or home directory.
    pub rel_path: &'static str,
    /// Environment variable that relocates the platform home in global scope.
    pub home_override_var: Option<&'static str>,
}

pub const PLATFORM_LINKS: [PlatformLink; 5] = [
    PlatformLink {
        id: "claude",
        display_name: "Claude Code",
        rel_path: ".claude/skills",
        home_override_var: None,
    },
    PlatformLink {
        id: "gemini",
        display_name: "Gemini CLI",
        rel_path: ".gemini/skills",
        home_override_var: None,
    },
    PlatformLink {
        id: "codex",
        display_name: "Codex CLI",
        rel_path: ".codex/skills",
        home_override_var: Some("CODEX_HOME"),
    },
    PlatformLink {
        id: "cursor",
        display_name: "Cursor",
        rel_path: ".cursor/skills",
        home_override_var: None,
    },
    PlatformLink {
        id: "adal",
        display_name: "AdaL CLI",
        rel_path: ".adal/skills",
        home_override_var: None,
    },
];

/// The user's home plus the environment overrides that relocate platform
/// homes. Captured once per run so engine code never reads the process env.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeDirs {
    pub home: PathBuf,
    pub codex_home: Option<PathBuf>,
}

impl HomeDirs {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            codex_home: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        let home = home_dir()?;
        let codex_home = std::env::var_os("CODEX_HOME")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Ok(Self { home, codex_home })
    }

    fn override_for(&self, var: &str) -> Option<&Path> {
        match var {
            "CODEX_HOME" => self.codex_home.as_deref(),
            _ => None,
        }
    }

    pub fn global_install_root(&self) -> PathBuf {
        self.home.join(GLOBAL_ROOT_DIR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.root.join("skills")
    }

    pub fn skill_dir(&self, name: &str) -> PathBuf {
        self.skills_dir().join(name)
    }

    pub fn agent_dir(&self) -> PathBuf {
        self.root.join(".agent")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(".tmp")
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.root.join(".venv")
    }

    pub fn instructions_path(&self) -> PathBuf {
        self.root.join(INSTRUCTIONS_FILE)
    }

    pub fn version_stamp_path(&self) -> PathBuf {
        self.root.join(VERSION_STAMP_FILE)
    }

    pub fn env_path(&self) -> PathBuf {
        self.root.join(ENV_FILE)
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.root.join("requirements.txt")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn uninstall_script_path(&self) -> PathBuf {
        self.root.join(UNINSTALL_SCRIPT)
    }

    pub fn alias_path(&self, alias: &str) -> PathBuf {
        self.root.join(alias)
    }

    pub fn managed_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Where a platform expects its skills directory for the given scope.
    pub fn platform_link_path(
        &self,
        platform: &PlatformLink,
        scope: InstallScope,
        homes: &HomeDirs,
    ) -> PathBuf {
        match scope {
            InstallScope::Project => self.root.join(platform.rel_path),
            InstallScope::Global => {
                let relocated = platform
                    .home_override_var
                    .and_then(|var| homes.override_for(var));
                if let Some(base) = relocated {
                    return base.join("skills");
                }
                homes.home.join(platform.rel_path)
            }
        }
    }

    pub fn ensure_structure(&self) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        for dir in [
            self.root.join("directives"),
            self.root.join("execution"),
            self.skills_dir(),
            self.root.join("skill-creator"),
            self.tmp_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            created.push(dir);
        }
        Ok(created)
    }
}

/// Read-only template tree shipped with the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatesLayout {
    root: PathBuf,
}

impl TemplatesLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.root.join("skills")
    }

    pub fn group_dir(&self, rel_path: &str) -> PathBuf {
        rel_path
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.skills_dir(), |path, part| path.join(part))
    }

    pub fn base_dir(&self) -> PathBuf {
        self.root.join("base")
    }

    pub fn env_template_path(&self) -> PathBuf {
        self.base_dir().join(ENV_TEMPLATE_FILE)
    }

    /// `.agent` lives at the templates root; older trees keep it under `base/`.
    pub fn agent_dir(&self) -> Option<PathBuf> {
        [self.root.join(".agent"), self.base_dir().join(".agent")]
            .into_iter()
            .find(|dir| dir.is_dir())
    }
}

pub fn home_dir() -> Result<PathBuf> {
    if cfg!(windows) {
        let profile = std::env::var("USERPROFILE")
            .context("USERPROFILE is not set; cannot resolve home directory")?;
        return Ok(PathBuf::from(profile));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve home directory")?;
    Ok(PathBuf::from(home))
}
