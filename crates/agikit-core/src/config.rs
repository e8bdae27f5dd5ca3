use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::settings::MemorySettings;

/// Optional `agikit.toml`. Every field is optional; CLI flags win over it.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct KitConfig {
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InstallConfig {
    pub pack: Option<String>,
    pub symlinks: Option<bool>,
    pub non_interactive: Option<bool>,
    pub domains: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    pub enabled: Option<bool>,
    pub qdrant_url: Option<String>,
    pub ollama_url: Option<String>,
    pub api_key: Option<String>,
    pub embedding_provider: Option<String>,
    pub embedding_model: Option<String>,
}

impl KitConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse agikit config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config: {}", path.display()))
    }

    /// Loads `path` when it exists, otherwise the defaults.
    pub fn load_optional(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn memory_settings(&self) -> MemorySettings {
        let mut settings = MemorySettings::default();
        let memory = &self.memory;
        if let Some(enabled) = memory.enabled {
            settings.enabled = enabled;
        }
        if let Some(url) = &memory.qdrant_url {
            settings.qdrant_url = url.clone();
        }
        if let Some(url) = &memory.ollama_url {
            settings.ollama_url = url.clone();
        }
        if let Some(key) = &memory.api_key {
            settings.api_key = Some(key.clone());
        }
        if let Some(provider) = &memory.embedding_provider {
            settings.embedding_provider = provider.clone();
        }
        if let Some(model) = &memory.embedding_model {
            settings.embedding_model = model.clone();
        }
        settings
    }
}
