use anyhow::{anyhow, Result};

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_PROVIDER: &str = "ollama";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 86_400;
pub const DEFAULT_CACHE_SIMILARITY: &str = "0.92";

/// Memory-system values written into the environment block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySettings {
    pub enabled: bool,
    pub qdrant_url: String,
    pub ollama_url: String,
    pub api_key: Option<String>,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub cache_ttl_seconds: u64,
    pub cache_similarity: String,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            api_key: None,
            embedding_provider: DEFAULT_EMBEDDING_PROVIDER.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            cache_similarity: DEFAULT_CACHE_SIMILARITY.to_string(),
        }
    }
}

impl MemorySettings {
    /// Ordered `KEY=value` pairs of the block. The first entry is the
    /// recognized key.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            ("MEMORY_ENABLED", self.enabled.to_string()),
            ("QDRANT_URL", self.qdrant_url.clone()),
            ("OLLAMA_URL", self.ollama_url.clone()),
        ];
        if let Some(api_key) = self.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
            entries.push(("QDRANT_API_KEY", api_key.to_string()));
        }
        entries.push(("EMBEDDING_PROVIDER", self.embedding_provider.clone()));
        entries.push(("EMBEDDING_MODEL", self.embedding_model.clone()));
        entries.push(("MEMORY_CACHE_TTL_SECONDS", self.cache_ttl_seconds.to_string()));
        entries.push(("MEMORY_CACHE_SIMILARITY", self.cache_similarity.clone()));
        entries
    }

    pub fn validate(&self) -> Result<()> {
        for (key, value) in self.entries() {
            if value.contains('\n') || value.contains('\r') {
                return Err(anyhow!("memory setting {key} must not contain newlines"));
            }
        }
        for (key, url) in [("QDRANT_URL", &self.qdrant_url), ("OLLAMA_URL", &self.ollama_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow!("{key} must be an http(s) URL: {url}"));
            }
        }
        Ok(())
    }
}
