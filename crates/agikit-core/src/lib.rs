mod config;
mod domain;
mod pack;
mod scope;
mod settings;
mod version;

pub use config::{InstallConfig, KitConfig, MemoryConfig};
pub use domain::{parse_domain_selection, Domain, DomainSelection, DOMAINS};
pub use pack::{Pack, PackId, SkillGroup};
pub use scope::InstallScope;
pub use settings::{MemorySettings, DEFAULT_OLLAMA_URL, DEFAULT_QDRANT_URL};
pub use version::{compare_versions, parse_kit_version, KitVersion, VersionRelation};
