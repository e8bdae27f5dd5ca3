use std::fmt;

use crate::domain::{Domain, DomainSelection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackId {
    Core,
    Medium,
    Full,
    Custom,
}

impl PackId {
    pub const ALL: [PackId; 4] = [Self::Core, Self::Medium, Self::Full, Self::Custom];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Medium => "medium",
            Self::Full => "full",
            Self::Custom => "custom",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Core => "Core",
            Self::Medium => "Medium",
            Self::Full => "Full Suite",
            Self::Custom => "Custom",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Core => "Essential skills (webcrawler, pdf-reader, qdrant-memory, documentation)",
            Self::Medium => "Core + specialized knowledge skills + .agent structure",
            Self::Full => "Medium + community extended skills (complete suite)",
            Self::Custom => "Core + the knowledge domains you pick",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "core" => Some(Self::Core),
            "medium" | "knowledge" => Some(Self::Medium),
            "full" => Some(Self::Full),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source subtree under `templates/skills/` that the installer walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillGroup {
    /// Path relative to `templates/skills`, e.g. `core` or `knowledge/security`.
    pub rel_path: String,
    /// Only refresh skills that already exist at the destination.
    pub refresh_only: bool,
}

impl SkillGroup {
    pub fn new(rel_path: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            refresh_only: false,
        }
    }

    pub fn refresh_only(rel_path: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            refresh_only: true,
        }
    }
}

/// A pack resolved to concrete skill groups. `custom` packs are only
/// constructed through [`Pack::resolve`] with a domain selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pack {
    pub id: PackId,
    pub groups: Vec<SkillGroup>,
    pub includes_agent_structure: bool,
    pub domains: Vec<&'static Domain>,
}

impl Pack {
    pub fn fixed(id: PackId) -> Option<Self> {
        let (groups, includes_agent_structure): (&[&str], bool) = match id {
            PackId::Core => (&["core"], false),
            PackId::Medium => (&["core", "knowledge"], true),
            PackId::Full => (&["core", "knowledge", "extended"], true),
            PackId::Custom => return None,
        };

        Some(Self {
            id,
            groups: groups.iter().map(|group| SkillGroup::new(*group)).collect(),
            includes_agent_structure,
            domains: Vec::new(),
        })
    }

    /// Resolves any pack id. An empty custom selection falls back to `core`.
    pub fn resolve(id: PackId, selection: &DomainSelection) -> Self {
        if id != PackId::Custom {
            return Self::fixed(id).unwrap_or_else(Self::core);
        }
        if selection.is_empty() {
            return Self::core();
        }

        let mut groups = vec![SkillGroup::new("core")];
        for domain in selection.domains() {
            groups.push(SkillGroup::new(format!("knowledge/{}", domain.id)));
            groups.push(SkillGroup::new(format!("extended/{}", domain.id)));
        }

        Self {
            id: PackId::Custom,
            groups,
            includes_agent_structure: true,
            domains: selection.domains().to_vec(),
        }
    }

    /// Groups refreshed by the `update` command: everything core and knowledge,
    /// extended skills only where the user already has them.
    pub fn update_refresh() -> Self {
        Self {
            id: PackId::Full,
            groups: vec![
                SkillGroup::new("core"),
                SkillGroup::new("knowledge"),
                SkillGroup::refresh_only("extended"),
            ],
            includes_agent_structure: true,
            domains: Vec::new(),
        }
    }

    pub fn core() -> Self {
        Self {
            id: PackId::Core,
            groups: vec![SkillGroup::new("core")],
            includes_agent_structure: false,
            domains: Vec::new(),
        }
    }
}
