use std::cmp::Ordering;
use std::fmt;

use semver::Version;

/// The `MAJOR.MINOR.PATCH` triple the installer orders by. Pre-release and
/// build metadata are accepted but do not take part in comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KitVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl fmt::Display for KitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

pub fn parse_kit_version(input: &str) -> Option<KitVersion> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    let version = Version::parse(trimmed).ok()?;
    Some(KitVersion {
        major: version.major,
        minor: version.minor,
        patch: version.patch,
    })
}

/// How the incoming (tool) version relates to the installed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRelation {
    /// One side is missing or not a well-formed version.
    Unknown,
    Equal,
    /// Incoming is newer: an upgrade.
    Newer,
    /// Incoming is older: a downgrade.
    Older,
}

impl VersionRelation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Equal => "same-version",
            Self::Newer => "upgrade",
            Self::Older => "downgrade",
        }
    }
}

pub fn compare_versions(installed: Option<&str>, incoming: Option<&str>) -> VersionRelation {
    let (Some(installed), Some(incoming)) = (
        installed.and_then(parse_kit_version),
        incoming.and_then(parse_kit_version),
    ) else {
        return VersionRelation::Unknown;
    };

    match incoming.cmp(&installed) {
        Ordering::Equal => VersionRelation::Equal,
        Ordering::Greater => VersionRelation::Newer,
        Ordering::Less => VersionRelation::Older,
    }
}
