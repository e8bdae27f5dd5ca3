#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallScope {
    #[default]
    Project,
    Global,
}

impl InstallScope {
    pub fn from_global_flag(global: bool) -> Self {
        if global {
            Self::Global
        } else {
            Self::Project
        }
    }

    pub fn is_global(self) -> bool {
        self == Self::Global
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Global => "global",
        }
    }
}
