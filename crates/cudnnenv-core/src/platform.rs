/// Host OS family. Chosen once at startup; selects the catalog and the
/// library directory name inside `cuda/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Macos,
}

impl Platform {
    pub fn host() -> Option<Self> {
        match std::env::consts::OS {
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::Macos),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
        }
    }

    pub fn lib_dir(self) -> &'static str {
        match self {
            Self::Linux => "lib64",
            Self::Macos => "lib",
        }
    }

    pub(crate) fn embedded_catalog(self) -> &'static str {
        match self {
            Self::Linux => include_str!("../catalog/linux.toml"),
            Self::Macos => include_str!("../catalog/macos.toml"),
        }
    }
}
