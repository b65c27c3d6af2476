#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveType {
    TarGz,
    TarXz,
}

impl ArchiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::TarXz => "tar.xz",
        }
    }

    /// File name used for the downloaded archive inside the working directory.
    pub fn download_file_name(self) -> &'static str {
        match self {
            Self::TarGz => "archive.tgz",
            Self::TarXz => "archive.txz",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "tar.gz" | "tgz" => Some(Self::TarGz),
            "tar.xz" | "txz" => Some(Self::TarXz),
            _ => None,
        }
    }

    pub fn infer_from_path(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        let without_fragment = lower.split('#').next().unwrap_or(&lower);
        let without_query = without_fragment
            .split('?')
            .next()
            .unwrap_or(without_fragment);

        if without_query.ends_with(".tar.gz") || without_query.ends_with(".tgz") {
            return Some(Self::TarGz);
        }
        if without_query.ends_with(".tar.xz") || without_query.ends_with(".txz") {
            return Some(Self::TarXz);
        }

        None
    }
}
