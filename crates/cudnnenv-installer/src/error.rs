use thiserror::Error;

/// Failure classes surfaced by the version store. Each maps to a stable
/// process exit code so scripts can branch on it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version {0} is not available in the catalog")]
    UnknownVersion(String),
    #[error("version {0} already exists")]
    AlreadyExists(String),
    #[error("version {0} is not installed")]
    NotInstalled(String),
    #[error("checksum mismatch for {url}: expected sha256 {expected}, got {actual}")]
    VerificationFailed {
        url: String,
        expected: String,
        actual: String,
    },
    #[error("invalid version id '{0}': must be a single non-empty path component")]
    InvalidVersionId(String),
    #[error("interrupted")]
    Interrupted,
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl StoreError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::AlreadyExists(_) => 3,
            Self::NotInstalled(_) => 4,
            Self::UnknownVersion(_) => 5,
            Self::VerificationFailed { .. } => 6,
            Self::InvalidVersionId(_) => 7,
            Self::Interrupted => 130,
        }
    }
}
