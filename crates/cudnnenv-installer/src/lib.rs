mod error;
mod extract;
mod fetch;
mod fs_utils;
mod interrupt;
mod layout;
mod scoped;
mod store;

pub use error::StoreError;
pub use extract::{ArchiveExtractor, ExtractRequest, TarExtractor};
pub use fetch::{ArchiveFetcher, FetchProgress, HttpFetcher, NoProgress};
pub use interrupt::{interrupted, InterruptGuard};
pub use layout::{default_user_root, StoreLayout};
pub use scoped::{remove_dir_best_effort, ScopedTempDir, VersionDirGuard};
pub use store::{
    validate_version_id, Confirm, InstallOutcome, MaterializeSource, UninstallOutcome,
    VersionStore,
};
