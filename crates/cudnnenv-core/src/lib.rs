mod archive;
mod catalog;
mod platform;

pub use archive::ArchiveType;
pub use catalog::{ArchiveLayout, Catalog, InstallRecipe};
pub use platform::Platform;
