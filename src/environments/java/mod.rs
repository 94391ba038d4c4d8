pub mod installer;
pub mod store;
pub mod version;

pub use installer::{ArchiveFormat, ArchiveInstaller};
pub use store::{match_installed, InstalledVersionStore};
pub use version::{compare_versions, SemanticVersion};
