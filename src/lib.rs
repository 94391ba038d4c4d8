pub mod cli;
pub mod core;
pub mod environments;
pub mod error;
pub mod infrastructure;
pub mod utils;

pub use crate::core::constants as app_constants;
pub use crate::core::switcher::{EnvironmentSwitcher, SwitchReport};
pub use crate::core::upgrade::{BatchReport, UpgradeOptions, UpgradeOrchestrator, UpgradeOutcome};
pub use environments::java::{ArchiveInstaller, InstalledVersionStore, SemanticVersion};
pub use error::{AppError, AppResult, ContextualError};
pub use infrastructure::config::Config;
