pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::{FileConfig, MigrationSettings, SettingsOverrides};
pub use core::migrator::{MigrationContext, Migrator};
pub use domain::model::MigrationReport;
pub use utils::error::{MigrationError, Result};
