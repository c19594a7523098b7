pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::MarkingConfig;

pub use adapters::{LocalCsvStore, MarkStoreBackend, RemoteSheetStore};
pub use app::Console;
pub use crate::core::{loader::ReferenceLoader, session::GradingSession};
pub use domain::ports::MarkStore;
pub use utils::error::{MarkingError, Result};
