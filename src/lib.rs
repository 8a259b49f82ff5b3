pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::PatrolConfig;

pub use adapters::{JsonDocumentStore, LocalStorage};
pub use core::orchestrator::{ScanOrchestrator, ScanReport, ScanSettings};
pub use utils::error::{PatrolError, Result};
