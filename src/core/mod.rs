pub mod aggregator;
pub mod classifier_client;
pub mod history;
pub mod orchestrator;
pub mod recorder;

pub use crate::domain::model::{
    ClassificationOutcome, ProductDescriptor, RiskLevel, ScanResult, ScanSession, ScanStats,
};
pub use crate::domain::ports::{CatalogSearch, Classifier, ConfigProvider, Credentials, SessionStore, Storage};
pub use crate::utils::error::Result;
