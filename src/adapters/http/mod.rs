pub mod classifier;
pub mod search;

pub use classifier::GeminiClassifier;
pub use search::MarketplaceSearchClient;
