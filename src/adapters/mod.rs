// Adapters layer: concrete implementations for external systems (storage, document store, http).

pub mod http;
pub mod storage;
pub mod store;

pub use storage::LocalStorage;
pub use store::JsonDocumentStore;
