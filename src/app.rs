use crate::adapters::http::{GeminiClassifier, MarketplaceSearchClient};
use crate::adapters::{JsonDocumentStore, LocalStorage};
use crate::config::PatrolConfig;
use crate::core::classifier_client::ItemClassifierClient;
use crate::core::orchestrator::{ScanObserver, ScanOrchestrator, ScanSettings};
use crate::core::recorder::SessionRecorder;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use std::sync::Arc;

/// 依配置建立檔案型 session 紀錄器
pub fn build_recorder(config: &PatrolConfig) -> SessionRecorder {
    let storage = LocalStorage::new(config.store_path());
    SessionRecorder::new(Arc::new(JsonDocumentStore::new(storage)))
}

/// 依配置組裝搜尋、分類、紀錄器與控制迴圈
pub fn build_orchestrator(
    config: &PatrolConfig,
    observer: Arc<dyn ScanObserver>,
) -> Result<ScanOrchestrator> {
    let search = MarketplaceSearchClient::new(config.search_endpoint(), config.hits_per_page());
    let classifier = GeminiClassifier::new(
        config.classifier_endpoint(),
        config.model(),
        config.classifier_timeout(),
    )?;

    Ok(ScanOrchestrator::new(
        Arc::new(search),
        ItemClassifierClient::new(Arc::new(classifier)),
        build_recorder(config),
        ScanSettings::from_config(config),
    )
    .with_observer(observer))
}
