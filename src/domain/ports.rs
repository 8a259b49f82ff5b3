use crate::domain::model::{
    CatalogPage, ClassificationOutcome, ProductDescriptor, ScanSession, StoredResult,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// 列出目錄下的檔名（不含路徑），目錄不存在時回傳空列表
    fn list_files(&self, dir: &str)
        -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn search_endpoint(&self) -> &str;
    fn classifier_endpoint(&self) -> &str;
    fn store_path(&self) -> &str;
    fn concurrency_limit(&self) -> usize;
    fn batch_limit(&self) -> usize;
    fn history_page_size(&self) -> usize;
}

/// 掃描所需的憑證，明確傳遞而非全域狀態
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub marketplace_app_id: String,
    pub ai_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("marketplace_app_id", &mask(&self.marketplace_app_id))
            .field("ai_api_key", &mask(&self.ai_api_key))
            .finish()
    }
}

fn mask(value: &str) -> &'static str {
    if value.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

/// 目錄搜尋協作者
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(
        &self,
        source_url: &str,
        credentials: &Credentials,
        page: u32,
    ) -> Result<CatalogPage>;
}

/// 分類協作者，可能失敗；總函數保證由 ItemClassifierClient 提供
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        item: &ProductDescriptor,
        credentials: &Credentials,
    ) -> Result<ClassificationOutcome>;
}

/// 文件型持久化：sessions 與 scan_results 兩個集合
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put_session(&self, session: &ScanSession) -> Result<()>;
    async fn complete_session(&self, session_id: &str, ended_at: DateTime<Utc>) -> Result<()>;
    async fn add_result(&self, result: &StoredResult) -> Result<()>;
    async fn list_sessions(&self, limit: usize) -> Result<Vec<ScanSession>>;
    async fn results_for(&self, session_id: &str) -> Result<Vec<StoredResult>>;
}
