use crate::domain::model::{ClassificationOutcome, ProductDescriptor};
use crate::domain::ports::{Classifier, Credentials};
use std::sync::Arc;

/// 包裝分類協作者，保證每個商品都得到一個結果。
///
/// 傳輸錯誤、非成功回應、格式錯誤都轉為 `RiskLevel::Error`，不會往上拋。
#[derive(Clone)]
pub struct ItemClassifierClient {
    inner: Arc<dyn Classifier>,
}

impl ItemClassifierClient {
    pub fn new(inner: Arc<dyn Classifier>) -> Self {
        Self { inner }
    }

    pub async fn classify(
        &self,
        item: &ProductDescriptor,
        credentials: &Credentials,
    ) -> ClassificationOutcome {
        match self.inner.classify(item, credentials).await {
            Ok(outcome) => {
                tracing::debug!("Classified {:?} as {}", item.name, outcome.risk_level);
                outcome
            }
            Err(e) => {
                tracing::warn!("⚠️ Classification failed for {:?}: {}", item.name, e);
                ClassificationOutcome::error(e.to_string())
            }
        }
    }
}
