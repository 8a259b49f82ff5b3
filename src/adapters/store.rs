use crate::domain::model::{ScanSession, SessionStatus, StoredResult};
use crate::domain::ports::{SessionStore, Storage};
use crate::utils::error::{PatrolError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

const SESSIONS: &str = "sessions";
const SCAN_RESULTS: &str = "scan_results";

/// 以 JSON 文件實作的掃描紀錄儲存。
///
/// 佈局：
/// - `sessions/<session_id>.json`：每次掃描一份 [`ScanSession`]
/// - `scan_results/<uuid>.json`：每個商品結果一份 [`StoredResult`]，以 `sessionId` 關聯
///
/// 兩個集合之間沒有交易保證。
pub struct JsonDocumentStore<S: Storage> {
    storage: S,
}

impl<S: Storage> JsonDocumentStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    fn session_path(session_id: &str) -> Result<String> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PatrolError::PersistenceError {
                message: format!("invalid session id: {:?}", session_id),
            });
        }
        Ok(format!("{}/{}.json", SESSIONS, session_id))
    }

    async fn read_doc<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let bytes = self.storage.read_file(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// 讀取整個集合，無法解析的文件略過
    async fn read_collection<T: DeserializeOwned>(&self, dir: &str) -> Result<Vec<T>> {
        let mut docs = Vec::new();
        for name in self.storage.list_files(dir).await? {
            if !name.ends_with(".json") {
                continue;
            }
            let path = format!("{}/{}", dir, name);
            match self.read_doc::<T>(&path).await {
                Ok(doc) => docs.push(doc),
                Err(e) => tracing::warn!("Skipping unreadable document {}: {}", path, e),
            }
        }
        Ok(docs)
    }
}

#[async_trait]
impl<S: Storage> SessionStore for JsonDocumentStore<S> {
    async fn put_session(&self, session: &ScanSession) -> Result<()> {
        let path = Self::session_path(&session.session_id)?;
        let data = serde_json::to_vec_pretty(session)?;
        self.storage.write_file(&path, &data).await
    }

    async fn complete_session(&self, session_id: &str, ended_at: DateTime<Utc>) -> Result<()> {
        let path = Self::session_path(session_id)?;
        let mut session: ScanSession =
            self.read_doc(&path)
                .await
                .map_err(|e| PatrolError::PersistenceError {
                    message: format!("session {} not found: {}", session_id, e),
                })?;

        session.status = SessionStatus::Completed;
        session.ended_at = Some(ended_at);

        let data = serde_json::to_vec_pretty(&session)?;
        self.storage.write_file(&path, &data).await
    }

    async fn add_result(&self, result: &StoredResult) -> Result<()> {
        let path = format!("{}/{}.json", SCAN_RESULTS, uuid::Uuid::new_v4());
        let data = serde_json::to_vec_pretty(result)?;
        self.storage.write_file(&path, &data).await
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<ScanSession>> {
        let mut sessions: Vec<ScanSession> = self.read_collection(SESSIONS).await?;
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn results_for(&self, session_id: &str) -> Result<Vec<StoredResult>> {
        Self::session_path(session_id)?;
        let mut results: Vec<StoredResult> = self
            .read_collection::<StoredResult>(SCAN_RESULTS)
            .await?
            .into_iter()
            .filter(|r| r.session_id == session_id)
            .collect();
        results.sort_by(|a, b| b.result.observed_at.cmp(&a.result.observed_at));
        Ok(results)
    }
}
