use crate::domain::model::{ScanResult, ScanSession, SessionStatus, StoredResult};
use crate::domain::ports::SessionStore;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

enum RecorderCommand {
    PutSession(ScanSession),
    AddResult(StoredResult),
    CompleteSession {
        session_id: String,
        ended_at: DateTime<Utc>,
    },
}

/// 將掃描生命週期同步到持久化儲存。
///
/// 寫入經由 channel 交給背景 writer，呼叫端不等待 I/O；writer 依提交順序寫入，
/// 失敗只記錄日誌。`flush` 會等待所有已提交的寫入完成。
pub struct SessionRecorder {
    store: Arc<dyn SessionStore>,
    tx: Option<mpsc::UnboundedSender<RecorderCommand>>,
    writer: Option<JoinHandle<()>>,
}

impl SessionRecorder {
    /// 必須在 tokio runtime 內呼叫
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(store.clone(), rx));
        Self {
            store,
            tx: Some(tx),
            writer: Some(writer),
        }
    }

    fn submit(&self, command: RecorderCommand) {
        match &self.tx {
            Some(tx) => {
                if tx.send(command).is_err() {
                    tracing::warn!("Session writer stopped, dropping write");
                }
            }
            None => tracing::warn!("Session recorder already flushed, dropping write"),
        }
    }

    /// 發出新的 session id 並記錄 Running 狀態
    pub fn begin_session(&self, source_url: &str, shop_identifier: &str, item_count: usize) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.submit(RecorderCommand::PutSession(ScanSession {
            session_id: session_id.clone(),
            shop_identifier: shop_identifier.to_string(),
            source_url: source_url.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            status: SessionStatus::Running,
            item_count,
        }));
        session_id
    }

    pub fn record_result(&self, session_id: &str, result: &ScanResult) {
        self.submit(RecorderCommand::AddResult(StoredResult {
            session_id: session_id.to_string(),
            result: result.clone(),
        }));
    }

    pub fn end_session(&self, session_id: &str) {
        self.submit(RecorderCommand::CompleteSession {
            session_id: session_id.to_string(),
            ended_at: Utc::now(),
        });
    }

    /// 最近的 session，讀取失敗時回傳空列表
    pub async fn list_sessions(&self, limit: usize) -> Vec<ScanSession> {
        match self.store.list_sessions(limit).await {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!("Failed to load session history: {}", e);
                Vec::new()
            }
        }
    }

    /// 某個 session 的所有結果（最新在前），讀取失敗時回傳空列表
    pub async fn load_session_results(&self, session_id: &str) -> Vec<ScanResult> {
        match self.store.results_for(session_id).await {
            Ok(results) => results.into_iter().map(|r| r.result).collect(),
            Err(e) => {
                tracing::warn!("Failed to load results for session {}: {}", session_id, e);
                Vec::new()
            }
        }
    }

    /// 關閉寫入 channel 並等待 writer 寫完
    pub async fn flush(&mut self) {
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                tracing::warn!("Session writer task failed: {}", e);
            }
        }
    }
}

async fn run_writer(store: Arc<dyn SessionStore>, mut rx: mpsc::UnboundedReceiver<RecorderCommand>) {
    while let Some(command) = rx.recv().await {
        if let Err(e) = apply(store.as_ref(), &command).await {
            tracing::warn!("⚠️ Persistence write failed: {}", e);
        }
    }
    tracing::debug!("Session writer drained");
}

async fn apply(store: &dyn SessionStore, command: &RecorderCommand) -> Result<()> {
    match command {
        RecorderCommand::PutSession(session) => store.put_session(session).await,
        RecorderCommand::AddResult(result) => store.add_result(result).await,
        RecorderCommand::CompleteSession {
            session_id,
            ended_at,
        } => store.complete_session(session_id, *ended_at).await,
    }
}
