use crate::core::aggregator::ResultAggregator;
use crate::core::classifier_client::ItemClassifierClient;
use crate::core::recorder::SessionRecorder;
use crate::domain::model::{
    ClassificationOutcome, ProductDescriptor, ScanResult, ScanStats,
};
use crate::domain::ports::{CatalogSearch, ConfigProvider, Credentials};
use crate::utils::error::{PatrolError, Result};
use crate::utils::validation::validate_non_empty_string;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    pub concurrency_limit: usize,
    pub batch_limit: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            concurrency_limit: 3,
            batch_limit: 50,
        }
    }
}

impl ScanSettings {
    pub fn from_config(config: &impl ConfigProvider) -> Self {
        Self {
            concurrency_limit: config.concurrency_limit().max(1),
            batch_limit: config.batch_limit(),
        }
    }
}

/// 掃描結束時的摘要
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub session_id: String,
    pub shop_identifier: String,
    pub source_url: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// 依完成順序，最新在前
    pub results: Vec<ScanResult>,
    pub stats: ScanStats,
}

/// 進度通知，預設全部不做事
pub trait ScanObserver: Send + Sync {
    fn on_started(&self, _session_id: &str, _shop_identifier: &str, _queued: usize) {}
    fn on_dispatched(&self, _item: &ProductDescriptor, _in_flight: usize) {}
    fn on_result(&self, _result: &ScanResult, _stats: &ScanStats) {}
    fn on_completed(&self, _report: &ScanReport) {}
}

pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

/// 以 tracing 輸出即時進度
pub struct LoggingObserver;

impl ScanObserver for LoggingObserver {
    fn on_started(&self, session_id: &str, shop_identifier: &str, queued: usize) {
        tracing::info!(
            "🚀 Scan started for shop {} ({} items queued, session {})",
            shop_identifier,
            queued,
            session_id
        );
    }

    fn on_dispatched(&self, item: &ProductDescriptor, in_flight: usize) {
        tracing::debug!("Dispatching {:?} ({} in flight)", item.name, in_flight);
    }

    fn on_result(&self, result: &ScanResult, stats: &ScanStats) {
        tracing::info!(
            "[{}] {} - {} ({} done: high {}, medium {}, low {})",
            result.outcome.risk_level,
            result.product.name,
            result.outcome.reason,
            stats.total,
            stats.high,
            stats.medium,
            stats.low
        );
    }

    fn on_completed(&self, report: &ScanReport) {
        tracing::info!(
            "✅ Scan of {} completed: {} items in {:?}",
            report.shop_identifier,
            report.stats.total,
            (report.ended_at - report.started_at).to_std().unwrap_or_default()
        );
    }
}

/// 分類 task 回傳給控制迴圈的完成事件
#[derive(Debug)]
struct ScanEvent {
    generation: u64,
    item: ProductDescriptor,
    outcome: ClassificationOutcome,
}

struct ActiveScan {
    session_id: String,
    shop_identifier: String,
    source_url: String,
    started_at: DateTime<Utc>,
    credentials: Credentials,
}

#[derive(Default)]
struct ScanState {
    queue: VecDeque<ProductDescriptor>,
    in_flight: usize,
    scanning: bool,
    aggregator: ResultAggregator,
    active: Option<ActiveScan>,
}

/// 掃描流程控制。
///
/// 單一控制迴圈擁有 `{queue, in_flight, scanning}`，每次狀態變動後重新評估：
///
/// 1. 未在掃描中則不做事。
/// 2. 佇列為空且沒有進行中的分類 → 進入完成狀態，通知 [`SessionRecorder`]。
/// 3. 否則在 `in_flight < concurrency_limit` 時依 FIFO 取出商品並派送。
///
/// 分類在 tokio task 中執行，完成時透過 channel 回傳完成事件；
/// 每次掃描有自己的 generation，舊掃描的遲到結果會被丟棄。
pub struct ScanOrchestrator {
    search: Arc<dyn CatalogSearch>,
    classifier: ItemClassifierClient,
    recorder: SessionRecorder,
    observer: Arc<dyn ScanObserver>,
    settings: ScanSettings,
    generation: u64,
    state: ScanState,
    events_tx: mpsc::UnboundedSender<ScanEvent>,
    events_rx: mpsc::UnboundedReceiver<ScanEvent>,
}

impl ScanOrchestrator {
    pub fn new(
        search: Arc<dyn CatalogSearch>,
        classifier: ItemClassifierClient,
        recorder: SessionRecorder,
        settings: ScanSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            search,
            classifier,
            recorder,
            observer: Arc::new(NoopObserver),
            settings,
            generation: 0,
            state: ScanState::default(),
            events_tx,
            events_rx,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn is_scanning(&self) -> bool {
        self.state.scanning
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight
    }

    pub fn queue_len(&self) -> usize {
        self.state.queue.len()
    }

    pub fn stats(&self) -> ScanStats {
        self.state.aggregator.stats()
    }

    pub fn results(&self) -> Vec<ScanResult> {
        self.state.aggregator.to_vec()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.state.active.as_ref().map(|a| a.session_id.as_str())
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut SessionRecorder {
        &mut self.recorder
    }

    /// 開始新的掃描：驗證憑證、搜尋商品、建立 session、填入佇列。
    ///
    /// 搜尋成功後才重設狀態。先前掃描若仍有進行中的分類不會被中止，
    /// 但其結果會因 generation 不符而被丟棄。
    pub async fn start_scan(
        &mut self,
        source_url: &str,
        credentials: &Credentials,
        page: u32,
    ) -> Result<()> {
        ensure_credentials(credentials)?;

        // 搜尋成功前不動目前的狀態，失敗時維持開始前的樣子
        let catalog = self
            .search
            .search(source_url, credentials, page)
            .await
            .map_err(|e| match e {
                PatrolError::RateLimited | PatrolError::ScanStartError { .. } => e,
                other => PatrolError::ScanStartError {
                    message: other.to_string(),
                },
            })?;

        if catalog.products.is_empty() {
            return Err(PatrolError::ScanStartError {
                message: format!(
                    "no products found for shop {}; check the URL",
                    catalog.shop_identifier
                ),
            });
        }

        self.generation += 1;
        self.state = ScanState {
            scanning: true,
            ..ScanState::default()
        };
        tracing::debug!("Starting scan generation {} for {}", self.generation, source_url);

        let found = catalog.products.len();
        let session_id =
            self.recorder
                .begin_session(source_url, &catalog.shop_identifier, found);

        self.state.queue = catalog
            .products
            .into_iter()
            .take(self.settings.batch_limit)
            .collect();
        if found > self.state.queue.len() {
            tracing::info!(
                "Batch limited to {} of {} products",
                self.state.queue.len(),
                found
            );
        }

        self.observer
            .on_started(&session_id, &catalog.shop_identifier, self.state.queue.len());
        self.state.active = Some(ActiveScan {
            session_id,
            shop_identifier: catalog.shop_identifier,
            source_url: source_url.to_string(),
            started_at: Utc::now(),
            credentials: credentials.clone(),
        });

        Ok(())
    }

    /// 驅動控制迴圈直到完成。沒有進行中的掃描時回傳 `None`。
    pub async fn run(&mut self) -> Option<ScanReport> {
        if !self.state.scanning {
            return None;
        }

        loop {
            if let Some(report) = self.evaluate() {
                return Some(report);
            }

            // 迴圈持有 sender，recv 不會回傳 None
            let event = self.events_rx.recv().await?;
            self.handle_event(event);
        }
    }

    /// 開始並執行完整掃描
    pub async fn scan(
        &mut self,
        source_url: &str,
        credentials: &Credentials,
        page: u32,
    ) -> Result<ScanReport> {
        self.start_scan(source_url, credentials, page).await?;
        self.run().await.ok_or_else(|| PatrolError::ScanStartError {
            message: "scan stopped before completion".to_string(),
        })
    }

    fn evaluate(&mut self) -> Option<ScanReport> {
        if !self.state.scanning {
            return None;
        }

        if self.state.queue.is_empty() && self.state.in_flight == 0 {
            return self.complete();
        }

        while self.state.in_flight < self.settings.concurrency_limit {
            let Some(item) = self.state.queue.pop_front() else {
                break;
            };
            self.dispatch(item);
        }

        None
    }

    fn dispatch(&mut self, item: ProductDescriptor) {
        let Some(active) = self.state.active.as_ref() else {
            return;
        };

        self.state.in_flight += 1;
        self.observer.on_dispatched(&item, self.state.in_flight);

        let generation = self.generation;
        let classifier = self.classifier.clone();
        let credentials = active.credentials.clone();
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let task_item = item.clone();
            let outcome = match tokio::spawn(async move {
                classifier.classify(&task_item, &credentials).await
            })
            .await
            {
                Ok(outcome) => outcome,
                Err(e) => ClassificationOutcome::error(format!("classification task failed: {}", e)),
            };

            // 接收端只會在 orchestrator 被丟棄後關閉
            let _ = tx.send(ScanEvent {
                generation,
                item,
                outcome,
            });
        });
    }

    fn handle_event(&mut self, event: ScanEvent) {
        if event.generation != self.generation {
            tracing::debug!(
                "Discarding stale result for {:?} (generation {}, current {})",
                event.item.name,
                event.generation,
                self.generation
            );
            return;
        }

        self.state.in_flight = self.state.in_flight.saturating_sub(1);

        let result = ScanResult::new(event.item, event.outcome);
        let stats = self.state.aggregator.push(result.clone());
        if let Some(active) = self.state.active.as_ref() {
            self.recorder.record_result(&active.session_id, &result);
        }
        self.observer.on_result(&result, &stats);
    }

    fn complete(&mut self) -> Option<ScanReport> {
        self.state.scanning = false;
        let active = self.state.active.as_ref()?;

        self.recorder.end_session(&active.session_id);

        let report = ScanReport {
            session_id: active.session_id.clone(),
            shop_identifier: active.shop_identifier.clone(),
            source_url: active.source_url.clone(),
            started_at: active.started_at,
            ended_at: Utc::now(),
            results: self.state.aggregator.to_vec(),
            stats: self.state.aggregator.stats(),
        };
        self.observer.on_completed(&report);
        Some(report)
    }
}

fn ensure_credentials(credentials: &Credentials) -> Result<()> {
    let check = |field: &str, value: &str| {
        validate_non_empty_string(field, value).map_err(|_| PatrolError::ConfigurationError {
            message: format!("{} is not set; configure it before starting a scan", field),
        })
    };
    check("credentials.marketplace_app_id", &credentials.marketplace_app_id)?;
    check("credentials.ai_api_key", &credentials.ai_api_key)
}
