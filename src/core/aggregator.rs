use crate::domain::model::{ClassificationOutcome, RiskLevel, ScanResult, ScanStats};
use std::collections::VecDeque;

/// 累加一個分類結果。Error 只增加 total。
pub fn apply_result(stats: ScanStats, outcome: &ClassificationOutcome) -> ScanStats {
    let mut next = ScanStats {
        total: stats.total + 1,
        ..stats
    };
    match outcome.risk_level {
        RiskLevel::High => next.high += 1,
        RiskLevel::Medium => next.medium += 1,
        RiskLevel::Low => next.low += 1,
        RiskLevel::Error => {}
    }
    next
}

/// 從已儲存的結果重新計算統計
pub fn recompute_stats<'a>(results: impl IntoIterator<Item = &'a ScanResult>) -> ScanStats {
    results
        .into_iter()
        .fold(ScanStats::default(), |stats, r| apply_result(stats, &r.outcome))
}

/// 執行中的統計與結果紀錄（最新完成的在前）
#[derive(Debug, Default, Clone)]
pub struct ResultAggregator {
    stats: ScanStats,
    log: VecDeque<ScanResult>,
}

impl ResultAggregator {
    pub fn push(&mut self, result: ScanResult) -> ScanStats {
        self.stats = apply_result(self.stats, &result.outcome);
        self.log.push_front(result);
        debug_assert_eq!(self.stats.total, self.log.len());
        self.stats
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn results(&self) -> impl Iterator<Item = &ScanResult> {
        self.log.iter()
    }

    pub fn to_vec(&self) -> Vec<ScanResult> {
        self.results().cloned().collect()
    }
}
