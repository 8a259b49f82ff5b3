use crate::core::aggregator::recompute_stats;
use crate::core::recorder::SessionRecorder;
use crate::domain::model::{ScanResult, ScanSession, ScanStats};
use crate::utils::error::Result;
use serde::Serialize;
use std::io::Write;

/// 歷史 session 的結果與重新計算的統計
#[derive(Debug, Clone)]
pub struct SessionView {
    pub session_id: String,
    pub results: Vec<ScanResult>,
    pub stats: ScanStats,
}

pub async fn recent_sessions(recorder: &SessionRecorder, page_size: usize) -> Vec<ScanSession> {
    recorder.list_sessions(page_size).await
}

pub async fn load_session(recorder: &SessionRecorder, session_id: &str) -> SessionView {
    let results = recorder.load_session_results(session_id).await;
    let stats = recompute_stats(&results);
    SessionView {
        session_id: session_id.to_string(),
        results,
        stats,
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    name: &'a str,
    price: i64,
    page_url: &'a str,
    image_url: &'a str,
    risk_level: &'a str,
    reason: &'a str,
    observed_at: String,
}

/// 以 CSV 輸出結果
pub fn write_csv<W: Write>(results: &[ScanResult], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for result in results {
        csv_writer.serialize(CsvRow {
            name: &result.product.name,
            price: result.product.price_minor,
            page_url: &result.product.page_url,
            image_url: result.product.image_url.as_deref().unwrap_or(""),
            risk_level: result.outcome.risk_level.as_str(),
            reason: &result.outcome.reason,
            observed_at: result.observed_at.to_rfc3339(),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn export_csv(results: &[ScanResult], path: &str) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(results, file)?;
    tracing::info!("📁 Exported {} results to {}", results.len(), path);
    Ok(())
}
