use anyhow::Context;
use clap::Parser;
use shop_patrol::app::{build_orchestrator, build_recorder};
use shop_patrol::config::Command;
use shop_patrol::core::history;
use shop_patrol::core::orchestrator::LoggingObserver;
use shop_patrol::domain::model::{ScanResult, ScanStats};
use shop_patrol::domain::ports::ConfigProvider;
use shop_patrol::utils::error::{ErrorSeverity, PatrolError};
use shop_patrol::utils::{logger, validation::Validate};
use shop_patrol::{CliConfig, PatrolConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting shop-patrol");
    tracing::debug!("CLI config: {:?}", cli);

    let config = PatrolConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config file '{}'", cli.config))?;

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(cli.command, &config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
        if e.is_retryable() {
            eprintln!("🔁 This failure is temporary; the same command may succeed later");
        }

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(command: Command, config: &PatrolConfig) -> Result<(), PatrolError> {
    match command {
        Command::Scan {
            url,
            page,
            app_id,
            api_key,
            export,
        } => {
            let credentials = config.credentials(app_id.as_deref(), api_key.as_deref());
            let mut orchestrator = build_orchestrator(config, Arc::new(LoggingObserver))?;

            let outcome = orchestrator.scan(&url, &credentials, page).await;
            // 等待背景寫入完成後再結束
            orchestrator.recorder_mut().flush().await;
            let report = outcome?;

            println!("✅ Scan completed for shop {}", report.shop_identifier);
            println!("🆔 Session: {}", report.session_id);
            print_stats(&report.stats);
            print_flagged(&report.results);

            if let Some(path) = export {
                history::export_csv(&report.results, &path)?;
                println!("📁 Results exported to {}", path);
            }
        }
        Command::History => {
            let mut recorder = build_recorder(config);
            let sessions = history::recent_sessions(&recorder, config.history_page_size()).await;
            recorder.flush().await;

            if sessions.is_empty() {
                println!("No scan sessions recorded yet.");
            }
            for session in sessions {
                println!(
                    "{}  {}  {:<9}  {:>3} items  {}",
                    session.started_at.format("%Y-%m-%d %H:%M"),
                    session.session_id,
                    format!("{:?}", session.status),
                    session.item_count,
                    session.shop_identifier
                );
            }
        }
        Command::Show { session_id, export } => {
            let mut recorder = build_recorder(config);
            let view = history::load_session(&recorder, &session_id).await;
            recorder.flush().await;

            if view.results.is_empty() {
                println!("No results stored for session {}", session_id);
                return Ok(());
            }
            for result in &view.results {
                println!(
                    "[{:<6}] {} ({}) - {}",
                    result.outcome.risk_level.as_str(),
                    result.product.name,
                    result.product.price_minor,
                    result.outcome.reason
                );
            }
            print_stats(&view.stats);

            if let Some(path) = export {
                history::export_csv(&view.results, &path)?;
                println!("📁 Results exported to {}", path);
            }
        }
    }

    Ok(())
}

fn print_stats(stats: &ScanStats) {
    println!(
        "📊 Total: {}  High: {}  Medium: {}  Low: {}  Errors: {}",
        stats.total,
        stats.high,
        stats.medium,
        stats.low,
        stats.errors()
    );
}

fn print_flagged(results: &[ScanResult]) {
    use shop_patrol::domain::model::RiskLevel;

    for result in results
        .iter()
        .filter(|r| r.outcome.risk_level == RiskLevel::High)
    {
        println!("⚠️  {} - {}", result.product.name, result.outcome.reason);
        println!("    {}", result.product.page_url);
    }
}
