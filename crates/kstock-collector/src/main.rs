//! KStock 동기화 CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use kstock_collector::{App, EtfFilter, JobState, ProgressReporter};
use kstock_core::{init_logging, AppConfig};
use kstock_data::CacheDomain;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kstock-collector")]
#[command(about = "KStock 데이터 동기화 및 캐시 관리", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 종목 목록만 동기화
    SyncStocks,

    /// 전체 동기화 (종목 목록 → 수급 분석 → ETF)
    RunAll,

    /// ETF 구성종목 수집
    CollectEtf {
        /// 포함 키워드 (쉼표로 구분, 예: "KODEX,TIGER")
        #[arg(long, value_delimiter = ',')]
        include: Vec<String>,

        /// 제외 키워드 (쉼표로 구분)
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// 동기화 이력 조회
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// 캐시 통계와 스케줄 설정 조회
    Status,

    /// 일일 동기화 시각 설정 (KST)
    Schedule {
        #[arg(long)]
        hour: u32,
        #[arg(long, default_value_t = 0)]
        minute: u32,
        /// 일일 동기화 끄기
        #[arg(long)]
        disable: bool,
    },

    /// 데몬 모드: 설정된 시각에 매일 동기화
    Daemon,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("설정 파일 로드 실패: {}", path.display()))?,
        None => AppConfig::from_env().context("환경 변수 설정 로드 실패")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    let mut log_config = config.logging.to_log_config();
    if let Some(level) = &cli.log_level {
        log_config.level = level.clone();
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!("KStock Collector 시작");
    let app = App::build(config).await?;

    let result = run(&app, cli.command).await;
    app.shutdown().await;
    tracing::info!("KStock Collector 종료");
    result
}

async fn run(app: &App, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::SyncStocks => {
            app.connect_bridge().await?;
            let count = app.orchestrator.sync_stock_list().await?;
            tracing::info!(count, "종목 목록 동기화 완료");
        }
        Commands::RunAll => run_manual(app).await?,
        Commands::CollectEtf { include, exclude } => {
            app.connect_bridge().await?;
            let filter = if include.is_empty() && exclude.is_empty() {
                EtfFilter::from_settings(&app.config.etf)
            } else {
                EtfFilter::new(include, exclude)
            };
            let result = app
                .orchestrator
                .etf_collector()
                .collect(&filter, &ProgressReporter::new())
                .await;
            tracing::info!(
                status = %result.status,
                success = result.success_count,
                failed = result.failed_count,
                "ETF 수집 종료"
            );
        }
        Commands::History { limit } => {
            for record in app.repos.history.recent(limit).await? {
                println!(
                    "#{:<5} {} {:<9} {:<11} stocks={:<5} analysis={:<4} {}ms {}",
                    record.id,
                    record.synced_at.format("%Y-%m-%d %H:%M:%S"),
                    record.sync_type,
                    record.status,
                    record.stock_count,
                    record.analysis_count,
                    record.duration_ms,
                    record.error_message.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Status => {
            for domain in app.repos.cache_domains() {
                let stats = domain.stats().await?;
                println!(
                    "{:<10} count={:<6} last_updated={} expired={}",
                    domain.name(),
                    stats.count,
                    stats
                        .last_updated_ms
                        .and_then(chrono::DateTime::from_timestamp_millis)
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string()),
                    stats.is_expired
                );
            }

            let schedule = app.repos.scheduling.get().await?;
            println!(
                "schedule   enabled={} at={:02}:{:02} KST last={} ({})",
                schedule.is_enabled,
                schedule.sync_hour,
                schedule.sync_minute,
                schedule.last_sync_status.as_deref().unwrap_or("-"),
                schedule.last_sync_message.as_deref().unwrap_or("-")
            );
        }
        Commands::Schedule {
            hour,
            minute,
            disable,
        } => {
            let schedule = app.repos.scheduling.set_schedule(!disable, hour, minute).await?;
            tracing::info!(
                enabled = schedule.is_enabled,
                hour = schedule.sync_hour,
                minute = schedule.sync_minute,
                "스케줄 저장 완료"
            );
        }
        Commands::Daemon => run_daemon(app).await?,
    }
    Ok(())
}

/// 스케줄러를 거쳐 수동 전체 동기화 (네트워크 확인, 재시도 포함).
async fn run_manual(app: &App) -> anyhow::Result<()> {
    app.connect_bridge().await?;
    let scheduler = app.scheduler()?;

    let state = tokio::select! {
        state = scheduler.run_manual_watched(|p| {
            tracing::info!(current = p.current, total = p.total, "진행 상황");
        }) => state,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("종료 신호 수신, 수동 동기화 취소 중...");
            scheduler.cancel_manual().await;
            JobState::Cancelled
        }
    };
    scheduler.shutdown().await;

    if let Some(record) = app.repos.history.recent(1).await?.into_iter().next() {
        tracing::info!(
            history_id = record.id,
            status = %record.status,
            stocks = record.stock_count,
            analysis = record.analysis_count,
            message = record.error_message.as_deref().unwrap_or("-"),
            "전체 동기화 종료"
        );
    }

    match state {
        JobState::Succeeded => Ok(()),
        other => anyhow::bail!("수동 동기화가 완료되지 않았습니다: {:?}", other),
    }
}

async fn run_daemon(app: &App) -> anyhow::Result<()> {
    // 브릿지가 아직 없으면 실행 시점에 Blocked 상태로 대기
    app.attach_bridge().await?;

    let scheduler = app.scheduler()?;
    let schedule = app.repos.scheduling.get().await?;
    scheduler.apply_config(&schedule)?;
    tracing::info!(
        enabled = schedule.is_enabled,
        hour = schedule.sync_hour,
        minute = schedule.sync_minute,
        "=== 데몬 모드 시작 ==="
    );

    let mut state = scheduler.observe_state();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("종료 신호 수신, 데몬 종료 중...");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                if current == JobState::Failed {
                    tracing::warn!("동기화 실패, 다음 예약 시각에 다시 실행합니다");
                } else {
                    tracing::debug!(?current, "Scheduler state changed");
                }
            }
        }
    }

    scheduler.shutdown().await;
    Ok(())
}
