//! 동기화 오케스트레이터.
//!
//! 한 번의 실행은 다음 단계로 진행합니다.
//!
//! 1. 종목 목록: 원격 전체 조회 → 우선순위 정렬/상한 적용 → 전체 교체
//! 2. 수급 분석: 상위 N 종목을 고정 크기 배치로 증분 동기화 (종목별 실패는 건너뜀)
//! 3. ETF 구성종목 (설정 시): 부분 실패는 실행 상태 `Partial`
//!
//! 실행 시작 시 이력을 만들고 종료 시 한 번만 갱신합니다. 실행은 내부 뮤텍스로 직렬화됩니다.

use crate::etf::{EtfCollector, EtfFilter};
use crate::progress::ProgressReporter;
use crate::scheduler::{JobTrigger, SyncJob};
use crate::stats::CollectionStats;
use async_trait::async_trait;
use futures::future::join_all;
use kstock_core::{
    prioritize_stocks, sync_span, AppConfig, CollectionResult, CollectionStatus, SharedClock, SyncCompletion,
    SyncError, SyncResult, SyncStatus, SyncType,
};
use kstock_data::Repositories;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn, Instrument};

/// 오케스트레이터 옵션.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// 저장할 최대 종목 수
    pub max_stock_count: usize,
    /// 수급 분석 대상 상위 종목 수
    pub analysis_top_n: usize,
    /// 동시에 처리할 종목 수
    pub analysis_batch_size: usize,
    /// 최초 수집 조회 기간 (일)
    pub analysis_lookback_days: u32,
    /// 보관할 이력 수
    pub history_limit: usize,
    /// 배치 간 딜레이
    pub request_delay: Duration,
    /// ETF 수집 포함 여부
    pub include_etf: bool,
    pub etf_filter: EtfFilter,
    /// 예약 실행을 건너뛰는 기준 (마지막 종목 동기화 이후 경과 시간)
    pub min_scheduled_interval: chrono::Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        let sync = &config.sync;
        Self {
            max_stock_count: sync.max_stock_count,
            analysis_top_n: sync.analysis_top_n,
            analysis_batch_size: sync.analysis_batch_size.max(1),
            analysis_lookback_days: u32::try_from(sync.analysis_lookback_days.max(1))
                .unwrap_or(u32::MAX),
            history_limit: sync.history_limit,
            request_delay: sync.request_delay(),
            include_etf: sync.include_etf,
            etf_filter: EtfFilter::from_settings(&config.etf),
            min_scheduled_interval: chrono::Duration::hours(1),
        }
    }
}

/// 실행 결과 요약.
#[derive(Debug, Clone)]
pub struct SyncRunReport {
    pub history_id: i64,
    pub sync_type: SyncType,
    /// 실행 상태 (ETF 부분 실패 시 `Partial`)
    pub status: CollectionStatus,
    pub stock_count: usize,
    pub analysis_count: usize,
    pub analysis: CollectionStats,
    pub etf: Option<CollectionResult>,
    pub error_message: Option<String>,
    pub duration: Duration,
}

/// 단계 실패. 실패 전에 저장된 종목 수를 함께 전달합니다.
struct StageFailure {
    stock_count: usize,
    error: SyncError,
}

/// 단계 1~3 결과.
struct StageOutcome {
    stock_count: usize,
    analysis: CollectionStats,
    etf: Option<CollectionResult>,
}

impl StageOutcome {
    /// ETF 단계가 완전히 성공하지 못했을 때의 안내 메시지.
    fn caveat(&self) -> Option<String> {
        let etf = self.etf.as_ref()?;
        if etf.status == CollectionStatus::Success {
            return None;
        }
        Some(format!(
            "ETF 수집 {}: {}",
            etf.status,
            etf.error_message.as_deref().unwrap_or("-")
        ))
    }
}

/// 동기화 오케스트레이터.
pub struct SyncOrchestrator {
    repos: Arc<Repositories>,
    clock: SharedClock,
    options: OrchestratorOptions,
    etf: EtfCollector,
    run_lock: Mutex<()>,
}

impl SyncOrchestrator {
    pub fn new(repos: Arc<Repositories>, clock: SharedClock, options: OrchestratorOptions) -> Self {
        let etf = EtfCollector::new(repos.clone(), clock.clone())
            .with_request_delay(options.request_delay);
        Self {
            repos,
            clock,
            options,
            etf,
            run_lock: Mutex::new(()),
        }
    }

    pub fn repositories(&self) -> &Arc<Repositories> {
        &self.repos
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn etf_collector(&self) -> &EtfCollector {
        &self.etf
    }

    /// 마지막 종목 목록 전체 교체 이후 `max_age` 이상 지났으면 `true` (교체 기록이 없어도 `true`).
    pub async fn has_new_data_available(&self, max_age: chrono::Duration) -> SyncResult<bool> {
        let latest = self.repos.stocks.last_replaced_at().await?;
        Ok(match latest {
            Some(at) => self.clock.now() - at >= max_age,
            None => true,
        })
    }

    /// 전체 동기화 실행.
    ///
    /// 종목 목록 단계가 실패하면 이력을 `FAILED`로 남기고 에러를 반환합니다.
    pub async fn run(&self, sync_type: SyncType, progress: &ProgressReporter) -> SyncResult<SyncRunReport> {
        let span = sync_span!("sync_run", sync_type);
        self.run_locked(sync_type, progress).instrument(span).await
    }

    async fn run_locked(&self, sync_type: SyncType, progress: &ProgressReporter) -> SyncResult<SyncRunReport> {
        let _guard = self.run_lock.lock().await;
        let started = Instant::now();

        let interrupted = self
            .repos
            .history
            .mark_interrupted("이전 실행이 중단되었습니다")
            .await?;
        if interrupted > 0 {
            warn!(interrupted, "Closed interrupted sync history");
        }

        let history_id = self.repos.history.start(sync_type).await?;
        info!(history_id, "=== 동기화 시작 ===");

        let outcome = self.run_stages(progress).await;
        let duration = started.elapsed();
        let duration_ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);

        let (completion, result) = match outcome {
            Ok(stages) => {
                let caveat = stages.caveat();
                let status = if caveat.is_some() {
                    CollectionStatus::Partial
                } else {
                    CollectionStatus::Success
                };
                let completion = SyncCompletion {
                    status: SyncStatus::Success,
                    stock_count: stages.stock_count as i64,
                    analysis_count: stages.analysis.success as i64,
                    error_message: caveat.clone(),
                    duration_ms,
                };
                let report = SyncRunReport {
                    history_id,
                    sync_type,
                    status,
                    stock_count: stages.stock_count,
                    analysis_count: stages.analysis.success,
                    analysis: stages.analysis,
                    etf: stages.etf,
                    error_message: caveat,
                    duration,
                };
                (completion, Ok(report))
            }
            Err(StageFailure { stock_count, error: e }) => {
                error!(error = %e, stock_count, "동기화 실패");
                let completion = SyncCompletion {
                    status: SyncStatus::Failed,
                    stock_count: stock_count as i64,
                    analysis_count: 0,
                    error_message: Some(e.to_string()),
                    duration_ms,
                };
                (completion, Err(e))
            }
        };

        self.finish(history_id, &completion, &result).await;
        info!(
            history_id,
            status = %completion.status,
            duration_ms,
            "=== 동기화 종료 ==="
        );
        result
    }

    /// 이력 종료, 오래된 이력 정리, 스케줄 설정에 마지막 결과 기록.
    async fn finish(&self, history_id: i64, completion: &SyncCompletion, result: &SyncResult<SyncRunReport>) {
        if let Err(e) = self.repos.history.complete(history_id, completion).await {
            error!(history_id, error = %e, "Failed to complete sync history");
        }
        if let Err(e) = self.repos.history.trim(self.options.history_limit).await {
            warn!(error = %e, "Failed to trim sync history");
        }

        let (status, message) = match result {
            Ok(report) => (report.status.as_str(), report.error_message.clone()),
            Err(e) => (CollectionStatus::Failed.as_str(), Some(e.to_string())),
        };
        if let Err(e) = self
            .repos
            .scheduling
            .record_result_now(status, message.as_deref())
            .await
        {
            warn!(error = %e, "Failed to record last sync result");
        }
    }

    async fn run_stages(&self, progress: &ProgressReporter) -> Result<StageOutcome, StageFailure> {
        info!("Step 1: 종목 목록 동기화");
        let stock_count = self
            .sync_stock_list()
            .await
            .map_err(|error| StageFailure { stock_count: 0, error })?;

        info!("Step 2: 수급 분석 동기화");
        let analysis = self
            .sync_analysis(progress)
            .await
            .map_err(|error| StageFailure { stock_count, error })?;

        let etf = if self.options.include_etf {
            info!("Step 3: ETF 구성종목 수집");
            Some(self.etf.collect(&self.options.etf_filter, progress).await)
        } else {
            None
        };

        Ok(StageOutcome {
            stock_count,
            analysis,
            etf,
        })
    }

    /// 단계 1: 종목 목록 전체 교체.
    #[instrument(skip(self))]
    pub async fn sync_stock_list(&self) -> SyncResult<usize> {
        let stocks = self.repos.stocks.fetch_all_remote().await?;
        if stocks.is_empty() {
            return Err(SyncError::NoData("종목 목록이 비어 있습니다".to_string()));
        }

        let fetched = stocks.len();
        let stocks = prioritize_stocks(stocks, self.options.max_stock_count);
        if stocks.len() < fetched {
            warn!(
                fetched,
                kept = stocks.len(),
                cap = self.options.max_stock_count,
                "Stock list truncated by priority"
            );
        }

        let saved = self.repos.stocks.replace_all(&stocks).await?;
        info!(saved, "종목 목록 저장 완료");
        Ok(saved)
    }

    /// 단계 2: 상위 종목 수급 분석 증분 동기화.
    ///
    /// 종목별 실패는 건너뜁니다. 대상 전체가 실패하면 첫 에러를 반환합니다.
    #[instrument(skip(self, progress))]
    pub async fn sync_analysis(&self, progress: &ProgressReporter) -> SyncResult<CollectionStats> {
        let started = Instant::now();
        let tickers = self.repos.stocks.top_tickers(self.options.analysis_top_n).await?;
        progress.start(tickers.len());

        let mut stats = CollectionStats::new();
        let mut first_error: Option<SyncError> = None;
        let mut done = 0;

        for (i, chunk) in tickers.chunks(self.options.analysis_batch_size.max(1)).enumerate() {
            if i > 0 && !self.options.request_delay.is_zero() {
                tokio::time::sleep(self.options.request_delay).await;
            }

            let results = join_all(chunk.iter().map(|ticker| {
                self.repos
                    .analysis
                    .sync_incremental(ticker, self.options.analysis_lookback_days)
            }))
            .await;

            for (ticker, result) in chunk.iter().zip(results) {
                if let Err(e) = &result {
                    warn!(ticker = %ticker, error = %e, "수급 분석 동기화 실패, 건너뜀");
                    if first_error.is_none() {
                        first_error = Some(e.clone());
                    }
                }
                stats.record(&result);
            }

            done += chunk.len();
            progress.advance(done);
        }

        stats.elapsed = started.elapsed();
        stats.log_summary("수급 분석 동기화");

        if stats.total > 0 && stats.success == 0 {
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl SyncJob for SyncOrchestrator {
    async fn execute(&self, trigger: JobTrigger, progress: &ProgressReporter) -> SyncResult<()> {
        let sync_type = match trigger {
            JobTrigger::Daily => {
                if !self
                    .has_new_data_available(self.options.min_scheduled_interval)
                    .await?
                {
                    info!("최근 동기화 데이터가 있어 예약 실행을 건너뜁니다");
                    return Ok(());
                }
                SyncType::Scheduled
            }
            JobTrigger::Manual => SyncType::Manual,
        };
        self.run(sync_type, progress).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kstock_core::{Clock, ManualClock};
    use kstock_data::{Database, RepositoryContext};
    use kstock_exchange::testing::{initialized_gateway, ok_envelope, ScriptedBridge};
    use serde_json::{json, Value};

    struct Fixture {
        clock: ManualClock,
        bridge: Arc<ScriptedBridge>,
        repos: Arc<Repositories>,
    }

    impl Fixture {
        async fn new() -> Self {
            let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
            let bridge = Arc::new(ScriptedBridge::new());
            let gateway = initialized_gateway(bridge.clone(), Arc::new(clock.clone())).await;
            let db = Database::in_memory().await.unwrap();
            let repos = Arc::new(Repositories::new(RepositoryContext::new(
                db,
                gateway,
                Arc::new(clock.clone()),
            )));
            Self { clock, bridge, repos }
        }

        fn orchestrator(&self, options: OrchestratorOptions) -> SyncOrchestrator {
            SyncOrchestrator::new(self.repos.clone(), Arc::new(self.clock.clone()), options)
        }
    }

    fn options() -> OrchestratorOptions {
        OrchestratorOptions {
            analysis_top_n: 10,
            analysis_batch_size: 2,
            request_delay: Duration::ZERO,
            ..OrchestratorOptions::default()
        }
    }

    fn stock_list() -> Value {
        json!([
            {"ticker": "247540", "name": "에코프로비엠", "market": "KOSDAQ"},
            {"ticker": "005930", "name": "삼성전자", "market": "KOSPI"},
            {"ticker": "000660", "name": "SK하이닉스", "market": "KOSPI"},
            {"ticker": "086520", "name": "에코프로", "market": "KOSDAQ"},
        ])
    }

    fn supply_rows() -> Value {
        json!([{
            "date": "2026-02-27",
            "close_price": 71000,
            "volume": 1000,
            "foreign_net_buy": 10,
            "institution_net_buy": -5,
        }])
    }

    #[tokio::test]
    async fn test_full_run_success() {
        let fx = Fixture::new().await;
        fx.bridge.on_ok("stock", "get_all_stocks", stock_list());
        fx.bridge.on_ok("analysis", "get_supply_demand", supply_rows());
        let orchestrator = fx.orchestrator(options());

        let progress = ProgressReporter::new();
        let report = orchestrator.run(SyncType::Manual, &progress).await.unwrap();

        assert_eq!(report.status, CollectionStatus::Success);
        assert_eq!(report.stock_count, 4);
        assert_eq!(report.analysis_count, 4);
        assert_eq!(report.analysis.total_rows, 4);
        assert!(report.etf.is_none());
        assert_eq!(progress.current(), kstock_core::CollectionProgress::new(4, 4));

        let history = fx.repos.history.recent(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, SyncStatus::Success);
        assert_eq!(history[0].sync_type, SyncType::Manual);
        assert_eq!(history[0].stock_count, 4);

        let config = fx.repos.scheduling.get().await.unwrap();
        assert_eq!(config.last_sync_status.as_deref(), Some("SUCCESS"));
        assert_eq!(config.last_sync_at, Some(fx.clock.now()));
    }

    #[tokio::test]
    async fn test_stock_list_failure_short_circuits() {
        let fx = Fixture::new().await;
        fx.bridge.on_error("stock", "get_all_stocks", "NETWORK_ERROR", "connection refused");
        fx.bridge.on_ok("analysis", "get_supply_demand", supply_rows());
        let orchestrator = fx.orchestrator(options());

        let err = orchestrator
            .run(SyncType::Scheduled, &ProgressReporter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert_eq!(fx.bridge.calls_to("analysis", "get_supply_demand"), 0);

        let history = fx.repos.history.recent(1).await.unwrap();
        assert_eq!(history[0].status, SyncStatus::Failed);
        assert!(history[0].error_message.is_some());
        assert_eq!(
            fx.repos.scheduling.get().await.unwrap().last_sync_status.as_deref(),
            Some("FAILED")
        );
    }

    #[tokio::test]
    async fn test_empty_stock_list_fails() {
        let fx = Fixture::new().await;
        fx.bridge.on_ok("stock", "get_all_stocks", json!([]));
        let orchestrator = fx.orchestrator(options());

        let err = orchestrator
            .run(SyncType::Manual, &ProgressReporter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NoData(_)));
    }

    #[tokio::test]
    async fn test_cap_keeps_priority_order() {
        let fx = Fixture::new().await;
        fx.bridge.on_ok("stock", "get_all_stocks", stock_list());
        let orchestrator = fx.orchestrator(OrchestratorOptions {
            max_stock_count: 2,
            ..options()
        });

        assert_eq!(orchestrator.sync_stock_list().await.unwrap(), 2);
        let mut kept = fx.repos.stocks.top_tickers(10).await.unwrap();
        kept.sort();
        // KOSPI 종목이 먼저 남는다
        assert_eq!(kept, vec!["000660", "005930"]);
    }

    #[tokio::test]
    async fn test_analysis_batch_tolerates_failures() {
        let fx = Fixture::new().await;
        fx.bridge.on_ok("stock", "get_all_stocks", stock_list());
        fx.bridge.on("analysis", "get_supply_demand", |args: &[Value]| {
            if args[0] == json!("000660") {
                Err(SyncError::Timeout("bridge call timed out".to_string()))
            } else {
                Ok(ok_envelope(supply_rows()))
            }
        });
        let orchestrator = fx.orchestrator(options());

        let report = orchestrator
            .run(SyncType::Manual, &ProgressReporter::new())
            .await
            .unwrap();
        assert_eq!(report.status, CollectionStatus::Success);
        assert_eq!(report.analysis.total, 4);
        assert_eq!(report.analysis.errors, 1);
        assert_eq!(report.analysis_count, 3);
        assert_eq!(fx.bridge.calls_to("analysis", "get_supply_demand"), 4);
    }

    #[tokio::test]
    async fn test_analysis_all_failed_is_error() {
        let fx = Fixture::new().await;
        fx.bridge.on_ok("stock", "get_all_stocks", stock_list());
        fx.bridge.on_error("analysis", "get_supply_demand", "TIMEOUT", "slow");
        let orchestrator = fx.orchestrator(options());

        let err = orchestrator
            .run(SyncType::Manual, &ProgressReporter::new())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        let history = fx.repos.history.recent(1).await.unwrap();
        assert_eq!(history[0].status, SyncStatus::Failed);
        // 종목 목록은 이미 저장됨
        assert_eq!(history[0].stock_count, 4);
        assert_eq!(history[0].analysis_count, 0);
        assert_eq!(fx.repos.stocks.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_partial_etf_stage() {
        let fx = Fixture::new().await;
        fx.bridge.on_ok("stock", "get_all_stocks", stock_list());
        fx.bridge.on_ok("analysis", "get_supply_demand", json!([]));
        fx.bridge.on_ok(
            "etf",
            "get_etf_list",
            json!([
                {"ticker": "069500", "name": "KODEX 200"},
                {"ticker": "102110", "name": "TIGER 200"},
            ]),
        );
        fx.bridge.on("etf", "get_constituents", |args: &[Value]| {
            if args[0] == json!("102110") {
                Err(SyncError::Network("reset".to_string()))
            } else {
                Ok(ok_envelope(json!([
                    {"stock_ticker": "005930", "stock_name": "삼성전자", "weight": "30.1"}
                ])))
            }
        });
        let orchestrator = fx.orchestrator(OrchestratorOptions {
            include_etf: true,
            ..options()
        });

        let report = orchestrator
            .run(SyncType::Scheduled, &ProgressReporter::new())
            .await
            .unwrap();
        assert_eq!(report.status, CollectionStatus::Partial);
        assert!(report.error_message.is_some());
        assert_eq!(report.etf.as_ref().unwrap().failed_count, 1);

        let history = fx.repos.history.recent(1).await.unwrap();
        assert_eq!(history[0].status, SyncStatus::Success);
        assert!(history[0].error_message.as_deref().unwrap().contains("ETF"));
        assert_eq!(
            fx.repos.scheduling.get().await.unwrap().last_sync_status.as_deref(),
            Some("PARTIAL")
        );
    }

    #[tokio::test]
    async fn test_has_new_data_available_and_daily_skip() {
        let fx = Fixture::new().await;
        fx.bridge.on_ok("stock", "get_all_stocks", stock_list());
        fx.bridge.on_ok("analysis", "get_supply_demand", json!([]));
        let orchestrator = fx.orchestrator(options());

        assert!(orchestrator
            .has_new_data_available(chrono::Duration::hours(1))
            .await
            .unwrap());

        orchestrator
            .execute(JobTrigger::Manual, &ProgressReporter::new())
            .await
            .unwrap();
        assert!(!orchestrator
            .has_new_data_available(chrono::Duration::hours(1))
            .await
            .unwrap());

        // 방금 동기화했으므로 예약 실행은 건너뜀
        orchestrator
            .execute(JobTrigger::Daily, &ProgressReporter::new())
            .await
            .unwrap();
        assert_eq!(fx.bridge.calls_to("stock", "get_all_stocks"), 1);

        fx.clock.advance(chrono::Duration::hours(2));
        orchestrator
            .execute(JobTrigger::Daily, &ProgressReporter::new())
            .await
            .unwrap();
        assert_eq!(fx.bridge.calls_to("stock", "get_all_stocks"), 2);
        let history = fx.repos.history.recent(10).await.unwrap();
        assert_eq!(history[0].sync_type, SyncType::Scheduled);
    }

    #[tokio::test]
    async fn test_single_stock_lookup_does_not_suppress_daily_run() {
        let fx = Fixture::new().await;
        fx.bridge.on_ok("stock", "get_all_stocks", stock_list());
        fx.bridge.on_ok(
            "stock",
            "get_stock_info",
            json!({"ticker": "005930", "name": "삼성전자", "market": "KOSPI"}),
        );
        fx.bridge.on_ok("analysis", "get_supply_demand", json!([]));
        let orchestrator = fx.orchestrator(options());

        orchestrator.sync_stock_list().await.unwrap();
        fx.clock.advance(chrono::Duration::hours(25));
        // 만료된 단건 조회는 해당 종목 행만 새로 씀
        fx.repos.stocks.get("005930").await.unwrap();

        assert!(orchestrator
            .has_new_data_available(chrono::Duration::hours(1))
            .await
            .unwrap());
        orchestrator
            .execute(JobTrigger::Daily, &ProgressReporter::new())
            .await
            .unwrap();
        assert_eq!(fx.bridge.calls_to("stock", "get_all_stocks"), 2);
    }

    #[tokio::test]
    async fn test_up_to_date_tickers_counted_as_skipped() {
        let fx = Fixture::new().await;
        fx.bridge.on_ok("stock", "get_all_stocks", stock_list());
        // 오늘(2026-03-02 KST) 거래일까지 포함
        fx.bridge.on_ok(
            "analysis",
            "get_supply_demand",
            json!([{
                "date": "2026-03-02",
                "close_price": 71000,
                "volume": 1000,
                "foreign_net_buy": 10,
                "institution_net_buy": -5,
            }]),
        );
        let orchestrator = fx.orchestrator(options());

        let first = orchestrator.run(SyncType::Manual, &ProgressReporter::new()).await.unwrap();
        assert_eq!(first.analysis.total_rows, 4);
        assert_eq!(first.analysis.skipped, 0);

        let second = orchestrator.run(SyncType::Manual, &ProgressReporter::new()).await.unwrap();
        assert_eq!(second.analysis.skipped, 4);
        assert_eq!(second.analysis.empty, 0);
        assert_eq!(second.analysis_count, 4);
        assert_eq!(fx.bridge.calls_to("analysis", "get_supply_demand"), 4);
    }

    #[tokio::test]
    async fn test_history_trimmed() {
        let fx = Fixture::new().await;
        fx.bridge.on_ok("stock", "get_all_stocks", stock_list());
        fx.bridge.on_ok("analysis", "get_supply_demand", json!([]));
        let orchestrator = fx.orchestrator(OrchestratorOptions {
            history_limit: 2,
            ..options()
        });

        for _ in 0..4 {
            orchestrator
                .run(SyncType::Manual, &ProgressReporter::new())
                .await
                .unwrap();
            fx.clock.advance(chrono::Duration::minutes(1));
        }
        assert_eq!(fx.repos.history.recent(10).await.unwrap().len(), 2);
    }
}
