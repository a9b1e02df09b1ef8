//! ETF 구성종목 수집.
//!
//! ETF 목록 조회 → 이름 키워드 필터 → ETF별 구성종목 저장 → 결과 집계 → 수집 이력 기록.

use crate::progress::ProgressReporter;
use kstock_core::{CollectionResult, EtfInfo, EtfSettings, ItemOutcome, SharedClock};
use kstock_data::Repositories;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// ETF 이름 키워드 필터.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EtfFilter {
    /// 하나라도 포함되어야 함 (비어 있으면 전체 허용)
    pub include: Vec<String>,
    /// 하나라도 포함되면 제외
    pub exclude: Vec<String>,
}

fn normalize(keywords: Vec<String>) -> Vec<String> {
    keywords
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

impl EtfFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include: normalize(include),
            exclude: normalize(exclude),
        }
    }

    pub fn from_settings(settings: &EtfSettings) -> Self {
        Self::new(
            settings.include_keywords.clone(),
            settings.exclude_keywords.clone(),
        )
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        let included =
            self.include.is_empty() || self.include.iter().any(|k| name.contains(k.as_str()));
        included && !self.exclude.iter().any(|k| name.contains(k.as_str()))
    }

    pub fn apply(&self, etfs: Vec<EtfInfo>) -> Vec<EtfInfo> {
        etfs.into_iter().filter(|e| self.matches(&e.name)).collect()
    }
}

/// ETF 수집기.
pub struct EtfCollector {
    repos: Arc<Repositories>,
    clock: SharedClock,
    request_delay: Duration,
}

impl EtfCollector {
    pub fn new(repos: Arc<Repositories>, clock: SharedClock) -> Self {
        Self {
            repos,
            clock,
            request_delay: Duration::ZERO,
        }
    }

    /// ETF 간 요청 딜레이.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// 수집 실행. 항목별 실패는 결과에 집계되며 에러로 반환되지 않습니다.
    #[instrument(skip_all)]
    pub async fn collect(&self, filter: &EtfFilter, progress: &ProgressReporter) -> CollectionResult {
        let started_at = self.clock.now();

        let result = match self.repos.etfs.fetch_etf_list_remote().await {
            Ok(etfs) => self.collect_items(filter.apply(etfs), progress).await,
            Err(e) => {
                error!(error = %e, "ETF 목록 조회 실패");
                CollectionResult::failed(format!("ETF 목록 조회 실패: {}", e))
            }
        };

        if let Err(e) = self
            .repos
            .etfs
            .record_collection(&result, started_at, self.clock.now())
            .await
        {
            warn!(error = %e, "Failed to record ETF collection");
        }

        info!(
            status = %result.status,
            success = result.success_count,
            failed = result.failed_count,
            "ETF 수집 완료"
        );
        result
    }

    async fn collect_items(&self, etfs: Vec<EtfInfo>, progress: &ProgressReporter) -> CollectionResult {
        let total = etfs.len();
        info!(total, "ETF 구성종목 수집 시작");
        progress.start(total);

        let mut outcomes = Vec::with_capacity(total);
        for (i, etf) in etfs.iter().enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            let outcome = match self.repos.etfs.refresh_constituents(&etf.ticker).await {
                Ok(rows) => {
                    debug!(ticker = %etf.ticker, rows, "Constituents saved");
                    ItemOutcome::Success {
                        item: etf.ticker.clone(),
                    }
                }
                Err(e) => {
                    warn!(ticker = %etf.ticker, name = %etf.name, error = %e, "구성종목 수집 실패");
                    ItemOutcome::Failure {
                        item: etf.ticker.clone(),
                        message: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
            progress.advance(i + 1);
        }

        CollectionResult::from_outcomes(&outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kstock_core::{CollectionProgress, CollectionStatus, ManualClock, SyncError};
    use kstock_data::{Database, RepositoryContext};
    use kstock_exchange::testing::{initialized_gateway, ScriptedBridge};
    use serde_json::{json, Value};

    async fn setup() -> (Arc<ScriptedBridge>, Arc<Repositories>, EtfCollector) {
        let clock: SharedClock =
            Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap()));
        let bridge = Arc::new(ScriptedBridge::new());
        let gateway = initialized_gateway(bridge.clone(), clock.clone()).await;
        let db = Database::in_memory().await.unwrap();
        let repos = Arc::new(Repositories::new(RepositoryContext::new(db, gateway, clock.clone())));
        (bridge, repos.clone(), EtfCollector::new(repos, clock))
    }

    fn etf_list(n: usize) -> Value {
        let items: Vec<Value> = (0..n)
            .map(|i| json!({"ticker": format!("{:06}", 100_000 + i), "name": format!("KODEX 테스트{}", i)}))
            .collect();
        Value::Array(items)
    }

    fn constituents() -> Value {
        json!([{"stock_ticker": "005930", "stock_name": "삼성전자", "weight": "25.0"}])
    }

    #[test]
    fn test_filter() {
        let filter = EtfFilter::new(
            vec!["kodex".to_string(), " 반도체 ".to_string()],
            vec!["레버리지".to_string(), "".to_string()],
        );
        assert_eq!(filter.exclude.len(), 1);
        assert!(filter.matches("KODEX 200"));
        assert!(filter.matches("TIGER 반도체"));
        assert!(!filter.matches("KODEX 레버리지"));
        assert!(!filter.matches("TIGER 200"));
        assert!(EtfFilter::default().matches("아무 ETF"));
    }

    #[tokio::test]
    async fn test_partial_batch() {
        let (bridge, repos, collector) = setup().await;
        bridge.on_ok("etf", "get_etf_list", etf_list(10));
        bridge.on("etf", "get_constituents", |args: &[Value]| {
            match args[0].as_str() {
                Some("100003") | Some("100007") => {
                    Err(SyncError::Network("connection reset".to_string()))
                }
                _ => Ok(kstock_exchange::testing::ok_envelope(constituents())),
            }
        });

        let progress = ProgressReporter::new();
        let result = collector.collect(&EtfFilter::default(), &progress).await;

        assert_eq!(result.status, CollectionStatus::Partial);
        assert_eq!(result.success_count, 8);
        assert_eq!(result.failed_count, 2);
        assert!(result.error_message.as_deref().unwrap().contains("100003"));
        assert_eq!(progress.current(), CollectionProgress::new(10, 10));

        let history = repos.etfs.recent_collections(1).await.unwrap();
        assert_eq!(history[0].status, CollectionStatus::Partial);
        assert_eq!(history[0].total_count, 10);
    }

    #[tokio::test]
    async fn test_list_failure_and_empty_list() {
        let (bridge, repos, collector) = setup().await;
        bridge.on_error("etf", "get_etf_list", "EGW00201", "초당 거래건수를 초과하였습니다.");

        let result = collector.collect(&EtfFilter::default(), &ProgressReporter::new()).await;
        assert_eq!(result.status, CollectionStatus::Failed);
        assert_eq!(result.total(), 0);
        assert!(result.error_message.is_some());

        bridge.on_ok("etf", "get_etf_list", json!([]));
        let result = collector.collect(&EtfFilter::default(), &ProgressReporter::new()).await;
        assert_eq!(result.status, CollectionStatus::Success);
        assert_eq!(result.error_message, None);

        assert_eq!(repos.etfs.recent_collections(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_filter_limits_calls() {
        let (bridge, _repos, collector) = setup().await;
        bridge.on_ok(
            "etf",
            "get_etf_list",
            json!([
                {"ticker": "069500", "name": "KODEX 200"},
                {"ticker": "122630", "name": "KODEX 레버리지"},
                {"ticker": "102110", "name": "TIGER 200"},
            ]),
        );
        bridge.on_ok("etf", "get_constituents", constituents());

        let filter = EtfFilter::new(vec!["KODEX".to_string()], vec!["레버리지".to_string()]);
        let result = collector.collect(&filter, &ProgressReporter::new()).await;

        assert_eq!(result.status, CollectionStatus::Success);
        assert_eq!(result.success_count, 1);
        assert_eq!(bridge.calls_to("etf", "get_constituents"), 1);
    }
}
