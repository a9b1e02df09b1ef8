//! 종목별 수급 분석 저장소 (`analysis_rows` 테이블).
//!
//! 일자별 행을 `(ticker, trade_date)` 단위로 저장합니다. 전체 조회는 캐시 우선이고,
//! 배치 동기화는 마지막으로 저장된 거래일 이후 데이터만 가져옵니다.
//!
//! 종목마다 원격에서 받아 둔 가장 이른 시작일(`analysis_coverage`)을 함께 기록합니다.
//! 요청 기간이 그보다 앞서면 캐시 미스로 보고 전체 기간을 다시 가져옵니다.

use super::{CacheDomain, RepositoryContext};
use crate::cache::{is_expired, CacheStats};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use kstock_core::{is_valid_ticker, DailySupplyDemand, StockAnalysis, SyncError, SyncResult};
use serde_json::json;
use tracing::{debug, instrument, warn};

const MODULE: &str = "analysis";
const FUNC: &str = "get_supply_demand";

fn yyyymmdd(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// 증분 동기화 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementalSync {
    /// 오늘까지 이미 저장되어 원격 조회를 하지 않음
    UpToDate,
    /// 원격 조회 후 새로 저장한 행 수
    Fetched(usize),
}

/// 수급 분석 저장소.
pub struct AnalysisRepository {
    ctx: RepositoryContext,
}

impl AnalysisRepository {
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }

    /// 최근 `days`일 수급 분석 (캐시 우선).
    #[instrument(skip(self))]
    pub async fn get_analysis(&self, ticker: &str, days: u32) -> SyncResult<StockAnalysis> {
        if !is_valid_ticker(ticker) {
            return Err(SyncError::InvalidArgument(format!("잘못된 종목코드: {}", ticker)));
        }
        if days == 0 {
            return Err(SyncError::InvalidArgument("조회 기간은 1일 이상이어야 합니다".to_string()));
        }

        let today = self.ctx.today();
        let start = today - Days::new(u64::from(days));

        if let Some(rows) = self.cached_rows(ticker, start).await {
            debug!(rows = rows.len(), "Analysis cache hit");
            return Ok(StockAnalysis {
                ticker: ticker.to_string(),
                name: None,
                rows,
            });
        }

        let rows = self.fetch_remote(ticker, start, today).await?;
        if rows.is_empty() {
            return Err(SyncError::NoData(format!("{} 수급 데이터 없음", ticker)));
        }
        if let Err(e) = self.store_rows(ticker, &rows).await {
            warn!(error = %e, "Failed to cache analysis rows");
        } else if let Err(e) = self.extend_coverage(ticker, start).await {
            warn!(error = %e, "Failed to record analysis coverage");
        }

        Ok(StockAnalysis {
            ticker: ticker.to_string(),
            name: None,
            rows,
        })
    }

    async fn cached_rows(&self, ticker: &str, start: NaiveDate) -> Option<Vec<DailySupplyDemand>> {
        match self.try_cached_rows(ticker, start).await {
            Ok(rows) => rows,
            Err(e) => {
                // 읽기/역직렬화 실패는 만료와 동일하게 처리
                warn!(ticker, error = %e, "Analysis cache unreadable, evicting");
                self.evict(ticker).await;
                None
            }
        }
    }

    async fn try_cached_rows(
        &self,
        ticker: &str,
        start: NaiveDate,
    ) -> Result<Option<Vec<DailySupplyDemand>>> {
        let (last,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(cached_at) FROM analysis_rows WHERE ticker = ?")
                .bind(ticker)
                .fetch_one(self.ctx.db.pool())
                .await?;

        let Some(last) = last else {
            return Ok(None);
        };
        if is_expired(last, self.ctx.now_ms(), self.ctx.ttl) {
            debug!(ticker, "Analysis cache expired");
            self.evict(ticker).await;
            return Ok(None);
        }

        match self.covered_from(ticker).await? {
            Some(from) if from <= start => {}
            covered => {
                debug!(ticker, ?covered, %start, "Requested window not covered");
                return Ok(None);
            }
        }

        let payloads: Vec<(String,)> = sqlx::query_as(
            "SELECT payload FROM analysis_rows WHERE ticker = ? AND trade_date >= ? ORDER BY trade_date",
        )
        .bind(ticker)
        .bind(start.to_string())
        .fetch_all(self.ctx.db.pool())
        .await?;

        if payloads.is_empty() {
            return Ok(None);
        }

        let rows = payloads
            .into_iter()
            .map(|(payload,)| serde_json::from_str(&payload))
            .collect::<std::result::Result<Vec<DailySupplyDemand>, _>>()?;
        Ok(Some(rows))
    }

    /// 원격 조회 (`start..=end`).
    pub async fn fetch_remote(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> SyncResult<Vec<DailySupplyDemand>> {
        let mut rows: Vec<DailySupplyDemand> = self
            .ctx
            .gateway
            .call(
                MODULE,
                FUNC,
                vec![json!(ticker), json!(yyyymmdd(start)), json!(yyyymmdd(end))],
            )
            .await?;
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }

    /// 가장 최근 저장 거래일.
    pub async fn latest_date(&self, ticker: &str) -> Result<Option<NaiveDate>> {
        let (latest,): (Option<String>,) =
            sqlx::query_as("SELECT MAX(trade_date) FROM analysis_rows WHERE ticker = ?")
                .bind(ticker)
                .fetch_one(self.ctx.db.pool())
                .await?;
        Ok(latest.and_then(|d| d.parse().ok()))
    }

    /// 원격에서 받아 둔 가장 이른 시작일.
    pub async fn covered_from(&self, ticker: &str) -> Result<Option<NaiveDate>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT covered_from FROM analysis_coverage WHERE ticker = ?")
                .bind(ticker)
                .fetch_optional(self.ctx.db.pool())
                .await?;
        Ok(row.and_then(|(d,)| d.parse().ok()))
    }

    /// `start`부터 오늘까지 받아 두었음을 기록합니다 (더 이른 기록은 유지).
    async fn extend_coverage(&self, ticker: &str, start: NaiveDate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analysis_coverage (ticker, covered_from) VALUES (?, ?)
            ON CONFLICT (ticker)
            DO UPDATE SET covered_from = MIN(covered_from, excluded.covered_from)
            "#,
        )
        .bind(ticker)
        .bind(start.to_string())
        .execute(self.ctx.db.pool())
        .await?;
        Ok(())
    }

    /// 증분 동기화.
    ///
    /// `lookback_days` 기간을 아직 받아 두지 않았으면 그 기간 전체를 가져오고,
    /// 아니면 마지막 저장 거래일 다음 날부터 가져옵니다.
    #[instrument(skip(self))]
    pub async fn sync_incremental(
        &self,
        ticker: &str,
        lookback_days: u32,
    ) -> SyncResult<IncrementalSync> {
        let today = self.ctx.today();
        let window_start = today - Days::new(u64::from(lookback_days));
        let latest = self.latest_date(ticker).await?;
        let covered = self.covered_from(ticker).await?;

        let start = match (latest, covered) {
            (Some(date), Some(from)) if from <= window_start => date + Days::new(1),
            _ => window_start,
        };

        if start > today {
            debug!("Analysis already up to date");
            self.touch(ticker).await?;
            return Ok(IncrementalSync::UpToDate);
        }

        let rows = match self.fetch_remote(ticker, start, today).await {
            Ok(rows) => rows,
            Err(SyncError::NoData(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        let new_rows: Vec<DailySupplyDemand> =
            rows.into_iter().filter(|r| r.date >= start).collect();

        self.store_rows(ticker, &new_rows).await?;
        if start == window_start {
            self.extend_coverage(ticker, window_start).await?;
        }
        self.touch(ticker).await?;
        debug!(new_rows = new_rows.len(), "Analysis synced");
        Ok(IncrementalSync::Fetched(new_rows.len()))
    }

    async fn store_rows(&self, ticker: &str, rows: &[DailySupplyDemand]) -> Result<()> {
        let now = self.ctx.now_ms();
        let mut tx = self.ctx.db.pool().begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO analysis_rows (ticker, trade_date, payload, cached_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (ticker, trade_date)
                DO UPDATE SET payload = excluded.payload, cached_at = excluded.cached_at
                "#,
            )
            .bind(ticker)
            .bind(row.date.to_string())
            .bind(serde_json::to_string(row)?)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// 원격 확인을 마친 종목의 캐시 시각 갱신.
    async fn touch(&self, ticker: &str) -> Result<()> {
        sqlx::query("UPDATE analysis_rows SET cached_at = ? WHERE ticker = ?")
            .bind(self.ctx.now_ms())
            .bind(ticker)
            .execute(self.ctx.db.pool())
            .await?;
        Ok(())
    }

    /// 종목 캐시 삭제.
    pub async fn invalidate(&self, ticker: &str) -> Result<u64> {
        let mut tx = self.ctx.db.pool().begin().await?;
        let result = sqlx::query("DELETE FROM analysis_rows WHERE ticker = ?")
            .bind(ticker)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM analysis_coverage WHERE ticker = ?")
            .bind(ticker)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn evict(&self, ticker: &str) {
        if let Err(e) = self.invalidate(ticker).await {
            warn!(ticker, error = %e, "Failed to evict analysis rows");
        }
    }
}

#[async_trait]
impl CacheDomain for AnalysisRepository {
    fn name(&self) -> &'static str {
        "analysis"
    }

    async fn stats(&self) -> Result<CacheStats> {
        let (count, last): (i64, Option<i64>) =
            sqlx::query_as("SELECT COUNT(DISTINCT ticker), MAX(cached_at) FROM analysis_rows")
                .fetch_one(self.ctx.db.pool())
                .await?;
        Ok(CacheStats::new(count, last, self.ctx.now_ms(), self.ctx.ttl))
    }

    async fn clear(&self) -> Result<u64> {
        let mut tx = self.ctx.db.pool().begin().await?;
        let result = sqlx::query("DELETE FROM analysis_rows").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM analysis_coverage").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
