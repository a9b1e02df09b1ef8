//! 종목 마스터 저장소 (`stocks` 테이블).

use super::{CacheDomain, RepositoryContext};
use crate::cache::{is_expired, CacheStats};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kstock_core::{is_valid_ticker, Market, StockInfo, SyncError, SyncResult};
use serde_json::json;
use sqlx::FromRow;
use tracing::{debug, info, instrument, warn};

const MODULE: &str = "stock";
const FUNC_ALL: &str = "get_all_stocks";
const FUNC_ONE: &str = "get_stock_info";
/// `sync_markers`에 기록하는 전체 교체 시각 이름.
const LIST_MARKER: &str = "stock_list";

/// 시장 우선순위 → 종목명 → 종목코드 정렬 (`StockInfo::priority_cmp`와 동일).
const PRIORITY_ORDER: &str = "CASE market WHEN 'KOSPI' THEN 0 WHEN 'KOSDAQ' THEN 1 \
     WHEN 'KONEX' THEN 2 ELSE 3 END, name, ticker";

#[derive(Debug, Clone, FromRow)]
struct StockRow {
    ticker: String,
    name: String,
    market: String,
    cached_at: i64,
}

impl StockRow {
    fn into_info(self) -> StockInfo {
        StockInfo::new(self.ticker, self.name, Market::parse(&self.market))
    }
}

/// 종목 마스터 저장소.
pub struct StockRepository {
    ctx: RepositoryContext,
}

impl StockRepository {
    pub fn new(ctx: RepositoryContext) -> Self {
        Self { ctx }
    }

    /// 종목 조회 (캐시 우선).
    #[instrument(skip(self))]
    pub async fn get(&self, ticker: &str) -> SyncResult<StockInfo> {
        if !is_valid_ticker(ticker) {
            return Err(SyncError::InvalidArgument(format!(
                "잘못된 종목코드: {}",
                ticker
            )));
        }

        if let Some(info) = self.cached(ticker).await {
            debug!("Stock cache hit");
            return Ok(info);
        }

        let info = self.fetch_remote(ticker).await?;
        if let Err(e) = self.upsert(&info).await {
            warn!(error = %e, "Failed to cache stock");
        }
        Ok(info)
    }

    async fn cached(&self, ticker: &str) -> Option<StockInfo> {
        let row: Option<StockRow> = match sqlx::query_as(
            "SELECT ticker, name, market, cached_at FROM stocks WHERE ticker = ?",
        )
        .bind(ticker)
        .fetch_optional(self.ctx.db.pool())
        .await
        {
            Ok(row) => row,
            Err(e) => {
                warn!(ticker, error = %e, "Stock cache read failed, treating as miss");
                return None;
            }
        };

        let row = row?;
        if is_expired(row.cached_at, self.ctx.now_ms(), self.ctx.ttl) {
            debug!(ticker, "Stock cache entry expired");
            if let Err(e) = self.invalidate(ticker).await {
                warn!(ticker, error = %e, "Failed to evict stale stock");
            }
            return None;
        }
        Some(row.into_info())
    }

    /// 원격에서 단일 종목 조회.
    pub async fn fetch_remote(&self, ticker: &str) -> SyncResult<StockInfo> {
        self.ctx
            .gateway
            .call(MODULE, FUNC_ONE, vec![json!(ticker)])
            .await
    }

    /// 원격에서 전체 종목 목록 조회.
    #[instrument(skip(self))]
    pub async fn fetch_all_remote(&self) -> SyncResult<Vec<StockInfo>> {
        let stocks: Vec<StockInfo> = self.ctx.gateway.call(MODULE, FUNC_ALL, vec![]).await?;
        info!(count = stocks.len(), "Fetched stock list");
        Ok(stocks)
    }

    async fn upsert(&self, info: &StockInfo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stocks (ticker, name, market, cached_at) VALUES (?, ?, ?, ?)
            ON CONFLICT (ticker)
            DO UPDATE SET name = excluded.name, market = excluded.market, cached_at = excluded.cached_at
            "#,
        )
        .bind(&info.ticker)
        .bind(&info.name)
        .bind(info.market.as_str())
        .bind(self.ctx.now_ms())
        .execute(self.ctx.db.pool())
        .await?;
        Ok(())
    }

    /// 전체 교체: 기존 행을 모두 지우고 새 목록을 저장합니다 (단일 트랜잭션).
    #[instrument(skip(self, stocks), fields(count = stocks.len()))]
    pub async fn replace_all(&self, stocks: &[StockInfo]) -> Result<usize> {
        let now = self.ctx.now_ms();
        let mut tx = self.ctx.db.pool().begin().await?;

        sqlx::query("DELETE FROM stocks").execute(&mut *tx).await?;
        for stock in stocks {
            sqlx::query(
                "INSERT OR REPLACE INTO stocks (ticker, name, market, cached_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&stock.ticker)
            .bind(&stock.name)
            .bind(stock.market.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(
            r#"
            INSERT INTO sync_markers (name, synced_at) VALUES (?, ?)
            ON CONFLICT (name) DO UPDATE SET synced_at = excluded.synced_at
            "#,
        )
        .bind(LIST_MARKER)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Stock list replaced");
        Ok(stocks.len())
    }

    /// 캐시된 종목 검색 (종목코드 접두사 또는 종목명 부분 일치).
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<StockInfo>> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT ticker, name, market, cached_at FROM stocks \
             WHERE substr(ticker, 1, length(?1)) = ?1 OR instr(name, ?1) > 0 \
             ORDER BY {} LIMIT ?2",
            PRIORITY_ORDER
        );
        let rows: Vec<StockRow> = sqlx::query_as(&sql)
            .bind(query)
            .bind(limit as i64)
            .fetch_all(self.ctx.db.pool())
            .await?;
        Ok(rows.into_iter().map(StockRow::into_info).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stocks")
            .fetch_one(self.ctx.db.pool())
            .await?;
        Ok(count)
    }

    /// 마지막 전체 교체([`Self::replace_all`]) 시각. 단건 조회 캐시는 반영하지 않습니다.
    pub async fn last_replaced_at(&self) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<(i64,)> =
            sqlx::query_as("SELECT synced_at FROM sync_markers WHERE name = ?")
                .bind(LIST_MARKER)
                .fetch_optional(self.ctx.db.pool())
                .await?;
        Ok(latest.and_then(|(at,)| DateTime::from_timestamp_millis(at)))
    }

    /// 우선순위 상위 `n`개 종목코드.
    pub async fn top_tickers(&self, n: usize) -> Result<Vec<String>> {
        let sql = format!("SELECT ticker FROM stocks ORDER BY {} LIMIT ?", PRIORITY_ORDER);
        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(n as i64)
            .fetch_all(self.ctx.db.pool())
            .await?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    /// 단일 종목 캐시 삭제.
    pub async fn invalidate(&self, ticker: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM stocks WHERE ticker = ?")
            .bind(ticker)
            .execute(self.ctx.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CacheDomain for StockRepository {
    fn name(&self) -> &'static str {
        "stocks"
    }

    async fn stats(&self) -> Result<CacheStats> {
        let (count, last): (i64, Option<i64>) =
            sqlx::query_as("SELECT COUNT(*), MAX(cached_at) FROM stocks")
                .fetch_one(self.ctx.db.pool())
                .await?;
        Ok(CacheStats::new(count, last, self.ctx.now_ms(), self.ctx.ttl))
    }

    async fn clear(&self) -> Result<u64> {
        let mut tx = self.ctx.db.pool().begin().await?;
        let result = sqlx::query("DELETE FROM stocks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM sync_markers WHERE name = ?")
            .bind(LIST_MARKER)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
