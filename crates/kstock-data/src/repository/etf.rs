//! ETF 목록 및 구성종목 저장소.
//!
//! - ETF 목록: `cache_entries` (도메인 `etf_list`)
//! - 구성종목: `etf_constituents`, 기준일별 스냅샷
//! - 수집 이력: `etf_collection_history`

use super::{CacheDomain, RepositoryContext};
use crate::cache::{is_expired, CacheKey, CacheStats, TtlCache};
use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use kstock_core::{
    is_valid_ticker, CollectionResult, CollectionStatus, EtfConstituent, EtfInfo, SyncError,
    SyncResult,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

const MODULE: &str = "etf";
const FUNC_LIST: &str = "get_etf_list";
const FUNC_CONSTITUENTS: &str = "get_constituents";

#[derive(Debug, Clone, FromRow)]
struct ConstituentRow {
    stock_ticker: String,
    stock_name: String,
    weight: String,
    shares: Option<i64>,
    amount: Option<i64>,
}

impl TryFrom<ConstituentRow> for EtfConstituent {
    type Error = DataError;

    fn try_from(row: ConstituentRow) -> Result<Self> {
        let weight = Decimal::from_str(&row.weight)
            .map_err(|e| DataError::InvalidData(format!("weight '{}': {}", row.weight, e)))?;
        Ok(EtfConstituent {
            stock_ticker: row.stock_ticker,
            stock_name: row.stock_name,
            weight,
            shares: row.shares,
            amount: row.amount,
        })
    }
}

/// ETF 수집 실행 이력.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtfCollectionRecord {
    pub id: i64,
    pub status: CollectionStatus,
    pub total_count: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CollectionRow {
    id: i64,
    status: String,
    total_count: i64,
    success_count: i64,
    failed_count: i64,
    error_message: Option<String>,
    started_at: i64,
    finished_at: i64,
}

impl TryFrom<CollectionRow> for EtfCollectionRecord {
    type Error = DataError;

    fn try_from(row: CollectionRow) -> Result<Self> {
        let status = CollectionStatus::parse(&row.status)
            .ok_or_else(|| DataError::InvalidData(format!("collection status '{}'", row.status)))?;
        let timestamp = |ms: i64| {
            DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| DataError::InvalidData(format!("timestamp {}", ms)))
        };
        Ok(EtfCollectionRecord {
            id: row.id,
            status,
            total_count: row.total_count,
            success_count: row.success_count,
            failed_count: row.failed_count,
            error_message: row.error_message,
            started_at: timestamp(row.started_at)?,
            finished_at: timestamp(row.finished_at)?,
        })
    }
}

/// ETF 저장소.
pub struct EtfRepository {
    ctx: RepositoryContext,
    list_cache: TtlCache<Vec<EtfInfo>>,
}

impl EtfRepository {
    pub fn new(ctx: RepositoryContext) -> Self {
        let list_cache = TtlCache::new(ctx.db.clone(), "etf_list", ctx.ttl, ctx.clock.clone());
        Self { ctx, list_cache }
    }

    fn list_key() -> CacheKey {
        CacheKey::new("all")
    }

    /// ETF 목록 (캐시 우선).
    pub async fn get_etf_list(&self) -> SyncResult<Vec<EtfInfo>> {
        self.list_cache
            .get_or_fetch(&Self::list_key(), || self.fetch_etf_list_remote())
            .await
    }

    /// 원격 ETF 목록.
    pub async fn fetch_etf_list_remote(&self) -> SyncResult<Vec<EtfInfo>> {
        self.ctx.gateway.call(MODULE, FUNC_LIST, vec![]).await
    }

    /// 원격 구성종목.
    pub async fn fetch_constituents_remote(&self, etf_ticker: &str) -> SyncResult<Vec<EtfConstituent>> {
        self.ctx
            .gateway
            .call(MODULE, FUNC_CONSTITUENTS, vec![json!(etf_ticker)])
            .await
    }

    /// 구성종목 (캐시 우선). 미스이면 원격 조회 후 오늘 기준일로 저장합니다.
    #[instrument(skip(self))]
    pub async fn get_constituents(&self, etf_ticker: &str) -> SyncResult<Vec<EtfConstituent>> {
        if !is_valid_ticker(etf_ticker) {
            return Err(SyncError::InvalidArgument(format!("잘못된 ETF 코드: {}", etf_ticker)));
        }

        match self.cached_constituents(etf_ticker).await {
            Ok(Some(rows)) => {
                debug!(rows = rows.len(), "Constituents cache hit");
                return Ok(rows);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Constituents cache unreadable, evicting");
                self.evict(etf_ticker).await;
            }
        }

        let rows = self.fetch_constituents_remote(etf_ticker).await?;
        if let Err(e) = self.save_constituents(etf_ticker, self.ctx.today(), &rows).await {
            warn!(error = %e, "Failed to cache constituents");
        }
        Ok(rows)
    }

    async fn cached_constituents(&self, etf_ticker: &str) -> Result<Option<Vec<EtfConstituent>>> {
        let latest: Option<(String, i64)> = sqlx::query_as(
            r#"
            SELECT base_date, MAX(cached_at) FROM etf_constituents
            WHERE etf_ticker = ?
            GROUP BY base_date ORDER BY base_date DESC LIMIT 1
            "#,
        )
        .bind(etf_ticker)
        .fetch_optional(self.ctx.db.pool())
        .await?;

        let Some((base_date, cached_at)) = latest else {
            return Ok(None);
        };
        if is_expired(cached_at, self.ctx.now_ms(), self.ctx.ttl) {
            debug!(etf_ticker, "Constituents cache expired");
            self.evict(etf_ticker).await;
            return Ok(None);
        }

        let rows: Vec<ConstituentRow> = sqlx::query_as(
            r#"
            SELECT stock_ticker, stock_name, weight, shares, amount FROM etf_constituents
            WHERE etf_ticker = ? AND base_date = ?
            ORDER BY CAST(weight AS REAL) DESC, stock_ticker
            "#,
        )
        .bind(etf_ticker)
        .bind(base_date)
        .fetch_all(self.ctx.db.pool())
        .await?;

        let constituents = rows
            .into_iter()
            .map(EtfConstituent::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(constituents))
    }

    /// 원격 조회 후 오늘 기준일로 저장 (수집용). 저장한 행 수를 반환합니다.
    pub async fn refresh_constituents(&self, etf_ticker: &str) -> SyncResult<usize> {
        let rows = self.fetch_constituents_remote(etf_ticker).await?;
        let saved = self
            .save_constituents(etf_ticker, self.ctx.today(), &rows)
            .await?;
        Ok(saved)
    }

    /// 기준일 구성종목 저장 (같은 기준일 기존 행은 교체).
    pub async fn save_constituents(
        &self,
        etf_ticker: &str,
        base_date: NaiveDate,
        rows: &[EtfConstituent],
    ) -> Result<usize> {
        let now = self.ctx.now_ms();
        let base_date = base_date.to_string();
        let mut tx = self.ctx.db.pool().begin().await?;

        sqlx::query("DELETE FROM etf_constituents WHERE etf_ticker = ? AND base_date = ?")
            .bind(etf_ticker)
            .bind(&base_date)
            .execute(&mut *tx)
            .await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO etf_constituents
                    (etf_ticker, base_date, stock_ticker, stock_name, weight, shares, amount, cached_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(etf_ticker)
            .bind(&base_date)
            .bind(&row.stock_ticker)
            .bind(&row.stock_name)
            .bind(row.weight.to_string())
            .bind(row.shares)
            .bind(row.amount)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(rows.len())
    }

    /// ETF 구성종목 캐시 삭제.
    pub async fn invalidate(&self, etf_ticker: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM etf_constituents WHERE etf_ticker = ?")
            .bind(etf_ticker)
            .execute(self.ctx.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn evict(&self, etf_ticker: &str) {
        if let Err(e) = self.invalidate(etf_ticker).await {
            warn!(etf_ticker, error = %e, "Failed to evict constituents");
        }
    }

    /// 수집 실행 결과 기록.
    pub async fn record_collection(
        &self,
        result: &CollectionResult,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Result<i64> {
        let done = sqlx::query(
            r#"
            INSERT INTO etf_collection_history
                (status, total_count, success_count, failed_count, error_message, started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.status.as_str())
        .bind(result.total() as i64)
        .bind(result.success_count as i64)
        .bind(result.failed_count as i64)
        .bind(&result.error_message)
        .bind(started_at.timestamp_millis())
        .bind(finished_at.timestamp_millis())
        .execute(self.ctx.db.pool())
        .await?;

        info!(status = %result.status, "ETF collection recorded");
        Ok(done.last_insert_rowid())
    }

    /// 최근 수집 이력 (최신순).
    pub async fn recent_collections(&self, limit: usize) -> Result<Vec<EtfCollectionRecord>> {
        let rows: Vec<CollectionRow> = sqlx::query_as(
            r#"
            SELECT id, status, total_count, success_count, failed_count, error_message, started_at, finished_at
            FROM etf_collection_history
            ORDER BY started_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.ctx.db.pool())
        .await?;

        rows.into_iter().map(EtfCollectionRecord::try_from).collect()
    }
}

#[async_trait]
impl CacheDomain for EtfRepository {
    fn name(&self) -> &'static str {
        "etf"
    }

    async fn stats(&self) -> Result<CacheStats> {
        let (count, last): (i64, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(DISTINCT etf_ticker), MAX(cached_at) FROM etf_constituents",
        )
        .fetch_one(self.ctx.db.pool())
        .await?;
        Ok(CacheStats::new(count, last, self.ctx.now_ms(), self.ctx.ttl))
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM etf_constituents")
            .execute(self.ctx.db.pool())
            .await?;
        let listed = self.list_cache.clear().await?;
        Ok(result.rows_affected() + listed)
    }
}
