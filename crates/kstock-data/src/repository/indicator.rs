//! 기술적 지표 저장소.

use super::{CacheDomain, RepositoryContext};
use crate::cache::{CacheKey, CacheStats, TtlCache};
use crate::error::Result;
use async_trait::async_trait;
use kstock_core::{
    is_valid_ticker, IndicatorKind, IndicatorPoint, IndicatorSeries, SyncError, SyncResult,
};
use serde_json::json;
use tracing::instrument;

const MODULE: &str = "indicator";
const FUNC: &str = "get_indicator";

/// 지표 저장소. 키 = 종목코드 + 지표 종류 + 조회 기간.
pub struct IndicatorRepository {
    ctx: RepositoryContext,
    cache: TtlCache<IndicatorSeries>,
}

impl IndicatorRepository {
    pub fn new(ctx: RepositoryContext) -> Self {
        let cache = TtlCache::new(ctx.db.clone(), "indicator", ctx.ttl, ctx.clock.clone());
        Self { ctx, cache }
    }

    fn key(ticker: &str, kind: IndicatorKind, days: u32) -> CacheKey {
        CacheKey::new(ticker).with(kind).with(days)
    }

    #[instrument(skip(self))]
    pub async fn get_indicator(
        &self,
        ticker: &str,
        kind: IndicatorKind,
        days: u32,
    ) -> SyncResult<IndicatorSeries> {
        if !is_valid_ticker(ticker) {
            return Err(SyncError::InvalidArgument(format!("잘못된 종목코드: {}", ticker)));
        }
        if days == 0 {
            return Err(SyncError::InvalidArgument("조회 기간은 1일 이상이어야 합니다".to_string()));
        }

        let key = Self::key(ticker, kind, days);
        self.cache
            .get_or_fetch(&key, || self.fetch_remote(ticker, kind, days))
            .await
    }

    /// 원격 지표 계산 요청.
    pub async fn fetch_remote(
        &self,
        ticker: &str,
        kind: IndicatorKind,
        days: u32,
    ) -> SyncResult<IndicatorSeries> {
        let points: Vec<IndicatorPoint> = self
            .ctx
            .gateway
            .call(MODULE, FUNC, vec![json!(ticker), json!(kind.as_str()), json!(days)])
            .await?;

        if points.is_empty() {
            return Err(SyncError::InsufficientData(format!(
                "{} {} 지표 계산에 필요한 데이터 부족",
                ticker, kind
            )));
        }

        Ok(IndicatorSeries {
            ticker: ticker.to_string(),
            kind,
            points,
        })
    }

    /// 종목의 모든 지표 캐시 삭제.
    pub async fn invalidate(&self, ticker: &str) -> Result<u64> {
        self.cache.delete_prefix(&CacheKey::new(ticker).prefix()).await
    }
}

#[async_trait]
impl CacheDomain for IndicatorRepository {
    fn name(&self) -> &'static str {
        "indicator"
    }

    async fn stats(&self) -> Result<CacheStats> {
        self.cache.stats().await
    }

    async fn clear(&self) -> Result<u64> {
        self.cache.clear().await
    }
}
