//! 시장 지표 저장소 (고객예탁금, 신용잔고 등).

use super::{CacheDomain, RepositoryContext};
use crate::cache::{CacheKey, CacheStats, TtlCache};
use crate::error::Result;
use async_trait::async_trait;
use kstock_core::{MarketIndicatorRow, MarketIndicators, SyncError, SyncResult};
use serde_json::json;
use tracing::instrument;

const MODULE: &str = "market";
const FUNC: &str = "get_market_indicators";

pub struct MarketRepository {
    ctx: RepositoryContext,
    cache: TtlCache<MarketIndicators>,
}

impl MarketRepository {
    pub fn new(ctx: RepositoryContext) -> Self {
        let cache = TtlCache::new(ctx.db.clone(), "market", ctx.ttl, ctx.clock.clone());
        Self { ctx, cache }
    }

    /// 시장 지표 조회 (캐시 우선). `market`은 "KOSPI" 또는 "KOSDAQ".
    #[instrument(skip(self))]
    pub async fn get_market_indicators(&self, market: &str, days: u32) -> SyncResult<MarketIndicators> {
        let market = market.trim().to_ascii_uppercase();
        if market != "KOSPI" && market != "KOSDAQ" {
            return Err(SyncError::InvalidArgument(format!("지원하지 않는 시장: {}", market)));
        }
        if days == 0 {
            return Err(SyncError::InvalidArgument("조회 기간은 1일 이상이어야 합니다".to_string()));
        }

        let key = CacheKey::new(&market).with(days);
        self.cache
            .get_or_fetch(&key, || self.fetch_remote(&market, days))
            .await
    }

    pub async fn fetch_remote(&self, market: &str, days: u32) -> SyncResult<MarketIndicators> {
        let mut rows: Vec<MarketIndicatorRow> = self
            .ctx
            .gateway
            .call(MODULE, FUNC, vec![json!(market), json!(days)])
            .await?;
        rows.sort_by_key(|r| r.date);
        Ok(MarketIndicators {
            market: market.to_string(),
            rows,
        })
    }

    /// 시장별 캐시 삭제.
    pub async fn invalidate(&self, market: &str) -> Result<u64> {
        self.cache
            .delete_prefix(&CacheKey::new(market.to_ascii_uppercase()).prefix())
            .await
    }
}

#[async_trait]
impl CacheDomain for MarketRepository {
    fn name(&self) -> &'static str {
        "market"
    }

    async fn stats(&self) -> Result<CacheStats> {
        self.cache.stats().await
    }

    async fn clear(&self) -> Result<u64> {
        self.cache.clear().await
    }
}
