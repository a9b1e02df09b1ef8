//! 조건검색 저장소.
//!
//! 조건식 목록만 캐시합니다. 검색 결과는 시점마다 달라지므로 항상 원격 호출합니다.

use super::{CacheDomain, RepositoryContext};
use crate::cache::{CacheKey, CacheStats, TtlCache};
use crate::error::Result;
use async_trait::async_trait;
use kstock_core::{ConditionItem, ConditionResult, SyncError, SyncResult};
use serde_json::json;
use tracing::{info, instrument};

const MODULE: &str = "condition";
const FUNC_LIST: &str = "get_condition_list";
const FUNC_SEARCH: &str = "search";

pub struct ConditionRepository {
    ctx: RepositoryContext,
    cache: TtlCache<Vec<ConditionItem>>,
}

impl ConditionRepository {
    pub fn new(ctx: RepositoryContext) -> Self {
        let cache = TtlCache::new(ctx.db.clone(), "condition", ctx.ttl, ctx.clock.clone());
        Self { ctx, cache }
    }

    fn list_key() -> CacheKey {
        CacheKey::new("conditions")
    }

    /// 조건식 목록 (캐시 우선).
    pub async fn get_conditions(&self) -> SyncResult<Vec<ConditionItem>> {
        self.cache
            .get_or_fetch(&Self::list_key(), || async {
                self.ctx.gateway.call(MODULE, FUNC_LIST, vec![]).await
            })
            .await
    }

    /// 조건검색 실행 (캐시 없음).
    #[instrument(skip(self))]
    pub async fn search(&self, index: i32, name: &str) -> SyncResult<ConditionResult> {
        if index < 0 || name.trim().is_empty() {
            return Err(SyncError::InvalidArgument(format!(
                "잘못된 조건식: {} ({})",
                name, index
            )));
        }

        let tickers: Vec<String> = self
            .ctx
            .gateway
            .call(MODULE, FUNC_SEARCH, vec![json!(index), json!(name)])
            .await?;
        info!(count = tickers.len(), "Condition search completed");

        Ok(ConditionResult {
            condition: ConditionItem {
                index,
                name: name.to_string(),
            },
            tickers,
        })
    }

    pub async fn invalidate(&self) -> Result<bool> {
        self.cache.delete(&Self::list_key()).await
    }
}

#[async_trait]
impl CacheDomain for ConditionRepository {
    fn name(&self) -> &'static str {
        "condition"
    }

    async fn stats(&self) -> Result<CacheStats> {
        self.cache.stats().await
    }

    async fn clear(&self) -> Result<u64> {
        self.cache.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use chrono::{TimeZone, Utc};
    use kstock_core::ManualClock;
    use kstock_exchange::testing::{initialized_gateway, ScriptedBridge};
    use std::sync::Arc;

    async fn setup() -> (Arc<ScriptedBridge>, ConditionRepository) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
        let bridge = Arc::new(ScriptedBridge::new());
        let gateway = initialized_gateway(bridge.clone(), Arc::new(clock.clone())).await;
        let db = Database::in_memory().await.unwrap();
        (bridge.clone(), ConditionRepository::new(RepositoryContext::new(db, gateway, Arc::new(clock))))
    }

    #[tokio::test]
    async fn test_list_cached_search_live() {
        let (bridge, repo) = setup().await;
        bridge.on_ok(
            MODULE,
            FUNC_LIST,
            json!([{"index": 0, "name": "골든크로스"}, {"index": 1, "name": "외국인 순매수"}]),
        );
        bridge.on_ok(MODULE, FUNC_SEARCH, json!(["005930", "000660"]));

        let list = repo.get_conditions().await.unwrap();
        assert_eq!(list.len(), 2);
        repo.get_conditions().await.unwrap();
        assert_eq!(bridge.calls_to(MODULE, FUNC_LIST), 1);

        let first = repo.search(0, "골든크로스").await.unwrap();
        repo.search(0, "골든크로스").await.unwrap();
        assert_eq!(first.tickers, vec!["005930", "000660"]);
        assert_eq!(bridge.calls_to(MODULE, FUNC_SEARCH), 2);
    }

    #[tokio::test]
    async fn test_search_validation() {
        let (bridge, repo) = setup().await;
        assert!(matches!(
            repo.search(-1, "x").await,
            Err(SyncError::InvalidArgument(_))
        ));
        assert!(matches!(
            repo.search(0, "  ").await,
            Err(SyncError::InvalidArgument(_))
        ));
        assert_eq!(bridge.total_calls(), 0);
    }
}
