//! 도메인별 키-값 TTL 캐시 (`cache_entries` 테이블).

use super::{is_expired, CacheKey, CacheStats};
use crate::error::Result;
use crate::storage::Database;
use chrono::Duration;
use kstock_core::{SharedClock, SyncResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use tracing::{debug, warn};

/// 직렬화된 값을 도메인/키 단위로 저장하는 TTL 캐시.
pub struct TtlCache<V> {
    db: Database,
    domain: &'static str,
    ttl: Duration,
    clock: SharedClock,
    _value: PhantomData<fn() -> V>,
}

impl<V> TtlCache<V>
where
    V: Serialize + DeserializeOwned,
{
    pub fn new(db: Database, domain: &'static str, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            db,
            domain,
            ttl,
            clock,
            _value: PhantomData,
        }
    }

    pub fn domain(&self) -> &'static str {
        self.domain
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 항목이 현재 시점에 만료되었는지 확인.
    pub fn is_expired(&self, cached_at_ms: i64) -> bool {
        is_expired(cached_at_ms, self.clock.now_millis(), self.ttl)
    }

    /// 유효한 값 조회.
    ///
    /// 만료되었거나 역직렬화할 수 없는 항목은 삭제하고 `None`을 반환합니다.
    /// 저장소 오류도 미스로 처리합니다.
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        let row: Option<(String, i64)> = match sqlx::query_as(
            "SELECT payload, cached_at FROM cache_entries WHERE domain = ? AND cache_key = ?",
        )
        .bind(self.domain)
        .bind(key.as_str())
        .fetch_optional(self.db.pool())
        .await
        {
            Ok(row) => row,
            Err(e) => {
                warn!(domain = self.domain, key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let (payload, cached_at) = row?;

        if self.is_expired(cached_at) {
            debug!(domain = self.domain, key = %key, "Cache entry expired");
            self.evict(key).await;
            return None;
        }

        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(domain = self.domain, key = %key, error = %e, "Corrupt cache entry");
                self.evict(key).await;
                None
            }
        }
    }

    /// 값 저장 (insert-or-replace).
    ///
    /// 호출자는 이미 값을 가지고 있으므로 저장 실패는 로그만 남깁니다.
    pub async fn put(&self, key: &CacheKey, value: &V) {
        if let Err(e) = self.try_put(key, value).await {
            warn!(domain = self.domain, key = %key, error = %e, "Cache write failed");
        }
    }

    async fn try_put(&self, key: &CacheKey, value: &V) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO cache_entries (domain, cache_key, payload, cached_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (domain, cache_key)
            DO UPDATE SET payload = excluded.payload, cached_at = excluded.cached_at
            "#,
        )
        .bind(self.domain)
        .bind(key.as_str())
        .bind(payload)
        .bind(self.clock.now_millis())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// 캐시 우선 조회. 미스일 때만 `fetch`를 호출하고 결과를 저장합니다.
    ///
    /// `fetch` 오류는 그대로 반환하며 캐시는 변경하지 않습니다.
    pub async fn get_or_fetch<F, Fut>(&self, key: &CacheKey, fetch: F) -> SyncResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<V>>,
    {
        if let Some(value) = self.get(key).await {
            debug!(domain = self.domain, key = %key, "Cache hit");
            return Ok(value);
        }

        debug!(domain = self.domain, key = %key, "Cache miss, fetching");
        let value = fetch().await?;
        self.put(key, &value).await;
        Ok(value)
    }

    /// 키 삭제.
    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE domain = ? AND cache_key = ?")
            .bind(self.domain)
            .bind(key.as_str())
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 접두사로 시작하는 모든 키 삭제.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM cache_entries WHERE domain = ? AND substr(cache_key, 1, length(?)) = ?",
        )
        .bind(self.domain)
        .bind(prefix)
        .bind(prefix)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected())
    }

    /// 도메인 전체 삭제.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE domain = ?")
            .bind(self.domain)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// 도메인 통계.
    pub async fn stats(&self) -> Result<CacheStats> {
        let (count, last): (i64, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), MAX(cached_at) FROM cache_entries WHERE domain = ?",
        )
        .bind(self.domain)
        .fetch_one(self.db.pool())
        .await?;
        Ok(CacheStats::new(count, last, self.clock.now_millis(), self.ttl))
    }

    async fn evict(&self, key: &CacheKey) {
        if let Err(e) = self.delete(key).await {
            warn!(domain = self.domain, key = %key, error = %e, "Cache eviction failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kstock_core::{ManualClock, SyncError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn setup() -> (ManualClock, Database, TtlCache<Vec<String>>) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
        let db = Database::in_memory().await.unwrap();
        let cache = TtlCache::new(db.clone(), "test", Duration::hours(24), Arc::new(clock.clone()));
        (clock, db, cache)
    }

    async fn row_count(db: &Database) -> i64 {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cache_entries")
            .fetch_one(db.pool())
            .await
            .unwrap();
        n
    }

    #[tokio::test]
    async fn test_hit_before_ttl_miss_after() {
        let (clock, db, cache) = setup().await;
        let key = CacheKey::new("a");
        cache.put(&key, &vec!["x".to_string()]).await;

        clock.advance(Duration::hours(24) - Duration::milliseconds(1));
        assert_eq!(cache.get(&key).await, Some(vec!["x".to_string()]));

        clock.advance(Duration::milliseconds(1));
        assert_eq!(cache.get(&key).await, None);
        // 만료 항목은 읽는 시점에 삭제된다
        assert_eq!(row_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_evicted() {
        let (_clock, db, cache) = setup().await;
        sqlx::query(
            "INSERT INTO cache_entries (domain, cache_key, payload, cached_at) VALUES ('test', 'a', '{broken', ?)",
        )
        .bind(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap().timestamp_millis())
        .execute(db.pool())
        .await
        .unwrap();

        assert_eq!(cache.get(&CacheKey::new("a")).await, None);
        assert_eq!(row_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_get_or_fetch_only_on_miss() {
        let (clock, _db, cache) = setup().await;
        let key = CacheKey::new("list");
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, SyncError>(vec!["005930".to_string()])
        };

        cache.get_or_fetch(&key, fetch).await.unwrap();
        cache.get_or_fetch(&key, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::hours(25));
        cache.get_or_fetch(&key, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_leaves_cache_untouched() {
        let (_clock, db, cache) = setup().await;
        let err = cache
            .get_or_fetch(&CacheKey::new("a"), || async {
                Err(SyncError::Network("reset".to_string()))
            })
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(row_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_domains_are_isolated() {
        let (clock, db, cache) = setup().await;
        let other: TtlCache<Vec<String>> =
            TtlCache::new(db.clone(), "other", Duration::hours(24), Arc::new(clock));
        let key = CacheKey::new("same");

        cache.put(&key, &vec!["a".to_string()]).await;
        other.put(&key, &vec!["b".to_string()]).await;
        cache.clear().await.unwrap();

        assert_eq!(cache.get(&key).await, None);
        assert_eq!(other.get(&key).await, Some(vec!["b".to_string()]));
    }

    #[tokio::test]
    async fn test_delete_prefix_and_stats() {
        let (_clock, _db, cache) = setup().await;
        let parent = CacheKey::new("005930");
        cache.put(&parent.clone().with("rsi"), &vec![]).await;
        cache.put(&parent.clone().with("macd"), &vec![]).await;
        cache.put(&CacheKey::new("000660").with("rsi"), &vec![]).await;

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.count, 3);
        assert!(!stats.is_expired);

        assert_eq!(cache.delete_prefix(&parent.prefix()).await.unwrap(), 2);
        assert_eq!(cache.stats().await.unwrap().count, 1);
    }
}
