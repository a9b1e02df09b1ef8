//! TTL 기반 로컬 캐시.
//!
//! # 읽기 경로
//!
//! 1. 키로 조회 → 없으면 미스
//! 2. `now - cached_at >= TTL`이면 미스로 처리하고 행을 즉시 삭제
//! 3. 역직렬화 실패도 만료와 동일하게 삭제 후 미스
//!
//! 별도의 GC 작업은 없습니다. TTL은 마지막 성공 조회 시점 기준이며 접근 시 연장되지 않습니다.

pub mod key;
pub mod ttl;

pub use key::CacheKey;
pub use ttl::TtlCache;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// 기본 캐시 유효 시간 (목록/분석/지표/시장 데이터 공통).
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// `cached_at`에 기록된 항목이 `now` 시점에 만료되었는지 확인.
pub fn is_expired(cached_at_ms: i64, now_ms: i64, ttl: Duration) -> bool {
    now_ms - cached_at_ms >= ttl.num_milliseconds()
}

/// 캐시 통계.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// 저장된 항목 수
    pub count: i64,
    /// 가장 최근 저장 시각 (epoch ms)
    pub last_updated_ms: Option<i64>,
    /// 가장 최근 항목 기준 만료 여부 (항목이 없으면 만료)
    pub is_expired: bool,
}

impl CacheStats {
    pub fn new(count: i64, last_updated_ms: Option<i64>, now_ms: i64, ttl: Duration) -> Self {
        let is_expired = match last_updated_ms {
            Some(at) if count > 0 => is_expired(at, now_ms, ttl),
            _ => true,
        };
        Self {
            count,
            last_updated_ms,
            is_expired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let ttl = Duration::hours(24);
        let t0 = 1_700_000_000_000;
        assert!(!is_expired(t0, t0, ttl));
        assert!(!is_expired(t0, t0 + ttl.num_milliseconds() - 1, ttl));
        assert!(is_expired(t0, t0 + ttl.num_milliseconds(), ttl));
    }

    #[test]
    fn test_stats_empty_is_expired() {
        let stats = CacheStats::new(0, None, 0, Duration::hours(24));
        assert!(stats.is_expired);

        let stats = CacheStats::new(3, Some(1_000), 2_000, Duration::hours(24));
        assert!(!stats.is_expired);
    }
}
