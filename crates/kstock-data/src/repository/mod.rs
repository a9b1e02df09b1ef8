//! 도메인별 저장소.
//!
//! 모든 조회 저장소는 캐시 우선입니다. 원격 호출 오류는 재시도 없이 그대로
//! 반환하며, 재시도는 스케줄러의 책임입니다.

pub mod analysis;
pub mod condition;
pub mod etf;
pub mod indicator;
pub mod market;
pub mod scheduling;
pub mod stock;
pub mod sync_history;

pub use analysis::{AnalysisRepository, IncrementalSync};
pub use condition::ConditionRepository;
pub use etf::{EtfCollectionRecord, EtfRepository};
pub use indicator::IndicatorRepository;
pub use market::MarketRepository;
pub use scheduling::SchedulingConfigRepository;
pub use stock::StockRepository;
pub use sync_history::SyncHistoryRepository;

use crate::cache::{CacheStats, DEFAULT_TTL_HOURS};
use crate::error::Result;
use crate::storage::Database;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use chrono_tz::Asia::Seoul;
use kstock_core::SharedClock;
use kstock_exchange::BridgeGateway;
use std::sync::Arc;

/// 저장소 공통 의존성.
#[derive(Clone)]
pub struct RepositoryContext {
    pub db: Database,
    pub gateway: Arc<BridgeGateway>,
    pub clock: SharedClock,
    pub ttl: Duration,
}

impl RepositoryContext {
    pub fn new(db: Database, gateway: Arc<BridgeGateway>, clock: SharedClock) -> Self {
        Self {
            db,
            gateway,
            clock,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.clock.now_millis()
    }

    /// 한국 시간 기준 오늘 날짜.
    pub(crate) fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&Seoul).date_naive()
    }
}

/// 통계 조회와 전체 삭제를 지원하는 캐시 도메인.
#[async_trait]
pub trait CacheDomain: Send + Sync {
    /// 표시용 도메인 이름.
    fn name(&self) -> &'static str;

    async fn stats(&self) -> Result<CacheStats>;

    /// 도메인의 모든 캐시 항목 삭제.
    async fn clear(&self) -> Result<u64>;
}

/// 모든 저장소 묶음.
pub struct Repositories {
    pub stocks: StockRepository,
    pub analysis: AnalysisRepository,
    pub indicators: IndicatorRepository,
    pub markets: MarketRepository,
    pub conditions: ConditionRepository,
    pub etfs: EtfRepository,
    pub history: SyncHistoryRepository,
    pub scheduling: SchedulingConfigRepository,
}

impl Repositories {
    pub fn new(ctx: RepositoryContext) -> Self {
        Self {
            stocks: StockRepository::new(ctx.clone()),
            analysis: AnalysisRepository::new(ctx.clone()),
            indicators: IndicatorRepository::new(ctx.clone()),
            markets: MarketRepository::new(ctx.clone()),
            conditions: ConditionRepository::new(ctx.clone()),
            etfs: EtfRepository::new(ctx.clone()),
            history: SyncHistoryRepository::new(ctx.db.clone(), ctx.clock.clone()),
            scheduling: SchedulingConfigRepository::new(ctx.db, ctx.clock),
        }
    }

    /// 통계를 제공하는 모든 캐시 도메인.
    pub fn cache_domains(&self) -> Vec<&dyn CacheDomain> {
        vec![
            &self.stocks,
            &self.analysis,
            &self.indicators,
            &self.markets,
            &self.conditions,
            &self.etfs,
        ]
    }
}
