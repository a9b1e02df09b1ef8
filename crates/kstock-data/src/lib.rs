//! # KStock Data
//!
//! SQLite 기반 로컬 캐시와 도메인별 저장소.
//!
//! - [`storage::Database`]: 연결 풀과 스키마
//! - [`cache::TtlCache`]: 도메인/키 단위 TTL 캐시 (지연 삭제)
//! - [`repository`]: 종목, 수급 분석, 지표, 시장 지표, 조건검색, ETF,
//!   동기화 이력, 스케줄 설정

pub mod cache;
pub mod error;
pub mod repository;
pub mod storage;

pub use cache::{CacheKey, CacheStats, TtlCache};
pub use error::{DataError, Result};
pub use repository::{
    AnalysisRepository, CacheDomain, ConditionRepository, EtfCollectionRecord, EtfRepository, IncrementalSync,
    IndicatorRepository, MarketRepository, Repositories, RepositoryContext,
    SchedulingConfigRepository, StockRepository, SyncHistoryRepository,
};
pub use storage::Database;
