//! # KStock Collector
//!
//! 국내 주식 데이터 동기화 실행 계층입니다.
//!
//! - 동기화 오케스트레이터 (종목 목록 → 수급 분석 → ETF)
//! - ETF 구성종목 수집 (키워드 필터, 부분 실패 집계)
//! - 일일/수동 작업 스케줄러 (네트워크 확인, 지수 백오프)

pub mod app;
pub mod error;
pub mod etf;
pub mod orchestrator;
pub mod progress;
pub mod scheduler;
pub mod stats;

pub use app::App;
pub use error::{CollectorError, Result};
pub use etf::{EtfCollector, EtfFilter};
pub use orchestrator::{OrchestratorOptions, SyncOrchestrator, SyncRunReport};
pub use progress::ProgressReporter;
pub use scheduler::{JobScheduler, JobState, JobTrigger, NetworkMonitor, RetryPolicy, SyncJob};
pub use stats::CollectionStats;
