//! # KStock Core
//!
//! 국내 주식 데이터 동기화 엔진의 핵심 타입을 제공합니다.
//!
//! - 종목/수급/지표/ETF 도메인 모델
//! - 동기화 이력 및 스케줄 설정 모델
//! - 공통 에러 분류 ([`SyncError`])
//! - 시간 추상화 ([`Clock`])
//! - 설정 관리 및 로깅 인프라

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use config::*;
pub use domain::*;
pub use error::{ErrorKind, SyncError, SyncResult};
pub use logging::{init_logging, LogConfig, LogFormat};
