//! 설정 관리.
//!
//! TOML 파일과 `KSTOCK__` 접두사 환경 변수에서 설정을 로드합니다.
//!
//! ```text
//! KSTOCK__SCHEDULER__SYNC_HOUR=7
//! KSTOCK__BROKER__APP_KEY=PSxxxxxxxx
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::logging::{LogConfig, LogFormat};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 로컬 저장소 설정
    pub database: DatabaseConfig,
    /// 증권사 인증 설정
    pub broker: BrokerSettings,
    /// 분석 브릿지 설정
    pub bridge: BridgeSettings,
    /// 캐시 설정
    pub cache: CacheSettings,
    /// 동기화 설정
    pub sync: SyncSettings,
    /// ETF 수집 필터
    pub etf: EtfSettings,
    /// 스케줄러 설정
    pub scheduler: SchedulerSettings,
    /// 로깅 설정
    pub logging: LoggingSettings,
}

/// 로컬 SQLite 저장소 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// DB 파일 경로
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/kstock.db".to_string(),
        }
    }
}

/// 증권사(KIS) 인증 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// 앱키
    pub app_key: String,
    /// 앱시크릿
    pub app_secret: String,
    /// 환경 ("real" | "paper")
    pub environment: String,
    /// 토큰 발급 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            app_secret: String::new(),
            environment: "paper".to_string(),
            timeout_secs: 30,
        }
    }
}

/// 분석 브릿지 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// 브릿지 서버 기본 URL
    pub base_url: String,
    /// 호출당 타임아웃 (밀리초)
    pub timeout_ms: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8765".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl BridgeSettings {
    /// 호출 타임아웃.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 캐시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// 데이터 캐시 TTL (시간)
    pub ttl_hours: i64,
    /// 토큰 만료 전 갱신 여유 시간 (분)
    pub credential_buffer_minutes: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            credential_buffer_minutes: 5,
        }
    }
}

impl CacheSettings {
    /// 데이터 캐시 TTL.
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours)
    }

    /// 토큰 갱신 여유 시간.
    pub fn credential_buffer(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.credential_buffer_minutes)
    }
}

/// 동기화 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSettings {
    /// 저장할 최대 종목 수
    pub max_stock_count: usize,
    /// 수급 분석 대상 상위 종목 수
    pub analysis_top_n: usize,
    /// 수급 분석 배치 크기
    pub analysis_batch_size: usize,
    /// 최초 수집 시 조회 기간 (일)
    pub analysis_lookback_days: i64,
    /// 보관할 동기화 이력 수
    pub history_limit: usize,
    /// 배치 간 딜레이 (밀리초)
    pub request_delay_ms: u64,
    /// 전체 동기화에 ETF 수집 포함 여부
    pub include_etf: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_stock_count: 5_000,
            analysis_top_n: 100,
            analysis_batch_size: 10,
            analysis_lookback_days: 365,
            history_limit: 50,
            request_delay_ms: 200,
            include_etf: false,
        }
    }
}

impl SyncSettings {
    /// 배치 간 딜레이.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// ETF 수집 키워드 필터.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EtfSettings {
    /// 이름에 하나라도 포함되어야 하는 키워드 (비어 있으면 전체)
    pub include_keywords: Vec<String>,
    /// 이름에 포함되면 제외하는 키워드
    pub exclude_keywords: Vec<String>,
}

/// 스케줄러 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// 일일 동기화 시 (KST)
    pub sync_hour: u32,
    /// 일일 동기화 분 (KST)
    pub sync_minute: u32,
    /// 최대 시도 횟수
    pub max_attempts: u32,
    /// 첫 재시도 대기 (초)
    pub initial_backoff_secs: u64,
    /// 최대 재시도 대기 (초)
    pub max_backoff_secs: u64,
    /// 네트워크 미연결 시 재확인 주기 (초)
    pub network_poll_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            sync_hour: 6,
            sync_minute: 0,
            max_attempts: 3,
            initial_backoff_secs: 30,
            max_backoff_secs: 900,
            network_poll_secs: 30,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingSettings {
    /// [`LogConfig`]로 변환.
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig::new(self.level.clone()).with_format(self.format)
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }

    /// 기본값과 환경 변수만으로 설정을 구성합니다.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix("KSTOCK")
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("etf.include_keywords")
        .with_list_parse_key("etf.exclude_keywords")
        .try_parsing(true)
}
