//! 에러 타입 정의.

use kstock_core::SyncError;
use kstock_data::DataError;
use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 로컬 저장소 에러
    #[error("Storage error: {0}")]
    Storage(#[from] DataError),

    /// 동기화 에러 (원격 호출, 인증 등)
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

impl CollectorError {
    /// 사용자 표시용 메시지.
    pub fn user_message(&self) -> String {
        match self {
            Self::Sync(e) => e.user_message().to_string(),
            other => other.to_string(),
        }
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
