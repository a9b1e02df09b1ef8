//! 동기화 이력 및 스케줄 설정 타입.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 동기화 실행 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncType {
    /// 일일 스케줄 실행
    Scheduled,
    /// 사용자 요청 실행
    Manual,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::Scheduled => "SCHEDULED",
            SyncType::Manual => "MANUAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SCHEDULED" => Some(SyncType::Scheduled),
            "MANUAL" => Some(SyncType::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 동기화 이력 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    InProgress,
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::InProgress => "IN_PROGRESS",
            SyncStatus::Success => "SUCCESS",
            SyncStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN_PROGRESS" => Some(SyncStatus::InProgress),
            "SUCCESS" => Some(SyncStatus::Success),
            "FAILED" => Some(SyncStatus::Failed),
            _ => None,
        }
    }

    /// 종료 상태인지 확인.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncStatus::InProgress)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 동기화 이력 레코드.
///
/// 시작 시 `InProgress`로 생성되고, 종료 시 정확히 한 번 종료 상태로 갱신됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistoryRecord {
    pub id: i64,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    /// 저장된 종목 수
    pub stock_count: i64,
    /// 수급 분석이 갱신된 종목 수
    pub analysis_count: i64,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub synced_at: DateTime<Utc>,
}

/// 동기화 종료 시 기록할 값.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCompletion {
    pub status: SyncStatus,
    pub stock_count: i64,
    pub analysis_count: i64,
    pub error_message: Option<String>,
    pub duration_ms: i64,
}

/// 일일 동기화 스케줄 설정 (단일 레코드).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub is_enabled: bool,
    /// 실행 시 (KST, 0-23)
    pub sync_hour: u32,
    /// 실행 분 (0-59)
    pub sync_minute: u32,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: Option<String>,
    pub last_sync_message: Option<String>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            is_enabled: true,
            sync_hour: 6,
            sync_minute: 0,
            last_sync_at: None,
            last_sync_status: None,
            last_sync_message: None,
        }
    }
}

/// 시/분 범위 확인.
pub fn is_valid_time_of_day(hour: u32, minute: u32) -> bool {
    hour < 24 && minute < 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [SyncStatus::InProgress, SyncStatus::Success, SyncStatus::Failed] {
            assert_eq!(SyncStatus::parse(status.as_str()), Some(status));
        }
        assert!(!SyncStatus::InProgress.is_terminal());
        assert!(SyncStatus::Failed.is_terminal());
    }

    #[test]
    fn test_sync_type_parse() {
        assert_eq!(SyncType::parse("MANUAL"), Some(SyncType::Manual));
        assert_eq!(SyncType::parse("manual"), None);
    }

    #[test]
    fn test_time_of_day_validation() {
        assert!(is_valid_time_of_day(0, 0));
        assert!(is_valid_time_of_day(23, 59));
        assert!(!is_valid_time_of_day(24, 0));
        assert!(!is_valid_time_of_day(6, 60));
    }
}
