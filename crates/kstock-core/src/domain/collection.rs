//! 다건 수집 결과 집계.
//!
//! 일부 항목 실패는 에러가 아니라 `Partial` 종료 상태로 표현합니다.

use serde::{Deserialize, Serialize};

/// 수집 실행 결과 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStatus {
    Success,
    Partial,
    Failed,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Success => "SUCCESS",
            CollectionStatus::Partial => "PARTIAL",
            CollectionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(CollectionStatus::Success),
            "PARTIAL" => Some(CollectionStatus::Partial),
            "FAILED" => Some(CollectionStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 항목별 수집 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Success { item: String },
    Failure { item: String, message: String },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success { .. })
    }
}

/// 실행 단위 집계 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionResult {
    pub status: CollectionStatus,
    pub success_count: usize,
    pub failed_count: usize,
    pub error_message: Option<String>,
}

impl CollectionResult {
    /// 항목별 결과를 집계합니다.
    ///
    /// - 전부 성공 (0건 포함) → `Success`
    /// - 일부 실패 → `Partial`
    /// - 전부 실패 → `Failed`
    pub fn from_outcomes(outcomes: &[ItemOutcome]) -> Self {
        let success_count = outcomes.iter().filter(|o| o.is_success()).count();
        let failures: Vec<(&String, &String)> = outcomes
            .iter()
            .filter_map(|o| match o {
                ItemOutcome::Failure { item, message } => Some((item, message)),
                ItemOutcome::Success { .. } => None,
            })
            .collect();
        let failed_count = failures.len();

        let status = if failed_count == 0 {
            CollectionStatus::Success
        } else if success_count == 0 {
            CollectionStatus::Failed
        } else {
            CollectionStatus::Partial
        };

        let error_message = failures.first().map(|(item, message)| {
            format!(
                "{}건 실패 (첫 실패: {} - {})",
                failed_count, item, message
            )
        });

        Self {
            status,
            success_count,
            failed_count,
            error_message,
        }
    }

    /// 실행 자체가 실패한 경우 (예: 대상 목록 조회 실패).
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: CollectionStatus::Failed,
            success_count: 0,
            failed_count: 0,
            error_message: Some(message.into()),
        }
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failed_count
    }
}

/// 다건 처리 진행 상황 `(current, total)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionProgress {
    pub current: usize,
    pub total: usize,
}

impl CollectionProgress {
    pub fn new(current: usize, total: usize) -> Self {
        Self { current, total }
    }

    /// 진행률 (%).
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(item: &str) -> ItemOutcome {
        ItemOutcome::Success {
            item: item.to_string(),
        }
    }

    fn fail(item: &str) -> ItemOutcome {
        ItemOutcome::Failure {
            item: item.to_string(),
            message: "Network error: reset".to_string(),
        }
    }

    #[test]
    fn test_all_success() {
        let result = CollectionResult::from_outcomes(&[ok("069500"), ok("102110")]);
        assert_eq!(result.status, CollectionStatus::Success);
        assert_eq!(result.success_count, 2);
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_empty_is_success() {
        let result = CollectionResult::from_outcomes(&[]);
        assert_eq!(result.status, CollectionStatus::Success);
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_partial() {
        let result = CollectionResult::from_outcomes(&[ok("069500"), fail("102110"), ok("229200")]);
        assert_eq!(result.status, CollectionStatus::Partial);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failed_count, 1);
        let message = result.error_message.unwrap();
        assert!(message.contains("1건 실패"));
        assert!(message.contains("102110"));
    }

    #[test]
    fn test_all_failed() {
        let result = CollectionResult::from_outcomes(&[fail("069500")]);
        assert_eq!(result.status, CollectionStatus::Failed);
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(CollectionProgress::new(0, 0).percent(), 0.0);
        assert_eq!(CollectionProgress::new(5, 10).percent(), 50.0);
    }
}
