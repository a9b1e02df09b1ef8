//! 지수 백오프 재시도 정책.

use kstock_core::{SchedulerSettings, SyncError};
use std::time::Duration;

/// 재시도 정책.
///
/// `n`번째 실패(1부터) 후 대기 시간은 `initial_backoff * 2^(n-1)`이며 `max_backoff`를 넘지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&SchedulerSettings::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    pub fn from_settings(settings: &SchedulerSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_secs(settings.initial_backoff_secs),
            Duration::from_secs(settings.max_backoff_secs),
        )
    }

    /// `attempt`번째 실패 후 대기 시간.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// 다음 시도까지 대기 시간. 재시도하지 않으면 `None`.
    pub fn next_delay(&self, attempt: u32, error: &SyncError) -> Option<Duration> {
        if !error.is_retryable() || attempt >= self.max_attempts {
            return None;
        }
        Some(self.backoff(attempt))
    }
}
