//! 시간 추상화.
//!
//! 만료/신선도 판단을 하는 모든 컴포넌트는 [`Clock`]을 주입받습니다.
//! 운영 환경에서는 [`SystemClock`], 테스트에서는 [`ManualClock`]을 사용합니다.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// 현재 시각 제공자.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// 현재 UTC 시각.
    fn now(&self) -> DateTime<Utc>;

    /// 현재 시각 (epoch 밀리초).
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// 시스템 시계.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 수동으로 조작하는 시계 (테스트용).
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// 주어진 시각에서 시작하는 시계 생성.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// 시계를 앞으로 이동.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }

    /// 시각 직접 설정.
    pub fn set(&self, to: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 공유 시계 핸들.
pub type SharedClock = Arc<dyn Clock>;

/// 기본 시스템 시계 핸들 생성.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
