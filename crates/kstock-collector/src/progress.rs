//! 다건 처리 진행 상황 보고.
//!
//! `watch` 채널로 최신 `(current, total)`만 유지하므로 구독자는 블로킹 없이 읽습니다.

use kstock_core::CollectionProgress;
use std::sync::Arc;
use tokio::sync::watch;

/// 진행 상황 송신기.
///
/// 한 단계 안에서 `current`는 감소하지 않습니다.
#[derive(Clone)]
pub struct ProgressReporter {
    tx: Arc<watch::Sender<CollectionProgress>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CollectionProgress::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<CollectionProgress> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> CollectionProgress {
        *self.tx.borrow()
    }

    /// 새 단계 시작: `(0, total)`로 초기화.
    pub fn start(&self, total: usize) {
        self.tx.send_replace(CollectionProgress::new(0, total));
    }

    /// 진행 보고. 이전 값보다 작은 `current`는 무시합니다.
    pub fn advance(&self, current: usize) {
        self.tx.send_if_modified(|progress| {
            let current = current.min(progress.total);
            if current <= progress.current {
                return false;
            }
            progress.current = current;
            true
        });
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let reporter = ProgressReporter::new();
        let rx = reporter.subscribe();

        reporter.start(10);
        reporter.advance(3);
        reporter.advance(2);
        assert_eq!(*rx.borrow(), CollectionProgress::new(3, 10));

        reporter.advance(15);
        assert_eq!(reporter.current(), CollectionProgress::new(10, 10));

        // 새 단계는 초기화
        reporter.start(4);
        assert_eq!(reporter.current(), CollectionProgress::new(0, 4));
    }

    #[tokio::test]
    async fn test_subscriber_sees_changes() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();
        reporter.start(2);
        reporter.advance(1);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), CollectionProgress::new(1, 2));
    }
}
