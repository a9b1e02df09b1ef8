//! 동기화 작업 스케줄러.
//!
//! - 일일 작업: 다음 실행 시각(KST)까지 초기 지연 후 24시간 주기
//! - 수동 작업: 새 요청이 진행 중인 수동 작업을 대체 (일일 작업은 유지)
//! - 네트워크 연결이 없으면 `Blocked` 상태로 대기
//! - 재시도 가능한 실패는 지수 백오프로 최대 시도 횟수까지 재시도
//!
//! 상태와 진행 상황은 `watch` 채널로 구독합니다.

pub mod network;
pub mod retry;

pub use network::{NetworkMonitor, StaticNetwork, TcpProbeMonitor};
pub use retry::RetryPolicy;

use crate::progress::ProgressReporter;
use async_trait::async_trait;
use chrono::{DateTime, Days, Utc};
use chrono_tz::Asia::Seoul;
use kstock_core::{
    is_valid_time_of_day, CollectionProgress, SchedulerSettings, SchedulingConfig, SharedClock,
    SyncError, SyncResult,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 일일 작업 주기.
pub const DAILY_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// 작업 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    Idle,
    Enqueued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Blocked,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::Cancelled)
    }
}

/// 작업 실행 계기.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTrigger {
    Daily,
    Manual,
}

/// 스케줄러가 실행하는 작업.
#[async_trait]
pub trait SyncJob: Send + Sync {
    async fn execute(&self, trigger: JobTrigger, progress: &ProgressReporter) -> SyncResult<()>;
}

/// `now` 이후 가장 가까운 `hour:minute` (KST).
///
/// 오늘 시각이 이미 지났거나 지금이면 내일입니다.
pub fn next_occurrence(now: DateTime<Utc>, hour: u32, minute: u32) -> SyncResult<DateTime<Utc>> {
    if !is_valid_time_of_day(hour, minute) {
        return Err(SyncError::InvalidArgument(format!(
            "잘못된 실행 시각: {:02}:{:02}",
            hour, minute
        )));
    }

    let today = now.with_timezone(&Seoul).date_naive();
    let at = |date: chrono::NaiveDate| {
        date.and_hms_opt(hour, minute, 0)
            .and_then(|naive| naive.and_local_timezone(Seoul).earliest())
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| SyncError::InvalidArgument(format!("{} {:02}:{:02}", date, hour, minute)))
    };

    let target = at(today)?;
    if target > now {
        return Ok(target);
    }
    let tomorrow = today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| SyncError::InvalidArgument(format!("날짜 범위 초과: {}", today)))?;
    at(tomorrow)
}

/// 다음 실행까지 초기 지연.
pub fn initial_delay(now: DateTime<Utc>, hour: u32, minute: u32) -> SyncResult<Duration> {
    let next = next_occurrence(now, hour, minute)?;
    Ok((next - now).to_std().unwrap_or_default())
}

struct JobHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl JobHandle {
    async fn cancel(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                error!(error = %e, "Scheduled job task panicked");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// 작업 실행기 (스폰된 태스크가 공유).
struct Worker {
    job: Arc<dyn SyncJob>,
    network: Arc<dyn NetworkMonitor>,
    policy: RetryPolicy,
    network_poll: Duration,
    state: watch::Sender<JobState>,
    progress: ProgressReporter,
}

impl Worker {
    fn set_state(&self, state: JobState) {
        self.state.send_replace(state);
    }

    /// 취소되면 `false`.
    async fn wait(&self, token: &CancellationToken, duration: Duration) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// 네트워크 확인 → 실행 → 실패 시 백오프 재시도.
    async fn run(&self, trigger: JobTrigger, token: &CancellationToken) -> JobState {
        let mut attempt = 0u32;
        loop {
            while !self.network.is_available().await {
                debug!(?trigger, "Network unavailable, job blocked");
                self.set_state(JobState::Blocked);
                if !self.wait(token, self.network_poll).await {
                    return JobState::Cancelled;
                }
            }

            attempt += 1;
            self.set_state(JobState::Running);
            info!(?trigger, attempt, "Sync job started");

            let result = tokio::select! {
                _ = token.cancelled() => return JobState::Cancelled,
                result = self.job.execute(trigger, &self.progress) => result,
            };

            let error = match result {
                Ok(()) => {
                    info!(?trigger, attempt, "Sync job succeeded");
                    return JobState::Succeeded;
                }
                Err(e) => e,
            };

            match self.policy.next_delay(attempt, &error) {
                Some(delay) => {
                    warn!(
                        ?trigger,
                        attempt,
                        error = %error,
                        retry_in_secs = delay.as_secs(),
                        "Sync job failed, retrying"
                    );
                    self.set_state(JobState::Enqueued);
                    if !self.wait(token, delay).await {
                        return JobState::Cancelled;
                    }
                }
                None => {
                    error!(?trigger, attempt, error = %error, "Sync job failed");
                    return JobState::Failed;
                }
            }
        }
    }

    async fn run_and_publish(&self, trigger: JobTrigger, token: &CancellationToken) -> JobState {
        let state = self.run(trigger, token).await;
        self.set_state(state);
        state
    }
}

/// 일일/수동 동기화 스케줄러.
pub struct JobScheduler {
    worker: Arc<Worker>,
    clock: SharedClock,
    daily: Mutex<Option<JobHandle>>,
    manual: tokio::sync::Mutex<Option<JobHandle>>,
}

impl JobScheduler {
    pub fn new(
        job: Arc<dyn SyncJob>,
        network: Arc<dyn NetworkMonitor>,
        policy: RetryPolicy,
        clock: SharedClock,
    ) -> Self {
        let (state, _) = watch::channel(JobState::Idle);
        Self {
            worker: Arc::new(Worker {
                job,
                network,
                policy,
                network_poll: Duration::from_secs(30),
                state,
                progress: ProgressReporter::new(),
            }),
            clock,
            daily: Mutex::new(None),
            manual: tokio::sync::Mutex::new(None),
        }
    }

    /// 설정값으로 생성.
    pub fn from_settings(
        job: Arc<dyn SyncJob>,
        network: Arc<dyn NetworkMonitor>,
        settings: &SchedulerSettings,
        clock: SharedClock,
    ) -> Self {
        Self::new(job, network, RetryPolicy::from_settings(settings), clock)
            .with_network_poll(Duration::from_secs(settings.network_poll_secs.max(1)))
    }

    /// 네트워크 재확인 주기. 작업을 예약하기 전에만 호출합니다.
    pub fn with_network_poll(mut self, poll: Duration) -> Self {
        if let Some(worker) = Arc::get_mut(&mut self.worker) {
            worker.network_poll = poll;
        }
        self
    }

    pub fn observe_state(&self) -> watch::Receiver<JobState> {
        self.worker.state.subscribe()
    }

    pub fn observe_progress(&self) -> watch::Receiver<CollectionProgress> {
        self.worker.progress.subscribe()
    }

    pub fn state(&self) -> JobState {
        *self.worker.state.borrow()
    }

    /// 일일 작업 등록 (기존 등록은 대체). 첫 실행까지 지연을 반환합니다.
    pub fn schedule_daily(&self, hour: u32, minute: u32) -> SyncResult<Duration> {
        let delay = initial_delay(self.clock.now(), hour, minute)?;

        let token = CancellationToken::new();
        let worker = self.worker.clone();
        let task_token = token.clone();
        let mut next_at = Instant::now() + delay;
        self.worker.set_state(JobState::Enqueued);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => return,
                    _ = tokio::time::sleep_until(next_at) => {}
                }

                if worker.run_and_publish(JobTrigger::Daily, &task_token).await == JobState::Cancelled {
                    return;
                }
                next_at += DAILY_INTERVAL;
                // 실행이 주기보다 길었으면 다음 주기로 건너뜀
                while next_at <= Instant::now() {
                    next_at += DAILY_INTERVAL;
                }
            }
        });

        let previous = lock(&self.daily).replace(JobHandle { token, task });
        if let Some(previous) = previous {
            previous.token.cancel();
        }

        info!(
            hour,
            minute,
            initial_delay_secs = delay.as_secs(),
            "Daily sync scheduled"
        );
        Ok(delay)
    }

    /// 일일 작업 해제.
    pub fn cancel_daily(&self) -> bool {
        match lock(&self.daily).take() {
            Some(handle) => {
                handle.token.cancel();
                self.worker.set_state(JobState::Cancelled);
                info!("Daily sync cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_daily_scheduled(&self) -> bool {
        lock(&self.daily)
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// 설정에 따라 일일 작업 등록/해제.
    pub fn apply_config(&self, config: &SchedulingConfig) -> SyncResult<()> {
        if config.is_enabled {
            self.schedule_daily(config.sync_hour, config.sync_minute)?;
        } else {
            self.cancel_daily();
        }
        Ok(())
    }

    /// 수동 실행. 진행 중인 수동 실행은 취소 후 대체됩니다.
    pub async fn run_now(&self) -> JoinHandle<JobState> {
        let mut manual = self.manual.lock().await;
        if let Some(previous) = manual.take() {
            info!("Replacing in-flight manual sync");
            previous.cancel().await;
        }

        let token = CancellationToken::new();
        let worker = self.worker.clone();
        let task_token = token.clone();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        self.worker.set_state(JobState::Enqueued);
        let task = tokio::spawn(async move {
            let state = worker.run_and_publish(JobTrigger::Manual, &task_token).await;
            let _ = done_tx.send(state);
        });
        *manual = Some(JobHandle { token, task });

        tokio::spawn(async move { done_rx.await.unwrap_or(JobState::Cancelled) })
    }

    /// 수동 실행 취소.
    pub async fn cancel_manual(&self) -> bool {
        match self.manual.lock().await.take() {
            Some(handle) => {
                handle.cancel().await;
                true
            }
            None => false,
        }
    }

    /// 수동 실행 후 종료 상태까지 대기합니다. 진행 상황이 바뀔 때마다 `on_progress`를 호출합니다.
    pub async fn run_manual_watched<F>(&self, mut on_progress: F) -> JobState
    where
        F: FnMut(CollectionProgress) + Send,
    {
        let mut progress = self.observe_progress();
        let mut handle = self.run_now().await;
        loop {
            tokio::select! {
                biased;
                changed = progress.changed() => {
                    if changed.is_err() {
                        return (&mut handle).await.unwrap_or(JobState::Cancelled);
                    }
                    on_progress(*progress.borrow_and_update());
                }
                joined = &mut handle => return joined.unwrap_or(JobState::Cancelled),
            }
        }
    }

    /// 모든 작업 중단.
    pub async fn shutdown(&self) {
        self.cancel_manual().await;
        let daily = lock(&self.daily).take();
        if let Some(handle) = daily {
            handle.cancel().await;
        }
    }
}
