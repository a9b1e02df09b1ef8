//! 접근 토큰 캐시.
//!
//! 계정 설정당 하나의 유효 토큰을 보관하고, 필요할 때만 발급자를 호출합니다.
//!
//! # 동작 규칙
//!
//! - 모든 상태 전이는 캐시 인스턴스의 단일 비동기 Mutex 안에서 일어납니다.
//!   동시 호출자는 직렬화되므로 갱신 요청은 한 번에 하나만 진행됩니다.
//! - 요청 설정이 저장된 설정과 다르면 신선도와 무관하게 캐시 토큰을 먼저 폐기합니다.
//! - 토큰은 `now < expires_at - buffer`일 때만 반환합니다.
//! - 만료된 토큰은 발급 시도 전에 폐기합니다. 발급이 실패하면 캐시는 빈 상태로 남습니다.
//! - [`CredentialCache::force_refresh`]는 신선도와 무관하게 재발급하며,
//!   실패 시 기존 토큰을 그대로 둡니다.

pub mod config;
pub mod kis;

use async_trait::async_trait;
use chrono::Duration;
use kstock_core::{Credential, SharedClock, SyncError, SyncResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use config::{BrokerConfig, BrokerEnvironment};
pub use kis::KisTokenIssuer;

/// 토큰 만료 전 갱신 여유 시간 기본값 (분).
pub const DEFAULT_BUFFER_MINUTES: i64 = 5;

/// 토큰 발급자.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// 주어진 계정 설정으로 새 토큰을 발급합니다.
    async fn issue(&self, config: &BrokerConfig) -> SyncResult<Credential>;
}

#[derive(Default)]
struct CacheState {
    config: Option<BrokerConfig>,
    credential: Option<Credential>,
}

/// Mutex로 보호되는 토큰 캐시.
pub struct CredentialCache {
    issuer: Arc<dyn TokenIssuer>,
    clock: SharedClock,
    buffer: Duration,
    state: Mutex<CacheState>,
}

impl CredentialCache {
    /// 새 캐시 생성 (갱신 여유 5분).
    pub fn new(issuer: Arc<dyn TokenIssuer>, clock: SharedClock) -> Self {
        Self {
            issuer,
            clock,
            buffer: Duration::minutes(DEFAULT_BUFFER_MINUTES),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// 갱신 여유 시간 지정.
    pub fn with_buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    /// 유효한 토큰 반환, 필요시 발급.
    pub async fn get_credential(&self, config: &BrokerConfig) -> SyncResult<Credential> {
        let mut state = self.state.lock().await;

        if state.config.as_ref() != Some(config) {
            if state.config.is_some() {
                info!(
                    app_key = %config.app_key_prefix(),
                    "Broker config changed, dropping cached credential"
                );
            }
            state.credential = None;
            state.config = Some(config.clone());
        }

        let now = self.clock.now();
        if let Some(credential) = &state.credential {
            if credential.is_fresh(now, self.buffer) {
                debug!(expires_at = %credential.expires_at, "Using cached credential");
                return Ok(credential.clone());
            }
            warn!(
                expires_at = %credential.expires_at,
                "Cached credential expired or expiring, refreshing"
            );
            state.credential = None;
        }

        let credential = self.issue_checked(config).await?;
        state.credential = Some(credential.clone());
        Ok(credential)
    }

    /// 신선도와 무관하게 토큰 재발급.
    ///
    /// 마지막으로 사용한 계정 설정이 없으면 `NoCredential`을 반환합니다.
    pub async fn force_refresh(&self) -> SyncResult<Credential> {
        let mut state = self.state.lock().await;

        let config = state.config.clone().ok_or_else(|| {
            SyncError::NoCredential("토큰을 갱신할 계정 설정이 없습니다".to_string())
        })?;

        info!(app_key = %config.app_key_prefix(), "Forcing credential refresh");
        let credential = self.issue_checked(&config).await?;
        state.credential = Some(credential.clone());
        Ok(credential)
    }

    /// 계정 설정과 토큰을 모두 비웁니다.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.config = None;
        state.credential = None;
        debug!("Credential cache cleared");
    }

    /// 토큰만 폐기합니다 (계정 설정 유지).
    ///
    /// 업스트림이 토큰을 거부했을 때 다음 호출에서 재발급되도록 합니다.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.credential.take().is_some() {
            info!("Cached credential invalidated");
        }
    }

    /// 저장소에서 복원한 토큰 설정.
    ///
    /// 토큰이 신선하지 않으면 무시하고 `false`를 반환합니다.
    pub async fn restore(&self, config: BrokerConfig, credential: Credential) -> bool {
        if !credential.is_fresh(self.clock.now(), self.buffer) {
            debug!("Ignoring stale persisted credential");
            return false;
        }
        let mut state = self.state.lock().await;
        state.config = Some(config);
        state.credential = Some(credential);
        true
    }

    /// 현재 캐시된 토큰 (발급 없이).
    pub async fn cached(&self) -> Option<Credential> {
        self.state.lock().await.credential.clone()
    }

    async fn issue_checked(&self, config: &BrokerConfig) -> SyncResult<Credential> {
        let credential = self.issuer.issue(config).await?;
        if !credential.is_fresh(self.clock.now(), self.buffer) {
            return Err(SyncError::Parse(format!(
                "발급된 토큰의 만료 시각이 유효하지 않습니다: {}",
                credential.expires_at
            )));
        }
        info!(expires_at = %credential.expires_at, "Credential issued");
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticIssuer;
    use chrono::{TimeZone, Utc};
    use kstock_core::{Clock, ManualClock};

    fn config_a() -> BrokerConfig {
        BrokerConfig::new("PSaaaaaaaaaaaaaaaaaaaa", "secret-a", BrokerEnvironment::Paper)
    }

    fn config_b() -> BrokerConfig {
        BrokerConfig::new("PSbbbbbbbbbbbbbbbbbbbb", "secret-b", BrokerEnvironment::Paper)
    }

    fn setup() -> (ManualClock, Arc<StaticIssuer>, CredentialCache) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
        let issuer = Arc::new(StaticIssuer::new(Arc::new(clock.clone()), Duration::hours(24)));
        let cache = CredentialCache::new(issuer.clone(), Arc::new(clock.clone()));
        (clock, issuer, cache)
    }

    #[tokio::test]
    async fn test_fresh_credential_is_reused() {
        let (clock, issuer, cache) = setup();

        let first = cache.get_credential(&config_a()).await.unwrap();
        clock.advance(Duration::hours(23));
        let second = cache.get_credential(&config_a()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn test_refreshes_inside_buffer_window() {
        let (clock, issuer, cache) = setup();

        let first = cache.get_credential(&config_a()).await.unwrap();
        // 만료 4분 전: 5분 여유 안쪽
        clock.advance(Duration::hours(24) - Duration::minutes(4));
        let second = cache.get_credential(&config_a()).await.unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(issuer.calls(), 2);
        assert!(second.is_fresh(clock.now(), Duration::minutes(5)));
    }

    #[tokio::test]
    async fn test_config_change_forces_issuance() {
        let (_clock, issuer, cache) = setup();

        let a = cache.get_credential(&config_a()).await.unwrap();
        let b = cache.get_credential(&config_b()).await.unwrap();

        assert_ne!(a.token, b.token);
        assert_eq!(issuer.calls(), 2);
        assert_eq!(issuer.last_app_key().as_deref(), Some("PSbbbbbbbbbbbbbbbbbbbb"));

        // A로 돌아가도 B의 토큰을 주지 않는다
        let a2 = cache.get_credential(&config_a()).await.unwrap();
        assert_ne!(a2.token, b.token);
        assert_eq!(issuer.calls(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_cache_empty() {
        let (clock, issuer, cache) = setup();

        cache.get_credential(&config_a()).await.unwrap();
        clock.advance(Duration::hours(25));
        issuer.fail_with(SyncError::Network("connection refused".to_string()));

        let err = cache.get_credential(&config_a()).await.unwrap_err();
        assert_eq!(err, SyncError::Network("connection refused".to_string()));
        assert!(cache.cached().await.is_none());
    }

    #[tokio::test]
    async fn test_force_refresh_failure_keeps_fresh_credential() {
        let (_clock, issuer, cache) = setup();

        let original = cache.get_credential(&config_a()).await.unwrap();
        issuer.fail_with(SyncError::Timeout("token endpoint".to_string()));

        assert!(cache.force_refresh().await.is_err());
        assert_eq!(cache.cached().await, Some(original));
    }

    #[tokio::test]
    async fn test_force_refresh_ignores_freshness() {
        let (_clock, issuer, cache) = setup();

        let original = cache.get_credential(&config_a()).await.unwrap();
        let refreshed = cache.force_refresh().await.unwrap();

        assert_ne!(original.token, refreshed.token);
        assert_eq!(issuer.calls(), 2);
        assert_eq!(cache.cached().await, Some(refreshed));
    }

    #[tokio::test]
    async fn test_force_refresh_without_config() {
        let (_clock, issuer, cache) = setup();
        let err = cache.force_refresh().await.unwrap_err();
        assert!(matches!(err, SyncError::NoCredential(_)));
        assert_eq!(issuer.calls(), 0);
    }

    #[tokio::test]
    async fn test_clear_forces_new_issuance() {
        let (_clock, issuer, cache) = setup();

        cache.get_credential(&config_a()).await.unwrap();
        cache.clear().await;
        assert!(cache.cached().await.is_none());

        cache.get_credential(&config_a()).await.unwrap();
        assert_eq!(issuer.calls(), 2);
    }

    #[tokio::test]
    async fn test_issued_credential_already_expiring_is_rejected() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
        let issuer = Arc::new(StaticIssuer::new(Arc::new(clock.clone()), Duration::minutes(3)));
        let cache = CredentialCache::new(issuer, Arc::new(clock));

        let err = cache.get_credential(&config_a()).await.unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
        assert!(cache.cached().await.is_none());
    }

    #[tokio::test]
    async fn test_restore_only_fresh() {
        let (clock, issuer, cache) = setup();
        let now = clock.now();

        let stale = Credential::new("old", now + Duration::minutes(2), "Bearer");
        assert!(!cache.restore(config_a(), stale).await);

        let fresh = Credential::new("persisted", now + Duration::hours(10), "Bearer");
        assert!(cache.restore(config_a(), fresh.clone()).await);
        assert_eq!(cache.get_credential(&config_a()).await.unwrap(), fresh);
        assert_eq!(issuer.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_issue_once() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
        let issuer = Arc::new(
            StaticIssuer::new(Arc::new(clock.clone()), Duration::hours(24))
                .with_delay(std::time::Duration::from_millis(50)),
        );
        let cache = Arc::new(CredentialCache::new(issuer.clone(), Arc::new(clock)));

        let (a, b) = tokio::join!(
            {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_credential(&config_a()).await })
            },
            {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_credential(&config_a()).await })
            }
        );

        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(issuer.calls(), 1);
    }
}
