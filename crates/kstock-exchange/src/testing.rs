//! 테스트 더블.
//!
//! `testing` feature로 다른 crate 테스트에서도 사용합니다.

use crate::bridge::{AnalyticsBridge, BridgeGateway};
use crate::credential::{BrokerConfig, BrokerEnvironment, CredentialCache, TokenIssuer};
use async_trait::async_trait;
use chrono::Duration;
use kstock_core::{Credential, SharedClock, SyncError, SyncResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// 성공 봉투.
pub fn ok_envelope(data: Value) -> Value {
    json!({ "ok": true, "data": data })
}

/// 실패 봉투.
pub fn err_envelope(code: &str, msg: &str) -> Value {
    json!({ "ok": false, "error": { "code": code, "msg": msg } })
}

/// 호출 횟수를 세는 토큰 발급자.
pub struct StaticIssuer {
    clock: SharedClock,
    lifetime: Duration,
    delay: Option<std::time::Duration>,
    calls: AtomicUsize,
    failure: Mutex<Option<SyncError>>,
    last_app_key: Mutex<Option<String>>,
}

impl StaticIssuer {
    /// 발급 시각 + `lifetime`에 만료되는 토큰을 발급합니다.
    pub fn new(clock: SharedClock, lifetime: Duration) -> Self {
        Self {
            clock,
            lifetime,
            delay: None,
            calls: AtomicUsize::new(0),
            failure: Mutex::new(None),
            last_app_key: Mutex::new(None),
        }
    }

    /// 발급마다 지연 추가.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 이후 발급을 실패시킵니다.
    pub fn fail_with(&self, error: SyncError) {
        *lock(&self.failure) = Some(error);
    }

    /// 실패 설정 해제.
    pub fn succeed(&self) {
        *lock(&self.failure) = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_app_key(&self) -> Option<String> {
        lock(&self.last_app_key).clone()
    }
}

#[async_trait]
impl TokenIssuer for StaticIssuer {
    async fn issue(&self, config: &BrokerConfig) -> SyncResult<Credential> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        *lock(&self.last_app_key) = Some(config.app_key.clone());

        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }
        Ok(Credential::new(
            format!("token-{}-{}", config.app_key_prefix(), n),
            self.clock.now() + self.lifetime,
            "Bearer",
        ))
    }
}

type Handler = Arc<dyn Fn(&[Value]) -> SyncResult<Value> + Send + Sync>;

/// `(module, func)`별 응답을 지정하는 브릿지.
///
/// 핸들러는 봉투 JSON을 반환합니다. 핸들러가 없는 호출은 `BridgeCall` 에러입니다.
#[derive(Default)]
pub struct ScriptedBridge {
    handlers: Mutex<HashMap<(String, String), Handler>>,
    calls: Mutex<Vec<(String, String, Vec<Value>)>>,
    delay: Option<std::time::Duration>,
}

impl ScriptedBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// 모든 호출에 지연 추가.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 핸들러 등록 (기존 핸들러 대체).
    pub fn on<F>(&self, module: &str, func: &str, handler: F)
    where
        F: Fn(&[Value]) -> SyncResult<Value> + Send + Sync + 'static,
    {
        lock(&self.handlers).insert((module.to_string(), func.to_string()), Arc::new(handler));
    }

    /// 항상 같은 데이터를 성공 봉투로 반환.
    pub fn on_ok(&self, module: &str, func: &str, data: Value) {
        self.on(module, func, move |_| Ok(ok_envelope(data.clone())));
    }

    /// 항상 실패 봉투를 반환.
    pub fn on_error(&self, module: &str, func: &str, code: &str, msg: &str) {
        let envelope = err_envelope(code, msg);
        self.on(module, func, move |_| Ok(envelope.clone()));
    }

    pub fn calls_to(&self, module: &str, func: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|(m, f, _)| m == module && f == func)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn last_args(&self, module: &str, func: &str) -> Option<Vec<Value>> {
        lock(&self.calls)
            .iter()
            .rev()
            .find(|(m, f, _)| m == module && f == func)
            .map(|(_, _, args)| args.clone())
    }
}

#[async_trait]
impl AnalyticsBridge for ScriptedBridge {
    async fn invoke(
        &self,
        module: &str,
        func: &str,
        args: &[Value],
        _credential: &Credential,
    ) -> SyncResult<Value> {
        lock(&self.calls).push((module.to_string(), func.to_string(), args.to_vec()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let handler = lock(&self.handlers)
            .get(&(module.to_string(), func.to_string()))
            .cloned();
        match handler {
            Some(handler) => handler(args),
            None => Err(SyncError::BridgeCall(format!(
                "no handler for {}.{}",
                module, func
            ))),
        }
    }
}

/// 초기화된 게이트웨이 생성 (24시간 토큰, 5초 타임아웃).
pub async fn initialized_gateway(
    bridge: Arc<dyn AnalyticsBridge>,
    clock: SharedClock,
) -> Arc<BridgeGateway> {
    let issuer = Arc::new(StaticIssuer::new(clock.clone(), Duration::hours(24)));
    let credentials = Arc::new(CredentialCache::new(issuer, clock));
    let gateway = Arc::new(BridgeGateway::new(
        credentials,
        std::time::Duration::from_secs(5),
    ));
    gateway
        .initialize(bridge, test_broker_config())
        .await;
    gateway
}

/// 테스트용 계정 설정.
pub fn test_broker_config() -> BrokerConfig {
    BrokerConfig::new("PStestappkey00000000", "test-secret", BrokerEnvironment::Paper)
}
