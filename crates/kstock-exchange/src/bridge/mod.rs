//! 분석 브릿지 게이트웨이.
//!
//! 분석 라이브러리는 `(module, func, args)` 형태의 불투명한 RPC로 호출되며,
//! 응답은 항상 `{ok, data?, error?}` 봉투(envelope)입니다.
//!
//! [`BridgeGateway`]는 다음을 책임집니다:
//! - 초기화 여부 확인 (`BridgeNotInitialized`)
//! - 토큰 캐시에서 인증 토큰 확보
//! - 모든 호출에 하드 타임아웃 적용 (`Timeout`)
//! - 봉투를 타입 있는 결과로 변환
//!
//! 캐싱은 하지 않습니다. 캐싱은 각 저장소의 책임입니다.

pub mod http;

use crate::credential::{BrokerConfig, CredentialCache};
use async_trait::async_trait;
use kstock_core::{Credential, SyncError, SyncResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub use http::HttpBridge;

/// 불투명한 분석 브릿지 호출.
///
/// 구현체는 봉투 JSON을 그대로 반환합니다. 봉투 해석은 게이트웨이가 합니다.
#[async_trait]
pub trait AnalyticsBridge: Send + Sync {
    async fn invoke(
        &self,
        module: &str,
        func: &str,
        args: &[Value],
        credential: &Credential,
    ) -> SyncResult<Value>;
}

/// 봉투 에러 본문.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    #[serde(alias = "message", default)]
    pub msg: String,
}

/// 브릿지 응답 봉투.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<EnvelopeError>,
}

impl Envelope {
    /// 봉투를 결과로 변환.
    ///
    /// - `ok=false` → 업스트림 코드에 따른 에러
    /// - `ok=true`, `data=null` → `NoData`
    pub fn into_result(self, call: &str) -> SyncResult<Value> {
        if !self.ok {
            return Err(match self.error {
                Some(error) => SyncError::from_upstream(&error.code, error.msg),
                None => SyncError::ApiCall {
                    code: "UNKNOWN".to_string(),
                    message: format!("{} 호출 실패 (에러 정보 없음)", call),
                },
            });
        }
        match self.data {
            Some(Value::Null) | None => Err(SyncError::NoData(format!("{} 응답 데이터 없음", call))),
            Some(data) => Ok(data),
        }
    }
}

struct GatewayContext {
    bridge: Arc<dyn AnalyticsBridge>,
    config: BrokerConfig,
}

/// 원격 데이터 게이트웨이.
pub struct BridgeGateway {
    context: RwLock<Option<GatewayContext>>,
    credentials: Arc<CredentialCache>,
    default_timeout: Duration,
}

impl BridgeGateway {
    pub fn new(credentials: Arc<CredentialCache>, default_timeout: Duration) -> Self {
        Self {
            context: RwLock::new(None),
            credentials,
            default_timeout,
        }
    }

    /// 브릿지와 계정 설정을 설치합니다.
    pub async fn initialize(&self, bridge: Arc<dyn AnalyticsBridge>, config: BrokerConfig) {
        info!(
            app_key = %config.app_key_prefix(),
            environment = config.environment.display_name(),
            "Bridge gateway initialized"
        );
        *self.context.write().await = Some(GatewayContext { bridge, config });
    }

    /// 브릿지를 제거합니다. 이후 호출은 `BridgeNotInitialized`로 실패합니다.
    pub async fn shutdown(&self) {
        if self.context.write().await.take().is_some() {
            info!("Bridge gateway shut down");
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.context.read().await.is_some()
    }

    /// 토큰 캐시 핸들.
    pub fn credentials(&self) -> &Arc<CredentialCache> {
        &self.credentials
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// 기본 타임아웃으로 호출하고 `data`를 `T`로 역직렬화합니다.
    pub async fn call<T: DeserializeOwned>(
        &self,
        module: &str,
        func: &str,
        args: Vec<Value>,
    ) -> SyncResult<T> {
        self.call_with(module, func, args, self.default_timeout, |data| {
            serde_json::from_value(data).map_err(SyncError::from)
        })
        .await
    }

    /// 타임아웃과 파서를 지정해 호출합니다.
    pub async fn call_with<T, F>(
        &self,
        module: &str,
        func: &str,
        args: Vec<Value>,
        timeout: Duration,
        parser: F,
    ) -> SyncResult<T>
    where
        F: FnOnce(Value) -> SyncResult<T>,
    {
        let result = self.invoke(module, func, &args, timeout).await.and_then(parser);

        if let Err(err) = &result {
            if err.is_auth_error() {
                warn!(module, func, error = %err, "Bridge call rejected credential");
                self.credentials.invalidate().await;
            } else {
                debug!(module, func, error = %err, "Bridge call failed");
            }
        }
        result
    }

    async fn invoke(
        &self,
        module: &str,
        func: &str,
        args: &[Value],
        timeout: Duration,
    ) -> SyncResult<Value> {
        let (bridge, config) = {
            let guard = self.context.read().await;
            let context = guard.as_ref().ok_or_else(|| {
                SyncError::BridgeNotInitialized(format!("{}.{} 호출 전 초기화 필요", module, func))
            })?;
            (context.bridge.clone(), context.config.clone())
        };

        let credential = self.credentials.get_credential(&config).await?;
        let call = format!("{}.{}", module, func);
        debug!(call = %call, args = args.len(), "Invoking bridge");

        let raw = tokio::time::timeout(timeout, bridge.invoke(module, func, args, &credential))
            .await
            .map_err(|_| SyncError::Timeout(format!("{} ({}ms)", call, timeout.as_millis())))??;

        let envelope: Envelope = serde_json::from_value(raw)
            .map_err(|e| SyncError::Parse(format!("{} 응답 봉투 형식 오류: {}", call, e)))?;
        envelope.into_result(&call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::BrokerEnvironment;
    use crate::testing::{err_envelope, ok_envelope, ScriptedBridge, StaticIssuer};
    use chrono::Utc;
    use kstock_core::ManualClock;
    use serde_json::json;

    async fn setup(bridge: Arc<ScriptedBridge>) -> (Arc<StaticIssuer>, BridgeGateway) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let issuer = Arc::new(StaticIssuer::new(clock.clone(), chrono::Duration::hours(24)));
        let cache = Arc::new(CredentialCache::new(issuer.clone(), clock));
        let gateway = BridgeGateway::new(cache, Duration::from_secs(5));
        let config = BrokerConfig::new("PSgatewaytestkey0000", "secret", BrokerEnvironment::Paper);
        gateway.initialize(bridge, config).await;
        (issuer, gateway)
    }

    #[test]
    fn test_envelope_conversion() {
        let ok: Envelope = serde_json::from_value(json!({"ok": true, "data": [1, 2]})).unwrap();
        assert_eq!(ok.into_result("m.f").unwrap(), json!([1, 2]));

        let null: Envelope = serde_json::from_value(json!({"ok": true, "data": null})).unwrap();
        assert!(matches!(null.into_result("m.f"), Err(SyncError::NoData(_))));

        let err: Envelope = serde_json::from_value(
            json!({"ok": false, "error": {"code": "EGW00201", "msg": "초당 거래건수 초과"}}),
        )
        .unwrap();
        assert!(matches!(err.into_result("m.f"), Err(SyncError::RateLimit(_))));

        let bare: Envelope = serde_json::from_value(json!({"ok": false})).unwrap();
        match bare.into_result("m.f") {
            Err(SyncError::ApiCall { code, .. }) => assert_eq!(code, "UNKNOWN"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_envelope_accepts_message_alias() {
        let env: Envelope = serde_json::from_value(
            json!({"ok": false, "error": {"code": "X1", "message": "bad"}}),
        )
        .unwrap();
        assert_eq!(env.error.unwrap().msg, "bad");
    }

    #[tokio::test]
    async fn test_not_initialized() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let issuer = Arc::new(StaticIssuer::new(clock.clone(), chrono::Duration::hours(24)));
        let gateway = BridgeGateway::new(
            Arc::new(CredentialCache::new(issuer.clone(), clock)),
            Duration::from_secs(1),
        );

        let err = gateway
            .call::<Value>("stock", "get_all", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BridgeNotInitialized(_)));
        assert_eq!(issuer.calls(), 0);
        assert!(!gateway.is_initialized().await);
    }

    #[tokio::test]
    async fn test_call_parses_data() {
        let bridge = Arc::new(ScriptedBridge::new());
        bridge.on_ok("stock", "get_name", json!("삼성전자"));
        let (_issuer, gateway) = setup(bridge.clone()).await;

        let name: String = gateway
            .call("stock", "get_name", vec![json!("005930")])
            .await
            .unwrap();
        assert_eq!(name, "삼성전자");
        assert_eq!(bridge.calls_to("stock", "get_name"), 1);
        assert_eq!(bridge.last_args("stock", "get_name"), Some(vec![json!("005930")]));
    }

    #[tokio::test]
    async fn test_upstream_error_is_typed() {
        let bridge = Arc::new(ScriptedBridge::new());
        bridge.on("stock", "get_name", |_| Ok(err_envelope("NOT_FOUND", "종목 없음")));
        let (_issuer, gateway) = setup(bridge).await;

        let err = gateway
            .call::<String>("stock", "get_name", vec![json!("999999")])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_parser_failure_is_parse_error() {
        let bridge = Arc::new(ScriptedBridge::new());
        bridge.on("stock", "get_name", |_| Ok(ok_envelope(json!({"unexpected": true}))));
        let (_issuer, gateway) = setup(bridge).await;

        let err = gateway
            .call::<Vec<String>>("stock", "get_name", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_distinct() {
        let bridge = Arc::new(ScriptedBridge::new().with_delay(Duration::from_secs(60)));
        bridge.on_ok("stock", "slow", json!(1));
        let (_issuer, gateway) = setup(bridge).await;

        let err = gateway
            .call_with("stock", "slow", vec![], Duration::from_secs(2), Ok)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_auth_failure_invalidates_credential() {
        let bridge = Arc::new(ScriptedBridge::new());
        bridge.on("stock", "get_name", |_| Ok(err_envelope("EGW00123", "기간이 만료된 token")));
        let (issuer, gateway) = setup(bridge.clone()).await;

        let err = gateway
            .call::<String>("stock", "get_name", vec![])
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
        assert!(gateway.credentials().cached().await.is_none());

        bridge.on_ok("stock", "get_name", json!("삼성전자"));
        let _: String = gateway.call("stock", "get_name", vec![]).await.unwrap();
        assert_eq!(issuer.calls(), 2);
    }

    #[tokio::test]
    async fn test_shutdown() {
        let bridge = Arc::new(ScriptedBridge::new());
        let (_issuer, gateway) = setup(bridge).await;
        assert!(gateway.is_initialized().await);

        gateway.shutdown().await;
        let err = gateway.call::<Value>("a", "b", vec![]).await.unwrap_err();
        assert!(matches!(err, SyncError::BridgeNotInitialized(_)));
    }
}
