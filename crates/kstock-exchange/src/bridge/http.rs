//! HTTP 분석 브릿지.
//!
//! 로컬 브릿지 프로세스에 `POST {base_url}/call`로 호출을 전달합니다.

use super::AnalyticsBridge;
use crate::http::map_reqwest_error;
use async_trait::async_trait;
use kstock_core::{Credential, SyncError, SyncResult};
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Serialize)]
struct CallRequest<'a> {
    module: &'a str,
    func: &'a str,
    args: &'a [Value],
}

/// HTTP 브릿지 클라이언트.
pub struct HttpBridge {
    client: Client,
    base_url: String,
}

impl HttpBridge {
    /// 새 브릿지 생성.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::BridgeInit(format!("HTTP client 생성 실패: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 브릿지 프로세스 상태 확인 (`GET /health`).
    pub async fn health_check(&self) -> SyncResult<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::BridgeInit(format!("브릿지 연결 실패 ({}): {}", url, e)))?;

        if !response.status().is_success() {
            return Err(SyncError::BridgeInit(format!(
                "브릿지 상태 확인 실패: {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn status_error(status: StatusCode, body: &str) -> SyncError {
        match status.as_u16() {
            429 => SyncError::RateLimit(body.to_string()),
            401 | 403 => SyncError::Auth(format!("{}: {}", status, body)),
            _ if !status.is_success() => SyncError::BridgeCall(format!("{}: {}", status, body)),
            _ => SyncError::Parse(format!("봉투 형식이 아닌 응답: {}", body)),
        }
    }
}

fn is_envelope(value: &Value) -> bool {
    value.get("ok").map(Value::is_boolean).unwrap_or(false)
}

#[async_trait]
impl AnalyticsBridge for HttpBridge {
    async fn invoke(
        &self,
        module: &str,
        func: &str,
        args: &[Value],
        credential: &Credential,
    ) -> SyncResult<Value> {
        let url = format!("{}/call", self.base_url);
        debug!(module, func, "POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, credential.auth_header())
            .json(&CallRequest { module, func, args })
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;

        match serde_json::from_str::<Value>(&text) {
            Ok(value) if is_envelope(&value) => Ok(value),
            _ => {
                error!(module, func, status = %status, "Bridge returned non-envelope body");
                Err(Self::status_error(status, &text))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use mockito::Matcher;
    use serde_json::json;

    fn credential() -> Credential {
        Credential::new("tok-abc", Utc::now() + ChronoDuration::hours(1), "Bearer")
    }

    #[tokio::test]
    async fn test_invoke_sends_call_and_returns_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/call")
            .match_header("authorization", "Bearer tok-abc")
            .match_body(Matcher::Json(json!({
                "module": "stock",
                "func": "get_name",
                "args": ["005930"],
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"data":"삼성전자"}"#)
            .create_async()
            .await;

        let bridge = HttpBridge::new(server.url(), Duration::from_secs(5)).unwrap();
        let value = bridge
            .invoke("stock", "get_name", &[json!("005930")], &credential())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(value, json!({"ok": true, "data": "삼성전자"}));
    }

    #[tokio::test]
    async fn test_error_envelope_passes_through_on_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/call")
            .with_status(500)
            .with_body(r#"{"ok":false,"error":{"code":"NO_DATA","msg":"없음"}}"#)
            .create_async()
            .await;

        let bridge = HttpBridge::new(server.url(), Duration::from_secs(5)).unwrap();
        let value = bridge.invoke("m", "f", &[], &credential()).await.unwrap();
        assert_eq!(value["error"]["code"], "NO_DATA");
    }

    #[tokio::test]
    async fn test_non_envelope_status_mapping() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/call")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let bridge = HttpBridge::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = bridge.invoke("m", "f", &[], &credential()).await.unwrap_err();
        assert!(matches!(err, SyncError::RateLimit(_)));

        assert!(matches!(
            HttpBridge::status_error(StatusCode::BAD_GATEWAY, "oops"),
            SyncError::BridgeCall(_)
        ));
        assert!(matches!(
            HttpBridge::status_error(StatusCode::OK, "<html>"),
            SyncError::Parse(_)
        ));
        assert!(matches!(
            HttpBridge::status_error(StatusCode::UNAUTHORIZED, ""),
            SyncError::Auth(_)
        ));
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(503)
            .create_async()
            .await;

        let bridge = HttpBridge::new(format!("{}/", server.url()), Duration::from_secs(5)).unwrap();
        let err = bridge.health_check().await.unwrap_err();
        assert!(matches!(err, SyncError::BridgeInit(_)));
    }
}
