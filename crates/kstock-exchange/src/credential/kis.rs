//! KIS OAuth 토큰 발급자.
//!
//! `POST /oauth2/tokenP`로 접근 토큰을 발급받습니다. 캐싱은 하지 않으며
//! [`CredentialCache`](super::CredentialCache)가 발급 시점을 결정합니다.

use super::{BrokerConfig, TokenIssuer};
use crate::http::map_reqwest_error;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kstock_core::{Credential, SharedClock, SyncError, SyncResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// KIS OAuth 토큰 응답.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// 접근 토큰
    pub access_token: String,
    /// 토큰 타입 (항상 "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// 토큰 만료 시간 (초)
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// 접근 토큰 만료 시각 (KIS 형식: "YYYY-MM-DD HH:MM:SS", KST)
    #[serde(default)]
    pub access_token_token_expired: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// KIS OAuth 오류 응답 (토큰 발급 실패 시).
#[derive(Debug, Clone, Deserialize)]
pub struct KisOAuthErrorResponse {
    /// 에러 코드 (예: "EGW00103")
    pub error_code: String,
    /// 에러 설명
    pub error_description: String,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    appkey: &'a str,
    appsecret: &'a str,
}

/// KIS REST 토큰 발급자.
pub struct KisTokenIssuer {
    client: Client,
    clock: SharedClock,
}

impl KisTokenIssuer {
    /// 새 발급자 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `SyncError::Network`를 반환합니다.
    pub fn new(timeout: std::time::Duration, clock: SharedClock) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Network(format!("HTTP client 생성 실패: {}", e)))?;
        Ok(Self { client, clock })
    }

    fn oauth_error_message(config: &BrokerConfig, oauth_error: &KisOAuthErrorResponse) -> String {
        match oauth_error.error_code.as_str() {
            "EGW00103" => format!(
                "유효하지 않은 AppKey입니다. AppKey: {}...",
                config.app_key_prefix()
            ),
            "EGW00102" => "AppKey가 만료되었습니다. 새 AppKey를 발급받으세요.".to_string(),
            "EGW00101" => "AppSecret이 일치하지 않습니다.".to_string(),
            _ => format!(
                "{} ({})",
                oauth_error.error_description, oauth_error.error_code
            ),
        }
    }
}

#[async_trait]
impl TokenIssuer for KisTokenIssuer {
    async fn issue(&self, config: &BrokerConfig) -> SyncResult<Credential> {
        if !config.has_keys() {
            return Err(SyncError::NoCredential(
                "AppKey/AppSecret이 설정되지 않았습니다".to_string(),
            ));
        }

        info!(
            app_key = %config.app_key_prefix(),
            environment = config.environment.display_name(),
            "Requesting new KIS access token"
        );

        let url = format!("{}/oauth2/tokenP", config.rest_base_url());
        let body = TokenRequest {
            grant_type: "client_credentials",
            appkey: &config.app_key,
            appsecret: &config.app_secret,
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            error!(status = %status, "Token request failed");

            if let Ok(oauth_error) = serde_json::from_str::<KisOAuthErrorResponse>(&text) {
                let message = Self::oauth_error_message(config, &oauth_error);
                error!(code = %oauth_error.error_code, "KIS OAuth 에러: {}", message);
                return Err(SyncError::Auth(message));
            }

            if status.as_u16() == 429 {
                return Err(SyncError::RateLimit(format!("Token request: {}", text)));
            }
            if status.is_server_error() {
                return Err(SyncError::Network(format!(
                    "Token request failed: {} - {}",
                    status, text
                )));
            }
            return Err(SyncError::Auth(format!("Token request failed: {}", text)));
        }

        let token: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            SyncError::Parse(format!("Failed to parse token response: {}", e))
        })?;

        let expires_at = token
            .access_token_token_expired
            .as_deref()
            .and_then(parse_kis_datetime)
            .or_else(|| {
                token
                    .expires_in
                    .map(|secs| self.clock.now() + Duration::seconds(secs))
            })
            .ok_or_else(|| SyncError::Parse("토큰 응답에 만료 정보가 없습니다".to_string()))?;

        Ok(Credential::new(token.access_token, expires_at, token.token_type))
    }
}

/// KIS 날짜시간 문자열 (KST) 파싱.
pub fn parse_kis_datetime(s: &str) -> Option<DateTime<Utc>> {
    use chrono::{NaiveDateTime, TimeZone};
    use chrono_tz::Asia::Seoul;

    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()?;
    let kst = Seoul.from_local_datetime(&naive).single()?;
    Some(kst.with_timezone(&Utc))
}
