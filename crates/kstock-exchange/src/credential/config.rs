//! 한국투자증권 (KIS) OpenAPI 접속 설정.
//!
//! 토큰 캐시는 이 설정 값의 동등성으로 계정을 구분합니다.
//! 앱키/앱시크릿/환경 중 하나라도 바뀌면 다른 계정으로 취급합니다.

use kstock_core::BrokerSettings;
use serde::{Deserialize, Serialize};

/// KIS API 환경.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerEnvironment {
    /// 실전투자
    Real,
    /// 모의투자
    #[default]
    Paper,
}

impl BrokerEnvironment {
    /// REST API 기본 URL.
    pub fn rest_base_url(&self) -> &'static str {
        match self {
            BrokerEnvironment::Real => "https://openapi.koreainvestment.com:9443",
            BrokerEnvironment::Paper => "https://openapivts.koreainvestment.com:29443",
        }
    }

    /// 문자열에서 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "real" | "prod" => Some(BrokerEnvironment::Real),
            "paper" | "mock" | "test" => Some(BrokerEnvironment::Paper),
            _ => None,
        }
    }

    /// 표시 이름.
    pub fn display_name(&self) -> &'static str {
        match self {
            BrokerEnvironment::Real => "실전투자",
            BrokerEnvironment::Paper => "모의투자",
        }
    }
}

/// 증권사 계정 설정.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// 앱키
    pub app_key: String,
    /// 앱시크릿
    pub app_secret: String,
    /// 실전/모의 환경
    pub environment: BrokerEnvironment,
    /// REST 기본 URL 재정의 (프록시 사용 시)
    pub base_url_override: Option<String>,
}

impl BrokerConfig {
    /// 새 설정 생성.
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        environment: BrokerEnvironment,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            environment,
            base_url_override: None,
        }
    }

    /// 설정 파일 값에서 생성.
    pub fn from_settings(settings: &BrokerSettings) -> Self {
        let environment = BrokerEnvironment::parse(&settings.environment).unwrap_or_default();
        Self::new(settings.app_key.clone(), settings.app_secret.clone(), environment)
    }

    /// REST 기본 URL 재정의.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url_override = Some(url.into());
        self
    }

    /// REST 기본 URL.
    pub fn rest_base_url(&self) -> &str {
        self.base_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.rest_base_url())
    }

    /// 앱키와 앱시크릿이 모두 입력되었는지 확인.
    pub fn has_keys(&self) -> bool {
        !self.app_key.trim().is_empty() && !self.app_secret.trim().is_empty()
    }

    /// 로그용 앱키 앞부분.
    pub fn app_key_prefix(&self) -> String {
        self.app_key.chars().take(8).collect()
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("app_key", &format!("{}...", self.app_key_prefix()))
            .field("app_secret", &"***")
            .field("environment", &self.environment)
            .field("base_url_override", &self.base_url_override)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_by_value() {
        let a = BrokerConfig::new("PSkey0000000000000000", "secret", BrokerEnvironment::Paper);
        let b = BrokerConfig::new("PSkey0000000000000000", "secret", BrokerEnvironment::Paper);
        assert_eq!(a, b);

        let c = b.clone().with_base_url("http://localhost:1234");
        assert_ne!(a, c);
        let d = BrokerConfig::new("PSkey0000000000000000", "secret", BrokerEnvironment::Real);
        assert_ne!(a, d);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = BrokerConfig::new("PSabcdefgh12345", "very-secret", BrokerEnvironment::Real);
        let debug = format!("{:?}", config);
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("PSabcdef..."));
    }

    #[test]
    fn test_from_settings() {
        let settings = BrokerSettings {
            app_key: "key".to_string(),
            app_secret: "secret".to_string(),
            environment: "REAL".to_string(),
            timeout_secs: 10,
        };
        let config = BrokerConfig::from_settings(&settings);
        assert_eq!(config.environment, BrokerEnvironment::Real);
        assert_eq!(config.rest_base_url(), "https://openapi.koreainvestment.com:9443");
        assert!(config.has_keys());
    }
}
