//! # KStock Exchange
//!
//! 증권사 인증 토큰 관리와 분석 브릿지 호출을 담당합니다.
//!
//! - [`CredentialCache`]: 계정 설정별 접근 토큰 캐시 (Mutex 직렬화)
//! - [`KisTokenIssuer`]: 한국투자증권 OAuth 토큰 발급
//! - [`BridgeGateway`]: 타임아웃/봉투 변환을 포함한 원격 데이터 호출
//! - [`HttpBridge`]: HTTP 기반 브릿지 구현

pub mod bridge;
pub mod credential;
pub mod http;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bridge::{AnalyticsBridge, BridgeGateway, Envelope, EnvelopeError, HttpBridge};
pub use credential::{
    BrokerConfig, BrokerEnvironment, CredentialCache, KisTokenIssuer, TokenIssuer,
};
