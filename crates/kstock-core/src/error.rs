//! 동기화 엔진의 에러 타입.
//!
//! 모든 경계(브릿지 호출, 토큰 발급, 캐시, 스케줄러)에서 발생하는 에러는
//! 이 모듈의 [`SyncError`] 하나로 수렴합니다. 재시도 여부와 사용자 표시 메시지는
//! 에러 종류([`ErrorKind`])로 결정됩니다.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 동기화 엔진 공통 에러.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// 네트워크/전송 계층 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 인증 실패 (토큰 만료, 잘못된 AppKey 등)
    #[error("Auth error: {0}")]
    Auth(String),

    /// 인증 정보 미설정
    #[error("No credential: {0}")]
    NoCredential(String),

    /// 업스트림 API 에러 코드
    #[error("API error {code}: {message}")]
    ApiCall { code: String, message: String },

    /// 요청 한도 초과
    #[error("Rate limited: {0}")]
    RateLimit(String),

    /// 응답 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    Parse(String),

    /// 대상 엔티티 없음
    #[error("{entity_type} not found: {message}")]
    NotFound { entity_type: String, message: String },

    /// 조회 성공, 데이터 없음
    #[error("No data: {0}")]
    NoData(String),

    /// 분석에 필요한 데이터 부족
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// 잘못된 인자
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 브릿지 초기화 실패
    #[error("Bridge init error: {0}")]
    BridgeInit(String),

    /// 브릿지가 아직 초기화되지 않음
    #[error("Bridge not initialized: {0}")]
    BridgeNotInitialized(String),

    /// 브릿지 호출 실패
    #[error("Bridge call error: {0}")]
    BridgeCall(String),

    /// 분류되지 않은 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// 필드 없는 에러 종류.
///
/// 재시도 판단, 통계, 표시 메시지 조회에 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    Auth,
    NoCredential,
    ApiCall,
    RateLimit,
    Parse,
    NotFound,
    NoData,
    InsufficientData,
    InvalidArgument,
    BridgeInit,
    BridgeNotInitialized,
    BridgeCall,
    Unknown,
}

impl ErrorKind {
    /// 모든 에러 종류.
    pub const ALL: [ErrorKind; 15] = [
        ErrorKind::Network,
        ErrorKind::Timeout,
        ErrorKind::Auth,
        ErrorKind::NoCredential,
        ErrorKind::ApiCall,
        ErrorKind::RateLimit,
        ErrorKind::Parse,
        ErrorKind::NotFound,
        ErrorKind::NoData,
        ErrorKind::InsufficientData,
        ErrorKind::InvalidArgument,
        ErrorKind::BridgeInit,
        ErrorKind::BridgeNotInitialized,
        ErrorKind::BridgeCall,
        ErrorKind::Unknown,
    ];

    /// 사용자에게 표시할 메시지.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Network => "네트워크 연결을 확인해 주세요.",
            ErrorKind::Timeout => "서버 응답 시간이 초과되었습니다. 잠시 후 다시 시도해 주세요.",
            ErrorKind::Auth => "인증에 실패했습니다. API 키 설정을 확인해 주세요.",
            ErrorKind::NoCredential => "API 키가 설정되지 않았습니다. 설정에서 API 키를 입력해 주세요.",
            ErrorKind::ApiCall => "증권사 API 호출 중 오류가 발생했습니다.",
            ErrorKind::RateLimit => "요청이 너무 많습니다. 잠시 후 다시 시도해 주세요.",
            ErrorKind::Parse => "응답 데이터를 해석할 수 없습니다.",
            ErrorKind::NotFound => "요청한 정보를 찾을 수 없습니다.",
            ErrorKind::NoData => "조회된 데이터가 없습니다.",
            ErrorKind::InsufficientData => "분석에 필요한 데이터가 부족합니다.",
            ErrorKind::InvalidArgument => "입력값이 올바르지 않습니다.",
            ErrorKind::BridgeInit => "분석 엔진을 시작하지 못했습니다.",
            ErrorKind::BridgeNotInitialized => "분석 엔진이 아직 준비되지 않았습니다.",
            ErrorKind::BridgeCall => "분석 엔진 호출 중 오류가 발생했습니다.",
            ErrorKind::Unknown => "알 수 없는 오류가 발생했습니다.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Auth => "auth",
            ErrorKind::NoCredential => "no_credential",
            ErrorKind::ApiCall => "api_call",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Parse => "parse",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NoData => "no_data",
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::BridgeInit => "bridge_init",
            ErrorKind::BridgeNotInitialized => "bridge_not_initialized",
            ErrorKind::BridgeCall => "bridge_call",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// 동기화 작업을 위한 Result 타입.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// 에러 종류 반환.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Network(_) => ErrorKind::Network,
            SyncError::Timeout(_) => ErrorKind::Timeout,
            SyncError::Auth(_) => ErrorKind::Auth,
            SyncError::NoCredential(_) => ErrorKind::NoCredential,
            SyncError::ApiCall { .. } => ErrorKind::ApiCall,
            SyncError::RateLimit(_) => ErrorKind::RateLimit,
            SyncError::Parse(_) => ErrorKind::Parse,
            SyncError::NotFound { .. } => ErrorKind::NotFound,
            SyncError::NoData(_) => ErrorKind::NoData,
            SyncError::InsufficientData(_) => ErrorKind::InsufficientData,
            SyncError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SyncError::BridgeInit(_) => ErrorKind::BridgeInit,
            SyncError::BridgeNotInitialized(_) => ErrorKind::BridgeNotInitialized,
            SyncError::BridgeCall(_) => ErrorKind::BridgeCall,
            SyncError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// 재시도 가능한 에러인지 확인합니다.
    ///
    /// 재시도는 스케줄러 계층에서만 수행합니다. 저장소는 에러를 그대로 반환합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::Timeout(_) | SyncError::RateLimit(_)
        )
    }

    /// 인증 관련 에러인지 확인합니다.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SyncError::Auth(_) | SyncError::NoCredential(_))
    }

    /// 사용자에게 표시할 메시지.
    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }

    /// 엔티티 없음 에러 생성.
    pub fn not_found(entity_type: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::NotFound {
            entity_type: entity_type.into(),
            message: message.into(),
        }
    }

    /// 업스트림(브릿지/증권사) 에러 코드를 에러 종류로 변환합니다.
    ///
    /// `EGW` 코드는 한국투자증권 OpenAPI 게이트웨이 코드입니다.
    pub fn from_upstream(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code.trim().to_ascii_uppercase().as_str() {
            "NETWORK_ERROR" | "CONNECTION_ERROR" => SyncError::Network(message),
            "TIMEOUT" => SyncError::Timeout(message),
            "AUTH_ERROR" | "UNAUTHORIZED" | "EGW00121" | "EGW00123" => SyncError::Auth(message),
            "NO_CREDENTIAL" | "NO_API_KEY" => SyncError::NoCredential(message),
            "RATE_LIMIT" | "TOO_MANY_REQUESTS" | "EGW00201" => SyncError::RateLimit(message),
            "PARSE_ERROR" => SyncError::Parse(message),
            "NOT_FOUND" | "STOCK_NOT_FOUND" => SyncError::not_found("entity", message),
            "NO_DATA" => SyncError::NoData(message),
            "INSUFFICIENT_DATA" => SyncError::InsufficientData(message),
            "INVALID_ARG" | "INVALID_ARGUMENT" => SyncError::InvalidArgument(message),
            _ => SyncError::ApiCall {
                code: code.to_string(),
                message,
            },
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Parse(err.to_string())
    }
}
