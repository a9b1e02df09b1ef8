//! 인증 토큰 도메인 타입.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 발급된 접근 토큰.
///
/// 발급 이후 변경되지 않으며, 갱신 시 새 값으로 대체됩니다.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// 접근 토큰
    pub token: String,
    /// 만료 시각
    pub expires_at: DateTime<Utc>,
    /// 토큰 타입 (일반적으로 "Bearer")
    pub token_type: String,
}

impl Credential {
    /// 새 토큰 생성.
    pub fn new(
        token: impl Into<String>,
        expires_at: DateTime<Utc>,
        token_type: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            expires_at,
            token_type: token_type.into(),
        }
    }

    /// `now < expires_at - buffer` 이면 사용 가능.
    pub fn is_fresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now < self.expires_at - buffer
    }

    /// 인증 헤더 값.
    pub fn auth_header(&self) -> String {
        format!("{} {}", self.token_type, self.token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.token.chars().take(6).collect();
        f.debug_struct("Credential")
            .field("token", &format!("{}...", prefix))
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_freshness_respects_buffer() {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        let buffer = Duration::minutes(5);

        let cred = Credential::new("abc", now + Duration::minutes(6), "Bearer");
        assert!(cred.is_fresh(now, buffer));

        let cred = Credential::new("abc", now + Duration::minutes(5), "Bearer");
        assert!(!cred.is_fresh(now, buffer));

        let cred = Credential::new("abc", now - Duration::minutes(1), "Bearer");
        assert!(!cred.is_fresh(now, buffer));
    }

    #[test]
    fn test_debug_hides_token() {
        let cred = Credential::new("secret-token-value", Utc::now(), "Bearer");
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("secret-token-value"));
        assert_eq!(cred.auth_header(), "Bearer secret-token-value");
    }
}
