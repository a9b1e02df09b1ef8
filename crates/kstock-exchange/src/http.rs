//! HTTP 전송 에러 변환.

use kstock_core::SyncError;

/// `reqwest` 에러를 [`SyncError`]로 변환합니다.
pub fn map_reqwest_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout(err.to_string())
    } else if err.is_decode() {
        SyncError::Parse(err.to_string())
    } else {
        SyncError::Network(err.to_string())
    }
}
