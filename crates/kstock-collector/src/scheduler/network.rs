//! 네트워크 연결 확인.

use async_trait::async_trait;
use kstock_core::{SyncError, SyncResult};
use reqwest::Url;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// 작업 실행 전 네트워크 연결 여부를 확인합니다.
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    async fn is_available(&self) -> bool;
}

/// 수동 전환 모니터 (테스트, 오프라인 모드).
#[derive(Debug)]
pub struct StaticNetwork {
    available: AtomicBool,
}

impl StaticNetwork {
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkMonitor for StaticNetwork {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

/// 브릿지 호스트로 TCP 연결을 시도하는 모니터.
#[derive(Debug, Clone)]
pub struct TcpProbeMonitor {
    addr: String,
    timeout: Duration,
}

impl TcpProbeMonitor {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    /// http(s) URL의 호스트와 포트(생략 시 스킴 기본 포트)로 대상 주소를 만듭니다.
    pub fn from_url(url: &str, timeout: Duration) -> SyncResult<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| SyncError::InvalidArgument(format!("잘못된 URL {}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SyncError::InvalidArgument(format!("지원하지 않는 URL: {}", url)));
        }

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| SyncError::InvalidArgument(format!("호스트 없음: {}", url)))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| SyncError::InvalidArgument(format!("포트 없음: {}", url)))?;
        Ok(Self::new(format!("{}:{}", host, port), timeout))
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl NetworkMonitor for TcpProbeMonitor {
    async fn is_available(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(addr = %self.addr, error = %e, "Network probe failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.addr, "Network probe timed out");
                false
            }
        }
    }
}
