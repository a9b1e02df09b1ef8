//! 구성 요소 조립.

use crate::error::{CollectorError, Result};
use crate::orchestrator::{OrchestratorOptions, SyncOrchestrator};
use crate::scheduler::{JobScheduler, TcpProbeMonitor};
use kstock_core::{system_clock, AppConfig, SharedClock};
use kstock_data::{Database, Repositories, RepositoryContext};
use kstock_exchange::{BridgeGateway, BrokerConfig, CredentialCache, HttpBridge, KisTokenIssuer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 네트워크 확인 TCP 연결 타임아웃.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// 실행에 필요한 구성 요소 묶음.
pub struct App {
    pub config: AppConfig,
    pub clock: SharedClock,
    pub db: Database,
    pub gateway: Arc<BridgeGateway>,
    pub repos: Arc<Repositories>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl App {
    /// 저장소를 열고 구성 요소를 만듭니다. 브릿지 연결은 [`App::connect_bridge`]에서 합니다.
    pub async fn build(config: AppConfig) -> Result<Self> {
        let clock = system_clock();

        let db = Database::connect(&config.database.path).await?;
        info!(path = %config.database.path, "Database opened");

        let issuer = KisTokenIssuer::new(
            Duration::from_secs(config.broker.timeout_secs),
            clock.clone(),
        )?;
        let credentials = Arc::new(
            CredentialCache::new(Arc::new(issuer), clock.clone())
                .with_buffer(config.cache.credential_buffer()),
        );
        let gateway = Arc::new(BridgeGateway::new(credentials, config.bridge.timeout()));

        let ctx = RepositoryContext::new(db.clone(), gateway.clone(), clock.clone())
            .with_ttl(config.cache.ttl());
        let repos = Arc::new(Repositories::new(ctx));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            repos.clone(),
            clock.clone(),
            OrchestratorOptions::from_config(&config),
        ));

        Ok(Self {
            config,
            clock,
            db,
            gateway,
            repos,
            orchestrator,
        })
    }

    /// 브릿지 상태 확인 후 게이트웨이 초기화. 브릿지가 응답하지 않으면 실패합니다.
    pub async fn connect_bridge(&self) -> Result<()> {
        let (bridge, broker) = self.http_bridge()?;
        bridge.health_check().await?;
        self.gateway.initialize(Arc::new(bridge), broker).await;
        info!(base_url = %self.config.bridge.base_url, "Bridge connected");
        Ok(())
    }

    /// 게이트웨이 초기화만 하고 브릿지 상태 확인 실패는 경고로 남깁니다.
    ///
    /// 데몬처럼 실행 시점의 네트워크 확인에 맡기는 경우에 사용합니다.
    pub async fn attach_bridge(&self) -> Result<()> {
        let (bridge, broker) = self.http_bridge()?;
        if let Err(e) = bridge.health_check().await {
            warn!(
                base_url = %self.config.bridge.base_url,
                error = %e,
                "Bridge unreachable, runs wait for network"
            );
        }
        self.gateway.initialize(Arc::new(bridge), broker).await;
        Ok(())
    }

    fn http_bridge(&self) -> Result<(HttpBridge, BrokerConfig)> {
        let broker = BrokerConfig::from_settings(&self.config.broker);
        if !broker.has_keys() {
            return Err(CollectorError::Config(
                "broker.app_key / broker.app_secret 설정이 필요합니다".to_string(),
            ));
        }
        let bridge = HttpBridge::new(&self.config.bridge.base_url, self.config.bridge.timeout())?;
        Ok((bridge, broker))
    }

    /// 동기화 스케줄러 생성.
    pub fn scheduler(&self) -> Result<JobScheduler> {
        let network = TcpProbeMonitor::from_url(&self.config.bridge.base_url, PROBE_TIMEOUT)?;
        Ok(JobScheduler::from_settings(
            self.orchestrator.clone(),
            Arc::new(network),
            &self.config.scheduler,
            self.clock.clone(),
        ))
    }

    /// 종료 정리.
    pub async fn shutdown(&self) {
        self.gateway.shutdown().await;
        self.db.pool().close().await;
    }
}
