//! 服务启动流程：
//! 1. 首次运行时生成热点身份并配置热点
//! 2. 如果已有有线连接，关闭热点并直接退出
//! 3. 启动热点、看门狗和 Web 服务器，直到看门狗检测到有线连接

use crate::config::AppConfig;
use crate::hotspot::HotspotController;
use crate::identity::IdentityStore;
use crate::orchestrator::ConnectionOrchestrator;
use crate::profile_store::ProfileStore;
use crate::session::ServiceSession;
use crate::traits::{
    AdapterClass, AdapterInventory, HostedNetwork, NetworkProbe, ProfileRegistry, WifiScanner,
};
use crate::watchdog::WiredLinkWatchdog;
use crate::web_server::{self, AppState};
use crate::Result;
use std::sync::Arc;
use tokio::sync::watch;

/// The OS capabilities one backend provides.
#[derive(Clone)]
pub struct Platform {
    pub probe: Arc<dyn NetworkProbe>,
    pub adapters: Arc<dyn AdapterInventory>,
    pub hosted: Arc<dyn HostedNetwork>,
    pub profiles: Arc<dyn ProfileRegistry>,
    pub scanner: Arc<dyn WifiScanner>,
}

impl Platform {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: NetworkProbe + AdapterInventory + HostedNetwork + ProfileRegistry + WifiScanner + 'static,
    {
        Self {
            probe: backend.clone(),
            adapters: backend.clone(),
            hosted: backend.clone(),
            profiles: backend.clone(),
            scanner: backend,
        }
    }
}

pub struct ProvisioningService {
    config: AppConfig,
    platform: Platform,
    session: Arc<ServiceSession>,
    hotspot: Arc<HotspotController>,
    orchestrator: Arc<ConnectionOrchestrator>,
}

impl ProvisioningService {
    pub fn new(config: AppConfig, platform: Platform) -> Self {
        let session = Arc::new(ServiceSession::new());
        let data_dir = &config.service.data_dir;

        let hotspot = Arc::new(HotspotController::new(
            platform.hosted.clone(),
            platform.adapters.clone(),
            IdentityStore::new(data_dir),
            config.hotspot.clone(),
            session.clone(),
        ));
        let orchestrator = Arc::new(ConnectionOrchestrator::new(
            ProfileStore::new(platform.profiles.clone(), data_dir.clone()),
            platform.probe.clone(),
            hotspot.clone(),
            session.clone(),
            config.connect.clone(),
            config.hotspot.shutdown_delay,
        ));

        Self {
            config,
            platform,
            session,
            hotspot,
            orchestrator,
        }
    }

    pub fn session(&self) -> Arc<ServiceSession> {
        self.session.clone()
    }

    pub fn orchestrator(&self) -> Arc<ConnectionOrchestrator> {
        self.orchestrator.clone()
    }

    /// Provisions and starts the hotspot unless a wired link is already up.
    /// Returns `false` when the wired link made provisioning unnecessary.
    pub async fn bring_up(&self) -> Result<bool> {
        tracing::info!(data_dir = %self.config.service.data_dir.display(), "🚀 Starting provisioning service");

        // 无法生成热点身份时拒绝以降级状态启动
        self.hotspot.ensure_provisioned().await?;

        match self.platform.probe.is_link_up(AdapterClass::Wired).await {
            Ok(true) => {
                tracing::info!("🔌 Wired link already present, hotspot not needed");
                self.session.mark_wired_link();
                self.hotspot.stop_best_effort().await;
                return Ok(false);
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Wired link check failed, assuming no wired link: {}", e),
        }

        if let Err(e) = self.hotspot.start().await {
            tracing::error!("❌ Failed to start hotspot: {}", e);
        }
        Ok(true)
    }

    /// Full service lifetime: bring-up, then watchdog and web server until
    /// the watchdog fires.
    pub async fn run(self) -> Result<()> {
        if !self.bring_up().await? {
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let watchdog = WiredLinkWatchdog::new(
            self.platform.probe.clone(),
            self.hotspot.clone(),
            self.session.clone(),
            self.config.watchdog.interval,
        );
        let watchdog_task = tokio::spawn(watchdog.run(shutdown_tx));

        let state = Arc::new(AppState {
            orchestrator: self.orchestrator.clone(),
            session: self.session.clone(),
            scanner: self.platform.scanner.clone(),
        });
        let served = web_server::run_server(self.config.service.bind_addr, state, shutdown_rx).await;

        watchdog_task.abort();
        served?;
        tracing::info!("🛑 Provisioning service stopped");
        Ok(())
    }
}
