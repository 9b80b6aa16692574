use crate::identity::{HotspotIdentity, MacAddress};
use crate::profile_store::file_stem_for;
use crate::traits::{
    AdapterClass, AdapterInventory, HostedNetwork, Network, NetworkProbe, ProfileRegistry,
    WifiScanner,
};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// 模拟连接建立到外网可达之间的时间
const ONLINE_AFTER: Duration = Duration::from_secs(2);

/// Every connection to this SSID fails, for exercising the rollback path.
pub const FAILING_SSID: &str = "xfinitywifi";

#[derive(Debug, Default)]
struct MockState {
    hotspot: Option<HotspotIdentity>,
    hotspot_running: bool,
    profiles: Vec<String>,
    connected: Option<(String, Instant)>,
    wired_link: bool,
}

/// A mock backend for development and tests.
/// It simulates the host in memory without any real hardware interaction.
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plugs or unplugs the simulated network cable.
    pub fn set_wired_link(&self, up: bool) {
        tracing::info!("🤖 [MockBackend] Wired link {}", if up { "up" } else { "down" });
        self.state().wired_link = up;
    }

    pub fn is_hotspot_running(&self) -> bool {
        self.state().hotspot_running
    }

    pub fn hotspot_identity(&self) -> Option<HotspotIdentity> {
        self.state().hotspot.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl NetworkProbe for MockBackend {
    async fn is_link_up(&self, class: AdapterClass) -> Result<bool> {
        let state = self.state();
        Ok(match class {
            AdapterClass::Wired => state.wired_link,
            AdapterClass::Wireless => state.connected.is_some(),
        })
    }

    async fn is_internet_reachable(&self, _attempts: u32) -> bool {
        let online = self
            .state()
            .connected
            .as_ref()
            .is_some_and(|(_, since)| since.elapsed() >= ONLINE_AFTER);
        tracing::debug!("🤖 [MockBackend] Reachability check: {}", online);
        online
    }
}

#[async_trait]
impl AdapterInventory for MockBackend {
    async fn hardware_address(&self, class: AdapterClass) -> Result<Option<MacAddress>> {
        Ok(match class {
            AdapterClass::Wired => Some(MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])),
            AdapterClass::Wireless => Some(MacAddress::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55])),
        })
    }
}

#[async_trait]
impl HostedNetwork for MockBackend {
    async fn configure(&self, identity: &HotspotIdentity) -> Result<()> {
        tracing::info!(ssid = %identity.ssid, "🤖 [MockBackend] Hotspot configured (simulated).");
        self.state().hotspot = Some(identity.clone());
        Ok(())
    }

    async fn unconfigure(&self) -> Result<()> {
        let mut state = self.state();
        state.hotspot = None;
        state.hotspot_running = false;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let mut state = self.state();
        if state.hotspot.is_none() {
            return Err(Error::Hotspot("hosted network is not configured".into()));
        }
        tracing::info!("🤖 [MockBackend] Hotspot started (simulated).");
        state.hotspot_running = true;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        tracing::info!("🤖 [MockBackend] Hotspot stopped (simulated).");
        self.state().hotspot_running = false;
        Ok(())
    }
}

#[async_trait]
impl ProfileRegistry for MockBackend {
    async fn known_profiles(&self) -> Result<Vec<String>> {
        Ok(self.state().profiles.clone())
    }

    fn profile_file_name(&self, ssid: &str) -> String {
        format!("{}.mock", file_stem_for(ssid))
    }

    // 第一行是 SSID，第二行是密码
    fn render_profile(&self, ssid: &str, password: &str) -> String {
        format!("{}\n{}\n", ssid, password)
    }

    async fn add(&self, path: &Path) -> Result<()> {
        let content = tokio::fs::read_to_string(path).await?;
        let ssid = content
            .lines()
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| Error::Registration(format!("malformed profile {}", path.display())))?
            .to_string();

        let mut state = self.state();
        if !state.profiles.contains(&ssid) {
            state.profiles.push(ssid);
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        let before = state.profiles.len();
        state.profiles.retain(|p| p != name);
        if state.profiles.len() == before {
            return Err(Error::CommandFailed(format!("profile '{}' is not found", name)));
        }
        if state.connected.as_ref().is_some_and(|(ssid, _)| ssid == name) {
            state.connected = None;
        }
        Ok(())
    }

    async fn connect(&self, name: &str) -> Result<()> {
        // 模拟建立连接的耗时
        sleep(Duration::from_millis(300)).await;

        let mut state = self.state();
        if !state.profiles.iter().any(|p| p == name) {
            return Err(Error::CommandFailed(format!("profile '{}' is not found", name)));
        }
        if name == FAILING_SSID {
            tracing::info!("🤖 [MockBackend] Connection failed to '{}'", name);
            return Err(Error::CommandFailed("Simulated connection failure".into()));
        }
        tracing::info!("🤖 [MockBackend] Connecting to '{}'", name);
        state.connected = Some((name.to_string(), Instant::now()));
        Ok(())
    }
}

#[async_trait]
impl WifiScanner for MockBackend {
    async fn scan(&self) -> Result<Vec<Network>> {
        tracing::info!("🤖 [MockBackend] Scanning for networks...");
        sleep(Duration::from_millis(500)).await;

        let networks = vec![
            Network {
                ssid: "MyHomeWiFi".to_string(),
                signal: 95,
                security: "WPA3".to_string(),
            },
            Network {
                ssid: FAILING_SSID.to_string(),
                signal: 88,
                security: "WPA2".to_string(),
            },
            Network {
                ssid: "CafeGuest".to_string(),
                signal: 78,
                security: "Open".to_string(),
            },
            Network {
                ssid: "Neighbor's Network".to_string(),
                signal: 55,
                security: "WPA2".to_string(),
            },
        ];

        tracing::info!("🤖 [MockBackend] Found {} networks.", networks.len());
        Ok(networks)
    }
}
