use crate::config::HotspotConfig;
use crate::identity::{HotspotIdentity, IdentityStore, MacAddress};
use crate::session::ServiceSession;
use crate::traits::{AdapterClass, AdapterInventory, HostedNetwork};
use crate::{Error, Result};
use std::sync::Arc;

/// Owns the temporary access point: first-run provisioning, start and stop.
///
/// Starting while a wired link is present is the caller's concern; the
/// service checks the session before calling [`HotspotController::start`].
pub struct HotspotController {
    hosted: Arc<dyn HostedNetwork>,
    adapters: Arc<dyn AdapterInventory>,
    store: IdentityStore,
    config: HotspotConfig,
    session: Arc<ServiceSession>,
}

impl HotspotController {
    pub fn new(
        hosted: Arc<dyn HostedNetwork>,
        adapters: Arc<dyn AdapterInventory>,
        store: IdentityStore,
        config: HotspotConfig,
        session: Arc<ServiceSession>,
    ) -> Self {
        Self {
            hosted,
            adapters,
            store,
            config,
            session,
        }
    }

    /// Provisions on first run. Returns the new identity, or `None` when a
    /// persisted identity already exists.
    pub async fn ensure_provisioned(&self) -> Result<Option<HotspotIdentity>> {
        if self.store.exists().await {
            tracing::debug!(path = %self.store.path().display(), "Hotspot identity already provisioned");
            return Ok(None);
        }
        self.provision().await.map(Some)
    }

    /// Derives the identity, configures the access point and persists the
    /// identity. A persistence failure unconfigures the access point again so
    /// the next start provisions from scratch.
    pub async fn provision(&self) -> Result<HotspotIdentity> {
        tracing::info!("🔧 First run: provisioning hotspot identity...");
        let mac = self.resolve_address().await?;
        let identity = HotspotIdentity::derive(
            &mac,
            &self.config.ssid_prefix,
            &self.config.password_prefix,
        );

        self.hosted
            .configure(&identity)
            .await
            .map_err(|e| Error::Hotspot(e.to_string()))?;

        if let Err(e) = self.store.save(&identity).await {
            tracing::error!("❌ Failed to persist hotspot identity: {}", e);
            if let Err(rollback) = self.hosted.unconfigure().await {
                tracing::warn!("Failed to roll back hotspot configuration: {}", rollback);
            }
            return Err(Error::Persist(e.to_string()));
        }

        tracing::info!(
            ssid = %identity.ssid,
            path = %self.store.path().display(),
            "✅ Hotspot provisioned, identity saved (encrypted)"
        );
        Ok(identity)
    }

    /// Wired adapter first, then any wireless adapter.
    async fn resolve_address(&self) -> Result<MacAddress> {
        for class in [AdapterClass::Wired, AdapterClass::Wireless] {
            match self.adapters.hardware_address(class).await {
                Ok(Some(mac)) if !mac.is_unspecified() => {
                    tracing::info!(?class, %mac, "Using adapter hardware address");
                    return Ok(mac);
                }
                Ok(_) => tracing::debug!(?class, "No usable hardware address"),
                Err(e) => tracing::warn!(?class, "Hardware address lookup failed: {}", e),
            }
        }
        Err(Error::NoAddressFound)
    }

    pub async fn start(&self) -> Result<()> {
        self.hosted
            .start()
            .await
            .map_err(|e| Error::Hotspot(e.to_string()))?;
        self.session.set_hotspot_active(true);
        tracing::info!("📶 Hotspot started");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let result = self
            .hosted
            .stop()
            .await
            .map_err(|e| Error::Hotspot(e.to_string()));
        // 无论系统命令是否报错，热点都视为已关闭
        self.session.set_hotspot_active(false);
        result
    }

    /// Stop whose failure is only logged; stopping twice is harmless.
    pub async fn stop_best_effort(&self) {
        match self.stop().await {
            Ok(()) => tracing::info!("🛑 Hotspot stopped"),
            Err(e) => tracing::warn!("Hotspot stop reported an error (ignored): {}", e),
        }
    }
}
