use crate::hotspot::HotspotController;
use crate::session::ServiceSession;
use crate::traits::{AdapterClass, NetworkProbe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Periodic wired-link check. Once a wired link shows up it stops the
/// hotspot, closes admissions and signals the service to shut down. It shares
/// no lock with the connection orchestrator: a wired link always wins.
pub struct WiredLinkWatchdog {
    probe: Arc<dyn NetworkProbe>,
    hotspot: Arc<HotspotController>,
    session: Arc<ServiceSession>,
    interval: Duration,
}

impl WiredLinkWatchdog {
    pub fn new(
        probe: Arc<dyn NetworkProbe>,
        hotspot: Arc<HotspotController>,
        session: Arc<ServiceSession>,
        interval: Duration,
    ) -> Self {
        Self {
            probe,
            hotspot,
            session,
            interval,
        }
    }

    /// Runs until a wired link is detected, then sends `true` on `shutdown`.
    pub async fn run(self, shutdown: watch::Sender<bool>) {
        // 启动时已经检查过一次，这里从一个周期之后开始
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.probe.is_link_up(AdapterClass::Wired).await {
                Ok(true) => break,
                Ok(false) => tracing::trace!("Watchdog: no wired link"),
                Err(e) => tracing::warn!("Watchdog: wired link check failed: {}", e),
            }
        }

        tracing::info!("🔌 Wired link detected, shutting down provisioning");
        self.session.mark_wired_link();
        self.hotspot.stop_best_effort().await;
        let _ = shutdown.send(true);
    }
}
