//! 单飞（single-flight）连接状态机。
//!
//! `Staging → Registering → Connecting → Polling → {Confirmed | TimedOut}`,
//! with any fault on the way resolving to `Failed`. Only one attempt runs at a
//! time; a second request while one is in flight is rejected, never queued.

use crate::config::ConnectConfig;
use crate::hotspot::HotspotController;
use crate::profile_store::ProfileStore;
use crate::session::{AttemptPhase, AttemptStatus, ServiceSession};
use crate::traits::NetworkProbe;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout_at, Instant, MissedTickBehavior};

/// Answer to a connection request, given before the attempt resolves.
#[derive(Debug)]
pub enum Admission {
    /// The attempt runs in the background; the handle yields its outcome.
    Accepted(JoinHandle<AttemptStatus>),
    /// Another attempt holds the single-flight lock.
    Busy,
    /// The wired-link watchdog has fired; no more attempts are admitted.
    Closed,
}

pub struct ConnectionOrchestrator {
    profiles: ProfileStore,
    probe: Arc<dyn NetworkProbe>,
    hotspot: Arc<HotspotController>,
    session: Arc<ServiceSession>,
    config: ConnectConfig,
    hotspot_linger: Duration,
    in_flight: Arc<Mutex<()>>,
}

impl ConnectionOrchestrator {
    pub fn new(
        profiles: ProfileStore,
        probe: Arc<dyn NetworkProbe>,
        hotspot: Arc<HotspotController>,
        session: Arc<ServiceSession>,
        config: ConnectConfig,
        hotspot_linger: Duration,
    ) -> Self {
        Self {
            profiles,
            probe,
            hotspot,
            session,
            config,
            hotspot_linger,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Admits at most one attempt system-wide. Never waits for the lock.
    pub fn request_connection(self: &Arc<Self>, ssid: String, password: String) -> Admission {
        if !self.session.is_accepting() {
            return Admission::Closed;
        }
        let guard = match self.in_flight.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!(ssid = %ssid, "Connection request rejected: another attempt is in flight");
                return Admission::Busy;
            }
        };

        tracing::info!(ssid = %ssid, "📡 Connection request accepted");
        self.session.begin_attempt(&ssid);
        let this = Arc::clone(self);
        Admission::Accepted(tokio::spawn(async move {
            let status = this.run_attempt(&ssid, &password).await;
            // 清理完成后才释放锁
            drop(guard);
            status
        }))
    }

    /// Drives one attempt to a terminal state, rolling back on failure.
    async fn run_attempt(&self, ssid: &str, password: &str) -> AttemptStatus {
        match self.drive(ssid, password).await {
            Ok(true) => {
                tracing::info!(ssid = %ssid, "✅ Connected");
                // 连接已确认，系统已保存 profile，待注册文件（含明文密码）不再需要
                if let Err(e) = self.profiles.discard_staged(ssid).await {
                    tracing::warn!(ssid = %ssid, "Failed to remove staged profile: {}", e);
                }
                self.session.finish_attempt(AttemptPhase::Confirmed, None);
                self.schedule_hotspot_shutdown();
                AttemptStatus::Confirmed
            }
            Ok(false) => {
                tracing::warn!(
                    ssid = %ssid,
                    window_ms = self.config.poll_window.as_millis() as u64,
                    "⏱️ No connectivity within the polling window, rolling back"
                );
                self.rollback(ssid).await;
                self.session.finish_attempt(
                    AttemptPhase::TimedOut,
                    Some("no connectivity within the polling window".to_string()),
                );
                AttemptStatus::TimedOut
            }
            Err(e) => {
                tracing::error!(ssid = %ssid, "❌ Connection attempt failed: {}", e);
                self.rollback(ssid).await;
                self.session
                    .finish_attempt(AttemptPhase::Failed, Some(e.to_string()));
                AttemptStatus::Failed
            }
        }
    }

    /// Steps 2-5. `Ok(true)` once connectivity is confirmed, `Ok(false)` when
    /// the polling window expires.
    async fn drive(&self, ssid: &str, password: &str) -> Result<bool> {
        self.enter(AttemptPhase::Staging, ssid);
        // 同名的旧 profile 必须先删除，不能与新 profile 共存
        self.profiles.unregister(ssid).await?;
        let profile = self.profiles.stage(ssid, password).await?;

        self.enter(AttemptPhase::Registering, ssid);
        self.profiles.register(&profile).await?;

        self.enter(AttemptPhase::Connecting, ssid);
        self.profiles.connect(ssid).await?;

        self.enter(AttemptPhase::Polling, ssid);
        Ok(self.await_connectivity().await)
    }

    /// Strictly sequential probes on a fixed interval, all inside one fixed
    /// deadline. A probe still running at the deadline counts as a miss.
    async fn await_connectivity(&self) -> bool {
        let start = Instant::now();
        let deadline = start + self.config.poll_window;
        let mut ticker = interval_at(start + self.config.poll_interval, self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut poll = 0u32;
        loop {
            if timeout_at(deadline, ticker.tick()).await.is_err() {
                return false;
            }
            poll += 1;
            let check = self.probe.is_internet_reachable(self.config.probe_attempts);
            match timeout_at(deadline, check).await {
                Ok(true) => {
                    tracing::debug!(poll, "Connectivity confirmed");
                    return true;
                }
                Ok(false) => tracing::debug!(poll, "No connectivity yet"),
                Err(_) => {
                    tracing::debug!(poll, "Reachability check still running at the deadline");
                    return false;
                }
            }
        }
    }

    /// Removes every trace of the attempt. Failures are logged, never raised.
    async fn rollback(&self, ssid: &str) {
        if let Err(e) = self.profiles.unregister(ssid).await {
            tracing::warn!(ssid = %ssid, "Rollback: failed to unregister profile: {}", e);
        }
        if let Err(e) = self.profiles.discard_staged(ssid).await {
            tracing::warn!(ssid = %ssid, "Rollback: failed to remove staged profile: {}", e);
        }
    }

    /// Stops the hotspot after the linger delay so the client can finish its
    /// handshake over it first.
    fn schedule_hotspot_shutdown(&self) {
        let hotspot = Arc::clone(&self.hotspot);
        let delay = self.hotspot_linger;
        tracing::info!(delay_secs = delay.as_secs(), "Hotspot shutdown scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            hotspot.stop_best_effort().await;
        });
    }

    fn enter(&self, phase: AttemptPhase, ssid: &str) {
        tracing::debug!(ssid = %ssid, ?phase, "Attempt phase");
        self.session.enter_phase(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::identity::IdentityStore;
    use crate::test_support::FakeHost;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    struct Harness {
        host: Arc<FakeHost>,
        orchestrator: Arc<ConnectionOrchestrator>,
        session: Arc<ServiceSession>,
        profiles: ProfileStore,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::default();
        let host = Arc::new(FakeHost::new());
        let session = Arc::new(ServiceSession::new());
        let hotspot = Arc::new(HotspotController::new(
            host.clone(),
            host.clone(),
            IdentityStore::new(dir.path()),
            config.hotspot.clone(),
            session.clone(),
        ));
        let orchestrator = Arc::new(ConnectionOrchestrator::new(
            ProfileStore::new(host.clone(), dir.path()),
            host.clone(),
            hotspot,
            session.clone(),
            config.connect.clone(),
            config.hotspot.shutdown_delay,
        ));
        Harness {
            profiles: ProfileStore::new(host.clone(), dir.path()),
            host,
            orchestrator,
            session,
            _dir: dir,
        }
    }

    fn accepted(admission: Admission) -> JoinHandle<AttemptStatus> {
        match admission {
            Admission::Accepted(handle) => handle,
            other => panic!("expected Accepted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_network_times_out_and_rolls_back() {
        let h = harness();

        let handle = accepted(
            h.orchestrator
                .request_connection("HomeNet".into(), "wrongpass".into()),
        );
        assert_eq!(handle.await.unwrap(), AttemptStatus::TimedOut);

        assert_eq!(h.host.probe_calls.load(Ordering::SeqCst), 5);
        assert!(h.host.known().is_empty());
        assert!(!h.profiles.staged_path("HomeNet").exists());
        assert!(!h.session.is_connected());
        assert_eq!(
            h.session.snapshot().attempt.unwrap().phase,
            AttemptPhase::TimedOut
        );
        // 锁已释放
        accepted(
            h.orchestrator
                .request_connection("HomeNet".into(), "rightpass".into()),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn second_poll_success_confirms_and_schedules_hotspot_stop() {
        let h = harness();
        h.host.online_on_probe.store(2, Ordering::SeqCst);
        let started = Instant::now();

        let handle = accepted(
            h.orchestrator
                .request_connection("HomeNet".into(), "rightpass".into()),
        );
        assert_eq!(handle.await.unwrap(), AttemptStatus::Confirmed);

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
        assert_eq!(h.host.probe_calls.load(Ordering::SeqCst), 2);
        assert!(h.session.is_connected());
        assert_eq!(h.host.known(), vec!["HomeNet"]);
        assert!(!h.profiles.staged_path("HomeNet").exists());
        assert_eq!(h.host.count("hotspot:stop"), 0);

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(h.host.count("hotspot:stop"), 0);
        assert!(h.session.is_connected());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.host.count("hotspot:stop"), 1);
        assert!(h.session.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_reachability_checks_cannot_stretch_the_window() {
        let h = harness();
        *h.host.reachability_delay.lock().unwrap() = Duration::from_millis(800);
        let started = Instant::now();

        let handle = accepted(
            h.orchestrator
                .request_connection("HomeNet".into(), "wrongpass".into()),
        );
        assert_eq!(handle.await.unwrap(), AttemptStatus::TimedOut);

        let window = AppConfig::default().connect.poll_window;
        assert!(started.elapsed() <= window + Duration::from_millis(100));
        assert_eq!(h.host.probe_calls.load(Ordering::SeqCst), 5);
        assert!(h.host.known().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_are_rejected_while_in_flight() {
        let h = harness();
        *h.host.connect_delay.lock().unwrap() = Duration::from_secs(3);

        let first = accepted(h.orchestrator.request_connection("A".into(), "password1".into()));
        for _ in 0..3 {
            assert!(matches!(
                h.orchestrator.request_connection("B".into(), "password2".into()),
                Admission::Busy
            ));
        }
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(matches!(
            h.orchestrator.request_connection("C".into(), "password3".into()),
            Admission::Busy
        ));

        assert_eq!(first.await.unwrap(), AttemptStatus::TimedOut);
        assert_eq!(h.host.count("add:B"), 0);
        assert_eq!(h.host.count("add:C"), 0);
        accepted(h.orchestrator.request_connection("D".into(), "password4".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_profile_is_removed_before_registering() {
        let h = harness();
        h.host.known.lock().unwrap().push("HomeNet".into());
        h.host.online_on_probe.store(1, Ordering::SeqCst);

        let handle = accepted(
            h.orchestrator
                .request_connection("HomeNet".into(), "rightpass".into()),
        );
        assert_eq!(handle.await.unwrap(), AttemptStatus::Confirmed);

        let events = h.host.events();
        let delete = events.iter().position(|e| e == "delete:HomeNet").unwrap();
        let add = events.iter().position(|e| e == "add:HomeNet").unwrap();
        assert!(delete < add);
        assert_eq!(h.host.known(), vec!["HomeNet"]);
    }

    #[tokio::test(start_paused = true)]
    async fn registration_failure_fails_without_polling() {
        let h = harness();
        h.host.fail_register.store(true, Ordering::SeqCst);

        let handle = accepted(
            h.orchestrator
                .request_connection("HomeNet".into(), "rightpass".into()),
        );
        assert_eq!(handle.await.unwrap(), AttemptStatus::Failed);

        assert_eq!(h.host.probe_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.host.count("connect:HomeNet"), 0);
        assert!(h.host.known().is_empty());
        assert!(!h.profiles.staged_path("HomeNet").exists());
        let attempt = h.session.snapshot().attempt.unwrap();
        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert!(attempt.message.unwrap().contains("registration"));
    }

    #[tokio::test]
    async fn closed_session_admits_nothing() {
        let h = harness();
        h.session.mark_wired_link();

        assert!(matches!(
            h.orchestrator.request_connection("HomeNet".into(), "rightpass".into()),
            Admission::Closed
        ));
        assert!(h.host.events().is_empty());
    }
}
