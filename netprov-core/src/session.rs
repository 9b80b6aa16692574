//! Process-wide provisioning state.
//!
//! Handlers only ever read a [`SessionSnapshot`]; every mutation goes through
//! the crate-internal transitions below, called by the hotspot controller,
//! the connection orchestrator and the watchdog.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Steps of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    Staging,
    Registering,
    Connecting,
    Polling,
    Confirmed,
    TimedOut,
    Failed,
}

impl AttemptPhase {
    pub fn status(self) -> AttemptStatus {
        match self {
            AttemptPhase::Confirmed => AttemptStatus::Confirmed,
            AttemptPhase::TimedOut => AttemptStatus::TimedOut,
            AttemptPhase::Failed => AttemptStatus::Failed,
            _ => AttemptStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Confirmed,
    TimedOut,
    Failed,
}

/// The current, or most recently finished, connection attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionAttempt {
    pub ssid: String,
    pub phase: AttemptPhase,
    pub status: AttemptStatus,
    pub message: Option<String>,
    #[serde(skip)]
    pub started_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub hotspot_active: bool,
    pub connected: bool,
    pub wired_link_detected: bool,
    pub accepting: bool,
    pub attempt: Option<ConnectionAttempt>,
}

#[derive(Debug)]
pub struct ServiceSession {
    state: Mutex<SessionSnapshot>,
}

impl Default for ServiceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionSnapshot {
                hotspot_active: false,
                connected: false,
                wired_link_detected: false,
                accepting: true,
                attempt: None,
            }),
        }
    }

    // 锁内只做字段读写，不会在持锁期间 panic
    fn state(&self) -> MutexGuard<'_, SessionSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    pub fn is_hotspot_active(&self) -> bool {
        self.state().hotspot_active
    }

    /// `false` once the wired-link watchdog has fired.
    pub fn is_accepting(&self) -> bool {
        self.state().accepting
    }

    pub fn wired_link_detected(&self) -> bool {
        self.state().wired_link_detected
    }

    pub(crate) fn set_hotspot_active(&self, active: bool) {
        self.state().hotspot_active = active;
    }

    pub(crate) fn begin_attempt(&self, ssid: &str) {
        self.state().attempt = Some(ConnectionAttempt {
            ssid: ssid.to_string(),
            phase: AttemptPhase::Staging,
            status: AttemptStatus::Pending,
            message: None,
            started_at: Instant::now(),
        });
    }

    pub(crate) fn enter_phase(&self, phase: AttemptPhase) {
        if let Some(attempt) = self.state().attempt.as_mut() {
            attempt.phase = phase;
            attempt.status = phase.status();
        }
    }

    pub(crate) fn finish_attempt(&self, phase: AttemptPhase, message: Option<String>) {
        let mut state = self.state();
        if phase == AttemptPhase::Confirmed {
            state.connected = true;
        }
        if let Some(attempt) = state.attempt.as_mut() {
            attempt.phase = phase;
            attempt.status = phase.status();
            attempt.message = message;
        }
    }

    /// Records the wired link and closes admissions. Returns `true` the first time.
    pub(crate) fn mark_wired_link(&self) -> bool {
        let mut state = self.state();
        let first = !state.wired_link_detected;
        state.wired_link_detected = true;
        state.accepting = false;
        first
    }
}
