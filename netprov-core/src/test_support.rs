//! Scripted stand-ins for the OS capability traits.

use crate::identity::{HotspotIdentity, MacAddress};
use crate::traits::{
    AdapterClass, AdapterInventory, CommandOutput, CommandRunner, HostedNetwork, Network,
    NetworkProbe, ProfileRegistry, WifiScanner,
};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// One fake host: network probe, adapter inventory, hosted network and
/// profile registry at once. Every call is appended to `events`.
#[derive(Default)]
pub struct FakeHost {
    pub events: Mutex<Vec<String>>,
    pub known: Mutex<Vec<String>>,
    pub wired: AtomicBool,
    /// Internet probes start succeeding on this call (1-based); `0` never succeeds.
    pub online_on_probe: AtomicU32,
    pub probe_calls: AtomicU32,
    /// How long each internet reachability check takes to answer.
    pub reachability_delay: Mutex<Duration>,
    pub wired_mac: Mutex<Option<MacAddress>>,
    pub wireless_mac: Mutex<Option<MacAddress>>,
    pub fail_register: AtomicBool,
    pub fail_stop: AtomicBool,
    pub connect_delay: Mutex<Duration>,
    pub configured: Mutex<Option<HotspotIdentity>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }

    pub fn known(&self) -> Vec<String> {
        self.known.lock().unwrap().clone()
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

#[async_trait]
impl NetworkProbe for FakeHost {
    async fn is_link_up(&self, class: AdapterClass) -> Result<bool> {
        Ok(class == AdapterClass::Wired && self.wired.load(Ordering::SeqCst))
    }

    async fn is_internet_reachable(&self, _attempts: u32) -> bool {
        let call = self.probe_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.reachability_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let threshold = self.online_on_probe.load(Ordering::SeqCst);
        threshold != 0 && call >= threshold
    }
}

#[async_trait]
impl AdapterInventory for FakeHost {
    async fn hardware_address(&self, class: AdapterClass) -> Result<Option<MacAddress>> {
        Ok(match class {
            AdapterClass::Wired => *self.wired_mac.lock().unwrap(),
            AdapterClass::Wireless => *self.wireless_mac.lock().unwrap(),
        })
    }
}

#[async_trait]
impl HostedNetwork for FakeHost {
    async fn configure(&self, identity: &HotspotIdentity) -> Result<()> {
        self.record(format!("configure:{}", identity.ssid));
        *self.configured.lock().unwrap() = Some(identity.clone());
        Ok(())
    }

    async fn unconfigure(&self) -> Result<()> {
        self.record("unconfigure");
        *self.configured.lock().unwrap() = None;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.record("hotspot:start");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record("hotspot:stop");
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(Error::CommandFailed("hosted network is not started".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRegistry for FakeHost {
    async fn known_profiles(&self) -> Result<Vec<String>> {
        Ok(self.known())
    }

    fn profile_file_name(&self, ssid: &str) -> String {
        format!("{}.profile", ssid)
    }

    // 第一行是 ssid，add() 读取它来模拟系统解析 profile 文件
    fn render_profile(&self, ssid: &str, password: &str) -> String {
        format!("{}\n{}\n", ssid, password)
    }

    async fn add(&self, path: &Path) -> Result<()> {
        let body = tokio::fs::read_to_string(path).await?;
        let ssid = body.lines().next().unwrap_or_default().to_string();
        self.record(format!("add:{}", ssid));
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(Error::CommandFailed("profile format is invalid".into()));
        }
        self.known.lock().unwrap().push(ssid);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.record(format!("delete:{}", name));
        self.known.lock().unwrap().retain(|p| p != name);
        Ok(())
    }

    async fn connect(&self, name: &str) -> Result<()> {
        self.record(format!("connect:{}", name));
        let delay = *self.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl WifiScanner for FakeHost {
    async fn scan(&self) -> Result<Vec<Network>> {
        Ok(vec![Network {
            ssid: "HomeNet".into(),
            signal: 80,
            security: "WPA2".into(),
        }])
    }
}

/// Answers commands from a table keyed by `program arg arg ...`.
#[derive(Default)]
pub struct ScriptedRunner {
    pub replies: Mutex<HashMap<String, CommandOutput>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, command: &str, stdout: &str) {
        self.replies.lock().unwrap().insert(
            command.to_string(),
            CommandOutput {
                success: true,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
    }

    pub fn fail(&self, command: &str, stderr: &str) {
        self.replies.lock().unwrap().insert(
            command.to_string(),
            CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.calls.lock().unwrap().push(line.clone());
        // 未登记的命令视为成功且无输出
        Ok(self
            .replies
            .lock()
            .unwrap()
            .get(&line)
            .cloned()
            .unwrap_or(CommandOutput {
                success: true,
                ..CommandOutput::default()
            }))
    }
}
